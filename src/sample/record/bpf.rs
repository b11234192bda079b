use super::{Header, SampleId};
use crate::ffi::Cursor;

const BPF_TAG_SIZE: usize = 8;

/// BPF program loaded or unloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BpfEvent {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    /// `PERF_BPF_EVENT_PROG_LOAD` or `PERF_BPF_EVENT_PROG_UNLOAD`.
    pub ty: u16,
    pub flags: u16,
    /// Program id.
    pub id: u32,
    pub tag: [u8; BPF_TAG_SIZE],
}

impl BpfEvent {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1176
    // struct {
    //     struct perf_event_header header;
    //     u16 type;
    //     u16 flags;
    //     u32 id;
    //     u8 tag[BPF_TAG_SIZE];
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        let ty = c.read()?;
        let flags = c.read()?;
        let id = c.read()?;
        let tag = c.bytes(BPF_TAG_SIZE)?.try_into().ok()?;
        Some(Self {
            header,
            sample_id,
            ty,
            flags,
            id,
            tag,
        })
    }
}

super::from!(BpfEvent);
