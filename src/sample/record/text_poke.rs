use super::{Header, SampleId};
use crate::ffi::Cursor;

/// Kernel text modified in place.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextPoke {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub addr: u64,
    pub old_bytes: Vec<u8>,
    pub new_bytes: Vec<u8>,
}

impl TextPoke {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1208
    // struct {
    //     struct perf_event_header header;
    //     u64 addr;
    //     u16 old_len;
    //     u16 new_len;
    //     u8 bytes[];
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        let addr = c.read()?;
        let old_len = c.read::<u16>()? as usize;
        let new_len = c.read::<u16>()? as usize;
        let old_bytes = c.bytes(old_len)?.to_vec();
        let new_bytes = c.bytes(new_len)?.to_vec();
        Some(Self {
            header,
            sample_id,
            addr,
            old_bytes,
            new_bytes,
        })
    }
}

super::from!(TextPoke);
