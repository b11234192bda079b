use super::{Header, SampleId};
use crate::ffi::{bindings as b, Cursor};

/// Process name changed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Comm {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub pid: u32,
    pub tid: u32,
    pub comm: String,
}

impl Comm {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L901
    // struct {
    //     struct perf_event_header header;
    //     u32  pid, tid;
    //     char comm[];
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        Some(Self {
            header,
            sample_id,
            pid: c.read()?,
            tid: c.read()?,
            comm: c.padded_str()?,
        })
    }

    /// The name changed because of `execve(2)`.
    pub fn by_execve(&self) -> bool {
        self.header.misc_bit(b::PERF_RECORD_MISC_COMM_EXEC)
    }
}

super::from!(Comm);
