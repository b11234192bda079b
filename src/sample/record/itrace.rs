use super::{Header, SampleId};
use crate::ffi::Cursor;

/// Instruction tracing started for a task.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItraceStart {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub pid: u32,
    pub tid: u32,
}

impl ItraceStart {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1092
    // struct {
    //     struct perf_event_header header;
    //     u32 pid;
    //     u32 tid;
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
        })
    }
}

super::from!(ItraceStart);
