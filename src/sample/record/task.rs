use super::{Header, SampleId};
use crate::ffi::Cursor;

/// Process creation or exit, delivered as [`Record::Fork`][super::Record::Fork]
/// or [`Record::Exit`][super::Record::Exit].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub pid: u32,
    pub ppid: u32,
    pub tid: u32,
    pub ptid: u32,
    pub time: u64,
}

impl Task {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L912
    // struct {
    //     struct perf_event_header header;
    //     u32 pid, ppid;
    //     u32 tid, ptid;
    //     u64 time;
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
            ppid: c.read()?,
            tid: c.read()?,
            ptid: c.read()?,
            time: c.read()?,
        })
    }
}
