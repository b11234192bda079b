use super::{Header, SampleId};
use crate::ffi::Cursor;

/// Sampling throttled or unthrottled by the kernel's interrupt rate limit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Throttle {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub time: u64,
    pub id: u64,
    pub stream_id: u64,
}

impl Throttle {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L922
    // struct {
    //     struct perf_event_header header;
    //     u64 time;
    //     u64 id;
    //     u64 stream_id;
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
            time: c.read()?,
            id: c.read()?,
            stream_id: c.read()?,
        })
    }
}
