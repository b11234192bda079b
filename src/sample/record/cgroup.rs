use super::{Header, SampleId};
use crate::ffi::Cursor;

/// New cgroup created and activated.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cgroup {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    /// Matches [`Sample::cgroup`][super::Sample::cgroup].
    pub id: u64,
    pub path: String,
}

impl Cgroup {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1194
    // struct {
    //     struct perf_event_header header;
    //     u64 id;
    //     char path[];
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
            id: c.read()?,
            path: c.padded_str()?,
        })
    }
}

super::from!(Cgroup);
