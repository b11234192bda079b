use super::{Header, SampleId};
use crate::count::{stat, Count, GroupCount};
use crate::ffi::{bindings as b, Cursor};

/// Counter values written when an inherited child task exits.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Read {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub pid: u32,
    pub tid: u32,
    pub values: ReadValues,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadValues {
    Single(Count),
    Group(GroupCount),
}

impl Read {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L931
    // struct {
    //     struct perf_event_header header;
    //     u32 pid, tid;
    //     struct read_format values;
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        read_format: u64,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        let pid = c.read()?;
        let tid = c.read()?;
        let values = if read_format & b::PERF_FORMAT_GROUP as u64 > 0 {
            ReadValues::Group(stat::parse_group(c, read_format)?)
        } else {
            ReadValues::Single(stat::parse_count(c, read_format)?)
        };
        Some(Self {
            header,
            sample_id,
            pid,
            tid,
            values,
        })
    }
}

super::from!(Read);
