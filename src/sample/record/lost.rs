use super::{Header, SampleId};
use crate::ffi::Cursor;

// Counts records dropped because the ring was full or paused:
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L178
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L203
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lost {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    /// Id of the event whose records were dropped.
    pub id: u64,
    pub lost: u64,
}

impl Lost {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L891
    // struct {
    //     struct perf_event_header header;
    //     u64 id;
    //     u64 lost;
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
            lost: c.read()?,
        })
    }
}

super::from!(Lost);

/// Samples dropped by the PMU itself, e.g. when an Intel PEBS record could
/// not be attributed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LostSamples {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub lost: u64,
}

impl LostSamples {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1105
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        Some(Self {
            header,
            sample_id,
            lost: c.read()?,
        })
    }
}

super::from!(LostSamples);
