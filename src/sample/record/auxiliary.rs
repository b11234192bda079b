use super::{Header, SampleId};
use crate::ffi::{bindings as b, Cursor};

/// New data landed in the AUX area.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aux {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub offset: u64,
    pub size: u64,
    /// `PERF_AUX_FLAG_*` bits.
    pub flags: u64,
}

impl Aux {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1076
    // struct {
    //     struct perf_event_header header;
    //     u64 aux_offset;
    //     u64 aux_size;
    //     u64 flags;
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
            offset: c.read()?,
            size: c.read()?,
            flags: c.read()?,
        })
    }

    /// The snapshot was cut short for lack of space.
    pub fn truncated(&self) -> bool {
        self.flags & b::PERF_AUX_FLAG_TRUNCATED > 0
    }

    pub fn overwrite(&self) -> bool {
        self.flags & b::PERF_AUX_FLAG_OVERWRITE > 0
    }

    pub fn partial(&self) -> bool {
        self.flags & b::PERF_AUX_FLAG_PARTIAL > 0
    }

    pub fn collision(&self) -> bool {
        self.flags & b::PERF_AUX_FLAG_COLLISION > 0
    }
}

super::from!(Aux);

/// Hardware id of the AUX output, e.g. the Arm CoreSight trace id.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuxOutputHwId {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub hw_id: u64,
}

impl AuxOutputHwId {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1222
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        Some(Self {
            header,
            sample_id,
            hw_id: c.read()?,
        })
    }
}

super::from!(AuxOutputHwId);
