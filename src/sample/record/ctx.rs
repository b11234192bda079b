use super::{Header, SampleId};
use crate::ffi::{bindings as b, Cursor};

/// Context switch of the monitored task.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Switch {
    pub header: Header,
    pub sample_id: Option<SampleId>,
}

impl Switch {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1116
    // struct {
    //     struct perf_event_header header;
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(header: Header, sample_id: Option<SampleId>) -> Self {
        Self { header, sample_id }
    }

    /// Switching out, as opposed to switching in.
    pub fn out(&self) -> bool {
        self.header.misc_bit(b::PERF_RECORD_MISC_SWITCH_OUT)
    }

    /// Switched out while still runnable.
    pub fn preempt(&self) -> bool {
        self.header.misc_bit(b::PERF_RECORD_MISC_SWITCH_OUT_PREEMPT)
    }
}

super::from!(Switch);

/// Context switch seen by a CPU-wide event.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchCpuWide {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    /// Task switched to when switching out, task switched from otherwise.
    pub next_prev_pid: u32,
    pub next_prev_tid: u32,
}

impl SwitchCpuWide {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1127
    // struct {
    //     struct perf_event_header header;
    //     u32 next_prev_pid;
    //     u32 next_prev_tid;
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
            next_prev_pid: c.read()?,
            next_prev_tid: c.read()?,
        })
    }

    pub fn out(&self) -> bool {
        self.header.misc_bit(b::PERF_RECORD_MISC_SWITCH_OUT)
    }

    pub fn preempt(&self) -> bool {
        self.header.misc_bit(b::PERF_RECORD_MISC_SWITCH_OUT_PREEMPT)
    }
}

super::from!(SwitchCpuWide);
