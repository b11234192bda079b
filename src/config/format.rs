use std::ops::BitOr;

use crate::ffi::bindings as b;

/// Optional fields of [`Sample`][crate::sample::record::Sample] records.
///
/// Fields appear in the record in declaration order, which is the kernel's order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleFormat {
    /// Event id at a fixed position, needed to demultiplex redirected streams.
    pub identifier: bool,
    /// Instruction pointer.
    pub ip: bool,
    /// Process and thread id.
    pub tid: bool,
    pub time: bool,
    /// Data address, for tracepoints, breakpoints and some software events.
    pub addr: bool,
    pub id: bool,
    pub stream_id: bool,
    pub cpu: bool,
    pub period: bool,
    /// Counter values, shaped by [`CountFormat`].
    pub read: bool,
    pub callchain: bool,
    pub raw: bool,
    pub branch_stack: bool,
    pub regs_user: bool,
    pub stack_user: bool,
    pub weight: bool,
    /// Three-part weight, exclusive with [`weight`][Self::weight].
    pub weight_struct: bool,
    pub data_src: bool,
    pub transaction: bool,
    pub regs_intr: bool,
    pub phys_addr: bool,
    pub aux: bool,
    pub cgroup: bool,
    pub data_page_size: bool,
    pub code_page_size: bool,
}

macro_rules! format_bits {
    ($self:ident, $val:ident, [$($field:ident => $flag:ident,)*]) => {
        $(if $self.$field {
            $val |= b::$flag;
        })*
    };
}

impl SampleFormat {
    pub(crate) fn as_sample_type(&self) -> u64 {
        let mut val = 0;
        format_bits!(self, val, [
            identifier => PERF_SAMPLE_IDENTIFIER,
            ip => PERF_SAMPLE_IP,
            tid => PERF_SAMPLE_TID,
            time => PERF_SAMPLE_TIME,
            addr => PERF_SAMPLE_ADDR,
            id => PERF_SAMPLE_ID,
            stream_id => PERF_SAMPLE_STREAM_ID,
            cpu => PERF_SAMPLE_CPU,
            period => PERF_SAMPLE_PERIOD,
            read => PERF_SAMPLE_READ,
            callchain => PERF_SAMPLE_CALLCHAIN,
            raw => PERF_SAMPLE_RAW,
            branch_stack => PERF_SAMPLE_BRANCH_STACK,
            regs_user => PERF_SAMPLE_REGS_USER,
            stack_user => PERF_SAMPLE_STACK_USER,
            weight => PERF_SAMPLE_WEIGHT,
            weight_struct => PERF_SAMPLE_WEIGHT_STRUCT,
            data_src => PERF_SAMPLE_DATA_SRC,
            transaction => PERF_SAMPLE_TRANSACTION,
            regs_intr => PERF_SAMPLE_REGS_INTR,
            phys_addr => PERF_SAMPLE_PHYS_ADDR,
            aux => PERF_SAMPLE_AUX,
            cgroup => PERF_SAMPLE_CGROUP,
            data_page_size => PERF_SAMPLE_DATA_PAGE_SIZE,
            code_page_size => PERF_SAMPLE_CODE_PAGE_SIZE,
        ]);
        val
    }

    /// Whether any field that only exists on overflow is requested.
    pub(crate) fn needs_sampling(&self) -> bool {
        self.callchain
            || self.raw
            || self.branch_stack
            || self.regs_user
            || self.stack_user
            || self.regs_intr
            || self.aux
    }
}

/// Shape of the values returned by reading a counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CountFormat {
    pub time_enabled: bool,
    pub time_running: bool,
    pub id: bool,
    /// Read the whole group through the leader.
    pub group: bool,
    /// Number of lost records, since `linux-6.0`.
    pub lost: bool,
}

impl CountFormat {
    pub(crate) fn as_read_format(&self) -> u64 {
        let mut val = 0;
        format_bits!(self, val, [
            time_enabled => PERF_FORMAT_TOTAL_TIME_ENABLED,
            time_running => PERF_FORMAT_TOTAL_TIME_RUNNING,
            id => PERF_FORMAT_ID,
            group => PERF_FORMAT_GROUP,
            lost => PERF_FORMAT_LOST,
        ]);
        val as u64
    }
}

/// Branch sampling filter, used with [`SampleFormat::branch_stack`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchSample(pub u64);

impl BranchSample {
    pub const USER: Self = Self(b::PERF_SAMPLE_BRANCH_USER as u64);
    pub const KERNEL: Self = Self(b::PERF_SAMPLE_BRANCH_KERNEL as u64);
    pub const HV: Self = Self(b::PERF_SAMPLE_BRANCH_HV as u64);
    pub const ANY: Self = Self(b::PERF_SAMPLE_BRANCH_ANY as u64);
    pub const ANY_CALL: Self = Self(b::PERF_SAMPLE_BRANCH_ANY_CALL as u64);
    pub const ANY_RETURN: Self = Self(b::PERF_SAMPLE_BRANCH_ANY_RETURN as u64);
    pub const IND_CALL: Self = Self(b::PERF_SAMPLE_BRANCH_IND_CALL as u64);
    pub const ABORT_TX: Self = Self(b::PERF_SAMPLE_BRANCH_ABORT_TX as u64);
    pub const IN_TX: Self = Self(b::PERF_SAMPLE_BRANCH_IN_TX as u64);
    pub const NO_TX: Self = Self(b::PERF_SAMPLE_BRANCH_NO_TX as u64);
    pub const COND: Self = Self(b::PERF_SAMPLE_BRANCH_COND as u64);
    pub const CALL_STACK: Self = Self(b::PERF_SAMPLE_BRANCH_CALL_STACK as u64);
    pub const IND_JUMP: Self = Self(b::PERF_SAMPLE_BRANCH_IND_JUMP as u64);
    pub const CALL: Self = Self(b::PERF_SAMPLE_BRANCH_CALL as u64);
    pub const NO_FLAGS: Self = Self(b::PERF_SAMPLE_BRANCH_NO_FLAGS as u64);
    pub const NO_CYCLES: Self = Self(b::PERF_SAMPLE_BRANCH_NO_CYCLES as u64);
    pub const TYPE_SAVE: Self = Self(b::PERF_SAMPLE_BRANCH_TYPE_SAVE as u64);
    /// Adds `hw_idx` to the branch stack.
    pub const HW_INDEX: Self = Self(b::PERF_SAMPLE_BRANCH_HW_INDEX as u64);
    pub const PRIV_SAVE: Self = Self(b::PERF_SAMPLE_BRANCH_PRIV_SAVE as u64);
    /// Adds per-entry counters to the branch stack.
    pub const COUNTERS: Self = Self(b::PERF_SAMPLE_BRANCH_COUNTERS as u64);

    const PRIV: u64 = Self::USER.0 | Self::KERNEL.0 | Self::HV.0;

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether a branch type beyond the privilege levels is selected.
    pub(crate) fn has_type(self) -> bool {
        self.0 & !Self::PRIV != 0
    }
}

impl BitOr for BranchSample {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
