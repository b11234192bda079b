//! Event attributes.
//!
//! [`Attr`] is the whole configuration of one event. It is filled by an
//! [event configurator][crate::event::Configure] plus the options below,
//! then serialised into the kernel's `perf_event_attr` layout when the
//! event is opened.

use crate::error::{Error, Result};

pub(crate) mod attr;
mod format;
mod opt;
mod pin;
mod target;

pub use format::*;
pub use opt::{Opt, Options};
pub use pin::*;
pub use target::*;

#[cfg(test)]
mod test;

/// Controls when a sample record is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sampling {
    /// Sample every N events, 0 means counting only.
    Period(u64),
    /// Sample N times per second, the kernel adjusts the period on the fly.
    Frequency(u64),
}

impl Default for Sampling {
    fn default() -> Self {
        Self::Period(0)
    }
}

/// Controls when a reader blocked on the ring is woken up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Wakeup {
    /// After N sample records, 0 is treated as 1 by the kernel.
    Events(u32),
    /// After N bytes are written to the ring.
    Watermark(u32),
}

impl Default for Wakeup {
    fn default() -> Self {
        Self::Events(0)
    }
}

/// Skid constraint of the sampled instruction pointer (`precise_ip`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Skid {
    #[default]
    Arbitrary = 0,
    Constant = 1,
    RequestZero = 2,
    Zero = 3,
}

/// Configuration of one event.
///
/// # Examples
///
/// ```rust
/// use perf_event_ring::config::{Attr, Opt, Sampling};
/// use perf_event_ring::event::{sw::Software, Configure};
///
/// let mut attr = Attr::default();
/// Software::TaskClock.configure(&mut attr).unwrap();
/// attr.options.set(Opt::Disabled, true);
/// attr.set_sample_frequency(1000);
/// attr.sample_format.ip = true;
///
/// assert_eq!(attr.sampling(), Sampling::Frequency(1000));
/// attr.validate().unwrap();
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attr {
    /// Free-form label, copied into every count read from the event.
    pub label: String,

    /// Event type, `PERF_TYPE_*` or a dynamic PMU type.
    pub ty: u32,
    pub config: u64,
    /// Also `bp_addr` for breakpoints.
    pub config1: u64,
    /// Also `bp_len` for breakpoints.
    pub config2: u64,
    pub config3: u64,
    pub bp_type: u32,

    sampling: Sampling,
    wakeup: Wakeup,
    pub options: Options,
    pub skid: Skid,

    pub sample_format: SampleFormat,
    pub count_format: CountFormat,
    pub branch_sample: BranchSample,
    /// Registers to dump in [`SampleFormat::regs_user`], an arch-specific bit mask.
    pub sample_regs_user: u64,
    /// Bytes of user stack to dump in [`SampleFormat::stack_user`].
    pub sample_stack_user: u32,
    /// Registers to dump in [`SampleFormat::regs_intr`].
    pub sample_regs_intr: u64,
    /// Maximum callchain depth, 0 uses the system default.
    pub sample_max_stack: u16,
    /// Clock used for time fields, e.g. `libc::CLOCK_MONOTONIC`.
    pub clock: Option<i32>,

    pub aux_watermark: u32,
    pub aux_sample_size: u32,
    /// Passed to the signal handler in `si_perf_data` when [`Opt::Sigtrap`] is set.
    pub sig_data: u64,
}

impl Attr {
    /// Samples every `n` events, leaving frequency mode.
    pub fn set_sample_period(&mut self, n: u64) {
        self.sampling = Sampling::Period(n);
    }

    /// Samples `n` times per second, leaving period mode.
    pub fn set_sample_frequency(&mut self, n: u64) {
        self.sampling = Sampling::Frequency(n);
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Wakes up readers after `n` sample records.
    pub fn set_wakeup_events(&mut self, n: u32) {
        self.wakeup = Wakeup::Events(n);
    }

    /// Wakes up readers after `bytes` bytes.
    pub fn set_wakeup_watermark(&mut self, bytes: u32) {
        self.wakeup = Wakeup::Watermark(bytes);
    }

    pub fn wakeup(&self) -> Wakeup {
        self.wakeup
    }

    pub fn set(&mut self, opt: Opt, on: bool) {
        self.options.set(opt, on);
    }

    pub fn get(&self, opt: Opt) -> bool {
        self.options.get(opt)
    }

    /// Checks the attribute for combinations the kernel would reject.
    ///
    /// This runs before every open, so self-inconsistent attributes never reach the syscall.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::ConfigInvalid(msg.to_string()));

        let sampling = match self.sampling {
            Sampling::Period(n) => n > 0,
            Sampling::Frequency(0) => return invalid("sample frequency must be non-zero"),
            Sampling::Frequency(_) => true,
        };

        let fmt = &self.sample_format;
        if fmt.needs_sampling() && !sampling {
            return invalid("sample fields require a sample period or frequency");
        }
        if fmt.regs_user && self.sample_regs_user == 0 {
            return invalid("user registers requested with an empty mask");
        }
        if fmt.regs_intr && self.sample_regs_intr == 0 {
            return invalid("interrupt registers requested with an empty mask");
        }
        if fmt.stack_user && (self.sample_stack_user == 0 || self.sample_stack_user % 8 != 0) {
            return invalid("user stack size must be a non-zero multiple of 8");
        }
        if fmt.branch_stack && !self.branch_sample.has_type() {
            return invalid("branch stack requested without a branch type");
        }
        if fmt.weight && fmt.weight_struct {
            return invalid("weight and weight_struct are exclusive");
        }
        if self.get(Opt::Sigtrap) && !self.get(Opt::RemoveOnExec) {
            return invalid("sigtrap requires remove_on_exec");
        }
        if self.get(Opt::InheritThread) && !self.get(Opt::Inherit) {
            return invalid("inherit_thread requires inherit");
        }
        Ok(())
    }
}
