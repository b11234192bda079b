use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::ffi::syscall::{gettid, sched_setaffinity};

/// Proof that the current code runs on one OS thread.
///
/// Events opened for [`Target::CallingThread`][super::Target::CallingThread]
/// are bound to the thread that opened them, and their ioctls should be issued
/// from that same thread. Holding a pin for as long as the event lives makes
/// that explicit. The guard is `!Send` so it cannot leave the thread.
///
/// # Examples
///
/// ```rust
/// use perf_event_ring::config::ThreadPin;
///
/// let pin = ThreadPin::current();
/// assert!(pin.is_current());
/// ```
#[derive(Debug)]
pub struct ThreadPin {
    tid: i32,
    _not_send: PhantomData<*const ()>,
}

impl ThreadPin {
    pub fn current() -> Self {
        Self {
            tid: gettid(),
            _not_send: PhantomData,
        }
    }

    /// Pins the current thread and restricts it to `cpu`.
    pub fn to_cpu(cpu: u32) -> Result<Self> {
        if cpu as usize >= libc::CPU_SETSIZE as usize {
            return Err(Error::ConfigInvalid(format!("cpu {cpu} out of range")));
        }
        sched_setaffinity(cpu)?;
        Ok(Self::current())
    }

    /// Kernel thread id of the pinned thread.
    pub fn tid(&self) -> i32 {
        self.tid
    }

    pub fn is_current(&self) -> bool {
        self.tid == gettid()
    }
}
