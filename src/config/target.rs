use std::os::fd::RawFd;

use crate::error::{Error, Result};
use crate::ffi::bindings as b;

/// Which tasks an event monitors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// The OS thread calling `open`.
    CallingThread,
    /// Every task, requires a specific CPU.
    AnyPid,
    /// A process or thread id.
    Pid(u32),
    /// Tasks of a cgroup, given as an fd of its directory in cgroupfs.
    /// Requires a specific CPU.
    Cgroup(RawFd),
}

/// Which CPUs an event monitors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cpu {
    Any,
    Id(u32),
}

/// Arguments of `perf_event_open` derived from a target and a CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenArgs {
    pub pid: i32,
    pub cpu: i32,
    pub flags: u64,
}

impl Target {
    pub(crate) fn resolve(self, cpu: Cpu) -> Result<OpenArgs> {
        let cpu_arg = match cpu {
            Cpu::Any => -1,
            Cpu::Id(n) => i32::try_from(n)
                .map_err(|_| Error::ConfigInvalid(format!("cpu {n} out of range")))?,
        };
        let (pid, flags) = match (self, cpu) {
            // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L12835
            (Target::AnyPid | Target::Cgroup(_), Cpu::Any) => {
                return Err(Error::ConfigInvalid(
                    "either the target or the cpu must be specific".to_string(),
                ));
            }
            (Target::CallingThread, _) => (0, 0),
            (Target::AnyPid, _) => (-1, 0),
            (Target::Pid(pid), _) => {
                // Must not wrap into -1, which selects every task.
                let pid = i32::try_from(pid)
                    .map_err(|_| Error::ConfigInvalid(format!("pid {pid} out of range")))?;
                (pid, 0)
            }
            (Target::Cgroup(fd), _) => (fd, b::PERF_FLAG_PID_CGROUP),
        };

        Ok(OpenArgs {
            pid,
            cpu: cpu_arg,
            flags,
        })
    }
}
