use std::io;

use thiserror::Error;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The attribute is self-inconsistent, or the kernel rejected it as invalid.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// `perf_event_paranoid` or the process capabilities do not allow the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(#[source] io::Error),

    /// The kernel or the PMU does not support a requested bit or option.
    #[error("unsupported by the kernel: {0}")]
    UnsupportedFeature(#[source] io::Error),

    /// Too many open counters, or the mlock limit was hit while mapping the ring.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[source] io::Error),

    /// A tracepoint or PMU could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// Group operation on a follower or on an event without a grouped count format.
    #[error("not a group leader")]
    NotAGroupLeader,

    /// Records were requested before the ring was mapped.
    #[error("ring is not mapped")]
    RingNotMapped,

    /// The event was disabled by the kernel, either because the refresh quota
    /// ran out or because the monitored task exited.
    #[error("event disabled")]
    Disabled,

    /// The ring broke its framing invariants. The event only accepts `close` from now on.
    #[error("ring buffer is corrupt")]
    CorruptRing,

    /// The event was poisoned by an earlier fatal error.
    #[error("event is poisoned")]
    Poisoned,

    /// The operation is not valid in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("canceled")]
    Canceled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Field-less mirror of [`Error`] for matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConfigInvalid,
    PermissionDenied,
    UnsupportedFeature,
    ResourceExhausted,
    NotFound,
    NotAGroupLeader,
    RingNotMapped,
    Disabled,
    CorruptRing,
    Poisoned,
    InvalidState,
    DeadlineExceeded,
    Canceled,
    Io,
}

pub type Result<T> = std::result::Result<T, Error>;

/// The syscall an OS error came from, errnos mean different things per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    Open,
    Mmap,
    Ioctl,
    Read,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotAGroupLeader => ErrorKind::NotAGroupLeader,
            Self::RingNotMapped => ErrorKind::RingNotMapped,
            Self::Disabled => ErrorKind::Disabled,
            Self::CorruptRing => ErrorKind::CorruptRing,
            Self::Poisoned => ErrorKind::Poisoned,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Canceled => ErrorKind::Canceled,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns the errno behind this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::PermissionDenied(e)
            | Self::UnsupportedFeature(e)
            | Self::ResourceExhausted(e)
            | Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    pub(crate) fn os(e: io::Error, origin: Origin) -> Self {
        let Some(errno) = e.raw_os_error() else {
            return Self::Io(e);
        };
        match (errno, origin) {
            // Mapping more than `perf_event_mlock_kb` without CAP_IPC_LOCK.
            (libc::EPERM | libc::ENOMEM, Origin::Mmap) => Self::ResourceExhausted(e),
            (libc::EACCES | libc::EPERM, _) => Self::PermissionDenied(e),
            (libc::ENOENT, Origin::Open) => Self::UnsupportedFeature(e),
            (libc::EOPNOTSUPP | libc::ENODEV | libc::ENOSYS | libc::E2BIG, _) => {
                Self::UnsupportedFeature(e)
            }
            (libc::EMFILE | libc::ENFILE | libc::ENOSPC | libc::ENOMEM | libc::EBUSY, _) => {
                Self::ResourceExhausted(e)
            }
            (libc::EINVAL, Origin::Open) => Self::ConfigInvalid(format!("rejected by the kernel: {e}")),
            _ => Self::Io(e),
        }
    }

    /// Whether the error leaves the event in an unknown state.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self.raw_os_error(),
            Some(libc::EBADF | libc::EFAULT | libc::EIO | libc::ENODEV)
        )
    }
}

/// Retries `f` while it fails with `EINTR`.
pub(crate) fn retry<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
