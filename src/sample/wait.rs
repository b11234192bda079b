use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use super::cancel::ReadCtx;
use crate::error::{retry, Error, Origin, Result};
use crate::ffi::syscall::{eventfd, poll, read, timerfd_create, timerfd_settime};

/// Why a wait returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    Readable,
    Hup,
    Timeout,
    Canceled,
}

/// Blocks a reader on the perf fd, a deadline timer and a cancel eventfd at once.
pub(crate) struct Waiter {
    timer: File,
    wake: Arc<File>,
}

impl Waiter {
    pub fn new() -> Result<Self> {
        let timer = timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_CLOEXEC | libc::TFD_NONBLOCK)
            .map_err(|e| Error::os(e, Origin::Read))?;
        let wake = eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK)
            .map_err(|e| Error::os(e, Origin::Read))?;
        Ok(Self {
            timer,
            wake: Arc::new(wake),
        })
    }

    pub fn wait(&self, perf: &File, ctx: &ReadCtx) -> Result<Wake> {
        drain(&self.wake)?;
        let _registration = ctx.cancel.as_ref().map(|it| it.register(self.wake.clone()));
        if ctx.is_canceled() {
            return Ok(Wake::Canceled);
        }

        let remaining = ctx.remaining();
        if let Some(left) = remaining {
            if left.is_zero() {
                return Ok(Wake::Timeout);
            }
            timerfd_settime(&self.timer, left).map_err(Error::Io)?;
        }

        let result = self.poll(perf, ctx);

        if remaining.is_some() {
            timerfd_settime(&self.timer, Duration::ZERO).map_err(Error::Io)?;
        }
        drain(&self.wake)?;
        result
    }

    fn poll(&self, perf: &File, ctx: &ReadCtx) -> Result<Wake> {
        let pollfd = |file: &File| libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let mut fds = [pollfd(perf), pollfd(&self.timer), pollfd(&self.wake)];

        loop {
            retry(|| poll(&mut fds, -1)).map_err(|e| Error::os(e, Origin::Read))?;
            let [perf, timer, wake] = fds.map(|it| it.revents);

            if wake != 0 && ctx.is_canceled() {
                return Ok(Wake::Canceled);
            }
            if perf & libc::POLLNVAL != 0 {
                return Err(Error::Io(io::Error::from_raw_os_error(libc::EBADF)));
            }
            if perf & libc::POLLIN != 0 {
                return Ok(Wake::Readable);
            }
            if perf & (libc::POLLHUP | libc::POLLERR) != 0 {
                return Ok(Wake::Hup);
            }
            if timer != 0 {
                return Ok(Wake::Timeout);
            }
            // Stale wakeup from an earlier token.
            drain(&self.wake)?;
        }
    }
}

fn drain(eventfd: &File) -> Result<()> {
    let mut buf = [0; 8];
    match retry(|| read(eventfd, &mut buf)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::ffi::syscall::write;
    use crate::sample::CancelToken;

    // An eventfd that nobody writes stands in for a quiet perf fd.
    fn quiet() -> File {
        eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK).unwrap()
    }

    #[test]
    fn test_readable() {
        let waiter = Waiter::new().unwrap();
        let perf = quiet();
        write(&perf, &1u64.to_ne_bytes()).unwrap();
        assert_eq!(waiter.wait(&perf, &ReadCtx::new()).unwrap(), Wake::Readable);
    }

    #[test]
    fn test_timeout() {
        let waiter = Waiter::new().unwrap();
        let perf = quiet();
        let start = Instant::now();
        let ctx = ReadCtx::new().with_timeout(Duration::from_millis(50));
        assert_eq!(waiter.wait(&perf, &ctx).unwrap(), Wake::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(45));

        // The timer is disarmed afterwards, so a later wait is not cut short.
        write(&perf, &1u64.to_ne_bytes()).unwrap();
        let ctx = ReadCtx::new().with_timeout(Duration::from_secs(5));
        assert_eq!(waiter.wait(&perf, &ctx).unwrap(), Wake::Readable);
    }

    #[test]
    fn test_expired_deadline() {
        let waiter = Waiter::new().unwrap();
        let ctx = ReadCtx::new().with_deadline(Instant::now());
        assert_eq!(waiter.wait(&quiet(), &ctx).unwrap(), Wake::Timeout);
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let waiter = Waiter::new().unwrap();
        let token = CancelToken::new();
        let ctx = ReadCtx::new().with_cancel(token.clone());

        let canceler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
        assert_eq!(waiter.wait(&quiet(), &ctx).unwrap(), Wake::Canceled);
        canceler.join().unwrap();

        // Sticky.
        assert_eq!(waiter.wait(&quiet(), &ctx).unwrap(), Wake::Canceled);
    }
}
