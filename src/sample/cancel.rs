use std::fs::File;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::count::group::lock;
use crate::ffi::syscall::write;

/// Cancels blocking reads from any thread.
///
/// Cancellation is sticky: once canceled, every read using the token returns
/// [`Error::Canceled`][crate::error::Error::Canceled] right away.
///
/// # Examples
///
/// ```rust
/// use perf_event_ring::sample::CancelToken;
///
/// let token = CancelToken::new();
/// let other = token.clone();
/// std::thread::spawn(move || other.cancel()).join().unwrap();
/// assert!(token.is_canceled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<Inner>);

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    next_key: AtomicU64,
    waiters: Mutex<Vec<(u64, Arc<File>)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes every read blocked on this token.
    pub fn cancel(&self) {
        self.0.canceled.store(true, Ordering::Release);
        for (_, eventfd) in lock(&self.0.waiters).iter() {
            if let Err(e) = write(eventfd, &1u64.to_ne_bytes()) {
                log::warn!("failed to wake canceled reader: {e}");
            }
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.0.canceled.load(Ordering::Acquire)
    }

    /// Adds an eventfd to be written on cancel.
    ///
    /// Callers check [`is_canceled`][Self::is_canceled] after registering,
    /// so a cancel racing with the registration is never missed.
    pub(crate) fn register(&self, eventfd: Arc<File>) -> Registration<'_> {
        let key = self.0.next_key.fetch_add(1, Ordering::Relaxed);
        lock(&self.0.waiters).push((key, eventfd));
        Registration { token: self, key }
    }
}

/// Removes its eventfd from the token on drop.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    key: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        lock(&self.token.0.waiters).retain(|(key, _)| *key != self.key);
    }
}

/// Deadline and cancellation for one blocking read.
///
/// The default context blocks until a record arrives.
#[derive(Clone, Debug, Default)]
pub struct ReadCtx {
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelToken>,
}

impl ReadCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_canceled)
    }

    /// Time left before the deadline, `None` without one.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|it| it.saturating_duration_since(Instant::now()))
    }
}
