//! Ring-buffer records.
//!
//! An event with sample fields writes records into a ring mapped with
//! [`Event::map_ring`][crate::count::Event::map_ring]. Records are pulled
//! one at a time with [`Event::read_record`][crate::count::Event::read_record],
//! which blocks until a record arrives, the [`ReadCtx`] deadline passes, or its
//! [`CancelToken`] fires. [`Records`] drains without blocking, and
//! [`RecordStream`] waits on the fd readiness from async code.

use std::collections::HashMap;
use std::fs::File;
use std::hint;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use arena::Arena;
use rb::Rb;
use record::{Parser, ReadValues, Record};
use wait::{Wake, Waiter};

use crate::count::group::{lock, Group};
use crate::error::{Error, Origin, Result};
use crate::ffi::PAGE_SIZE;

mod arena;
mod cancel;
mod iter;
mod rb;
pub mod record;
mod wait;

pub use cancel::{CancelToken, ReadCtx};
pub use iter::{RecordStream, Records};

/// Default ring size as a power of two, in data pages.
pub(crate) const DEFAULT_EXP: u8 = 7;

/// Everything needed to turn one event's records into [`Record`]s.
#[derive(Clone, Debug)]
pub(crate) struct Decoder {
    pub parser: Parser,
    pub label: String,
    pub group: Arc<Group>,
}

impl Decoder {
    pub fn decode(&self, frame: &[u8]) -> Record {
        let mut record = self.parser.parse(frame);
        match &mut record {
            Record::Sample(it) => {
                if let Some(count) = &mut it.read {
                    count.label.clone_from(&self.label);
                }
            }
            Record::GroupSample(it) => {
                if let Some(counts) = &mut it.read {
                    self.group.label(counts);
                }
            }
            Record::Read(it) => match &mut it.values {
                ReadValues::Single(count) => count.label.clone_from(&self.label),
                ReadValues::Group(counts) => self.group.label(counts),
            },
            _ => (),
        }
        record
    }
}

/// Decoders of events redirected into a ring, keyed by event id.
#[derive(Debug, Default)]
pub(crate) struct Registry(Mutex<HashMap<u64, Decoder>>);

impl Registry {
    pub fn insert(&self, id: u64, decoder: Decoder) {
        lock(&self.0).insert(id, decoder);
    }

    pub fn remove(&self, id: u64) {
        lock(&self.0).remove(&id);
    }
}

/// The mapped ring of one event.
pub(crate) struct Ring {
    perf: Arc<File>,
    arena: Arena,
    waiter: Waiter,
    owner: Decoder,
    registry: Arc<Registry>,
    corrupt: AtomicBool,
    hup: AtomicBool,
    reader: Mutex<()>,
    consumer: Mutex<()>,
}

impl Ring {
    /// Maps one metadata page and 2^`exp` data pages.
    pub fn map(perf: Arc<File>, owner: Decoder, exp: u8) -> Result<Self> {
        let Some(len) = 2_usize
            .checked_pow(exp as u32)
            .and_then(|n| n.checked_add(1))
            .and_then(|n| n.checked_mul(*PAGE_SIZE))
        else {
            return Err(Error::ConfigInvalid(format!("ring of 2^{exp} pages is too large")));
        };
        let arena = Arena::new(&perf, len, 0).map_err(|e| Error::os(e, Origin::Mmap))?;
        let waiter = Waiter::new()?;
        log::debug!("mapped ring of {} data pages ({len} bytes)", len / *PAGE_SIZE - 1);

        Ok(Self {
            perf,
            arena,
            waiter,
            owner,
            registry: Arc::default(),
            corrupt: AtomicBool::new(false),
            hup: AtomicBool::new(false),
            reader: Mutex::new(()),
            consumer: Mutex::new(()),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_corrupt(&self) -> bool {
        self.corrupt.load(Ordering::Relaxed)
    }

    /// Pops and decodes one record without blocking.
    pub fn try_next(&self) -> Result<Option<Record>> {
        if self.is_corrupt() {
            return Err(Error::CorruptRing);
        }
        let _consumer = lock(&self.consumer);
        let rb = Rb::new(
            self.arena.data(),
            self.arena.data_tail(),
            self.arena.data_head(),
        );
        match rb.pop() {
            Ok(Some(chunk)) => Ok(Some(self.decode(chunk.as_bytes()))),
            Ok(None) => Ok(None),
            Err(e) => {
                self.corrupt.store(true, Ordering::Relaxed);
                log::warn!("ring framing is broken, no more records will be read");
                Err(e)
            }
        }
    }

    fn decode(&self, frame: &[u8]) -> Record {
        if let Some(id) = self.owner.parser.identifier(frame) {
            if let Some(decoder) = lock(&self.registry.0).get(&id) {
                return decoder.decode(frame);
            }
        }
        self.owner.decode(frame)
    }

    /// Blocks until a record is available.
    ///
    /// An expired deadline or a canceled token is reported before the ring
    /// is touched, so the consumer position never moves on those paths.
    /// Fails with `InvalidState` while another thread is blocked reading.
    pub fn read_record(&self, ctx: &ReadCtx) -> Result<Record> {
        if ctx.is_canceled() {
            return Err(Error::Canceled);
        }
        if ctx.remaining().is_some_and(|it| it.is_zero()) {
            return Err(Error::DeadlineExceeded);
        }

        // One consumer at a time, a second reader fails right away.
        let _reader = match self.reader.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(Error::InvalidState("another reader is active"))
            }
        };
        loop {
            if let Some(record) = self.try_next()? {
                return Ok(record);
            }
            if self.hup.load(Ordering::Acquire) {
                return Err(Error::Disabled);
            }
            match self.waiter.wait(&self.perf, ctx)? {
                Wake::Readable => log::trace!("ring readable"),
                // Drain what is left before reporting.
                Wake::Hup => self.set_hup(),
                Wake::Timeout => return Err(Error::DeadlineExceeded),
                Wake::Canceled => return Err(Error::Canceled),
            }
        }
    }

    pub fn set_hup(&self) {
        if !self.hup.swap(true, Ordering::AcqRel) {
            log::debug!("event hung up");
        }
    }

    /// Forgets an earlier hangup once the event counts again.
    pub fn clear_hup(&self) {
        self.hup.store(false, Ordering::Release);
    }

    /// Reads `time_enabled` and `time_running` from the metadata page.
    pub fn times(&self) -> (u64, u64) {
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L600
        let lock = self.arena.lock();
        loop {
            let seq = lock.load(Ordering::Acquire);
            let enabled = self.arena.time_enabled().load(Ordering::Relaxed);
            let running = self.arena.time_running().load(Ordering::Relaxed);
            fence(Ordering::Acquire);
            if seq % 2 == 0 && lock.load(Ordering::Relaxed) == seq {
                return (enabled, running);
            }
            hint::spin_loop();
        }
    }

    pub fn close(self) -> Result<()> {
        self.arena.unmap().map_err(Error::Io)
    }
}

#[cfg(test)]
impl Ring {
    /// Publishes `len` more bytes of the data area, as the kernel does
    /// after writing a record.
    pub fn advance_head(&self, len: u64) {
        self.arena.data_head().fetch_add(len, Ordering::Release);
    }
}

impl std::fmt::Debug for Ring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("corrupt", &self.corrupt)
            .field("hup", &self.hup)
            .finish_non_exhaustive()
    }
}
