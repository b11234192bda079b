use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) use cow::CowChunk;

use crate::error::{Error, Result};
use crate::sample::record::HEADER_SIZE;

mod cow;


/// Consumer side of the kernel data ring.
///
/// `head` and `tail` are free-running byte positions, only reduced modulo
/// the ring size when indexing, so `head - tail` is always the number of
/// unread bytes.
pub(crate) struct Rb<'a> {
    data: &'a [u8],
    tail: &'a AtomicU64,
    head: &'a AtomicU64,
}

impl<'a> Rb<'a> {
    pub fn new(data: &'a [u8], tail: &'a AtomicU64, head: &'a AtomicU64) -> Self {
        Self { data, tail, head }
    }

    /// Bytes written by the kernel and not consumed yet.
    pub fn available(&self) -> Result<u64> {
        let tail = self.tail.load(Ordering::Relaxed);
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L720
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L99
        let head = self.head.load(Ordering::Acquire);
        let avail = head.wrapping_sub(tail);
        if avail > self.data.len() as u64 {
            return Err(Error::CorruptRing);
        }
        Ok(avail)
    }

    /// Pops one framed record, `None` when the ring is empty.
    ///
    /// Only one consumer may pop at a time, the caller serializes.
    pub fn pop(&self) -> Result<Option<CowChunk<'a>>> {
        let size = self.data.len() as u64;
        let avail = self.available()?;
        if avail == 0 {
            return Ok(None);
        }
        if avail < HEADER_SIZE as u64 {
            return Err(Error::CorruptRing);
        }

        let tail = self.tail.load(Ordering::Relaxed);
        let start = (tail % size) as usize;

        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L824
        // struct perf_event_header {
        //     u32 type; # 4 bytes
        //     u16 misc; # 2 bytes
        //     u16 size; # 2 bytes
        // };
        let mut header = [0; HEADER_SIZE];
        self.copy(start, &mut header);
        let len = u16::from_ne_bytes([header[6], header[7]]) as u64;
        if len < HEADER_SIZE as u64 || len > avail {
            return Err(Error::CorruptRing);
        }

        let new_tail = tail + len;
        let end = start + len as usize;
        let chunk = if end <= self.data.len() {
            Cow::Borrowed(&self.data[start..end])
        } else {
            let mut buf = vec![0; len as usize];
            self.copy(start, &mut buf);
            // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L723
            self.tail.store(new_tail, Ordering::Release);
            Cow::Owned(buf)
        };

        Ok(Some(CowChunk {
            tail: self.tail,
            new_tail,
            chunk,
        }))
    }

    /// Copies `buf.len()` bytes starting at `start`, wrapping at the end of the ring.
    fn copy(&self, start: usize, buf: &mut [u8]) {
        let first = buf.len().min(self.data.len() - start);
        buf[..first].copy_from_slice(&self.data[start..start + first]);
        let rest = buf.len() - first;
        buf[first..].copy_from_slice(&self.data[..rest]);
    }
}
