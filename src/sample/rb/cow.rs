use std::borrow::{Borrow, Cow};
use std::sync::atomic::{AtomicU64, Ordering};

/// Copy-on-write chunk.
///
/// Borrows the ring when the record is contiguous and only releases the
/// space on drop, so it should be dropped as early as possible to keep
/// the kernel from running out of room.
pub(crate) struct CowChunk<'a> {
    pub(super) tail: &'a AtomicU64,
    pub(super) new_tail: u64,
    pub(super) chunk: Cow<'a, [u8]>,
}

impl CowChunk<'_> {
    pub fn as_bytes(&self) -> &[u8] {
        &self.chunk
    }
}

impl Borrow<[u8]> for CowChunk<'_> {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Drop for CowChunk<'_> {
    fn drop(&mut self) {
        if let Cow::Borrowed(_) = self.chunk {
            // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L723
            self.tail.store(self.new_tail, Ordering::Release);
        }
    }
}
