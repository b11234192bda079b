use std::fs::File;
use std::io::Result;
use std::mem::ManuallyDrop;
use std::ptr::{addr_of_mut, null_mut, NonNull};
use std::slice;
use std::sync::atomic::{AtomicU32, AtomicU64};

use crate::ffi::syscall::{mmap, munmap};
use crate::ffi::{Metadata, PAGE_SIZE};

/// Shared mapping of a perf fd: one metadata page followed by the data area.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping lives until `unmap` or drop, and all access to the shared
// words goes through atomics.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(file: &File, len: usize, offset: usize) -> Result<Self> {
        let prot = libc::PROT_READ | libc::PROT_WRITE;
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L6582
        let flags = libc::MAP_SHARED;
        let ptr = unsafe { mmap::<u8>(null_mut(), len, prot, flags, file, offset as _) }?;
        let ptr = NonNull::new(ptr).ok_or_else(|| std::io::Error::other("null mapping"))?;
        Ok(Self { ptr, len })
    }

    fn metadata(&self) -> *mut Metadata {
        self.ptr.as_ptr().cast()
    }

    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L720
    pub fn data_head(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(addr_of_mut!((*self.metadata()).data_head)) }
    }

    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L723
    pub fn data_tail(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(addr_of_mut!((*self.metadata()).data_tail)) }
    }

    pub fn time_enabled(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(addr_of_mut!((*self.metadata()).time_enabled)) }
    }

    pub fn time_running(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(addr_of_mut!((*self.metadata()).time_running)) }
    }

    /// Seqlock guarding the timing fields.
    pub fn lock(&self) -> &AtomicU32 {
        unsafe { AtomicU32::from_ptr(addr_of_mut!((*self.metadata()).lock)) }
    }

    /// The data area, located through `data_offset`/`data_size` and falling
    /// back to the page after the metadata on kernels that leave them zero.
    pub fn data(&self) -> &[u8] {
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L6212
        let meta = self.metadata();
        let (offset, size) = unsafe {
            let offset = addr_of_mut!((*meta).data_offset).read_volatile() as usize;
            let size = addr_of_mut!((*meta).data_size).read_volatile() as usize;
            (offset, size)
        };
        let (offset, size) = match offset.checked_add(size) {
            Some(end) if size > 0 && end <= self.len => (offset, size),
            _ => (*PAGE_SIZE, self.len.saturating_sub(*PAGE_SIZE)),
        };
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(offset), size) }
    }

    /// Unmaps now, reporting the error instead of logging it.
    pub fn unmap(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        unsafe { munmap(this.ptr.as_ptr(), this.len) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr(), self.len) } {
            log::error!("failed to unmap ring: {e}");
        }
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L580
// struct perf_event_mmap_page {
//     u32 version;        /* version number of this structure */
//     u32 compat_version; /* lowest version this is compat with */
//
//     u32 lock;         /* seqlock for synchronization */
//     u32 index;        /* hardware event identifier */
//     s64 offset;       /* add to hardware event value */
//     u64 time_enabled; /* time event active */
//     u64 time_running; /* time event on CPU */
//     ...
//     u8 __reserved[116*8];
//
//     u64 data_head;   /* head in the data section */
//     u64 data_tail;   /* user-space written tail */
//     u64 data_offset; /* where the buffer starts */
//     u64 data_size;   /* data buffer size */
//     ...
// };
