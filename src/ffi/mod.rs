use std::sync::LazyLock;

pub mod bindings;
pub mod syscall;

pub type Metadata = bindings::perf_event_mmap_page;

const _: () = {
    assert!(std::mem::offset_of!(Metadata, time_enabled) == 24);
    assert!(std::mem::offset_of!(Metadata, data_head) == 1024);
    assert!(std::mem::offset_of!(Metadata, data_tail) == 1032);
    assert!(std::mem::offset_of!(Metadata, data_size) == 1048);
};

pub static PAGE_SIZE: LazyLock<usize> = LazyLock::new(|| {
    let name = libc::_SC_PAGE_SIZE;
    let size = unsafe { libc::sysconf(name) };
    size as _
});

pub trait Scalar: Sized {
    const SIZE: usize;
    fn from_ne(bytes: &[u8]) -> Self;
}

macro_rules! scalar {
    ($($ty:ty),*) => {
        $(impl Scalar for $ty {
            const SIZE: usize = size_of::<$ty>();

            fn from_ne(bytes: &[u8]) -> Self {
                let mut buf = [0; size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(buf)
            }
        })*
    };
}
scalar!(u8, u16, u32, u64, i32, i64);

/// Bounds-checked reader over a framed record.
///
/// Every read returns `None` once the record is exhausted, which the
/// decoders turn into an opaque record instead of reading past the frame.
#[derive(Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[inline]
    pub fn read<T: Scalar>(&mut self) -> Option<T> {
        self.bytes(T::SIZE).map(T::from_ne)
    }

    #[inline]
    pub fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    pub fn u64s(&mut self, n: u64) -> Option<Vec<u64>> {
        // Check the whole run first so a garbage `n` can not drive a huge allocation.
        let len = usize::try_from(n).ok()?.checked_mul(8)?;
        let bytes = self.bytes(len)?;
        Some(bytes.chunks_exact(8).map(u64::from_ne).collect())
    }

    /// Reads a NUL-terminated string padded to 8 bytes.
    pub fn padded_str(&mut self) -> Option<String> {
        let rest = self.buf.get(self.pos..)?;
        let nul = rest.iter().position(|&b| b == 0)?;
        let s = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        self.align(8)?;
        Some(s)
    }

    pub fn align(&mut self, to: usize) -> Option<()> {
        let pos = self.pos.next_multiple_of(to);
        if pos > self.buf.len() {
            return None;
        }
        self.pos = pos;
        Some(())
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.bytes(len).map(|_| ())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::{bindings as b, Cursor};

    #[test]
    fn test_cursor_stops_at_frame_end() {
        let buf = [1u8, 0, 0, 0, 2, 0, 0, 0, 3];
        let mut c = Cursor::new(&buf);
        assert_eq!(c.read::<u32>(), Some(1));
        assert_eq!(c.read::<u32>(), Some(2));
        assert_eq!(c.read::<u32>(), None);
        assert_eq!(c.read::<u8>(), Some(3));
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn test_cursor_padded_str() {
        let mut buf = b"comm\0\0\0\0".to_vec();
        buf.extend(7u64.to_ne_bytes());
        let mut c = Cursor::new(&buf);
        assert_eq!(c.padded_str().as_deref(), Some("comm"));
        assert_eq!(c.read::<u64>(), Some(7));
    }

    #[test]
    fn test_cursor_rejects_oversized_run() {
        let buf = [0u8; 16];
        let mut c = Cursor::new(&buf);
        assert!(c.u64s(u64::MAX).is_none());
        assert_eq!(c.u64s(2), Some(vec![0, 0]));
    }

    #[test]
    fn test_ioctl_requests_follow_target_layout() {
        let ops = [
            b::PERF_IOC_OP_ENABLE,
            b::PERF_IOC_OP_DISABLE,
            b::PERF_IOC_OP_REFRESH,
            b::PERF_IOC_OP_RESET,
            b::PERF_IOC_OP_PERIOD,
            b::PERF_IOC_OP_SET_OUTPUT,
            b::PERF_IOC_OP_SET_FILTER,
            b::PERF_IOC_OP_ID,
            b::PERF_IOC_OP_SET_BPF,
            b::PERF_IOC_OP_PAUSE_OUTPUT,
            b::PERF_IOC_OP_QUERY_BPF,
            b::PERF_IOC_OP_MODIFY_ATTRIBUTES,
        ];
        for (nr, op) in ops.into_iter().enumerate() {
            let op = op as u64;
            assert_eq!(op & 0xff, nr as u64);
            assert_eq!((op >> 8) & 0xff, b'$' as u64);
        }

        // _IO('$', 0) and _IOR('$', 7, __u64 *)
        #[cfg(any(
            target_arch = "powerpc",
            target_arch = "powerpc64",
            target_arch = "mips",
            target_arch = "mips64",
            target_arch = "sparc",
            target_arch = "sparc64",
        ))]
        let (enable, id) = (0x2000_2400, 0x4000_2407 | (size_of::<usize>() as u64) << 16);
        #[cfg(not(any(
            target_arch = "powerpc",
            target_arch = "powerpc64",
            target_arch = "mips",
            target_arch = "mips64",
            target_arch = "sparc",
            target_arch = "sparc64",
        )))]
        let (enable, id) = (0x2400, 0x8000_2407 | (size_of::<usize>() as u64) << 16);
        assert_eq!(b::PERF_IOC_OP_ENABLE as u64, enable);
        assert_eq!(b::PERF_IOC_OP_ID as u64, id);
    }

    #[test]
    fn test_misc_and_flag_widths() {
        let misc: u16 = b::PERF_RECORD_MISC_MMAP_BUILD_ID;
        assert_eq!(misc, 1 << 14);
        let flag: u64 = b::PERF_FLAG_FD_CLOEXEC;
        assert_eq!(flag, 1 << 3);
        let aux: u64 = b::PERF_AUX_FLAG_TRUNCATED;
        assert_eq!(aux, 1);
    }
}
