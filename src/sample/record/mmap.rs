use arrayvec::ArrayVec;

use super::{Header, SampleId};
use crate::ffi::{bindings as b, Cursor};

// https://github.com/torvalds/linux/blob/v6.13/include/linux/buildid.h#L7
const BUILD_ID_SIZE_MAX: usize = 20;

/// Memory mapping created by the monitored task.
///
/// Enabled with [`Opt::Mmap`][crate::config::Opt::Mmap] for executable maps
/// and [`Opt::MmapData`][crate::config::Opt::MmapData] for the rest.
/// [`Opt::Mmap2`][crate::config::Opt::Mmap2] adds [`ext`][Self::ext].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mmap {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub pid: u32,
    pub tid: u32,
    pub addr: u64,
    pub len: u64,
    pub pgoff: u64,
    pub ext: Option<Ext>,
    pub filename: String,
}

/// Fields only present in `PERF_RECORD_MMAP2`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ext {
    pub prot: u32,
    pub flags: u32,
    pub info: Info,
}

/// Device info or ELF build id of the mapped file.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Info {
    Device {
        major: u32,
        minor: u32,
        inode: u64,
        inode_gen: u64,
    },
    BuildId(ArrayVec<u8, BUILD_ID_SIZE_MAX>),
}

impl Mmap {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L877
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1048
    // struct {
    //     struct perf_event_header header;
    //     u32 pid, tid;
    //     u64 addr;
    //     u64 len;
    //     u64 pgoff;
    //     {
    //         union {
    //             struct {
    //                 u32 maj;
    //                 u32 min;
    //                 u64 ino;
    //                 u64 ino_generation;
    //             };
    //             struct {
    //                 u8 build_id_size;
    //                 u8 __reserved_1;
    //                 u16 __reserved_2;
    //                 u8 build_id[20];
    //             };
    //         };
    //     } && PERF_RECORD_MMAP2
    //     { u32 prot, flags; } && PERF_RECORD_MMAP2
    //     char filename[];
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        v2: bool,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        let pid = c.read()?;
        let tid = c.read()?;
        let addr = c.read()?;
        let len = c.read()?;
        let pgoff = c.read()?;

        let ext = if v2 {
            let info = if header.misc_bit(b::PERF_RECORD_MISC_MMAP_BUILD_ID) {
                let size = c.read::<u8>()? as usize;
                c.skip(3)?;
                let id = c.bytes(BUILD_ID_SIZE_MAX)?;
                Info::BuildId(ArrayVec::try_from(id.get(..size)?).ok()?)
            } else {
                Info::Device {
                    major: c.read()?,
                    minor: c.read()?,
                    inode: c.read()?,
                    inode_gen: c.read()?,
                }
            };
            Some(Ext {
                prot: c.read()?,
                flags: c.read()?,
                info,
            })
        } else {
            None
        };

        Some(Self {
            header,
            sample_id,
            pid,
            tid,
            addr,
            len,
            pgoff,
            ext,
            filename: c.padded_str()?,
        })
    }

    pub fn executable(&self) -> bool {
        !self.header.misc_bit(b::PERF_RECORD_MISC_MMAP_DATA)
    }
}

super::from!(Mmap);
