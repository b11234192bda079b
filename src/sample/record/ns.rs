use super::{Header, SampleId};
use crate::ffi::Cursor;

/// Namespaces of a new task.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Namespaces {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub pid: u32,
    pub tid: u32,
    /// Indexed by `NET_NS_INDEX` and friends from the kernel headers.
    pub namespaces: Vec<Namespace>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Namespace {
    pub dev: u64,
    pub inode: u64,
}

impl Namespaces {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1140
    // struct {
    //     struct perf_event_header header;
    //     u32 pid;
    //     u32 tid;
    //     u64 nr_namespaces;
    //     { u64 dev, inode; } [nr_namespaces];
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        let pid = c.read()?;
        let tid = c.read()?;
        let nr: u64 = c.read()?;
        let namespaces = c
            .u64s(nr.checked_mul(2)?)?
            .chunks_exact(2)
            .map(|it| Namespace {
                dev: it[0],
                inode: it[1],
            })
            .collect();
        Some(Self {
            header,
            sample_id,
            pid,
            tid,
            namespaces,
        })
    }
}

super::from!(Namespaces);
