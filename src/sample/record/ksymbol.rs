use super::{Header, SampleId};
use crate::ffi::Cursor;

const PERF_RECORD_KSYMBOL_FLAGS_UNREGISTER: u16 = 1 << 0;

/// Kernel symbol registered or unregistered, e.g. a JIT-compiled BPF program.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ksymbol {
    pub header: Header,
    pub sample_id: Option<SampleId>,

    pub addr: u64,
    pub len: u32,
    /// `PERF_RECORD_KSYMBOL_TYPE_*`.
    pub ksym_type: u16,
    pub flags: u16,
    pub name: String,
}

impl Ksymbol {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1158
    // struct {
    //     struct perf_event_header header;
    //     u64 addr;
    //     u32 len;
    //     u16 ksym_type;
    //     u16 flags;
    //     char name[];
    //     struct sample_id sample_id;
    // };
    pub(crate) fn parse(
        c: &mut Cursor<'_>,
        header: Header,
        sample_id: Option<SampleId>,
    ) -> Option<Self> {
        Some(Self {
            header,
            sample_id,
            addr: c.read()?,
            len: c.read()?,
            ksym_type: c.read()?,
            flags: c.read()?,
            name: c.padded_str()?,
        })
    }

    pub fn unregister(&self) -> bool {
        self.flags & PERF_RECORD_KSYMBOL_FLAGS_UNREGISTER > 0
    }
}

super::from!(Ksymbol);
