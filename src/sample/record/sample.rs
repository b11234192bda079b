use super::{Header, Parser, Record};
use crate::count::{stat, Count, GroupCount};
use crate::ffi::{bindings as b, Cursor};

/// Sample record.
///
/// Fields are present iff enabled in the event's
/// [`SampleFormat`][crate::config::SampleFormat]. `R` is the shape of the
/// counter values, a [`GroupCount`] for events that read their whole group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample<R = Count> {
    pub header: Header,

    pub identifier: Option<u64>,
    /// Instruction pointer.
    pub ip: Option<u64>,
    pub pid: Option<u32>,
    pub tid: Option<u32>,
    pub time: Option<u64>,
    /// Data address, usually the address of a tracepoint, breakpoint or software event.
    pub addr: Option<u64>,
    pub id: Option<u64>,
    pub stream_id: Option<u64>,
    pub cpu: Option<u32>,
    pub period: Option<u64>,
    /// Counter values at sample time.
    pub read: Option<R>,
    pub callchain: Option<Vec<u64>>,
    /// Raw tracepoint or PMU payload, as sized by the kernel, so it keeps
    /// the padding that aligns the sample to 8 bytes.
    pub raw: Option<Vec<u8>>,
    pub branch_stack: Option<BranchStack>,
    pub regs_user: Option<Regs>,
    pub stack_user: Option<UserStack>,
    pub weight: Option<Weight>,
    pub data_src: Option<u64>,
    pub transaction: Option<u64>,
    pub regs_intr: Option<Regs>,
    pub phys_addr: Option<u64>,
    /// Cgroup id, see [`Cgroup::id`][super::Cgroup::id].
    pub cgroup: Option<u64>,
    pub data_page_size: Option<u64>,
    pub code_page_size: Option<u64>,
    pub aux: Option<Vec<u8>>,
}

/// Sample of an event whose count format reads the whole group.
pub type GroupSample = Sample<GroupCount>;

impl<R> Sample<R> {
    /// Whether [`ip`][Self::ip] points at the exact instruction that overflowed.
    pub fn exact_ip(&self) -> bool {
        self.header.misc_bit(b::PERF_RECORD_MISC_EXACT_IP)
    }
}

super::from!(Sample);
super::from!(GroupSample);

/// Branch stack taken from the last branch record hardware.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchStack {
    /// Index of the most recent entry in the hardware buffer.
    pub hw_index: Option<u64>,
    pub entries: Vec<BranchEntry>,
    /// Per-entry event occurrence counters.
    pub counters: Option<Vec<u64>>,
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1436
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchEntry {
    pub from: u64,
    pub to: u64,
    /// Raw flag word, decoded by the accessors below.
    pub flags: u64,
}

impl BranchEntry {
    pub fn mispredicted(&self) -> bool {
        self.flags & 0b1 > 0
    }

    pub fn predicted(&self) -> bool {
        self.flags & 0b10 > 0
    }

    pub fn in_tx(&self) -> bool {
        self.flags & 0b100 > 0
    }

    pub fn abort(&self) -> bool {
        self.flags & 0b1000 > 0
    }

    pub fn cycles(&self) -> u16 {
        (self.flags >> 4) as u16
    }

    /// `PERF_BR_*` type, bits 20-23.
    pub fn branch_type(&self) -> u8 {
        ((self.flags >> 20) & 0b1111) as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Abi {
    _32,
    _64,
}

/// Registers selected by a sample register mask, in mask bit order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Regs {
    /// `None` when the task had no registers to sample, e.g. a kernel thread.
    pub abi: Option<Abi>,
    pub regs: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserStack {
    /// Copied stack, `sample_stack_user` bytes long.
    pub data: Vec<u8>,
    /// Bytes of `data` that were actually dumped.
    pub dyn_size: u64,
}

impl UserStack {
    pub fn valid(&self) -> &[u8] {
        let len = (self.dyn_size as usize).min(self.data.len());
        &self.data[..len]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Weight {
    Full(u64),
    Vars { var1: u32, var2: u16, var3: u16 },
}

pub(super) fn parse(p: &Parser, header: Header, c: Cursor<'_>) -> Option<Record> {
    let grouped = p.read_format & b::PERF_FORMAT_GROUP as u64 > 0;
    if grouped {
        let sample = parse_with(p, header, c, |c| stat::parse_group(c, p.read_format))?;
        Some(sample.into())
    } else {
        let sample = parse_with(p, header, c, |c| stat::parse_count(c, p.read_format))?;
        Some(sample.into())
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L957
// struct {
//     struct perf_event_header header;
//     { u64 id;           } && PERF_SAMPLE_IDENTIFIER
//     { u64 ip;           } && PERF_SAMPLE_IP
//     { u32 pid, tid;     } && PERF_SAMPLE_TID
//     { u64 time;         } && PERF_SAMPLE_TIME
//     { u64 addr;         } && PERF_SAMPLE_ADDR
//     { u64 id;           } && PERF_SAMPLE_ID
//     { u64 stream_id;    } && PERF_SAMPLE_STREAM_ID
//     { u32 cpu, res;     } && PERF_SAMPLE_CPU
//     { u64 period;       } && PERF_SAMPLE_PERIOD
//     { struct read_format values; } && PERF_SAMPLE_READ
//     { u64 nr, ips[nr];  } && PERF_SAMPLE_CALLCHAIN
//     { u32 size; char data[size]; } && PERF_SAMPLE_RAW
//     { u64 nr;
//       { u64 hw_idx; } && PERF_SAMPLE_BRANCH_HW_INDEX
//       { u64 from, to, flags } lbr[nr];
//       { u64 counters; } cntr[nr] && PERF_SAMPLE_BRANCH_COUNTERS
//     } && PERF_SAMPLE_BRANCH_STACK
//     { u64 abi; u64 regs[weight(mask)]; } && PERF_SAMPLE_REGS_USER
//     { u64 size; char data[size]; u64 dyn_size; } && PERF_SAMPLE_STACK_USER
//     union perf_sample_weight weight;
//     { u64 data_src;     } && PERF_SAMPLE_DATA_SRC
//     { u64 transaction;  } && PERF_SAMPLE_TRANSACTION
//     { u64 abi; u64 regs[weight(mask)]; } && PERF_SAMPLE_REGS_INTR
//     { u64 phys_addr;    } && PERF_SAMPLE_PHYS_ADDR
//     { u64 cgroup;       } && PERF_SAMPLE_CGROUP
//     { u64 data_page_size; } && PERF_SAMPLE_DATA_PAGE_SIZE
//     { u64 code_page_size; } && PERF_SAMPLE_CODE_PAGE_SIZE
//     { u64 size; char data[size]; } && PERF_SAMPLE_AUX
// };
fn parse_with<R>(
    p: &Parser,
    header: Header,
    mut c: Cursor<'_>,
    read: impl FnOnce(&mut Cursor<'_>) -> Option<R>,
) -> Option<Sample<R>> {
    let c = &mut c;
    macro_rules! when {
        ($flag:ident, $then:expr) => {
            if p.has(b::$flag) {
                Some($then)
            } else {
                None
            }
        };
        ($flag:ident) => {
            when!($flag, c.read()?)
        };
    }

    let identifier = when!(PERF_SAMPLE_IDENTIFIER);
    let ip = when!(PERF_SAMPLE_IP);
    let (pid, tid) = match when!(PERF_SAMPLE_TID, (c.read()?, c.read()?)) {
        Some((pid, tid)) => (Some(pid), Some(tid)),
        None => (None, None),
    };
    let time = when!(PERF_SAMPLE_TIME);
    let addr = when!(PERF_SAMPLE_ADDR);
    let id = when!(PERF_SAMPLE_ID);
    let stream_id = when!(PERF_SAMPLE_STREAM_ID);
    let cpu = when!(PERF_SAMPLE_CPU, {
        let cpu = c.read()?;
        c.skip(4)?;
        cpu
    });
    let period = when!(PERF_SAMPLE_PERIOD);
    let read = when!(PERF_SAMPLE_READ, read(c)?);
    let callchain = when!(PERF_SAMPLE_CALLCHAIN, {
        let nr = c.read()?;
        c.u64s(nr)?
    });
    let raw = when!(PERF_SAMPLE_RAW, {
        let len = c.read::<u32>()? as usize;
        let bytes = c.bytes(len)?.to_vec();
        // https://github.com/torvalds/linux/blob/v6.13/include/linux/perf_event.h#L1303
        c.align(8)?;
        bytes
    });
    let branch_stack = when!(PERF_SAMPLE_BRANCH_STACK, parse_branch_stack(p, c)?);
    let regs_user = when!(PERF_SAMPLE_REGS_USER, parse_regs(c, p.regs_user)?);
    let stack_user = when!(PERF_SAMPLE_STACK_USER, {
        let size = c.read::<u64>()?;
        let data = c.bytes(usize::try_from(size).ok()?)?.to_vec();
        let dyn_size = if size > 0 { c.read()? } else { 0 };
        UserStack { data, dyn_size }
    });
    let weight = if p.has(b::PERF_SAMPLE_WEIGHT) {
        Some(Weight::Full(c.read()?))
    } else if p.has(b::PERF_SAMPLE_WEIGHT_STRUCT) {
        #[cfg(target_endian = "little")]
        let vars = Weight::Vars {
            var1: c.read()?,
            var2: c.read()?,
            var3: c.read()?,
        };
        #[cfg(target_endian = "big")]
        let vars = {
            let (var3, var2, var1) = (c.read()?, c.read()?, c.read()?);
            Weight::Vars { var1, var2, var3 }
        };
        Some(vars)
    } else {
        None
    };
    let data_src = when!(PERF_SAMPLE_DATA_SRC);
    let transaction = when!(PERF_SAMPLE_TRANSACTION);
    let regs_intr = when!(PERF_SAMPLE_REGS_INTR, parse_regs(c, p.regs_intr)?);
    let phys_addr = when!(PERF_SAMPLE_PHYS_ADDR);
    let cgroup = when!(PERF_SAMPLE_CGROUP);
    let data_page_size = when!(PERF_SAMPLE_DATA_PAGE_SIZE);
    let code_page_size = when!(PERF_SAMPLE_CODE_PAGE_SIZE);
    let aux = when!(PERF_SAMPLE_AUX, {
        let len = c.read::<u64>()?;
        c.bytes(usize::try_from(len).ok()?)?.to_vec()
    });

    Some(Sample {
        header,
        identifier,
        ip,
        pid,
        tid,
        time,
        addr,
        id,
        stream_id,
        cpu,
        period,
        read,
        callchain,
        raw,
        branch_stack,
        regs_user,
        stack_user,
        weight,
        data_src,
        transaction,
        regs_intr,
        phys_addr,
        cgroup,
        data_page_size,
        code_page_size,
        aux,
    })
}

fn parse_regs(c: &mut Cursor<'_>, count: u32) -> Option<Regs> {
    // PERF_SAMPLE_REGS_USER: https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7589
    // PERF_SAMPLE_REGS_INTR: https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7620
    let abi = match u32::try_from(c.read::<u64>()?).ok()? {
        b::PERF_SAMPLE_REGS_ABI_NONE => {
            return Some(Regs {
                abi: None,
                regs: vec![],
            })
        }
        b::PERF_SAMPLE_REGS_ABI_32 => Abi::_32,
        b::PERF_SAMPLE_REGS_ABI_64 => Abi::_64,
        _ => return None,
    };
    Some(Regs {
        abi: Some(abi),
        regs: c.u64s(count as u64)?,
    })
}

fn parse_branch_stack(p: &Parser, c: &mut Cursor<'_>) -> Option<BranchStack> {
    let nr: u64 = c.read()?;
    let hw_index = if p.branch_hw_index {
        Some(c.read()?)
    } else {
        None
    };
    let words = c.u64s(nr.checked_mul(3)?)?;
    let entries = words
        .chunks_exact(3)
        .map(|it| BranchEntry {
            from: it[0],
            to: it[1],
            flags: it[2],
        })
        .collect();
    // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7575
    let counters = if p.branch_counters && nr > 0 {
        Some(c.u64s(nr)?)
    } else {
        None
    };
    Some(BranchStack {
        hw_index,
        entries,
        counters,
    })
}
