//! Records delivered through the ring.
//!
//! Decoding is a pure function of the raw frame and the attribute of the
//! event that produced it, see [`Parser`].

use crate::config::Attr;
use crate::ffi::{bindings as b, Cursor};

mod auxiliary;
mod bpf;
mod cgroup;
mod comm;
mod ctx;
mod itrace;
mod ksymbol;
mod lost;
mod mmap;
mod ns;
mod read;
mod sample;
mod task;
mod text_poke;
mod throttle;

pub use auxiliary::*;
pub use bpf::*;
pub use cgroup::*;
pub use comm::*;
pub use ctx::*;
pub use itrace::*;
pub use ksymbol::*;
pub use lost::*;
pub use mmap::*;
pub use ns::*;
pub use read::*;
pub use sample::*;
pub use task::*;
pub use text_poke::*;
pub use throttle::*;

#[cfg(test)]
mod test;

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L824
// struct perf_event_header {
//     u32 type;
//     u16 misc;
//     u16 size;
// };
/// Common header of every record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Record type, `PERF_RECORD_*`.
    pub ty: u32,
    pub misc: u16,
    /// Size of the whole record, header included.
    pub size: u16,
}

pub(crate) const HEADER_SIZE: usize = 8;

impl Header {
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let mut c = Cursor::new(bytes);
        Some(Self {
            ty: c.read()?,
            misc: c.read()?,
            size: c.read()?,
        })
    }

    pub fn cpu_mode(&self) -> CpuMode {
        match self.misc & b::PERF_RECORD_MISC_CPUMODE_MASK {
            b::PERF_RECORD_MISC_KERNEL => CpuMode::Kernel,
            b::PERF_RECORD_MISC_USER => CpuMode::User,
            b::PERF_RECORD_MISC_HYPERVISOR => CpuMode::Hypervisor,
            b::PERF_RECORD_MISC_GUEST_KERNEL => CpuMode::GuestKernel,
            b::PERF_RECORD_MISC_GUEST_USER => CpuMode::GuestUser,
            _ => CpuMode::Unknown,
        }
    }

    pub(crate) fn misc_bit(&self, bit: u16) -> bool {
        self.misc & bit != 0
    }
}

/// Privilege level the record was generated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CpuMode {
    Unknown,
    Kernel,
    User,
    Hypervisor,
    GuestKernel,
    GuestUser,
}

/// Sample fields appended to non-sample records when
/// [`Opt::SampleIdAll`][crate::config::Opt::SampleIdAll] is set.
///
/// Which fields are present follows the event's sample format.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleId {
    pub pid: Option<u32>,
    pub tid: Option<u32>,
    pub time: Option<u64>,
    pub id: Option<u64>,
    pub stream_id: Option<u64>,
    pub cpu: Option<u32>,
    pub identifier: Option<u64>,
}

impl SampleId {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L859
    // struct sample_id {
    //     { u32 pid, tid;  } && PERF_SAMPLE_TID
    //     { u64 time;      } && PERF_SAMPLE_TIME
    //     { u64 id;        } && PERF_SAMPLE_ID
    //     { u64 stream_id; } && PERF_SAMPLE_STREAM_ID
    //     { u32 cpu, res;  } && PERF_SAMPLE_CPU
    //     { u64 id;        } && PERF_SAMPLE_IDENTIFIER
    // } && perf_event_attr::sample_id_all
    const FIELDS: [u64; 6] = [
        b::PERF_SAMPLE_TID,
        b::PERF_SAMPLE_TIME,
        b::PERF_SAMPLE_ID,
        b::PERF_SAMPLE_STREAM_ID,
        b::PERF_SAMPLE_CPU,
        b::PERF_SAMPLE_IDENTIFIER,
    ];

    pub(crate) fn size(sample_type: u64) -> usize {
        Self::FIELDS
            .iter()
            .filter(|&&flag| sample_type & flag != 0)
            .count()
            * 8
    }

    pub(crate) fn parse(c: &mut Cursor<'_>, sample_type: u64) -> Option<Self> {
        let has = |flag: u64| sample_type & flag != 0;
        let mut id = Self::default();
        if has(b::PERF_SAMPLE_TID) {
            id.pid = Some(c.read()?);
            id.tid = Some(c.read()?);
        }
        if has(b::PERF_SAMPLE_TIME) {
            id.time = Some(c.read()?);
        }
        if has(b::PERF_SAMPLE_ID) {
            id.id = Some(c.read()?);
        }
        if has(b::PERF_SAMPLE_STREAM_ID) {
            id.stream_id = Some(c.read()?);
        }
        if has(b::PERF_SAMPLE_CPU) {
            id.cpu = Some(c.read()?);
            c.skip(4)?;
        }
        if has(b::PERF_SAMPLE_IDENTIFIER) {
            id.identifier = Some(c.read()?);
        }
        Some(id)
    }
}

/// Record of a type this crate does not decode, or one that failed to decode.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unknown {
    pub header: Header,
    /// The record body, header excluded.
    pub bytes: Vec<u8>,
}

/// A decoded record.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Record {
    Sample(Box<Sample>),
    GroupSample(Box<GroupSample>),
    Mmap(Box<Mmap>),
    Lost(Lost),
    Comm(Comm),
    Exit(Task),
    Throttle(Throttle),
    Unthrottle(Throttle),
    Fork(Task),
    Read(Box<Read>),
    Aux(Aux),
    ItraceStart(ItraceStart),
    LostSamples(LostSamples),
    Switch(Switch),
    SwitchCpuWide(SwitchCpuWide),
    Namespaces(Namespaces),
    Ksymbol(Ksymbol),
    BpfEvent(BpfEvent),
    Cgroup(Cgroup),
    TextPoke(TextPoke),
    AuxOutputHwId(AuxOutputHwId),
    Unknown(Unknown),
}

macro_rules! each_variant {
    ($self:expr, $it:ident => $expr:expr) => {
        match $self {
            Record::Sample($it) => $expr,
            Record::GroupSample($it) => $expr,
            Record::Mmap($it) => $expr,
            Record::Lost($it) => $expr,
            Record::Comm($it) => $expr,
            Record::Exit($it) => $expr,
            Record::Throttle($it) => $expr,
            Record::Unthrottle($it) => $expr,
            Record::Fork($it) => $expr,
            Record::Read($it) => $expr,
            Record::Aux($it) => $expr,
            Record::ItraceStart($it) => $expr,
            Record::LostSamples($it) => $expr,
            Record::Switch($it) => $expr,
            Record::SwitchCpuWide($it) => $expr,
            Record::Namespaces($it) => $expr,
            Record::Ksymbol($it) => $expr,
            Record::BpfEvent($it) => $expr,
            Record::Cgroup($it) => $expr,
            Record::TextPoke($it) => $expr,
            Record::AuxOutputHwId($it) => $expr,
            Record::Unknown($it) => $expr,
        }
    };
}

impl Record {
    pub fn header(&self) -> &Header {
        each_variant!(self, it => &it.header)
    }

    /// The sample-id trailer, `None` for samples and when the trailer is off.
    pub fn sample_id(&self) -> Option<&SampleId> {
        match self {
            Record::Sample(_) | Record::GroupSample(_) | Record::Unknown(_) => None,
            Record::Mmap(it) => it.sample_id.as_ref(),
            Record::Lost(it) => it.sample_id.as_ref(),
            Record::Comm(it) => it.sample_id.as_ref(),
            Record::Exit(it) | Record::Fork(it) => it.sample_id.as_ref(),
            Record::Throttle(it) | Record::Unthrottle(it) => it.sample_id.as_ref(),
            Record::Read(it) => it.sample_id.as_ref(),
            Record::Aux(it) => it.sample_id.as_ref(),
            Record::ItraceStart(it) => it.sample_id.as_ref(),
            Record::LostSamples(it) => it.sample_id.as_ref(),
            Record::Switch(it) => it.sample_id.as_ref(),
            Record::SwitchCpuWide(it) => it.sample_id.as_ref(),
            Record::Namespaces(it) => it.sample_id.as_ref(),
            Record::Ksymbol(it) => it.sample_id.as_ref(),
            Record::BpfEvent(it) => it.sample_id.as_ref(),
            Record::Cgroup(it) => it.sample_id.as_ref(),
            Record::TextPoke(it) => it.sample_id.as_ref(),
            Record::AuxOutputHwId(it) => it.sample_id.as_ref(),
        }
    }
}

macro_rules! from {
    ($ty:ident) => {
        impl From<$ty> for super::Record {
            fn from(value: $ty) -> Self {
                Self::$ty(value.into())
            }
        }
    };
}
use from;

/// Record decoder of one event.
///
/// Holds the parts of the event's attribute that shape its records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parser {
    pub(crate) sample_type: u64,
    pub(crate) read_format: u64,
    pub(crate) sample_id_all: bool,
    pub(crate) regs_user: u32,
    pub(crate) regs_intr: u32,
    pub(crate) branch_hw_index: bool,
    pub(crate) branch_counters: bool,
}

impl Parser {
    pub fn new(attr: &Attr) -> Self {
        use crate::config::{BranchSample, Opt};

        Self {
            sample_type: attr.sample_format.as_sample_type(),
            read_format: attr.count_format.as_read_format(),
            sample_id_all: attr.get(Opt::SampleIdAll),
            regs_user: attr.sample_regs_user.count_ones(),
            regs_intr: attr.sample_regs_intr.count_ones(),
            branch_hw_index: attr.branch_sample.contains(BranchSample::HW_INDEX),
            branch_counters: attr.branch_sample.contains(BranchSample::COUNTERS),
        }
    }

    pub(crate) fn has(&self, flag: u64) -> bool {
        self.sample_type & flag != 0
    }

    /// Decodes one framed record, header included.
    ///
    /// Records that are truncated or of an unknown type come back as [`Record::Unknown`],
    /// bytes past the fields this crate knows about are ignored.
    pub fn parse(&self, frame: &[u8]) -> Record {
        let Some(header) = Header::parse(frame) else {
            return Record::Unknown(Unknown {
                header: Header::default(),
                bytes: frame.to_vec(),
            });
        };
        let end = (header.size as usize).clamp(HEADER_SIZE, frame.len().max(HEADER_SIZE));
        let frame = frame.get(..end).unwrap_or(frame);

        log::trace!("record type {} size {}", header.ty, header.size);

        self.decode(header, frame).unwrap_or_else(|| {
            Record::Unknown(Unknown {
                header,
                bytes: frame.get(HEADER_SIZE..).unwrap_or_default().to_vec(),
            })
        })
    }

    fn decode(&self, header: Header, frame: &[u8]) -> Option<Record> {
        if header.ty == b::PERF_RECORD_SAMPLE {
            return sample::parse(self, header, Cursor::at(frame, HEADER_SIZE));
        }

        let (mut c, sample_id) = self.split(frame)?;
        let c = &mut c;
        let record = match header.ty {
            b::PERF_RECORD_MMAP => Mmap::parse(c, header, false, sample_id)?.into(),
            b::PERF_RECORD_MMAP2 => Mmap::parse(c, header, true, sample_id)?.into(),
            b::PERF_RECORD_LOST => Lost::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_COMM => Comm::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_EXIT => Record::Exit(Task::parse(c, header, sample_id)?),
            b::PERF_RECORD_FORK => Record::Fork(Task::parse(c, header, sample_id)?),
            b::PERF_RECORD_THROTTLE => Record::Throttle(Throttle::parse(c, header, sample_id)?),
            b::PERF_RECORD_UNTHROTTLE => {
                Record::Unthrottle(Throttle::parse(c, header, sample_id)?)
            }
            b::PERF_RECORD_READ => Read::parse(c, header, self.read_format, sample_id)?.into(),
            b::PERF_RECORD_AUX => Aux::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_ITRACE_START => ItraceStart::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_LOST_SAMPLES => LostSamples::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_SWITCH => Switch::parse(header, sample_id).into(),
            b::PERF_RECORD_SWITCH_CPU_WIDE => SwitchCpuWide::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_NAMESPACES => Namespaces::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_KSYMBOL => Ksymbol::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_BPF_EVENT => BpfEvent::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_CGROUP => Cgroup::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_TEXT_POKE => TextPoke::parse(c, header, sample_id)?.into(),
            b::PERF_RECORD_AUX_OUTPUT_HW_ID => AuxOutputHwId::parse(c, header, sample_id)?.into(),
            _ => return None,
        };
        Some(record)
    }

    // The trailer sits at the very end of the frame, so it is located from
    // there instead of after bodies with padded strings.
    fn split<'a>(&self, frame: &'a [u8]) -> Option<(Cursor<'a>, Option<SampleId>)> {
        if !self.sample_id_all {
            return Some((Cursor::at(frame, HEADER_SIZE), None));
        }
        let body_end = frame.len().checked_sub(SampleId::size(self.sample_type))?;
        if body_end < HEADER_SIZE {
            return None;
        }
        let mut tail = Cursor::new(&frame[body_end..]);
        let sample_id = SampleId::parse(&mut tail, self.sample_type)?;
        Some((Cursor::at(&frame[..body_end], HEADER_SIZE), Some(sample_id)))
    }

    /// Event id of a framed record, read from the identifier slot.
    pub(crate) fn identifier(&self, frame: &[u8]) -> Option<u64> {
        if !self.has(b::PERF_SAMPLE_IDENTIFIER) {
            return None;
        }
        let header = Header::parse(frame)?;
        let frame = frame.get(..header.size as usize)?;
        if header.ty == b::PERF_RECORD_SAMPLE {
            Cursor::at(frame, HEADER_SIZE).read()
        } else if self.sample_id_all {
            let at = frame.len().checked_sub(8)?;
            (at >= HEADER_SIZE).then(|| Cursor::at(frame, at).read())?
        } else {
            None
        }
    }
}
