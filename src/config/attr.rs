use super::opt::{FREQ, PRECISE_IP, USE_CLOCKID, WATERMARK};
use super::{Attr, Sampling, Wakeup};
use crate::ffi::bindings as b;

pub const ATTR_SIZE: usize = b::PERF_ATTR_SIZE_VER8 as _;

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L389
// struct perf_event_attr {
//     u32 type;                       # 0
//     u32 size;                       # 4
//     u64 config;                     # 8
//     union { u64 sample_period; u64 sample_freq; };       # 16
//     u64 sample_type;                # 24
//     u64 read_format;                # 32
//     u64 disabled : 1, ...;          # 40, option word 0
//     union { u32 wakeup_events; u32 wakeup_watermark; };  # 48
//     u32 bp_type;                    # 52
//     union { u64 bp_addr; u64 kprobe_func; u64 uprobe_path; u64 config1; };  # 56
//     union { u64 bp_len; u64 kprobe_addr; u64 probe_offset; u64 config2; };  # 64
//     u64 branch_sample_type;         # 72
//     u64 sample_regs_user;           # 80
//     u32 sample_stack_user;          # 88
//     s32 clockid;                    # 92
//     u64 sample_regs_intr;           # 96
//     u32 aux_watermark;              # 104
//     u16 sample_max_stack;           # 108
//     u16 __reserved_2;               # 110
//     u32 aux_sample_size;            # 112
//     union { u32 aux_action; struct { u32 aux_start_paused : 1, ... }; };  # 116, option word 1
//     u64 sig_data;                   # 120
//     u64 config3;                    # 128
// };
pub mod offset {
    pub const TYPE: usize = 0;
    pub const SIZE: usize = 4;
    pub const CONFIG: usize = 8;
    pub const SAMPLE_PERIOD: usize = 16;
    pub const SAMPLE_TYPE: usize = 24;
    pub const READ_FORMAT: usize = 32;
    pub const FLAGS: usize = 40;
    pub const WAKEUP: usize = 48;
    pub const BP_TYPE: usize = 52;
    pub const CONFIG1: usize = 56;
    pub const CONFIG2: usize = 64;
    pub const BRANCH_SAMPLE_TYPE: usize = 72;
    pub const SAMPLE_REGS_USER: usize = 80;
    pub const SAMPLE_STACK_USER: usize = 88;
    pub const CLOCKID: usize = 92;
    pub const SAMPLE_REGS_INTR: usize = 96;
    pub const AUX_WATERMARK: usize = 104;
    pub const SAMPLE_MAX_STACK: usize = 108;
    pub const AUX_SAMPLE_SIZE: usize = 112;
    pub const AUX_ACTION: usize = 116;
    pub const SIG_DATA: usize = 120;
    pub const CONFIG3: usize = 128;
}

/// `perf_event_attr` in its binary form.
#[derive(Clone, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct AttrBytes(pub [u8; ATTR_SIZE]);

impl AttrBytes {
    fn put<const N: usize>(&mut self, at: usize, bytes: [u8; N]) {
        self.0[at..at + N].copy_from_slice(&bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl std::fmt::Debug for AttrBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.chunks(8)).finish()
    }
}

impl Attr {
    /// Serialises into the kernel layout, all scalars in host byte order.
    pub(crate) fn encode(&self) -> AttrBytes {
        let mut buf = AttrBytes([0; ATTR_SIZE]);

        let mut opts = self.options;
        let period = match self.sampling {
            Sampling::Period(n) => n,
            Sampling::Frequency(n) => {
                opts.put(FREQ, true);
                n
            }
        };
        let wakeup = match self.wakeup {
            Wakeup::Events(n) => n,
            Wakeup::Watermark(n) => {
                opts.put(WATERMARK, true);
                n
            }
        };
        opts.set_field(PRECISE_IP, 2, self.skid as u64);
        opts.put(USE_CLOCKID, self.clock.is_some());

        buf.put(offset::TYPE, self.ty.to_ne_bytes());
        buf.put(offset::SIZE, (ATTR_SIZE as u32).to_ne_bytes());
        buf.put(offset::CONFIG, self.config.to_ne_bytes());
        buf.put(offset::SAMPLE_PERIOD, period.to_ne_bytes());
        buf.put(
            offset::SAMPLE_TYPE,
            self.sample_format.as_sample_type().to_ne_bytes(),
        );
        buf.put(
            offset::READ_FORMAT,
            self.count_format.as_read_format().to_ne_bytes(),
        );
        buf.put(offset::FLAGS, opts.word(0).to_ne_bytes());
        buf.put(offset::WAKEUP, wakeup.to_ne_bytes());
        buf.put(offset::BP_TYPE, self.bp_type.to_ne_bytes());
        buf.put(offset::CONFIG1, self.config1.to_ne_bytes());
        buf.put(offset::CONFIG2, self.config2.to_ne_bytes());
        buf.put(offset::BRANCH_SAMPLE_TYPE, self.branch_sample.0.to_ne_bytes());
        buf.put(offset::SAMPLE_REGS_USER, self.sample_regs_user.to_ne_bytes());
        buf.put(offset::SAMPLE_STACK_USER, self.sample_stack_user.to_ne_bytes());
        buf.put(offset::CLOCKID, self.clock.unwrap_or(0).to_ne_bytes());
        buf.put(offset::SAMPLE_REGS_INTR, self.sample_regs_intr.to_ne_bytes());
        buf.put(offset::AUX_WATERMARK, self.aux_watermark.to_ne_bytes());
        buf.put(offset::SAMPLE_MAX_STACK, self.sample_max_stack.to_ne_bytes());
        buf.put(offset::AUX_SAMPLE_SIZE, self.aux_sample_size.to_ne_bytes());
        buf.put(offset::AUX_ACTION, (opts.word(1) as u32).to_ne_bytes());
        buf.put(offset::SIG_DATA, self.sig_data.to_ne_bytes());
        buf.put(offset::CONFIG3, self.config3.to_ne_bytes());

        buf
    }
}
