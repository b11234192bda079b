use super::*;
use crate::config::{Attr, BranchSample, Opt};

/// Frame builder, pads the body to 8 bytes and fills in the header size.
struct Frame {
    ty: u32,
    misc: u16,
    body: Vec<u8>,
}

impl Frame {
    fn new(ty: u32) -> Self {
        Self {
            ty,
            misc: 0,
            body: vec![],
        }
    }

    fn misc(mut self, misc: u16) -> Self {
        self.misc = misc;
        self
    }

    fn u64(mut self, v: u64) -> Self {
        self.body.extend(v.to_ne_bytes());
        self
    }

    fn u32(mut self, v: u32) -> Self {
        self.body.extend(v.to_ne_bytes());
        self
    }

    fn u16(mut self, v: u16) -> Self {
        self.body.extend(v.to_ne_bytes());
        self
    }

    fn bytes(mut self, v: &[u8]) -> Self {
        self.body.extend(v);
        self
    }

    fn str(mut self, s: &str) -> Self {
        self.body.extend(s.as_bytes());
        self.body.push(0);
        self.pad()
    }

    fn pad(mut self) -> Self {
        while self.body.len() % 8 != 0 {
            self.body.push(0);
        }
        self
    }

    fn build(self) -> Vec<u8> {
        let size = (HEADER_SIZE + self.body.len()) as u16;
        let mut out = vec![];
        out.extend(self.ty.to_ne_bytes());
        out.extend(self.misc.to_ne_bytes());
        out.extend(size.to_ne_bytes());
        out.extend(self.body);
        out
    }
}

fn parser(f: impl FnOnce(&mut Attr)) -> Parser {
    let mut attr = Attr::default();
    attr.set_sample_period(1);
    f(&mut attr);
    Parser::new(&attr)
}

#[test]
fn test_sample_tid_time() {
    let p = parser(|attr| {
        attr.sample_format.tid = true;
        attr.sample_format.time = true;
        attr.sample_format.cpu = true;
    });
    let frame = Frame::new(b::PERF_RECORD_SAMPLE)
        .misc(b::PERF_RECORD_MISC_USER)
        .u32(100)
        .u32(101)
        .u64(5000)
        .u32(3)
        .u32(0)
        .build();

    let Record::Sample(sample) = p.parse(&frame) else {
        panic!("not a sample");
    };
    assert_eq!((sample.pid, sample.tid), (Some(100), Some(101)));
    assert_eq!(sample.time, Some(5000));
    assert_eq!(sample.cpu, Some(3));
    assert_eq!(sample.ip, None);
    assert_eq!(sample.header.cpu_mode(), CpuMode::User);
    assert_eq!(sample.header.size as usize, frame.len());
}

#[test]
fn test_sample_variable_fields() {
    let p = parser(|attr| {
        attr.sample_format.ip = true;
        attr.sample_format.callchain = true;
        attr.sample_format.raw = true;
        attr.sample_format.regs_user = true;
        attr.sample_format.stack_user = true;
        attr.sample_format.branch_stack = true;
        attr.sample_regs_user = 0b101;
        attr.sample_stack_user = 8;
        attr.branch_sample = BranchSample::ANY | BranchSample::HW_INDEX;
    });
    let frame = Frame::new(b::PERF_RECORD_SAMPLE)
        .misc(b::PERF_RECORD_MISC_EXACT_IP)
        .u64(0xffff)
        // callchain
        .u64(2)
        .u64(1)
        .u64(2)
        // raw, 4 + 5 bytes padded to 16
        .u32(5)
        .bytes(b"hello")
        .pad()
        // branch stack with hw index, one entry
        .u64(1)
        .u64(9)
        .u64(0x10)
        .u64(0x20)
        .u64(0b11 | (7 << 4))
        // user regs
        .u64(b::PERF_SAMPLE_REGS_ABI_64 as u64)
        .u64(11)
        .u64(22)
        // user stack
        .u64(8)
        .bytes(&[1, 2, 3, 4, 5, 6, 7, 8])
        .u64(4)
        .build();

    let Record::Sample(sample) = p.parse(&frame) else {
        panic!("not a sample");
    };
    assert!(sample.exact_ip());
    assert_eq!(sample.ip, Some(0xffff));
    assert_eq!(sample.callchain, Some(vec![1, 2]));
    assert_eq!(sample.raw.as_deref(), Some(&b"hello"[..]));

    let branches = sample.branch_stack.as_ref().unwrap();
    assert_eq!(branches.hw_index, Some(9));
    assert_eq!(branches.entries.len(), 1);
    let entry = branches.entries[0];
    assert_eq!((entry.from, entry.to), (0x10, 0x20));
    assert!(entry.mispredicted() && entry.predicted());
    assert_eq!(entry.cycles(), 7);

    let regs = sample.regs_user.as_ref().unwrap();
    assert_eq!(regs.abi, Some(Abi::_64));
    assert_eq!(regs.regs, vec![11, 22]);

    let stack = sample.stack_user.as_ref().unwrap();
    assert_eq!(stack.valid(), &[1, 2, 3, 4]);
}

#[test]
fn test_regs_abi_none_has_no_regs() {
    let p = parser(|attr| {
        attr.sample_format.regs_user = true;
        attr.sample_regs_user = 0xff;
    });
    let frame = Frame::new(b::PERF_RECORD_SAMPLE)
        .u64(b::PERF_SAMPLE_REGS_ABI_NONE as u64)
        .build();
    let Record::Sample(sample) = p.parse(&frame) else {
        panic!("not a sample");
    };
    let regs = sample.regs_user.unwrap();
    assert_eq!(regs.abi, None);
    assert!(regs.regs.is_empty());
}

#[test]
fn test_group_sample_read_values() {
    let p = parser(|attr| {
        attr.sample_format.read = true;
        attr.count_format.group = true;
        attr.count_format.id = true;
    });
    let frame = Frame::new(b::PERF_RECORD_SAMPLE)
        .u64(2)
        .u64(10)
        .u64(100)
        .u64(20)
        .u64(200)
        .build();

    let Record::GroupSample(sample) = p.parse(&frame) else {
        panic!("not a group sample");
    };
    let read = sample.read.as_ref().unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!((read.values[0].value, read.values[0].id), (10, Some(100)));
    assert_eq!((read.values[1].value, read.values[1].id), (20, Some(200)));
}

#[test]
fn test_unknown_tail_is_ignored() {
    let p = parser(|attr| attr.sample_format.ip = true);
    let frame = Frame::new(b::PERF_RECORD_SAMPLE)
        .u64(7)
        .u64(0xdead)
        .u64(0xbeef)
        .build();
    let Record::Sample(sample) = p.parse(&frame) else {
        panic!("not a sample");
    };
    assert_eq!(sample.ip, Some(7));
}

#[test]
fn test_truncated_record_is_unknown() {
    let p = parser(|attr| {
        attr.sample_format.ip = true;
        attr.sample_format.time = true;
    });
    let frame = Frame::new(b::PERF_RECORD_SAMPLE).u64(7).build();
    let Record::Unknown(unknown) = p.parse(&frame) else {
        panic!("truncated sample decoded");
    };
    assert_eq!(unknown.header.ty, b::PERF_RECORD_SAMPLE);
    assert_eq!(unknown.bytes, 7u64.to_ne_bytes());
}

#[test]
fn test_unknown_type_keeps_bytes() {
    let p = parser(|_| {});
    let frame = Frame::new(99).u64(1).u64(2).build();
    let record = p.parse(&frame);
    assert_eq!(record.header().ty, 99);
    let Record::Unknown(unknown) = record else {
        panic!("type 99 decoded");
    };
    assert_eq!(unknown.bytes.len(), 16);
}

#[test]
fn test_garbage_callchain_length() {
    let p = parser(|attr| attr.sample_format.callchain = true);
    let frame = Frame::new(b::PERF_RECORD_SAMPLE).u64(u64::MAX).build();
    assert!(matches!(p.parse(&frame), Record::Unknown(_)));
}

#[test]
fn test_comm_with_sample_id_trailer() {
    let p = parser(|attr| {
        attr.set(Opt::SampleIdAll, true);
        attr.sample_format.tid = true;
        attr.sample_format.time = true;
        attr.sample_format.cpu = true;
        attr.sample_format.identifier = true;
    });
    let frame = Frame::new(b::PERF_RECORD_COMM)
        .misc(b::PERF_RECORD_MISC_COMM_EXEC)
        .u32(1)
        .u32(2)
        .str("a-long-process-name")
        // trailer
        .u32(1)
        .u32(2)
        .u64(777)
        .u32(5)
        .u32(0)
        .u64(42)
        .build();

    let record = p.parse(&frame);
    let id = record.sample_id().cloned().unwrap();
    assert_eq!((id.pid, id.tid, id.time), (Some(1), Some(2), Some(777)));
    assert_eq!((id.cpu, id.identifier), (Some(5), Some(42)));
    assert_eq!(p.identifier(&frame), Some(42));

    let Record::Comm(comm) = record else {
        panic!("not a comm");
    };
    assert_eq!(comm.comm, "a-long-process-name");
    assert!(comm.by_execve());
}

#[test]
fn test_sample_identifier_is_first_word() {
    let p = parser(|attr| {
        attr.sample_format.identifier = true;
        attr.sample_format.ip = true;
    });
    let frame = Frame::new(b::PERF_RECORD_SAMPLE).u64(31).u64(1).build();
    assert_eq!(p.identifier(&frame), Some(31));

    let plain = parser(|attr| attr.sample_format.ip = true);
    assert_eq!(plain.identifier(&frame), None);
}

#[test]
fn test_mmap2_build_id() {
    let p = parser(|_| {});
    let mut build_id = [0u8; 20];
    build_id[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    let frame = Frame::new(b::PERF_RECORD_MMAP2)
        .misc(b::PERF_RECORD_MISC_MMAP_BUILD_ID)
        .u32(10)
        .u32(11)
        .u64(0x4000)
        .u64(0x1000)
        .u64(0)
        .bytes(&[4, 0, 0, 0])
        .bytes(&build_id)
        .u32(libc::PROT_READ as u32)
        .u32(libc::MAP_PRIVATE as u32)
        .str("/usr/lib/libc.so.6")
        .build();

    let Record::Mmap(mmap) = p.parse(&frame) else {
        panic!("not an mmap");
    };
    assert!(mmap.executable());
    assert_eq!(mmap.filename, "/usr/lib/libc.so.6");
    let ext = mmap.ext.as_ref().unwrap();
    assert_eq!(ext.prot, libc::PROT_READ as u32);
    let Info::BuildId(id) = &ext.info else {
        panic!("no build id");
    };
    assert_eq!(id.as_slice(), &[0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_mmap_v1() {
    let p = parser(|_| {});
    let frame = Frame::new(b::PERF_RECORD_MMAP)
        .misc(b::PERF_RECORD_MISC_MMAP_DATA)
        .u32(1)
        .u32(1)
        .u64(0x1000)
        .u64(0x2000)
        .u64(3)
        .str("[heap]")
        .build();
    let Record::Mmap(mmap) = p.parse(&frame) else {
        panic!("not an mmap");
    };
    assert!(!mmap.executable());
    assert!(mmap.ext.is_none());
    assert_eq!((mmap.addr, mmap.len, mmap.pgoff), (0x1000, 0x2000, 3));
}

#[test]
fn test_fork_exit_throttle_lost() {
    let p = parser(|_| {});
    let task = |ty| {
        Frame::new(ty)
            .u32(2)
            .u32(1)
            .u32(3)
            .u32(1)
            .u64(99)
            .build()
    };
    let Record::Fork(fork) = p.parse(&task(b::PERF_RECORD_FORK)) else {
        panic!("not a fork");
    };
    assert_eq!((fork.pid, fork.ppid, fork.tid, fork.time), (2, 1, 3, 99));
    assert!(matches!(p.parse(&task(b::PERF_RECORD_EXIT)), Record::Exit(_)));

    let throttle = |ty| Frame::new(ty).u64(1).u64(2).u64(3).build();
    assert!(matches!(
        p.parse(&throttle(b::PERF_RECORD_THROTTLE)),
        Record::Throttle(Throttle { id: 2, .. })
    ));
    assert!(matches!(
        p.parse(&throttle(b::PERF_RECORD_UNTHROTTLE)),
        Record::Unthrottle(Throttle { stream_id: 3, .. })
    ));

    let lost = Frame::new(b::PERF_RECORD_LOST).u64(8).u64(12).build();
    assert!(matches!(
        p.parse(&lost),
        Record::Lost(Lost { id: 8, lost: 12, .. })
    ));
}

#[test]
fn test_switch_flags() {
    let p = parser(|_| {});
    let out = b::PERF_RECORD_MISC_SWITCH_OUT | b::PERF_RECORD_MISC_SWITCH_OUT_PREEMPT;
    let frame = Frame::new(b::PERF_RECORD_SWITCH).misc(out).build();
    let Record::Switch(switch) = p.parse(&frame) else {
        panic!("not a switch");
    };
    assert!(switch.out() && switch.preempt());

    let frame = Frame::new(b::PERF_RECORD_SWITCH_CPU_WIDE).u32(4).u32(5).build();
    let Record::SwitchCpuWide(switch) = p.parse(&frame) else {
        panic!("not a cpu-wide switch");
    };
    assert!(!switch.out());
    assert_eq!((switch.next_prev_pid, switch.next_prev_tid), (4, 5));
}

#[test]
fn test_ksymbol_bpf_text_poke() {
    let p = parser(|_| {});
    let frame = Frame::new(b::PERF_RECORD_KSYMBOL)
        .u64(0xffff0000)
        .u32(64)
        .u16(1)
        .u16(1)
        .str("bpf_prog_x")
        .build();
    let Record::Ksymbol(ksym) = p.parse(&frame) else {
        panic!("not a ksymbol");
    };
    assert_eq!(ksym.name, "bpf_prog_x");
    assert!(ksym.unregister());

    let frame = Frame::new(b::PERF_RECORD_BPF_EVENT)
        .u16(1)
        .u16(0)
        .u32(77)
        .bytes(&[1, 2, 3, 4, 5, 6, 7, 8])
        .build();
    let Record::BpfEvent(bpf) = p.parse(&frame) else {
        panic!("not a bpf event");
    };
    assert_eq!((bpf.id, bpf.tag), (77, [1, 2, 3, 4, 5, 6, 7, 8]));

    let frame = Frame::new(b::PERF_RECORD_TEXT_POKE)
        .u64(0x1000)
        .u16(2)
        .u16(3)
        .bytes(&[0xaa, 0xbb, 0x1, 0x2, 0x3])
        .pad()
        .build();
    let Record::TextPoke(poke) = p.parse(&frame) else {
        panic!("not a text poke");
    };
    assert_eq!(poke.old_bytes, [0xaa, 0xbb]);
    assert_eq!(poke.new_bytes, [1, 2, 3]);
}

#[test]
fn test_namespaces_cgroup_aux() {
    let p = parser(|_| {});
    let frame = Frame::new(b::PERF_RECORD_NAMESPACES)
        .u32(1)
        .u32(1)
        .u64(2)
        .u64(10)
        .u64(11)
        .u64(20)
        .u64(21)
        .build();
    let Record::Namespaces(ns) = p.parse(&frame) else {
        panic!("not namespaces");
    };
    assert_eq!(ns.namespaces[1], Namespace { dev: 20, inode: 21 });

    let frame = Frame::new(b::PERF_RECORD_CGROUP).u64(5).str("/user.slice").build();
    let Record::Cgroup(cgroup) = p.parse(&frame) else {
        panic!("not a cgroup");
    };
    assert_eq!((cgroup.id, cgroup.path.as_str()), (5, "/user.slice"));

    let frame = Frame::new(b::PERF_RECORD_AUX)
        .u64(0)
        .u64(4096)
        .u64(b::PERF_AUX_FLAG_TRUNCATED)
        .build();
    let Record::Aux(aux) = p.parse(&frame) else {
        panic!("not an aux");
    };
    assert!(aux.truncated() && !aux.collision());
}

#[test]
fn test_read_record() {
    let p = parser(|attr| attr.count_format.time_enabled = true);
    let frame = Frame::new(b::PERF_RECORD_READ)
        .u32(9)
        .u32(9)
        .u64(123)
        .u64(456)
        .build();
    let Record::Read(read) = p.parse(&frame) else {
        panic!("not a read");
    };
    let ReadValues::Single(count) = &read.values else {
        panic!("group values");
    };
    assert_eq!((count.value, count.time_enabled), (123, Some(456)));
}

#[test]
fn test_sample_raw_keeps_kernel_padding() {
    let p = parser(|attr| {
        attr.sample_format.raw = true;
        attr.sample_format.period = true;
    });
    // The kernel sizes raw data so that the u32 size plus the data end on
    // an 8 byte boundary, the padding is part of the data.
    let frame = Frame::new(b::PERF_RECORD_SAMPLE)
        .u64(1000)
        .u32(12)
        .bytes(b"hello\0\0\0\0\0\0\0")
        .build();

    let Record::Sample(sample) = p.parse(&frame) else {
        panic!("not a sample");
    };
    assert_eq!(sample.period, Some(1000));
    assert_eq!(sample.raw.as_deref(), Some(&b"hello\0\0\0\0\0\0\0"[..]));
}
