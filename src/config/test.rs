use std::collections::HashSet;

use super::attr::{offset, ATTR_SIZE};
use super::{Attr, BranchSample, Cpu, Opt, Sampling, Skid, Target, Wakeup};
use crate::error::ErrorKind;
use crate::ffi::bindings as b;

fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes(buf[at..at + 2].try_into().unwrap())
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes(buf[at..at + 4].try_into().unwrap())
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    u64::from_ne_bytes(buf[at..at + 8].try_into().unwrap())
}

#[test]
fn test_encode_golden_layout() {
    let mut attr = Attr {
        ty: b::PERF_TYPE_TRACEPOINT,
        config: 0x1234,
        config1: 0xaa,
        config2: 0xbb,
        config3: 0xcc,
        bp_type: 3,
        sample_regs_user: 0xff,
        sample_stack_user: 64,
        sample_regs_intr: 0xf0,
        sample_max_stack: 16,
        clock: Some(libc::CLOCK_MONOTONIC),
        aux_watermark: 4096,
        aux_sample_size: 512,
        sig_data: 0xdead,
        branch_sample: BranchSample::ANY | BranchSample::USER,
        ..Default::default()
    };
    attr.set_sample_period(7);
    attr.set_wakeup_events(3);
    attr.sample_format.tid = true;
    attr.sample_format.stream_id = true;
    attr.count_format.group = true;
    attr.count_format.id = true;
    attr.set(Opt::Disabled, true);
    attr.set(Opt::SampleIdAll, true);
    attr.set(Opt::AuxResume, true);
    attr.skid = Skid::RequestZero;

    let bytes = attr.encode();
    let buf = bytes.as_bytes();
    assert_eq!(buf.len(), ATTR_SIZE);
    assert_eq!(u32_at(buf, offset::TYPE), b::PERF_TYPE_TRACEPOINT);
    assert_eq!(u32_at(buf, offset::SIZE), 136);
    assert_eq!(u64_at(buf, offset::CONFIG), 0x1234);
    assert_eq!(u64_at(buf, offset::SAMPLE_PERIOD), 7);
    assert_eq!(
        u64_at(buf, offset::SAMPLE_TYPE),
        b::PERF_SAMPLE_TID | b::PERF_SAMPLE_STREAM_ID
    );
    assert_eq!(
        u64_at(buf, offset::READ_FORMAT),
        b::PERF_FORMAT_GROUP as u64 | b::PERF_FORMAT_ID as u64
    );
    // disabled, sample_id_all, precise_ip = 2, use_clockid
    let flags = 1 | (1 << 18) | (2 << 15) | (1 << 25);
    assert_eq!(u64_at(buf, offset::FLAGS), flags);
    assert_eq!(u32_at(buf, offset::WAKEUP), 3);
    assert_eq!(u32_at(buf, offset::BP_TYPE), 3);
    assert_eq!(u64_at(buf, offset::CONFIG1), 0xaa);
    assert_eq!(u64_at(buf, offset::CONFIG2), 0xbb);
    assert_eq!(
        u64_at(buf, offset::BRANCH_SAMPLE_TYPE),
        b::PERF_SAMPLE_BRANCH_ANY as u64 | b::PERF_SAMPLE_BRANCH_USER as u64
    );
    assert_eq!(u64_at(buf, offset::SAMPLE_REGS_USER), 0xff);
    assert_eq!(u32_at(buf, offset::SAMPLE_STACK_USER), 64);
    assert_eq!(u32_at(buf, offset::CLOCKID) as i32, libc::CLOCK_MONOTONIC);
    assert_eq!(u64_at(buf, offset::SAMPLE_REGS_INTR), 0xf0);
    assert_eq!(u32_at(buf, offset::AUX_WATERMARK), 4096);
    assert_eq!(u16_at(buf, offset::SAMPLE_MAX_STACK), 16);
    assert_eq!(u16_at(buf, offset::SAMPLE_MAX_STACK + 2), 0);
    assert_eq!(u32_at(buf, offset::AUX_SAMPLE_SIZE), 512);
    assert_eq!(u32_at(buf, offset::AUX_ACTION), 1 << 2);
    assert_eq!(u64_at(buf, offset::SIG_DATA), 0xdead);
    assert_eq!(u64_at(buf, offset::CONFIG3), 0xcc);
}

#[test]
fn test_default_attr_is_zero_but_size() {
    let bytes = Attr::default().encode();
    let buf = bytes.as_bytes();
    assert_eq!(u32_at(buf, offset::SIZE), 136);
    let mut rest = buf.to_vec();
    rest[offset::SIZE..offset::SIZE + 4].fill(0);
    assert!(rest.iter().all(|&b| b == 0));
}

#[test]
fn test_period_xor_frequency() {
    let mut attr = Attr::default();
    let freq_bit = |attr: &Attr| u64_at(attr.encode().as_bytes(), offset::FLAGS) & (1 << 10) != 0;

    attr.set_sample_frequency(4000);
    assert_eq!(attr.sampling(), Sampling::Frequency(4000));
    assert!(freq_bit(&attr));
    assert_eq!(u64_at(attr.encode().as_bytes(), offset::SAMPLE_PERIOD), 4000);

    attr.set_sample_period(10);
    assert_eq!(attr.sampling(), Sampling::Period(10));
    assert!(!freq_bit(&attr));

    attr.set_sample_frequency(1);
    attr.set_sample_frequency(2);
    assert!(freq_bit(&attr));
    assert_eq!(attr.sampling(), Sampling::Frequency(2));
}

#[test]
fn test_wakeup_events_xor_watermark() {
    let mut attr = Attr::default();
    let watermark_bit =
        |attr: &Attr| u64_at(attr.encode().as_bytes(), offset::FLAGS) & (1 << 14) != 0;

    attr.set_wakeup_watermark(8192);
    assert_eq!(attr.wakeup(), Wakeup::Watermark(8192));
    assert!(watermark_bit(&attr));

    attr.set_wakeup_events(1);
    assert_eq!(attr.wakeup(), Wakeup::Events(1));
    assert!(!watermark_bit(&attr));
    assert_eq!(u32_at(attr.encode().as_bytes(), offset::WAKEUP), 1);
}

#[test]
fn test_option_table_is_injective() {
    let positions: HashSet<_> = Opt::ALL.iter().map(|o| o.position()).collect();
    assert_eq!(positions.len(), Opt::ALL.len());
    for reserved in [(0, 10), (0, 14), (0, 15), (0, 16), (0, 25)] {
        assert!(!positions.contains(&reserved));
    }
}

#[test]
fn test_every_option_lands_on_its_bit() {
    for opt in Opt::ALL {
        let mut attr = Attr::default();
        attr.set(opt, true);
        assert!(attr.get(opt));
        let buf = attr.encode();
        let (word, bit) = opt.position();
        let (flags, aux) = (
            u64_at(buf.as_bytes(), offset::FLAGS),
            u32_at(buf.as_bytes(), offset::AUX_ACTION) as u64,
        );
        match word {
            0 => assert_eq!((flags, aux), (1 << bit, 0), "{opt:?}"),
            _ => assert_eq!((flags, aux), (0, 1 << bit), "{opt:?}"),
        }
        attr.set(opt, false);
        assert!(!attr.get(opt));
    }
}

#[test]
fn test_validate() {
    let kind = |attr: &Attr| attr.validate().unwrap_err().kind();

    let mut attr = Attr::default();
    attr.validate().unwrap();

    attr.sample_format.callchain = true;
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.set_sample_period(1);
    attr.validate().unwrap();

    attr.set_sample_frequency(0);
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.set_sample_frequency(99);
    attr.validate().unwrap();

    attr.sample_format.stack_user = true;
    attr.sample_stack_user = 12;
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.sample_stack_user = 16;
    attr.validate().unwrap();

    attr.sample_format.regs_user = true;
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.sample_regs_user = 1;
    attr.validate().unwrap();

    attr.sample_format.branch_stack = true;
    attr.branch_sample = BranchSample::USER;
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.branch_sample = BranchSample::USER | BranchSample::ANY_CALL;
    attr.validate().unwrap();

    attr.set(Opt::Sigtrap, true);
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.set(Opt::RemoveOnExec, true);
    attr.validate().unwrap();

    attr.set(Opt::InheritThread, true);
    assert_eq!(kind(&attr), ErrorKind::ConfigInvalid);
    attr.set(Opt::Inherit, true);
    attr.validate().unwrap();
}

#[test]
fn test_id_fields_need_no_sampling() {
    let mut attr = Attr::default();
    attr.sample_format.id = true;
    attr.sample_format.identifier = true;
    attr.sample_format.tid = true;
    attr.validate().unwrap();
}

#[test]
fn test_resolve_target() {
    let args = Target::CallingThread.resolve(Cpu::Any).unwrap();
    assert_eq!((args.pid, args.cpu, args.flags), (0, -1, 0));

    let args = Target::Pid(42).resolve(Cpu::Id(3)).unwrap();
    assert_eq!((args.pid, args.cpu, args.flags), (42, 3, 0));

    let args = Target::AnyPid.resolve(Cpu::Id(0)).unwrap();
    assert_eq!((args.pid, args.cpu), (-1, 0));

    let args = Target::Cgroup(9).resolve(Cpu::Id(1)).unwrap();
    assert_eq!((args.pid, args.flags), (9, b::PERF_FLAG_PID_CGROUP));

    let err = Target::AnyPid.resolve(Cpu::Any).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}

#[test]
fn test_resolve_rejects_wrapping_ids() {
    let err = Target::Pid(u32::MAX).resolve(Cpu::Id(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    let err = Target::Pid(1 << 31).resolve(Cpu::Any).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

    let err = Target::CallingThread.resolve(Cpu::Id(u32::MAX)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

    let args = Target::Pid(i32::MAX as u32).resolve(Cpu::Any).unwrap();
    assert_eq!(args.pid, i32::MAX);
}
