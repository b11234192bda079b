use std::fs;
use std::path::Path;

use super::bp::{Breakpoint, Len, Type};
use super::dp::{type_in, DynamicPmu};
use super::hw::{Cache, CacheId, CacheOp, CacheResult, Hardware};
use super::raw::Raw;
use super::sw::Software;
use super::tp::{Tracefs, TracepointId};
use super::Configure;
use crate::config::Attr;
use crate::error::ErrorKind;
use crate::ffi::bindings as b;

fn fake_tracepoint(root: &Path, subsystem: &str, name: &str, id: &str) {
    let dir = root.join("events").join(subsystem).join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("id"), id).unwrap();
}

#[test]
fn test_hardware() {
    let mut attr = Attr::default();
    Hardware::Instr.configure(&mut attr).unwrap();
    assert_eq!(attr.ty, b::PERF_TYPE_HARDWARE);
    assert_eq!(attr.config, b::PERF_COUNT_HW_INSTRUCTIONS as u64);
}

#[test]
fn test_cache_uses_cache_type() {
    let mut attr = Attr::default();
    let ev = Cache(CacheId::Dtlb, CacheOp::Write, CacheResult::Miss);
    ev.configure(&mut attr).unwrap();
    assert_eq!(attr.ty, b::PERF_TYPE_HW_CACHE);
    assert_eq!(attr.config, 3 | (1 << 8) | (1 << 16));
}

#[test]
fn test_software() {
    let mut attr = Attr::default();
    Software::Dummy.configure(&mut attr).unwrap();
    assert_eq!(attr.ty, b::PERF_TYPE_SOFTWARE);
    assert_eq!(attr.config, b::PERF_COUNT_SW_DUMMY as u64);
}

#[test]
fn test_breakpoint() {
    let mut attr = Attr::default();
    let ev = Breakpoint {
        ty: Type::Rw(Len::new(4).unwrap()),
        addr: 0x1000,
    };
    ev.configure(&mut attr).unwrap();
    assert_eq!(attr.ty, b::PERF_TYPE_BREAKPOINT);
    assert_eq!(attr.bp_type, b::HW_BREAKPOINT_RW);
    assert_eq!((attr.config1, attr.config2), (0x1000, 4));

    assert!(Len::new(0).is_none());
    assert!(Len::new(9).is_none());
}

#[test]
fn test_raw_and_dynamic_pmu() {
    let mut attr = Attr::default();
    Raw::new(0x1c2).configure(&mut attr).unwrap();
    assert_eq!((attr.ty, attr.config), (b::PERF_TYPE_RAW, 0x1c2));

    let ev = DynamicPmu {
        ty: 9,
        config: 1,
        config1: 2,
        config2: 3,
        config3: 4,
    };
    ev.configure(&mut attr).unwrap();
    assert_eq!(
        (attr.ty, attr.config, attr.config1, attr.config2, attr.config3),
        (9, 1, 2, 3, 4)
    );
}

#[test]
fn test_pmu_type_lookup() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("kprobe")).unwrap();
    fs::write(dir.path().join("kprobe/type"), "6\n").unwrap();

    assert_eq!(type_in(dir.path(), "kprobe").unwrap(), 6);
    let err = type_in(dir.path(), "uprobe").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_tracefs_resolves_id() {
    let dir = tempfile::tempdir().unwrap();
    fake_tracepoint(dir.path(), "syscalls", "sys_enter_getpid", "172\n");

    let tracefs = Tracefs::at(dir.path());
    let id = tracefs.tracepoint("syscalls", "sys_enter_getpid").unwrap();
    assert_eq!(id, TracepointId(172));

    let mut attr = Attr::default();
    id.configure(&mut attr).unwrap();
    assert_eq!((attr.ty, attr.config), (b::PERF_TYPE_TRACEPOINT, 172));
}

#[test]
fn test_tracefs_falls_back_to_second_root() {
    let empty = tempfile::tempdir().unwrap();
    let debug = tempfile::tempdir().unwrap();
    fake_tracepoint(debug.path(), "sched", "sched_switch", "300");

    let only_empty = Tracefs::at(empty.path());
    assert_eq!(
        only_empty.tracepoint("sched", "sched_switch").unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let both = Tracefs::new([empty.path(), debug.path()]);
    assert_eq!(both.tracepoint("sched", "sched_switch").unwrap().0, 300);
}

#[test]
fn test_tracefs_rejects_bad_names() {
    let dir = tempfile::tempdir().unwrap();
    fake_tracepoint(dir.path(), "a", "b", "1");
    let tracefs = Tracefs::at(dir.path());
    for (sub, name) in [("..", "b"), ("a/b", "c"), ("a", ""), ("a", "b/../b")] {
        let err = tracefs.tracepoint(sub, name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[test]
fn test_malformed_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    fake_tracepoint(dir.path(), "x", "y", "not a number");
    let err = Tracefs::at(dir.path()).tracepoint("x", "y").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_failed_configure_leaves_attr_unchanged() {
    struct Missing;

    super::configure!(Missing, _value, {
        Tracefs::at("/nonexistent/tracing").tracepoint("no", "such")?;
        unreachable!()
    });

    let mut attr = Attr::default();
    Software::TaskClock.configure(&mut attr).unwrap();
    let before = attr.clone();

    let err = Missing.configure(&mut attr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(attr, before);
}
