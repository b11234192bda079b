#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::Write;

use perf_event_ring::config::{Attr, Cpu, Opt, Target};
use perf_event_ring::event::{tp::Tracepoint, Configure};
use perf_event_ring::{Error, Event, Result};

/// Whether an error means the host cannot run the test.
fn unavailable(e: &Error) -> bool {
    matches!(
        e,
        Error::PermissionDenied(_) | Error::UnsupportedFeature(_) | Error::NotFound(_)
    )
}

/// Turns setup failures caused by the host into a skip.
pub fn skip<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(it) => Some(it),
        Err(e) if unavailable(&e) => {
            eprintln!("skipping: {e}");
            None
        }
        Err(e) => panic!("{e}"),
    }
}

/// A disabled tracepoint event sampling every hit, waking readers on each sample.
pub fn tracepoint(subsystem: &str, name: &str) -> Option<Attr> {
    let mut attr = Attr::default();
    skip(Tracepoint::new(subsystem, name).configure(&mut attr))?;
    attr.label = name.to_string();
    attr.set(Opt::Disabled, true);
    attr.set_sample_period(1);
    attr.set_wakeup_events(1);
    attr.sample_format.tid = true;
    Some(attr)
}

pub fn open<'g>(attr: &Attr, target: Target, leader: Option<&'g Event<'g>>) -> Option<Event<'g>> {
    skip(Event::open(attr, target, Cpu::Any, leader))
}

pub fn getpid() {
    unsafe { libc::syscall(libc::SYS_getpid) };
}

pub fn gettid() -> u32 {
    unsafe { libc::syscall(libc::SYS_gettid) as u32 }
}

/// Issues exactly one `write` syscall of 8 bytes.
pub fn write_null() {
    let mut null = OpenOptions::new().write(true).open("/dev/null").unwrap();
    null.write_all(&[0; 8]).unwrap();
}

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}
