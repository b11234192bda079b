//! Counters, event groups and ring-buffer records on top of the
//! `perf_event_open` system call.
//!
//! ## Example
//!
//! Count the `getpid` syscalls made by the current thread and read the
//! sample each of them leaves in the ring.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use perf_event_ring::config::{Attr, Cpu, Opt, Target};
//! use perf_event_ring::count::Event;
//! use perf_event_ring::event::{tp::Tracepoint, Configure};
//! use perf_event_ring::sample::record::Record;
//! use perf_event_ring::sample::ReadCtx;
//!
//! let mut attr = Attr::default();
//! Tracepoint::new("syscalls", "sys_enter_getpid").configure(&mut attr).unwrap();
//! attr.label = "getpid".to_string();
//! attr.set(Opt::Disabled, true);
//! attr.set_sample_period(1);
//! attr.sample_format.tid = true;
//!
//! let event = Event::open(&attr, Target::CallingThread, Cpu::Any, None).unwrap();
//! event.map_ring().unwrap();
//!
//! let count = event.measure(|| unsafe { libc::getpid(); }).unwrap();
//! assert_eq!(count.value, 1);
//!
//! let ctx = ReadCtx::new().with_timeout(Duration::from_secs(1));
//! if let Record::Sample(sample) = event.read_record(&ctx).unwrap() {
//!     println!("getpid from {:?}", sample.pid);
//! }
//! ```
//!
//! ## Kernel compatibility
//!
//! `perf_event_attr` is always passed at its 136-byte size, so kernels
//! since 5.13 accept every field. Older kernels accept it as long as the
//! fields they do not know are left zero, and report the rest as
//! [`Error::UnsupportedFeature`].
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

pub mod config;
pub mod count;
pub mod error;
pub mod event;
mod ffi;
pub mod sample;

pub use count::{Count, Event, GroupCount, State};
pub use error::{Error, ErrorKind, Result};
