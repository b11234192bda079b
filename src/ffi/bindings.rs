//! Kernel ABI generated from the uapi headers by `build/main.rs`.
//!
//! Ioctl requests are exposed as `PERF_IOC_OP_*`, evaluated by clang for
//! the target so the direction and size encoding always match the kernel.

#![allow(warnings)]

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
