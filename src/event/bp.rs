use super::EventConfig;
use crate::ffi::bindings as b;

/// Hardware breakpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Breakpoint {
    pub ty: Type,
    pub addr: u64,
}

/// Access that triggers the breakpoint, with the watched length for data accesses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    R(Len),
    W(Len),
    Rw(Len),
    /// Instruction fetch, the length is `sizeof(long)`.
    X,
}

/// Watched length in bytes, 1 to 8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Len(u8);

impl Len {
    pub fn new(bytes: u8) -> Option<Self> {
        (1..=8).contains(&bytes).then_some(Self(bytes))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

super::configure!(Breakpoint, value, {
    let (bp_type, len) = match value.ty {
        Type::R(len) => (b::HW_BREAKPOINT_R, len.0 as u64),
        Type::W(len) => (b::HW_BREAKPOINT_W, len.0 as u64),
        Type::Rw(len) => (b::HW_BREAKPOINT_RW, len.0 as u64),
        Type::X => (b::HW_BREAKPOINT_X, size_of::<libc::c_long>() as u64),
    };
    Ok(EventConfig {
        ty: b::PERF_TYPE_BREAKPOINT,
        config: 0,
        config1: value.addr,
        config2: len,
        config3: 0,
        bp_type,
    })
});
