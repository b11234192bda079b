use super::EventConfig;
use crate::ffi::bindings as b;

/// A "raw" implementation-specific event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Raw {
    pub config: u64,
    pub config1: u64,
    pub config2: u64,
    /// Since `linux-6.3`.
    pub config3: u64,
}

impl Raw {
    pub fn new(config: u64) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

super::configure!(Raw, value, {
    Ok(EventConfig {
        ty: b::PERF_TYPE_RAW,
        config: value.config,
        config1: value.config1,
        config2: value.config2,
        config3: value.config3,
        bp_type: 0,
    })
});
