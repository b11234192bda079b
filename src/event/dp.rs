use std::fs;
use std::path::Path;

use super::EventConfig;
use crate::error::{Error, Result};

const DEVICES: &str = "/sys/bus/event_source/devices";

/// Dynamic PMU event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicPmu {
    /// PMU type, as read from `/sys/bus/event_source/devices/<pmu>/type`
    /// (see [`DynamicPmu::type_of`]). The core CPU PMU is usually 4.
    pub ty: u32,
    pub config: u64,
    pub config1: u64,
    pub config2: u64,
    /// Needs Linux 6.3 or later when non-zero.
    pub config3: u64,
}

impl DynamicPmu {
    /// Looks up the type of the PMU named `pmu`, e.g. `"cpu"` or `"kprobe"`.
    pub fn type_of(pmu: &str) -> Result<u32> {
        type_in(Path::new(DEVICES), pmu)
    }
}

pub(crate) fn type_in(devices: &Path, pmu: &str) -> Result<u32> {
    let path = devices.join(pmu).join("type");
    let text = fs::read_to_string(&path).map_err(|_| Error::NotFound(format!("pmu {pmu}")))?;
    text.trim()
        .parse()
        .map_err(|_| Error::NotFound(format!("malformed pmu type in {}", path.display())))
}

super::configure!(DynamicPmu, value, {
    Ok(EventConfig {
        ty: value.ty,
        config: value.config,
        config1: value.config1,
        config2: value.config2,
        config3: value.config3,
        bp_type: 0,
    })
});
