use super::EventConfig;
use crate::ffi::bindings as b;

/// Generalized hardware events.
///
/// Not every PMU implements every event, unsupported ones fail at open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hardware {
    CpuCycle,
    BusCycle,
    RefCpuCycle,

    CacheMiss,
    CacheAccess,

    BranchMiss,
    BranchInstr,

    BackendStalledCycle,
    FrontendStalledCycle,

    Instr,
}

super::configure!(Hardware, value, {
    let config = match value {
        Hardware::CpuCycle => b::PERF_COUNT_HW_CPU_CYCLES,
        Hardware::BusCycle => b::PERF_COUNT_HW_BUS_CYCLES,
        Hardware::RefCpuCycle => b::PERF_COUNT_HW_REF_CPU_CYCLES,
        Hardware::CacheMiss => b::PERF_COUNT_HW_CACHE_MISSES,
        Hardware::CacheAccess => b::PERF_COUNT_HW_CACHE_REFERENCES,
        Hardware::BranchMiss => b::PERF_COUNT_HW_BRANCH_MISSES,
        Hardware::BranchInstr => b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS,
        Hardware::BackendStalledCycle => b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND,
        Hardware::FrontendStalledCycle => b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND,
        Hardware::Instr => b::PERF_COUNT_HW_INSTRUCTIONS,
    };
    Ok(EventConfig {
        ty: b::PERF_TYPE_HARDWARE,
        config: config as u64,
        ..Default::default()
    })
});

/// Hardware cache event, a combination of a cache, an operation and a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cache(pub CacheId, pub CacheOp, pub CacheResult);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CacheId {
    L1d,
    L1i,
    /// Last level cache.
    Ll,
    Dtlb,
    Itlb,
    /// Branch prediction unit.
    Bpu,
    /// Local memory accesses.
    Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CacheOp {
    Read,
    Write,
    Prefetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CacheResult {
    Access,
    Miss,
}

super::configure!(Cache, value, {
    let Cache(id, op, result) = value;
    let id = match id {
        CacheId::L1d => b::PERF_COUNT_HW_CACHE_L1D,
        CacheId::L1i => b::PERF_COUNT_HW_CACHE_L1I,
        CacheId::Ll => b::PERF_COUNT_HW_CACHE_LL,
        CacheId::Dtlb => b::PERF_COUNT_HW_CACHE_DTLB,
        CacheId::Itlb => b::PERF_COUNT_HW_CACHE_ITLB,
        CacheId::Bpu => b::PERF_COUNT_HW_CACHE_BPU,
        CacheId::Node => b::PERF_COUNT_HW_CACHE_NODE,
    };
    let op = match op {
        CacheOp::Read => b::PERF_COUNT_HW_CACHE_OP_READ,
        CacheOp::Write => b::PERF_COUNT_HW_CACHE_OP_WRITE,
        CacheOp::Prefetch => b::PERF_COUNT_HW_CACHE_OP_PREFETCH,
    };
    let result = match result {
        CacheResult::Access => b::PERF_COUNT_HW_CACHE_RESULT_ACCESS,
        CacheResult::Miss => b::PERF_COUNT_HW_CACHE_RESULT_MISS,
    };
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L43
    Ok(EventConfig {
        ty: b::PERF_TYPE_HW_CACHE,
        config: (id | (op << 8) | (result << 16)) as u64,
        ..Default::default()
    })
});
