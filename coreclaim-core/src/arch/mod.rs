//! Architecture detection and thread affinity
//!
//! This module is responsible for:
//! - Detecting the CPU topology (cores, NUMA nodes)
//! - Applying core sets to the calling thread's scheduling mask

pub mod affinity;
pub mod cpu_info;

pub use affinity::AffinityOutcome;
pub use cpu_info::{CpuInfo, NumaNode};

/// Get information about the current system's CPU topology
pub fn detect_cpu_topology() -> CpuInfo {
    CpuInfo::detect()
}
