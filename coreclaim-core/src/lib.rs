//! Coreclaim Core - CPU core reservation and thread affinity
//!
//! This library lets independently configured workers claim exclusive or
//! shared CPU cores on a NUMA node, without two exclusive claimants ever
//! being granted the same core, and pins each worker's thread to its cores
//! when it starts.

/// Architecture detection and thread affinity
pub mod arch;

/// Core sets, the allocation registry and the core manager
pub mod reservation;

/// Error types
pub mod error;

/// Worker threads bound to core reservations
pub mod worker;

pub use arch::{AffinityOutcome, CpuInfo, NumaNode};
pub use error::{CoreError, Result};
pub use reservation::{Claim, CoreManager, CoreSet};
pub use worker::{Worker, WorkerConfig};
