//! Error types for core reservation and affinity application.

use thiserror::Error;

/// Errors reported by the core manager, its registry and the affinity layer.
///
/// Every error is returned to the immediate caller. Nothing is retried inside
/// the crate: deciding whether a missing reservation is fatal belongs to the
/// worker that asked for it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The claimant already holds a live claim
    #[error("claimant '{0}' already holds a core reservation")]
    DuplicateClaimant(String),

    /// The claimant id was empty
    #[error("claimant id must not be empty")]
    EmptyClaimant,

    /// Not enough unheld cores on the requested node
    #[error("NUMA node {node}: requested {requested} cores but only {available} are available")]
    InsufficientCores {
        /// Node the request targeted
        node: usize,
        /// Number of cores asked for
        requested: usize,
        /// Number of cores that could have been granted
        available: usize,
    },

    /// The node id does not exist on this host
    #[error("unknown NUMA node {0}")]
    UnknownNumaNode(usize),

    /// No claim is recorded for this claimant
    #[error("no core reservation for claimant '{0}'")]
    NoSuchClaimant(String),

    /// An affinity mask must name at least one core
    #[error("cannot apply an empty core set as thread affinity")]
    EmptyCoreSet,

    /// The core id cannot be represented in the OS affinity mask
    #[error("core {0} is out of range for the OS affinity mask")]
    InvalidCore(usize),

    /// The OS rejected the affinity call
    #[cfg(target_os = "linux")]
    #[error("affinity system call failed: {0}")]
    Affinity(#[from] nix::Error),

    /// Pinning to this core set is not supported on this platform
    #[error("thread affinity for core set {0} is not supported on this platform")]
    AffinityUnsupported(String),

    /// `start` was called on a worker whose thread is still running
    #[error("worker '{0}' is already running")]
    WorkerAlreadyRunning(String),

    /// The worker thread could not be spawned
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CoreError>;
