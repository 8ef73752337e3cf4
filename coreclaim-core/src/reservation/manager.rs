//! Process-wide core reservation coordinator
//!
//! `CoreManager` hands out core sets to named claimants and pins their
//! threads at start time. One instance is meant to exist per process: build
//! it once with the detected topology and pass an `Arc` to every worker, or
//! use `CoreManager::shared()`.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::arch::{affinity, AffinityOutcome, CpuInfo};
use crate::error::{CoreError, Result};
use crate::reservation::{AllocationRegistry, Claim, CoreSet};

static SHARED: OnceLock<Arc<CoreManager>> = OnceLock::new();

/// Hands out exclusive or shared core reservations and applies them as thread affinity
#[derive(Debug)]
pub struct CoreManager {
    /// Topology detected (or supplied) at construction; never refreshed
    cpu_info: CpuInfo,
    /// All claims, behind one lock so reservation stays atomic across claimants
    registry: Mutex<AllocationRegistry>,
}

impl CoreManager {
    /// Create a manager over the given topology
    pub fn new(cpu_info: CpuInfo) -> Self {
        Self {
            cpu_info,
            registry: Mutex::new(AllocationRegistry::new()),
        }
    }

    /// Create a manager over the host's detected topology
    pub fn detect() -> Self {
        Self::new(CpuInfo::detect())
    }

    /// The process-wide manager, detected on first use
    pub fn shared() -> Arc<CoreManager> {
        SHARED.get_or_init(|| Arc::new(Self::detect())).clone()
    }

    /// Topology this manager allocates from
    pub fn cpu_info(&self) -> &CpuInfo {
        &self.cpu_info
    }

    // Every mutation of the registry is a single insert or remove, so a
    // panic elsewhere while the lock was held cannot leave it half-updated.
    fn registry(&self) -> MutexGuard<'_, AllocationRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `count` cores on NUMA node `node` for `claimant`.
    ///
    /// The lowest-numbered grantable cores are chosen. A `count` of zero
    /// grants an empty set and records nothing. The calling thread's
    /// affinity is not touched; see [`CoreManager::set_affinity`].
    pub fn allocate(
        &self,
        claimant: &str,
        node: usize,
        count: usize,
        exclusive: bool,
    ) -> Result<CoreSet> {
        if claimant.is_empty() {
            return Err(CoreError::EmptyClaimant);
        }
        let numa_node = self
            .cpu_info
            .node(node)
            .ok_or(CoreError::UnknownNumaNode(node))?;

        let mut registry = self.registry();
        if registry.contains(claimant) {
            tracing::warn!("claimant {} already holds a reservation", claimant);
            return Err(CoreError::DuplicateClaimant(claimant.to_string()));
        }

        if count == 0 {
            return Ok(CoreSet::new().with_node(node));
        }

        let cores = match registry.try_reserve(numa_node, count, exclusive) {
            Some(cores) => cores,
            None => {
                let available = registry.available(numa_node, exclusive).len();
                tracing::warn!(
                    "refused {} cores on node {} for {}: {} available",
                    count,
                    node,
                    claimant,
                    available
                );
                return Err(CoreError::InsufficientCores {
                    node,
                    requested: count,
                    available,
                });
            }
        };

        registry.insert(Claim::new(claimant, cores.clone(), exclusive))?;
        tracing::debug!(claimant, node, exclusive, "granted cores {}", cores);
        Ok(cores)
    }

    /// Reserve `count` exclusive cores on `node`
    pub fn allocate_exclusive(&self, claimant: &str, node: usize, count: usize) -> Result<CoreSet> {
        self.allocate(claimant, node, count, true)
    }

    /// Drop `claimant`'s reservation. Unknown claimants are ignored.
    pub fn release(&self, claimant: &str) {
        if let Some(claim) = self.registry().remove(claimant) {
            tracing::debug!(claimant, "released cores {}", claim.cores);
        }
    }

    /// The live claim held by `claimant`
    pub fn claim(&self, claimant: &str) -> Result<Claim> {
        self.registry()
            .get(claimant)
            .cloned()
            .ok_or_else(|| CoreError::NoSuchClaimant(claimant.to_string()))
    }

    /// Restrict the calling thread to `claimant`'s reserved cores.
    ///
    /// Claimants without a reservation run on the default mask; for them
    /// this is a no-op returning [`AffinityOutcome::Unconstrained`].
    pub fn set_affinity(&self, claimant: &str) -> Result<AffinityOutcome> {
        match self.set_affinity_strict(claimant) {
            Err(CoreError::NoSuchClaimant(_)) => {
                tracing::debug!(claimant, "no reservation, leaving affinity unconstrained");
                Ok(AffinityOutcome::Unconstrained)
            }
            other => other,
        }
    }

    /// Like [`CoreManager::set_affinity`], but a missing reservation is an error
    pub fn set_affinity_strict(&self, claimant: &str) -> Result<AffinityOutcome> {
        let cores = self.claim(claimant)?.cores;
        affinity::apply_to_current_thread(&cores)?;
        Ok(AffinityOutcome::Pinned(cores))
    }

    /// Human-readable rendering of `claimant`'s reservation
    pub fn affinity_description(&self, claimant: &str) -> String {
        match self.registry().get(claimant) {
            Some(claim) => claim.describe(),
            None => "unconstrained".to_string(),
        }
    }

    /// The registry state as text lines, header first
    pub fn dump_lines(&self) -> Vec<String> {
        let registry = self.registry();
        let mut lines = Vec::with_capacity(registry.len() + 1);
        lines.push(format!(
            "core reservations: {} claims, exclusively held [{}]",
            registry.len(),
            registry.exclusively_held()
        ));
        lines.extend(registry.claims().map(|claim| format!("  {}", claim)));
        lines
    }

    /// Log the registry state, one line per claim
    pub fn dump(&self) {
        for line in self.dump_lines() {
            tracing::info!("{}", line);
        }
    }
}
