//! Claimant to reservation table
//!
//! The registry records which claimant holds which cores and computes what
//! is still free on a node. It does no locking of its own; `CoreManager`
//! owns it behind a single mutex so that reserving and inserting happen as
//! one step.

use std::collections::BTreeMap;
use std::fmt;

use crate::arch::NumaNode;
use crate::error::{CoreError, Result};
use crate::reservation::CoreSet;

/// A reservation held by one claimant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Caller-supplied owner id, unique among live claims
    pub claimant: String,
    /// Cores granted to the claimant
    pub cores: CoreSet,
    /// Whether no other claimant may be granted these cores
    pub exclusive: bool,
}

impl Claim {
    /// Create a new claim
    pub fn new(claimant: impl Into<String>, cores: CoreSet, exclusive: bool) -> Self {
        Self {
            claimant: claimant.into(),
            cores,
            exclusive,
        }
    }

    /// The granted cores, their node and exclusivity, e.g. `cores 2-3 (node 0, exclusive)`
    pub fn describe(&self) -> String {
        let kind = if self.exclusive { "exclusive" } else { "shared" };
        match self.cores.node() {
            Some(node) => format!("cores {} (node {}, {})", self.cores, node, kind),
            None => format!("cores {} ({})", self.cores, kind),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.claimant, self.describe())
    }
}

/// Table of live claims
#[derive(Debug, Default)]
pub struct AllocationRegistry {
    /// Claims keyed by claimant; ordered for deterministic dumps
    claims: BTreeMap<String, Claim>,
    /// Union of all exclusive claims' cores
    exclusive_held: CoreSet,
}

impl AllocationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live claims
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether no claim is live
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Look up a claimant's claim
    pub fn get(&self, claimant: &str) -> Option<&Claim> {
        self.claims.get(claimant)
    }

    /// Whether the claimant holds a claim
    pub fn contains(&self, claimant: &str) -> bool {
        self.claims.contains_key(claimant)
    }

    /// All live claims, ordered by claimant
    pub fn claims(&self) -> impl Iterator<Item = &Claim> + '_ {
        self.claims.values()
    }

    /// Cores held by exclusive claims
    pub fn exclusively_held(&self) -> &CoreSet {
        &self.exclusive_held
    }

    /// Cores held by any claim, exclusive or shared
    pub fn held(&self) -> CoreSet {
        self.claims
            .values()
            .fold(CoreSet::new(), |acc, claim| acc.union(&claim.cores))
    }

    /// Cores on `node` a new request could be granted.
    ///
    /// Shared requests only avoid exclusively held cores. Exclusive requests
    /// must also avoid cores any shared claim is using.
    pub fn available(&self, node: &NumaNode, exclusive: bool) -> CoreSet {
        if exclusive {
            node.cores.difference(&self.held())
        } else {
            node.cores.difference(&self.exclusive_held)
        }
    }

    /// Pick the `count` lowest-numbered grantable cores on `node`.
    ///
    /// Returns `None` when fewer than `count` are grantable. Does not record
    /// anything; pair with `insert` under the same lock.
    pub fn try_reserve(&self, node: &NumaNode, count: usize, exclusive: bool) -> Option<CoreSet> {
        self.available(node, exclusive).first_n(count)
    }

    /// Record a claim. Fails if the claimant already holds one.
    pub fn insert(&mut self, claim: Claim) -> Result<()> {
        if self.claims.contains_key(&claim.claimant) {
            return Err(CoreError::DuplicateClaimant(claim.claimant));
        }

        if claim.exclusive {
            debug_assert!(
                claim.cores.is_disjoint(&self.held()),
                "exclusive claim overlaps held cores"
            );
            self.exclusive_held = self.exclusive_held.union(&claim.cores);
        } else {
            debug_assert!(
                claim.cores.is_disjoint(&self.exclusive_held),
                "shared claim overlaps exclusive cores"
            );
        }

        self.claims.insert(claim.claimant.clone(), claim);
        Ok(())
    }

    /// Drop a claimant's claim, returning it if one existed
    pub fn remove(&mut self, claimant: &str) -> Option<Claim> {
        let claim = self.claims.remove(claimant)?;
        if claim.exclusive {
            // Exclusive claims are disjoint, so this frees exactly their cores
            self.exclusive_held = self.exclusive_held.difference(&claim.cores);
        }
        Some(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node0() -> NumaNode {
        NumaNode::new(0, 0..8)
    }

    fn reserve_and_insert(
        registry: &mut AllocationRegistry,
        claimant: &str,
        count: usize,
        exclusive: bool,
    ) -> Option<CoreSet> {
        let cores = registry.try_reserve(&node0(), count, exclusive)?;
        registry
            .insert(Claim::new(claimant, cores.clone(), exclusive))
            .unwrap();
        Some(cores)
    }

    #[test]
    fn test_lowest_cores_first() {
        let mut registry = AllocationRegistry::new();

        let a = reserve_and_insert(&mut registry, "a", 2, true).unwrap();
        let b = reserve_and_insert(&mut registry, "b", 3, true).unwrap();

        assert_eq!(a.to_string(), "0-1");
        assert_eq!(b.to_string(), "2-4");
        assert_eq!(a.node(), Some(0));
        assert_eq!(registry.exclusively_held().to_string(), "0-4");
    }

    #[test]
    fn test_insufficient_returns_none() {
        let mut registry = AllocationRegistry::new();
        reserve_and_insert(&mut registry, "a", 6, true).unwrap();

        assert!(registry.try_reserve(&node0(), 3, true).is_none());
        assert_eq!(registry.try_reserve(&node0(), 2, true).unwrap().to_string(), "6-7");
    }

    #[test]
    fn test_shared_claims_overlap() {
        let mut registry = AllocationRegistry::new();

        let a = reserve_and_insert(&mut registry, "a", 4, false).unwrap();
        let b = reserve_and_insert(&mut registry, "b", 4, false).unwrap();

        assert_eq!(a, b);
        assert!(registry.exclusively_held().is_empty());
        assert_eq!(registry.held().to_string(), "0-3");
    }

    #[test]
    fn test_exclusive_avoids_shared_cores() {
        let mut registry = AllocationRegistry::new();
        reserve_and_insert(&mut registry, "shared", 2, false).unwrap();

        let excl = reserve_and_insert(&mut registry, "excl", 2, true).unwrap();
        assert_eq!(excl.to_string(), "2-3");

        // A later shared request may not land on the exclusive cores
        let shared = registry.try_reserve(&node0(), 4, false).unwrap();
        assert_eq!(shared.to_string(), "0-1,4-5");
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let mut registry = AllocationRegistry::new();
        reserve_and_insert(&mut registry, "a", 1, true).unwrap();

        let err = registry
            .insert(Claim::new("a", CoreSet::from_cores([5]), true))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateClaimant(ref name) if name == "a"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.exclusively_held().to_string(), "0");
    }

    #[test]
    fn test_remove_frees_cores() {
        let mut registry = AllocationRegistry::new();
        reserve_and_insert(&mut registry, "a", 8, true).unwrap();
        assert!(registry.try_reserve(&node0(), 1, true).is_none());

        let removed = registry.remove("a").unwrap();
        assert_eq!(removed.cores.len(), 8);
        assert!(registry.is_empty());
        assert!(registry.exclusively_held().is_empty());
        assert!(registry.remove("a").is_none());

        assert_eq!(registry.try_reserve(&node0(), 8, true).unwrap().len(), 8);
    }

    #[test]
    fn test_claims_are_ordered() {
        let mut registry = AllocationRegistry::new();
        reserve_and_insert(&mut registry, "zeta", 1, true).unwrap();
        reserve_and_insert(&mut registry, "alpha", 1, false).unwrap();

        let names: Vec<_> = registry.claims().map(|c| c.claimant.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_claim_display() {
        let claim = Claim::new("burner", CoreSet::from_cores([2, 3]).with_node(0), true);
        assert_eq!(claim.to_string(), "burner: cores 2-3 (node 0, exclusive)");

        let claim = Claim::new("shared", CoreSet::from_cores([4]).with_node(1), false);
        assert_eq!(claim.to_string(), "shared: cores 4 (node 1, shared)");
    }

    #[test]
    fn test_claim_describe() {
        let tagged = Claim::new("a", CoreSet::from_cores([0, 1]).with_node(2), true);
        assert_eq!(tagged.describe(), "cores 0-1 (node 2, exclusive)");
        assert!(tagged.to_string().ends_with(&tagged.describe()));

        let untagged = Claim::new("b", CoreSet::from_cores([5]), false);
        assert_eq!(untagged.describe(), "cores 5 (shared)");
    }
}
