//! Sets of logical CPU cores
//!
//! A `CoreSet` is the unit of reservation: the cores a claimant was granted,
//! optionally tagged with the NUMA node they were drawn from.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a cpulist string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cpulist segment '{segment}'")]
pub struct CoreSetParseError {
    /// The offending comma-separated segment
    pub segment: String,
}

/// An ordered, duplicate-free set of logical core ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CoreSet {
    /// Core ids, kept sorted by the BTreeSet
    cores: BTreeSet<usize>,
    /// NUMA node the cores were drawn from, if known
    node: Option<usize>,
}

impl CoreSet {
    /// Create an empty core set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a core set from any collection of core ids. Duplicates collapse.
    pub fn from_cores<I: IntoIterator<Item = usize>>(cores: I) -> Self {
        Self {
            cores: cores.into_iter().collect(),
            node: None,
        }
    }

    /// Tag this set with the NUMA node it belongs to
    pub fn with_node(mut self, node: usize) -> Self {
        self.node = Some(node);
        self
    }

    /// NUMA node tag, if any
    pub fn node(&self) -> Option<usize> {
        self.node
    }

    /// Number of cores in the set
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    /// Whether the set holds no cores
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// Whether `core` is a member
    pub fn contains(&self, core: usize) -> bool {
        self.cores.contains(&core)
    }

    /// Add a core; returns false if it was already present
    pub fn insert(&mut self, core: usize) -> bool {
        self.cores.insert(core)
    }

    /// Iterate over members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.cores.iter().copied()
    }

    /// Cores in either set. The node tag is kept only when both sides agree.
    pub fn union(&self, other: &CoreSet) -> CoreSet {
        CoreSet {
            cores: self.cores.union(&other.cores).copied().collect(),
            node: self.common_node(other),
        }
    }

    /// Cores in `self` that are not in `other`. Keeps `self`'s node tag.
    pub fn difference(&self, other: &CoreSet) -> CoreSet {
        CoreSet {
            cores: self.cores.difference(&other.cores).copied().collect(),
            node: self.node,
        }
    }

    /// Cores present in both sets. Keeps `self`'s node tag.
    pub fn intersection(&self, other: &CoreSet) -> CoreSet {
        CoreSet {
            cores: self.cores.intersection(&other.cores).copied().collect(),
            node: self.node,
        }
    }

    /// True when the two sets share no core
    pub fn is_disjoint(&self, other: &CoreSet) -> bool {
        self.cores.is_disjoint(&other.cores)
    }

    /// True when both sets hold the same cores, ignoring node tags
    pub fn same_cores(&self, other: &CoreSet) -> bool {
        self.cores == other.cores
    }

    /// The `n` lowest-numbered members, or `None` if the set is smaller than `n`
    pub fn first_n(&self, n: usize) -> Option<CoreSet> {
        if self.cores.len() < n {
            return None;
        }
        Some(CoreSet {
            cores: self.cores.iter().take(n).copied().collect(),
            node: self.node,
        })
    }

    fn common_node(&self, other: &CoreSet) -> Option<usize> {
        match (self.node, other.node) {
            (Some(a), Some(b)) if a == b => Some(a),
            _ => None,
        }
    }
}

impl FromIterator<usize> for CoreSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::from_cores(iter)
    }
}

impl Extend<usize> for CoreSet {
    fn extend<I: IntoIterator<Item = usize>>(&mut self, iter: I) {
        self.cores.extend(iter);
    }
}

/// Renders the Linux cpulist format, e.g. `0-2,4,6-7`
impl fmt::Display for CoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.cores.iter().copied().peekable();
        let mut first = true;

        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }

            if !first {
                f.write_str(",")?;
            }
            first = false;

            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
        }

        Ok(())
    }
}

/// Parses the Linux cpulist format, e.g. `0-2,4,6-8`. Blank input is the empty set.
impl FromStr for CoreSet {
    type Err = CoreSetParseError;

    fn from_str(cpulist: &str) -> Result<Self, Self::Err> {
        let mut set = CoreSet::new();
        let invalid = |part: &str| CoreSetParseError {
            segment: part.to_string(),
        };

        for part in cpulist.trim().split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            match part.split_once('-') {
                Some((start, end)) => {
                    let start = start.trim().parse::<usize>().map_err(|_| invalid(part))?;
                    let end = end.trim().parse::<usize>().map_err(|_| invalid(part))?;
                    if start > end {
                        return Err(invalid(part));
                    }
                    set.extend(start..=end);
                }
                None => {
                    let core = part.parse::<usize>().map_err(|_| invalid(part))?;
                    set.insert(core);
                }
            }
        }

        Ok(set)
    }
}
