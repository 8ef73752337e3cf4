//! CPU information and topology detection
//!
//! This module handles detecting the logical cores and NUMA nodes that core
//! reservations are drawn from.

use std::fmt;

use crate::arch::affinity;
use crate::reservation::CoreSet;

/// Information about a NUMA node including its ID and associated CPU cores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumaNode {
    /// NUMA node ID
    pub id: usize,
    /// Logical CPU cores in this NUMA node, tagged with `id`
    pub cores: CoreSet,
}

impl NumaNode {
    /// Create a new NUMA node with the given ID and core list
    pub fn new<I: IntoIterator<Item = usize>>(id: usize, cores: I) -> Self {
        Self {
            id,
            cores: CoreSet::from_cores(cores).with_node(id),
        }
    }

    /// Get the number of cores in this NUMA node
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }
}

/// CPU topology information including logical cores and NUMA nodes
#[derive(Clone)]
pub struct CpuInfo {
    /// Total number of logical CPU cores
    logical_cores: usize,
    /// Total number of physical CPU cores (if available)
    physical_cores: Option<usize>,
    /// NUMA nodes detected on the system, sorted by id
    numa_nodes: Vec<NumaNode>,
    /// More than one NUMA node is present
    numa_available: bool,
}

impl fmt::Debug for CpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuInfo")
            .field("logical_cores", &self.logical_cores)
            .field("physical_cores", &self.physical_cores)
            .field("numa_nodes", &self.numa_nodes.len())
            .field("numa_available", &self.numa_available)
            .finish()
    }
}

impl CpuInfo {
    /// Detect CPU topology on the current system
    pub fn detect() -> Self {
        let logical_cores = num_cpus::get();

        // Physical count is not available on every platform
        let physical_cores = match num_cpus::get_physical() {
            count if count > 0 => Some(count),
            _ => None,
        };

        let numa_nodes = Self::detect_numa_nodes(logical_cores);
        let numa_available = numa_nodes.len() > 1;

        tracing::debug!(
            logical_cores,
            nodes = numa_nodes.len(),
            numa_available,
            "detected CPU topology"
        );

        Self {
            logical_cores,
            physical_cores,
            numa_nodes,
            numa_available,
        }
    }

    /// Build a topology from an explicit node layout.
    ///
    /// Nodes are sorted by id. The logical core count is the number of
    /// distinct cores across all nodes.
    pub fn from_nodes(mut numa_nodes: Vec<NumaNode>) -> Self {
        numa_nodes.sort_by_key(|node| node.id);

        let all = numa_nodes
            .iter()
            .fold(CoreSet::new(), |acc, node| acc.union(&node.cores));
        let numa_available = numa_nodes.len() > 1;

        Self {
            logical_cores: all.len(),
            physical_cores: None,
            numa_nodes,
            numa_available,
        }
    }

    /// Get the total number of logical CPU cores
    pub fn logical_cores(&self) -> usize {
        self.logical_cores
    }

    /// Get the total number of physical CPU cores (if available)
    pub fn physical_cores(&self) -> Option<usize> {
        self.physical_cores
    }

    /// Get a list of all NUMA nodes
    pub fn numa_nodes(&self) -> &[NumaNode] {
        &self.numa_nodes
    }

    /// Look up a NUMA node by id
    pub fn node(&self, id: usize) -> Option<&NumaNode> {
        self.numa_nodes.iter().find(|node| node.id == id)
    }

    /// Every core on the host, across all nodes
    pub fn all_cores(&self) -> CoreSet {
        self.numa_nodes
            .iter()
            .fold(CoreSet::new(), |acc, node| acc.union(&node.cores))
    }

    /// Check if NUMA topology is available
    pub fn is_numa_available(&self) -> bool {
        self.numa_available
    }

    /// Detect NUMA nodes on the system
    fn detect_numa_nodes(logical_cores: usize) -> Vec<NumaNode> {
        #[cfg(target_os = "linux")]
        {
            match Self::detect_numa_linux() {
                Ok(nodes) if !nodes.is_empty() => return nodes,
                Ok(_) => {}
                Err(err) => tracing::warn!("Failed to read NUMA topology from sysfs: {}", err),
            }
        }

        vec![Self::fallback_node(&affinity::allowed_cores(), logical_cores)]
    }

    /// Single node 0 used when no NUMA layout is available.
    ///
    /// Holds the cores the process may run on, so every id it hands out can
    /// be applied as affinity. `0..logical_cores` is used only when the
    /// allowed set cannot be read.
    fn fallback_node(allowed: &CoreSet, logical_cores: usize) -> NumaNode {
        if allowed.is_empty() {
            NumaNode::new(0, 0..logical_cores)
        } else {
            NumaNode::new(0, allowed.iter())
        }
    }

    // Linux-specific NUMA detection
    #[cfg(target_os = "linux")]
    fn detect_numa_linux() -> Result<Vec<NumaNode>, std::io::Error> {
        use std::fs;
        use std::path::Path;

        let numa_path = Path::new("/sys/devices/system/node");
        if !numa_path.exists() {
            return Ok(vec![]);
        }

        let mut numa_nodes = Vec::new();

        // Read node directories (node0, node1, etc.)
        for entry in fs::read_dir(numa_path)? {
            let path = entry?.path();

            let file_name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let node_id = match file_name
                .strip_prefix("node")
                .and_then(|id| id.parse::<usize>().ok())
            {
                Some(id) => id,
                None => continue,
            };

            let cpulist_path = path.join("cpulist");
            if !cpulist_path.exists() {
                continue;
            }

            let cpulist = fs::read_to_string(cpulist_path)?;
            match cpulist.parse::<CoreSet>() {
                // Memory-only nodes have an empty cpulist
                Ok(cores) if cores.is_empty() => continue,
                Ok(cores) => numa_nodes.push(NumaNode::new(node_id, cores.iter())),
                Err(err) => tracing::warn!("Skipping NUMA node {}: {}", node_id, err),
            }
        }

        numa_nodes.sort_by_key(|node| node.id);
        Ok(numa_nodes)
    }

    /// Create a mock CpuInfo for testing
    #[cfg(test)]
    pub(crate) fn mock(logical_cores: usize, numa_nodes_count: usize) -> Self {
        let mut numa_nodes = Vec::new();

        if numa_nodes_count > 0 {
            // Distribute cores evenly among NUMA nodes
            let cores_per_node = logical_cores / numa_nodes_count;
            let mut remaining_cores = logical_cores % numa_nodes_count;

            let mut core_idx = 0;
            for node_id in 0..numa_nodes_count {
                let extra_core = if remaining_cores > 0 { 1 } else { 0 };
                remaining_cores = remaining_cores.saturating_sub(1);

                let node_core_count = cores_per_node + extra_core;
                numa_nodes.push(NumaNode::new(node_id, core_idx..core_idx + node_core_count));
                core_idx += node_core_count;
            }
        } else {
            numa_nodes.push(NumaNode::new(0, 0..logical_cores));
        }

        Self {
            logical_cores,
            physical_cores: Some(logical_cores / 2),
            numa_nodes,
            numa_available: numa_nodes_count > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_info_detect() {
        let info = CpuInfo::detect();
        println!("Detected CPU info: {:?}", info);

        // At minimum, we should have at least one core
        assert!(info.logical_cores() > 0);

        // Should have at least one NUMA node (even if it's a fallback)
        assert!(!info.numa_nodes().is_empty());
        assert!(!info.all_cores().is_empty());
    }

    #[test]
    fn test_mock_cpu_info() {
        let info = CpuInfo::mock(8, 1);
        assert_eq!(info.logical_cores(), 8);
        assert_eq!(info.numa_nodes().len(), 1);
        assert_eq!(info.numa_nodes()[0].core_count(), 8);

        let info = CpuInfo::mock(8, 2);
        assert_eq!(info.numa_nodes().len(), 2);
        assert_eq!(info.numa_nodes()[0].core_count(), 4);
        assert_eq!(info.numa_nodes()[1].core_count(), 4);
        assert_eq!(info.numa_nodes()[1].cores.to_string(), "4-7");

        // Uneven distribution
        let info = CpuInfo::mock(7, 2);
        assert_eq!(info.numa_nodes()[0].core_count(), 4);
        assert_eq!(info.numa_nodes()[1].core_count(), 3);
    }

    #[test]
    fn test_from_nodes() {
        let info = CpuInfo::from_nodes(vec![
            NumaNode::new(1, [4, 5, 6, 7]),
            NumaNode::new(0, [0, 1, 2, 3]),
        ]);

        assert_eq!(info.logical_cores(), 8);
        assert!(info.is_numa_available());
        assert_eq!(info.numa_nodes()[0].id, 0);
        assert_eq!(info.node(1).map(|n| n.core_count()), Some(4));
        assert!(info.node(2).is_none());
        assert_eq!(info.all_cores().to_string(), "0-7");
    }

    #[test]
    fn test_numa_available_means_multiple_nodes() {
        assert!(!CpuInfo::from_nodes(vec![NumaNode::new(0, 0..4)]).is_numa_available());
        assert!(!CpuInfo::mock(8, 1).is_numa_available());
        assert!(CpuInfo::mock(8, 2).is_numa_available());

        let detected = CpuInfo::detect();
        assert_eq!(detected.is_numa_available(), detected.numa_nodes().len() > 1);
    }

    #[test]
    fn test_fallback_node_uses_allowed_cores() {
        // A process restricted to core 5 must not be offered core 0
        let node = CpuInfo::fallback_node(&CoreSet::from_cores([5]), 1);
        assert_eq!(node.id, 0);
        assert_eq!(node.cores.to_string(), "5");
        assert_eq!(node.cores.node(), Some(0));

        let node = CpuInfo::fallback_node(&CoreSet::from_cores([2, 3, 7]), 3);
        assert_eq!(node.cores.to_string(), "2-3,7");
    }

    #[test]
    fn test_fallback_node_without_allowed_set() {
        let node = CpuInfo::fallback_node(&CoreSet::new(), 4);
        assert_eq!(node.cores.to_string(), "0-3");
    }

    #[test]
    fn test_fallback_node_cores_are_allowed() {
        let allowed = affinity::allowed_cores();
        if allowed.is_empty() {
            return;
        }
        let node = CpuInfo::fallback_node(&allowed, num_cpus::get());
        assert!(node.cores.same_cores(&allowed));
    }

    #[test]
    fn test_node_cores_are_tagged() {
        let node = NumaNode::new(3, [12, 13]);
        assert_eq!(node.cores.node(), Some(3));
    }
}
