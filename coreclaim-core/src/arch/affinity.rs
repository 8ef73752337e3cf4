//! Applying core sets to the calling thread's scheduling mask
//!
//! On Linux the whole set is applied at once with `sched_setaffinity`.
//! Elsewhere only single-core sets can be honoured, through `core_affinity`.

use crate::error::{CoreError, Result};
use crate::reservation::CoreSet;

/// What `set_affinity` did to the calling thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffinityOutcome {
    /// The thread now runs only on these cores
    Pinned(CoreSet),
    /// No reservation exists; the default mask was left alone
    Unconstrained,
}

impl AffinityOutcome {
    /// Whether the thread's mask was changed
    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned(_))
    }
}

/// Restrict the calling thread to exactly the cores in `cores`
#[cfg(target_os = "linux")]
pub fn apply_to_current_thread(cores: &CoreSet) -> Result<()> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    if cores.is_empty() {
        return Err(CoreError::EmptyCoreSet);
    }

    let mut cpu_set = CpuSet::new();
    for core in cores.iter() {
        cpu_set.set(core).map_err(|_| CoreError::InvalidCore(core))?;
    }

    // Pid 0 is the calling thread
    sched_setaffinity(Pid::from_raw(0), &cpu_set)?;
    tracing::debug!("pinned current thread to cores {}", cores);
    Ok(())
}

/// Restrict the calling thread to exactly the cores in `cores`
#[cfg(not(target_os = "linux"))]
pub fn apply_to_current_thread(cores: &CoreSet) -> Result<()> {
    if cores.is_empty() {
        return Err(CoreError::EmptyCoreSet);
    }

    let mut members = cores.iter();
    let core = match (members.next(), members.next()) {
        (Some(core), None) => core,
        _ => return Err(CoreError::AffinityUnsupported(cores.to_string())),
    };

    if core_affinity::set_for_current(core_affinity::CoreId { id: core }) {
        tracing::debug!("pinned current thread to core {}", core);
        Ok(())
    } else {
        Err(CoreError::AffinityUnsupported(cores.to_string()))
    }
}

/// Read back the effective affinity mask of the calling thread
#[cfg(target_os = "linux")]
pub fn current_thread_affinity() -> Result<CoreSet> {
    use nix::sched::{sched_getaffinity, CpuSet};
    use nix::unistd::Pid;

    let cpu_set = sched_getaffinity(Pid::from_raw(0))?;
    let mut cores = CoreSet::new();
    for core in 0..CpuSet::count() {
        if cpu_set.is_set(core)? {
            cores.insert(core);
        }
    }
    Ok(cores)
}

/// Read back the effective affinity mask of the calling thread
#[cfg(not(target_os = "linux"))]
pub fn current_thread_affinity() -> Result<CoreSet> {
    Err(CoreError::AffinityUnsupported("current thread".to_string()))
}

/// Cores the OS currently lets this process schedule on
pub fn allowed_cores() -> CoreSet {
    core_affinity::get_core_ids()
        .map(|ids| ids.into_iter().map(|id| id.id).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_set_is_rejected() {
        let result = apply_to_current_thread(&CoreSet::new());
        assert!(matches!(result, Err(CoreError::EmptyCoreSet)));
    }

    #[test]
    fn test_outcome_is_pinned() {
        assert!(AffinityOutcome::Pinned(CoreSet::from_cores([0])).is_pinned());
        assert!(!AffinityOutcome::Unconstrained.is_pinned());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pin_and_read_back() {
        let allowed = allowed_cores();
        let target = match allowed.first_n(1) {
            Some(first) => first,
            None => return,
        };

        // Run in a dedicated thread so the test harness thread keeps its mask
        let observed = thread::spawn(move || {
            apply_to_current_thread(&target).unwrap();
            (target.clone(), current_thread_affinity().unwrap())
        })
        .join()
        .unwrap();

        assert!(observed.0.same_cores(&observed.1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_out_of_range_core() {
        let huge = nix::sched::CpuSet::count() + 1;
        let result = thread::spawn(move || apply_to_current_thread(&CoreSet::from_cores([huge])))
            .join()
            .unwrap();
        assert!(matches!(result, Err(CoreError::InvalidCore(core)) if core == huge));
    }
}
