//! Worker threads that run on reserved cores
//!
//! A `Worker` is a named, long-running task. At configuration time it asks
//! the `CoreManager` to reserve cores under its name; at start time its
//! thread applies that reservation before running any work, so the mask
//! holds for the whole run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::arch::AffinityOutcome;
use crate::error::{CoreError, Result};
use crate::reservation::{CoreManager, CoreSet};

/// Resource needs of a single worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Cores to reserve; zero means run unconstrained
    pub reserved_core_count: usize,
    /// NUMA node to draw cores from
    pub numa_node: usize,
    /// Whether the cores must not be shared with other claimants
    pub exclusive: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            reserved_core_count: 0,
            numa_node: 0,
            exclusive: true,
        }
    }
}

/// A named worker thread bound to a core reservation
pub struct Worker {
    /// Claimant id used with the core manager; also the thread name
    name: String,
    manager: Arc<CoreManager>,
    /// Cleared by `stop` to ask the run loop to exit
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Create a stopped worker
    pub fn new(name: impl Into<String>, manager: Arc<CoreManager>) -> Self {
        Self {
            name: name.into(),
            manager,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// The worker's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reserve cores for this worker.
    ///
    /// Does nothing and returns `None` when no cores are requested.
    pub fn configure(&self, config: &WorkerConfig) -> Result<Option<CoreSet>> {
        if config.reserved_core_count == 0 {
            return Ok(None);
        }

        tracing::info!(
            "worker {}: reserving {} cores on node {}",
            self.name,
            config.reserved_core_count,
            config.numa_node
        );
        self.manager
            .allocate(
                &self.name,
                config.numa_node,
                config.reserved_core_count,
                config.exclusive,
            )
            .map(Some)
    }

    /// Cores currently reserved for this worker, if any
    pub fn reserved_cores(&self) -> Option<CoreSet> {
        self.manager.claim(&self.name).ok().map(|claim| claim.cores)
    }

    /// Give the worker's cores back to the manager
    pub fn release(&self) {
        self.manager.release(&self.name);
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Spawn the worker thread.
    ///
    /// The thread applies the reservation first and only then calls `work`
    /// with the running flag; `work` should return once the flag is cleared.
    /// If the affinity cannot be applied, `work` never runs and the error is
    /// returned here.
    pub fn start<F>(&mut self, work: F) -> Result<AffinityOutcome>
    where
        F: FnOnce(&AtomicBool) + Send + 'static,
    {
        // Work that returned on its own leaves a finished handle behind
        if self.handle.as_ref().map_or(false, |h| h.is_finished()) {
            self.stop();
        }
        if self.handle.is_some() {
            return Err(CoreError::WorkerAlreadyRunning(self.name.clone()));
        }

        self.running.store(true, Ordering::Release);

        let (tx, rx) = mpsc::channel();
        let name = self.name.clone();
        let manager = self.manager.clone();
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let outcome = match manager.set_affinity(&name) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        return;
                    }
                };

                manager.dump();
                tracing::info!("{}: {}", name, manager.affinity_description(&name));
                let _ = tx.send(Ok(outcome));

                work(&running);
            })
            .map_err(CoreError::WorkerSpawn)?;

        let started = rx.recv().unwrap_or_else(|_| {
            Err(CoreError::WorkerSpawn(std::io::Error::new(
                std::io::ErrorKind::Other,
                "worker thread exited before applying affinity",
            )))
        });

        match started {
            Ok(outcome) => {
                self.handle = Some(handle);
                tracing::info!("{} successfully started", self.name);
                Ok(outcome)
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                tracing::warn!("{} failed to start: {}", self.name, err);
                Err(err)
            }
        }
    }

    /// Ask the run loop to exit and wait for the thread. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("worker {} panicked", self.name);
            } else {
                tracing::info!("{} successfully stopped", self.name);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
