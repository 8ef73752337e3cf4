//! CPU burner example for Coreclaim.
//!
//! Starts a handful of workers that do nothing but waste CPU time and memory
//! bandwidth, each optionally pinned to cores reserved through the shared
//! core manager. Useful for watching how concurrent modules behave when they
//! do or do not get dedicated cores.

use coreclaim_core::{CoreManager, Worker, WorkerConfig};
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Settings for one burner module
#[derive(Debug, Clone)]
struct BurnerConfig {
    name: String,
    /// How long to spin before each sleep
    burn_time_us: u64,
    /// How long to sleep between bursts
    sleep_time_us: u64,
    /// Number of floats summed per pass
    mem_size: usize,
    cores: WorkerConfig,
}

fn burn(config: BurnerConfig) -> impl FnOnce(&AtomicBool) + Send + 'static {
    move |running: &AtomicBool| {
        let interval = Duration::from_micros(config.burn_time_us);
        let mem = vec![1.0f32; config.mem_size];
        let mut passes: u64 = 0;

        while running.load(Ordering::Acquire) {
            let start = Instant::now();
            loop {
                black_box(mem.iter().sum::<f32>());
                passes += 1;
                if start.elapsed() >= interval {
                    break;
                }
            }
            // Sleep a bit so we don't use ALL the CPU unless asked to
            thread::sleep(Duration::from_micros(config.sleep_time_us));
        }

        tracing::info!("{}: {} passes over {} floats", config.name, passes, config.mem_size);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_thread_names(true)
        .init();

    let manager = CoreManager::shared();
    let cpu_info = manager.cpu_info();
    println!(
        "Host: {} logical cores, {} NUMA nodes",
        cpu_info.logical_cores(),
        cpu_info.numa_nodes().len()
    );

    // Reserve one core per pinned burner, keep at least one core unreserved
    let node0_cores = cpu_info.node(0).map_or(0, |node| node.core_count());
    let pinned = node0_cores.saturating_sub(1).min(2);

    let mut configs: Vec<BurnerConfig> = (0..pinned)
        .map(|i| BurnerConfig {
            name: format!("burner-pinned-{}", i),
            burn_time_us: 800,
            sleep_time_us: 200,
            mem_size: 64 * 1024,
            cores: WorkerConfig {
                reserved_core_count: 1,
                numa_node: 0,
                exclusive: true,
            },
        })
        .collect();
    configs.push(BurnerConfig {
        name: "burner-free".to_string(),
        burn_time_us: 500,
        sleep_time_us: 500,
        mem_size: 16 * 1024,
        cores: WorkerConfig::default(),
    });

    let mut workers = Vec::new();
    for config in configs {
        let mut worker = Worker::new(config.name.clone(), manager.clone());
        worker.configure(&config.cores)?;
        let outcome = worker.start(burn(config))?;
        println!("{}: {:?}", worker.name(), outcome);
        workers.push(worker);
    }

    thread::sleep(Duration::from_secs(2));

    for worker in &mut workers {
        worker.stop();
        worker.release();
    }
    manager.dump();

    println!("\nCPU burner example completed successfully!");
    Ok(())
}
