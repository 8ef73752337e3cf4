use coreclaim_core::arch;
use coreclaim_core::arch::affinity;

fn main() {
    // Detect CPU topology
    let cpu_info = arch::detect_cpu_topology();
    println!("Detected {} logical cores", cpu_info.logical_cores());

    if let Some(physical) = cpu_info.physical_cores() {
        println!("Detected {} physical cores", physical);
    } else {
        println!("Physical core count not available");
    }

    println!("Detected {} NUMA nodes", cpu_info.numa_nodes().len());
    println!("NUMA available: {}", cpu_info.is_numa_available());

    for node in cpu_info.numa_nodes() {
        println!(
            "NUMA Node {}: {} cores ({})",
            node.id,
            node.core_count(),
            node.cores
        );
    }

    println!("\nCores this process may run on: {}", affinity::allowed_cores());
    match affinity::current_thread_affinity() {
        Ok(mask) => println!("Main thread affinity: {}", mask),
        Err(e) => println!("Main thread affinity unavailable: {}", e),
    }
}
