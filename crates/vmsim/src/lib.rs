//! Concurrent workload driver for the virtual memory manager.
//!
//! Simulated processes are dispatched through a [`ProcessQueue`] and then run in parallel
//! against one shared [`MemoryManager`]. Each process allocates regions, writes a byte pattern
//! through every page, reads it back and frees every other region.

pub mod console;

use std::fmt;

use rayon::prelude::*;
use vmm::{
    FreeError, MemoryManager, Process, ProcessId, ProcessQueue, QueueFull, TranslateError,
    VirtualAddress, layout,
};

/// Shape of the workload each process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Number of simulated processes.
    pub processes: u32,
    /// Allocation attempts per process.
    pub allocations: usize,
    /// Size in bytes of every allocation.
    pub size: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            processes: 4,
            allocations: 8,
            size: 3000,
        }
    }
}

/// Per-process results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub pid: u32,
    pub priority: u32,
    /// Allocations that succeeded.
    pub allocated: usize,
    /// Allocations that were refused.
    pub failed: usize,
    /// Bytes written and read back successfully.
    pub bytes_verified: usize,
    /// Pages released by frees during the run.
    pub pages_freed: usize,
}

/// Errors that abort a process's workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadError {
    /// A byte read back differs from the byte written.
    Mismatch {
        pid: u32,
        address: VirtualAddress,
        expected: u8,
        found: u8,
    },
    /// An address returned by the allocator did not translate.
    Access { pid: u32, source: TranslateError },
    /// A region returned by the allocator could not be freed.
    Free { pid: u32, source: FreeError },
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                pid,
                address,
                expected,
                found,
            } => write!(
                f,
                "pid {pid}: read {found:#04x} at {address}, expected {expected:#04x}"
            ),
            Self::Access { pid, source } => write!(f, "pid {pid}: access failed: {source}"),
            Self::Free { pid, source } => write!(f, "pid {pid}: free failed: {source}"),
        }
    }
}

impl std::error::Error for WorkloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mismatch { .. } => None,
            Self::Access { source, .. } => Some(source),
            Self::Free { source, .. } => Some(source),
        }
    }
}

/// Processes after a run, with their remaining regions still mapped.
pub struct Simulation {
    pub processes: Vec<Process>,
    pub reports: Vec<ProcessReport>,
}

/// Creates `count` processes with ids starting at 1.
pub fn spawn_processes(count: u32) -> Vec<Process> {
    (1..=count)
        .filter_map(ProcessId::new)
        .map(|pid| Process::new(pid, (pid.get() * 7) % 10))
        .collect()
}

/// Orders processes the way the scheduler would pick them.
///
/// Processes pass through a [`ProcessQueue`] in batches of at most its capacity; within a batch
/// they leave by priority.
pub fn dispatch_order(processes: Vec<Process>) -> Vec<Process> {
    let mut order = Vec::with_capacity(processes.len());
    let mut queue = ProcessQueue::new();

    for process in processes {
        let rejected = match queue.enqueue(process) {
            Ok(()) => continue,
            Err(QueueFull(process)) => process,
        };

        while !queue.is_empty() {
            order.push(queue.dequeue());
        }
        if let Err(QueueFull(process)) = queue.enqueue(rejected) {
            order.push(process);
        }
    }

    while let Some(process) = queue.try_dequeue() {
        order.push(process);
    }
    order
}

/// The byte written at page `page` of the region allocated in `round` by `pid`. Never zero.
fn pattern(pid: u32, round: usize, page: usize) -> u8 {
    ((pid as usize * 31 + round * 7 + page) % 255 + 1) as u8
}

/// Runs the workload for one process.
pub fn run_process(
    manager: &MemoryManager,
    process: &mut Process,
    config: &WorkloadConfig,
) -> Result<ProcessReport, WorkloadError> {
    let pid = process.pid().get();
    let mut report = ProcessReport {
        pid,
        priority: process.priority(),
        ..ProcessReport::default()
    };
    let pages = layout::pages_for(config.size);

    for round in 0..config.allocations {
        let start = match manager.allocate(config.size, process) {
            Ok(start) => start,
            Err(err) => {
                log::info!("pid {pid}: allocation {round} refused: {err}");
                report.failed += 1;
                continue;
            }
        };
        report.allocated += 1;

        for page in 0..pages {
            manager
                .write_byte(start.nth_page(page), process, pattern(pid, round, page))
                .map_err(|source| WorkloadError::Access { pid, source })?;
        }

        for page in 0..pages {
            let address = start.nth_page(page);
            let expected = pattern(pid, round, page);
            let found = manager
                .read_byte(address, process)
                .map_err(|source| WorkloadError::Access { pid, source })?;
            if found != expected {
                return Err(WorkloadError::Mismatch {
                    pid,
                    address,
                    expected,
                    found,
                });
            }
            report.bytes_verified += 1;
        }

        if round % 2 == 1 {
            report.pages_freed += manager
                .deallocate(start, process)
                .map_err(|source| WorkloadError::Free { pid, source })?;
        }
    }

    log::debug!(
        "pid {pid}: {} allocated, {} refused, {} bytes verified",
        report.allocated,
        report.failed,
        report.bytes_verified
    );
    Ok(report)
}

/// Runs every process's workload in parallel on the current rayon pool.
///
/// Processes are dispatched in scheduler order first; the returned processes keep whatever
/// regions their workload did not free.
pub fn run(
    manager: &MemoryManager,
    config: &WorkloadConfig,
) -> Result<Simulation, WorkloadError> {
    let mut processes = dispatch_order(spawn_processes(config.processes));
    log::info!(
        "dispatch order: {:?}",
        processes.iter().map(|p| p.pid().get()).collect::<Vec<_>>()
    );

    let reports = processes
        .par_iter_mut()
        .map(|process| run_process(manager, process, config))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Simulation { processes, reports })
}
