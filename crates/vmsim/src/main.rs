use clap::{ArgAction, Parser, Subcommand};

use vmm::{MemoryManager, layout};
use vmsim::console::Console;
use vmsim::{WorkloadConfig, run};

#[derive(Parser)]
#[command(name = "vmsim")]
#[command(about = "Runs simulated processes against a paged virtual memory manager")]
struct Args {
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a parallel allocate/write/verify/free workload
    Run {
        /// Number of simulated processes
        #[arg(short, long, default_value_t = 4)]
        processes: u32,

        /// Allocations attempted by each process
        #[arg(short, long, default_value_t = 8)]
        allocations: usize,

        /// Size in bytes of each allocation
        #[arg(short, long, default_value_t = 3000)]
        size: usize,

        /// Worker threads (defaults to one per core)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Print the occupied frames before releasing them
        #[arg(long)]
        dump: bool,
    },
    /// Print the memory geometry
    Layout,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    Console::init(args.verbose as i8 - args.quiet as i8);

    match args.command {
        Command::Run {
            processes,
            allocations,
            size,
            threads,
            dump,
        } => {
            let config = WorkloadConfig {
                processes,
                allocations,
                size,
            };
            simulate(config, threads, dump)
        }
        Command::Layout => {
            print_layout();
            Ok(())
        }
    }
}

fn simulate(
    config: WorkloadConfig,
    threads: Option<usize>,
    dump: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let manager = MemoryManager::init();
    let mut simulation = pool.install(|| run(manager, &config))?;

    if dump {
        print!("{}", manager.dump());
    }

    let mut released = 0;
    for process in &mut simulation.processes {
        released += manager.release_all(process);
    }

    println!(
        "{:>4} {:>8} {:>9} {:>6} {:>8} {:>7}",
        "pid", "priority", "allocated", "failed", "verified", "freed"
    );
    for report in &simulation.reports {
        println!(
            "{:>4} {:>8} {:>9} {:>6} {:>8} {:>7}",
            report.pid,
            report.priority,
            report.allocated,
            report.failed,
            report.bytes_verified,
            report.pages_freed
        );
    }
    println!("{released} pages released at exit");

    let free = manager.free_frames();
    if free != layout::NUM_PAGES {
        return Err(format!("{} frames still held after release", layout::NUM_PAGES - free).into());
    }
    println!("all {free} frames free");
    Ok(())
}

fn print_layout() {
    println!("offset bits:    {}", layout::OFFSET_BITS);
    println!("page bits:      {}", layout::PAGE_BITS);
    println!("segment bits:   {}", layout::SEGMENT_BITS);
    println!("address bits:   {}", layout::ADDRESS_BITS);
    println!("page size:      {} bytes", layout::PAGE_SIZE);
    println!("frames:         {}", layout::NUM_PAGES);
    println!("physical size:  {} bytes", layout::RAM_SIZE);
    println!("segments:       {}", layout::SEGMENT_ENTRIES);
    println!("pages/segment:  {}", layout::PAGE_ENTRIES);
    println!("queue capacity: {}", layout::MAX_QUEUE_SIZE);
}
