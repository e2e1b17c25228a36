//! Memory simulator - command-line front end
//!
//! Usage: memory-sim [OPTIONS] <COMMAND>
//!
//! Commands:
//!   paging   Allocate pages from an init file and translate logical addresses
//!   segment  Build segment tables and translate (segment, offset) pairs
//!   vm       Run a page access trace through demand paging
//!   replace  Compare replacement policies on a reference string
//!
//! Options:
//!   --config <FILE>  TOML configuration
//!   --log <LEVEL>    Log level (defaults to RUST_LOG, then the config)
//!   --json           Print statistics as JSON
//!   -v, --verbose    Print detailed per-step information

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::Serialize;

use memory_sim::config::SimConfig;
use memory_sim::io::{self, ProcessPages};
use memory_sim::replacement::{simulate, SimulationReport};
use memory_sim::{
    AllocationStrategy, LogHandle, PageId, PagingSimulator, ReplacementPolicy, SegmentationEngine,
    VirtualMemoryManager, VirtualPageId,
};

#[derive(Parser, Debug)]
#[command(name = "memory-sim", version, about = "Paging, segmentation and virtual memory simulator")]
struct Cli {
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL")]
    log: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Paging(PagingArgs),
    Segment(SegmentArgs),
    Vm(VmArgs),
    Replace(ReplaceArgs),
}

#[derive(Args, Debug)]
struct PagingArgs {
    /// Lines of `pid page page ...` to allocate
    init_file: PathBuf,
    /// `pid address` pairs to translate
    input_file: PathBuf,
    /// Physical addresses, -1 for page faults
    output_file: PathBuf,
    #[arg(long)]
    strategy: Option<AllocationStrategy>,
    #[arg(long)]
    frames: Option<usize>,
    #[arg(long)]
    frame_size: Option<u64>,
}

#[derive(Args, Debug)]
struct SegmentArgs {
    /// Lines of `pid seg name size [base]`
    init_file: PathBuf,
    /// Lines of `pid seg offset`
    input_file: PathBuf,
    /// Physical addresses, -1 for violations
    output_file: PathBuf,
}

#[derive(Args, Debug)]
struct VmArgs {
    /// Lines of `pid page page ...` registering each process
    init_file: PathBuf,
    /// Lines of `pid page [r|w]`
    input_file: PathBuf,
    #[arg(long)]
    policy: Option<ReplacementPolicy>,
    #[arg(long)]
    frames: Option<usize>,
    #[arg(long)]
    frame_size: Option<u64>,
}

#[derive(Args, Debug)]
struct ReplaceArgs {
    /// File holding the reference string
    #[arg(required_unless_present = "refs")]
    refs_file: Option<PathBuf>,
    /// Inline reference string, e.g. "1 2 3 1 2 4"
    #[arg(long, conflicts_with = "refs_file")]
    refs: Option<String>,
    /// Policy to run; all of them when omitted
    #[arg(long)]
    policy: Option<ReplacementPolicy>,
    #[arg(long)]
    frames: Option<usize>,
}

/// Coloured stderr logger
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color_code: u8 = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        eprintln!(
            "\x1b[{color_code}m[{:>5}] {}: {}\x1b[0m",
            record.level(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn init_logger(level: Option<&str>, verbose: bool) {
    let default = if verbose { LevelFilter::Info } else { LevelFilter::Warn };
    let filter = level.and_then(|s| LevelFilter::from_str(s).ok()).unwrap_or(default);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(filter);
    }
}

fn main() {
    let cli = Cli::parse();

    // Run the simulator and handle any errors
    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };

    let env_level = std::env::var("RUST_LOG").ok();
    let level = cli.log.as_deref().or(env_level.as_deref()).or(config.log.level.as_deref());
    init_logger(level, cli.verbose);

    match &cli.command {
        Command::Paging(args) => run_paging(cli, &config, args),
        Command::Segment(args) => run_segment(cli, &config, args),
        Command::Vm(args) => run_vm(cli, &config, args),
        Command::Replace(args) => run_replace(cli, &config, args),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_paging(cli: &Cli, config: &SimConfig, args: &PagingArgs) -> Result<()> {
    let mut paging = config.paging.clone();
    paging.num_frames = args.frames.unwrap_or(paging.num_frames);
    paging.frame_size = args.frame_size.unwrap_or(paging.frame_size);
    paging.strategy = args.strategy.unwrap_or(paging.strategy);
    if paging.frame_size == 0 {
        bail!("frame size must be positive");
    }

    // Step 1: Allocate the initial pages
    let init = io::read_process_pages(&args.init_file)?;
    let mut sim = PagingSimulator::from_config(&paging).with_logger(LogHandle::facade("paging"));
    for ProcessPages { process, pages } in &init {
        if !sim.has_process(*process) {
            sim.create_process(*process, 0)?;
        }
        for &page in pages {
            if let Err(e) = sim.allocate_page(*process, PageId(page), None) {
                eprintln!("process {} page {}: {}", process, page, e);
            }
        }
    }

    if cli.verbose {
        eprintln!("=== Paging ===");
        eprintln!("Strategy:    {}", paging.strategy);
        eprintln!("Frames:      {} x {} bytes", paging.num_frames, paging.frame_size);
        for process in sim.processes() {
            let mapped: Vec<String> = sim
                .page_table(process)
                .into_iter()
                .flat_map(|t| t.mapped())
                .map(|(page, frame)| format!("{}->{}", page, frame))
                .collect();
            eprintln!("  Process {}: {}", process, mapped.join(" "));
        }
        eprintln!();
    }

    // Step 2: Translate each address
    let addresses = io::read_address_pairs(&args.input_file)?;
    let mut results = Vec::with_capacity(addresses.len());
    for &(process, address) in &addresses {
        let output = match sim.translate_address(process, address) {
            Ok(t) => {
                if cli.verbose {
                    match t.physical_address {
                        Some(pa) => eprintln!("P{} LA {} -> PA {}", process, address, pa),
                        None => eprintln!("P{} LA {} -> page fault (offset {})", process, address, t.offset),
                    }
                }
                t.to_output()
            }
            Err(e) => {
                if cli.verbose {
                    eprintln!("P{} LA {} -> ERROR: {}", process, address, e);
                }
                memory_sim::constants::INVALID_ADDRESS
            }
        };
        results.push(output);
    }

    // Step 3: Write results
    io::write_results(&args.output_file, &results)?;

    let stats = sim.statistics();
    if cli.json {
        print_json(&stats)?;
    } else if cli.verbose {
        eprintln!();
        eprintln!("=== Summary ===");
        eprintln!("Successful translations: {}", stats.successful_translations);
        eprintln!("Page faults:             {}", stats.page_faults);
        eprintln!("Memory utilization:      {:.1}%", stats.memory.utilization_percent);
        eprintln!("Results written to: {}", args.output_file.display());
    }
    Ok(())
}

fn run_segment(cli: &Cli, config: &SimConfig, args: &SegmentArgs) -> Result<()> {
    let specs = io::read_segment_specs(&args.init_file)?;
    let mut engine = SegmentationEngine::from_config(&config.segmentation).with_logger(LogHandle::facade("segmentation"));

    for spec in &specs {
        if !engine.has_process(spec.process) {
            engine.create_process(spec.process)?;
        }
        let base = engine
            .add_segment(spec.process, spec.segment, &spec.name, spec.size, spec.base)
            .with_context(|| format!("adding segment {} to process {}", spec.segment, spec.process))?;
        if cli.verbose {
            eprintln!(
                "Process {} segment {} ({}): base={:#x} limit={:#x}",
                spec.process, spec.segment, spec.name, base, spec.size
            );
        }
    }

    let requests = io::read_segment_addresses(&args.input_file)?;
    let results: Vec<i64> = requests
        .iter()
        .map(|&(process, segment, offset)| {
            let t = engine.translate_address(process, segment, offset);
            if cli.verbose {
                match t.physical_address {
                    Some(pa) => eprintln!("P{} ({}, {}) -> PA {:#x}", process, segment, offset, pa),
                    None => eprintln!("P{} ({}, {}) -> ERROR: {}", process, segment, offset, t.reason),
                }
            }
            t.to_output()
        })
        .collect();

    io::write_results(&args.output_file, &results)?;

    #[derive(Serialize)]
    struct Report {
        statistics: memory_sim::segmentation::SegmentationStats,
        fragmentation: Vec<(memory_sim::ProcessId, memory_sim::segmentation::Fragmentation)>,
    }

    let mut processes: Vec<_> = specs.iter().map(|s| s.process).collect();
    processes.sort_unstable();
    processes.dedup();
    let report = Report {
        statistics: engine.statistics(),
        fragmentation: processes.iter().map(|&p| (p, engine.fragmentation(p))).collect(),
    };

    if cli.json {
        print_json(&report)?;
    } else if cli.verbose {
        eprintln!();
        eprintln!("=== Summary ===");
        eprintln!("Success rate: {:.1}%", report.statistics.success_rate * 100.0);
        for (process, frag) in &report.fragmentation {
            eprintln!(
                "Process {}: external fragmentation {} bytes ({:.3}%)",
                process, frag.external_bytes, frag.external_percent
            );
        }
    }
    Ok(())
}

fn run_vm(cli: &Cli, config: &SimConfig, args: &VmArgs) -> Result<()> {
    let mut vm_config = config.virtual_memory.clone();
    vm_config.num_frames = args.frames.unwrap_or(vm_config.num_frames);
    vm_config.frame_size = args.frame_size.unwrap_or(vm_config.frame_size);
    vm_config.policy = args.policy.unwrap_or(vm_config.policy);
    if vm_config.num_frames == 0 {
        bail!("at least one frame is required");
    }
    if vm_config.frame_size == 0 {
        bail!("frame size must be positive");
    }

    let mut vm = VirtualMemoryManager::from_config(&vm_config).with_logger(LogHandle::facade("vm"));
    for ProcessPages { process, pages } in io::read_process_pages(&args.init_file)? {
        vm.load_process(process, pages.into_iter().map(VirtualPageId));
    }

    let accesses = io::read_page_accesses(&args.input_file)?;
    let trace: Vec<VirtualPageId> = accesses.iter().map(|a| a.page).collect();

    let mut outcomes = Vec::with_capacity(accesses.len());
    for (i, access) in accesses.iter().enumerate() {
        match vm.access_page(access.process, access.page, access.write, &trace[i + 1..]) {
            Ok(outcome) => {
                if !cli.json {
                    let mut line = format!(
                        "P{} page {} {} -> frame {}",
                        access.process,
                        access.page,
                        if outcome.fault { "FAULT" } else { "hit  " },
                        outcome.frame_index.map_or("-".to_string(), |f| f.to_string()),
                    );
                    if let Some(victim) = outcome.replaced_page {
                        line.push_str(&format!(" (swapped out page {})", victim));
                    }
                    println!("{}", line);
                }
                outcomes.push(outcome);
            }
            Err(e) => eprintln!("P{} page {}: {}", access.process, access.page, e),
        }
    }

    #[derive(Serialize)]
    struct Report {
        accesses: Vec<memory_sim::vm_manager::AccessOutcome>,
        statistics: memory_sim::vm_manager::VmStats,
        layout: Vec<memory_sim::vm_manager::VmFrameView>,
    }

    let report = Report { accesses: outcomes, statistics: vm.statistics(), layout: vm.memory_layout() };
    if cli.json {
        print_json(&report)?;
    } else {
        let stats = &report.statistics;
        println!();
        println!("Policy:     {}", stats.policy);
        println!("Faults:     {} ({:.1}%)", stats.replacement.page_faults, stats.replacement.fault_rate * 100.0);
        println!("Hits:       {}", stats.replacement.page_hits);
        println!("Swap ins:   {}", stats.swap_ins);
        println!("Swap outs:  {}", stats.swap_outs);
    }
    Ok(())
}

fn format_frames(frames: &[Option<VirtualPageId>]) -> String {
    let cells: Vec<String> = frames
        .iter()
        .map(|f| f.map_or("-".to_string(), |p| p.to_string()))
        .collect();
    format!("[{}]", cells.join(" "))
}

fn print_report(report: &SimulationReport, verbose: bool) {
    println!("=== {} ({} frames) ===", report.policy, report.num_frames);
    if verbose {
        for step in &report.steps {
            let evicted = step.replaced_page.map(|p| format!(" evict {}", p)).unwrap_or_default();
            println!(
                "{:>4} {} {}{}",
                step.page_id,
                if step.fault { "F" } else { " " },
                format_frames(&step.frames),
                evicted
            );
        }
    }
    println!(
        "faults={} hits={} fault_rate={:.3}",
        report.stats.page_faults, report.stats.page_hits, report.stats.fault_rate
    );
}

fn run_replace(cli: &Cli, config: &SimConfig, args: &ReplaceArgs) -> Result<()> {
    let references = match (&args.refs, &args.refs_file) {
        (Some(inline), _) => io::parse_reference_string(inline)?,
        (None, Some(path)) => io::read_reference_string(path)?,
        (None, None) => bail!("a reference string is required"),
    };
    let num_frames = args.frames.unwrap_or(config.virtual_memory.num_frames);
    if num_frames == 0 {
        bail!("at least one frame is required");
    }

    let policies: Vec<ReplacementPolicy> = match args.policy {
        Some(policy) => vec![policy],
        None => ReplacementPolicy::ALL.to_vec(),
    };
    let reports: Vec<SimulationReport> =
        policies.into_iter().map(|p| simulate(p, num_frames, &references)).collect();

    if cli.json {
        return print_json(&reports);
    }
    for report in &reports {
        print_report(report, cli.verbose);
    }
    Ok(())
}
