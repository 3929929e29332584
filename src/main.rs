use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use core_util::constants::{DATA_COLLECTION_INTERVAL_MS, DEFAULT_MAX_INTERVAL_SECS, DEFAULT_PROC_ROOT};
use core_util::device::open_device;
use core_util::display::print_report;
use core_util::monitor::MonitorConfig;
use core_util::{monitor_core_utilization, sample_once};

#[derive(Parser)]
#[command(name = "core-util", about = "Per-core utilization monitor", version)]
struct Args {
	/// Milliseconds between two snapshots.
	#[arg(short, long, default_value_t = DATA_COLLECTION_INTERVAL_MS)]
	interval_ms: u64,

	/// Number of reports to print before exiting (0 runs until interrupted).
	#[arg(short = 'n', long, default_value_t = 0)]
	count: usize,

	/// Print a single report and exit.
	#[arg(long)]
	once: bool,

	/// Path to the proc filesystem to read counters from.
	#[arg(long, default_value = DEFAULT_PROC_ROOT)]
	proc_root: PathBuf,

	/// Longest interval, in seconds, a wrapped jiffy counter is accepted for.
	#[arg(long, default_value_t = DEFAULT_MAX_INTERVAL_SECS)]
	max_interval_secs: u64,

	/// Increase logging verbosity (-v for debug, -vv for trace). Default is warn level.
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,

	/// Quiet mode - only show errors.
	#[arg(short, long)]
	quiet: bool,
}

fn init_tracing(args: &Args) {
	let level = if args.quiet {
		"error"
	} else {
		match args.verbose {
			0 => "warn",
			1 => "debug",
			_ => "trace",
		}
	};

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("core_util={level}")));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn main() -> ExitCode {
	let args = Args::parse();
	init_tracing(&args);

	let config = MonitorConfig {
		interval: Duration::from_millis(args.interval_ms),
		count: args.count,
		max_interval: Duration::from_secs(args.max_interval_secs),
		proc_root: args.proc_root.clone(),
	};
	let device = open_device(&config.proc_root);

	let result = if args.once {
		sample_once(device, &config).map(|report| print_report(&report))
	} else {
		monitor_core_utilization(device, &config)
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("Error: {e}");
			ExitCode::FAILURE
		},
	}
}
