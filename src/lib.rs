pub mod constants;
pub mod counters;
pub mod delta;
pub mod device;
pub mod display;
pub mod error;
pub mod monitor;
pub mod sampler;
pub mod snapshot;
pub mod util;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::delta::DeltaComputer;
use crate::device::Device;
use crate::display::{display_report, prepare_display_area};
use crate::error::{Inconsistency, Result};
use crate::monitor::{MonitorConfig, UtilizationMonitor, UtilizationReport};
use crate::sampler::Sampler;

pub use crate::counters::{CounterKind, CounterStore};
pub use crate::delta::{CoreDelta, CoreUtilization, PerCoreDelta};
pub use crate::error::{DeviceError, Field, SamplerError};
pub use crate::snapshot::SnapshotHandle;

fn open_monitor<D: Device>(device: D, config: &MonitorConfig) -> Result<UtilizationMonitor<D>> {
	let mut monitor = UtilizationMonitor::new(device, Sampler::new(), DeltaComputer::new(config.max_interval))?;
	monitor.prime()?;
	Ok(monitor)
}

/// Takes two snapshots one interval apart and reports the difference
pub fn sample_once<D: Device>(device: D, config: &MonitorConfig) -> Result<UtilizationReport> {
	let mut monitor = open_monitor(device, config)?;
	thread::sleep(config.interval);
	monitor.sample()?.ok_or_else(|| Inconsistency::NotSampled.into())
}

/// Samples core utilization continuously and displays the results
///
/// This is the main entry point for the monitoring functionality. Failed
/// intervals are logged and skipped.
pub fn monitor_core_utilization<D: Device>(device: D, config: &MonitorConfig) -> Result<()> {
	let mut monitor = open_monitor(device, config)?;

	info!(
		device = monitor.device().name(),
		cores = monitor.core_count(),
		interval_ms = config.interval.as_millis() as u64,
		"monitoring core utilization"
	);
	println!(
		"Monitoring {} core utilization every {} ms...",
		monitor.device().name(),
		config.interval.as_millis()
	);
	println!("Press Ctrl+C to stop.");
	println!();

	if let Err(e) = prepare_display_area(monitor.core_count()) {
		error!("Display error: {}", e);
	}

	// Create a channel for communication between threads
	let (tx, rx) = mpsc::channel::<UtilizationReport>();

	// Spawn the display thread
	let display_handle = thread::spawn(move || {
		let wait = Duration::from_millis(constants::DISPLAY_UPDATE_INTERVAL_MS);
		let mut last_display_time: Option<Instant> = None;

		loop {
			match rx.recv() {
				Ok(report) => {
					// Throttle redraws
					if let Some(since) = last_display_time.map(|t| t.elapsed()) {
						if since < wait {
							thread::sleep(wait - since);
						}
					}
					if let Err(e) = display_report(&report) {
						error!("Display error: {}", e);
						break;
					}
					last_display_time = Some(Instant::now());
				},
				// Sampling loop has ended
				Err(mpsc::RecvError) => break,
			}
		}
	});

	let mut reports = 0;
	while config.count == 0 || reports < config.count {
		thread::sleep(config.interval);

		match monitor.sample() {
			Ok(Some(report)) => {
				reports += 1;
				if tx.send(report).is_err() {
					break;
				}
			},
			Ok(None) => {},
			Err(e) => warn!(device = monitor.device().name(), "skipping interval: {}", e),
		}

		// Check if the display thread has ended
		if display_handle.is_finished() {
			break;
		}
	}

	drop(tx);
	let _ = display_handle.join();

	Ok(())
}
