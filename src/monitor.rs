use std::collections::VecDeque;
use std::mem;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::constants::{AVERAGING_ITERATIONS, DATA_COLLECTION_INTERVAL_MS, DEFAULT_MAX_INTERVAL_SECS, DEFAULT_PROC_ROOT};
use crate::delta::{DeltaComputer, DeviceUtilization, PerCoreDelta};
use crate::device::Device;
use crate::error::Result;
use crate::sampler::Sampler;
use crate::snapshot::SnapshotHandle;

/// Settings for a monitoring run
#[derive(Debug, Clone)]
pub struct MonitorConfig {
	/// Time between two snapshots
	pub interval: Duration,
	/// Reports to produce before stopping, 0 for no limit
	pub count: usize,
	/// Longest span a wrapped jiffy counter may cover
	pub max_interval: Duration,
	pub proc_root: PathBuf,
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			interval: Duration::from_millis(DATA_COLLECTION_INTERVAL_MS),
			count: 0,
			max_interval: Duration::from_secs(DEFAULT_MAX_INTERVAL_SECS),
			proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
		}
	}
}

/// Utilization over the last interval, ready for display
#[derive(Debug, Clone)]
pub struct UtilizationReport {
	pub device_name: String,
	pub elapsed: Duration,
	/// Busy percentage per core averaged over recent intervals; `None` until a core records ticks
	pub core_busy: Vec<Option<f64>>,
	/// Busy percentage from the device-maintained sums for this interval
	pub aggregate_busy: Option<f64>,
	pub device: Option<DeviceUtilization>,
}

/// Samples a device at a fixed cadence and averages per-core busy time
///
/// Holds two handles: the last good snapshot and the one being refreshed.
/// Both are released when the monitor is dropped.
pub struct UtilizationMonitor<D: Device> {
	device: D,
	sampler: Sampler,
	computer: DeltaComputer,
	previous: SnapshotHandle,
	current: SnapshotHandle,
	busy_readings: Vec<VecDeque<f64>>,
}

impl<D: Device> UtilizationMonitor<D> {
	/// Acquires both handles for `device`
	pub fn new(device: D, sampler: Sampler, computer: DeltaComputer) -> Result<Self> {
		let previous = sampler.acquire(&device)?;
		let current = sampler.acquire(&device)?;
		let busy_readings = (0..previous.core_count())
			.map(|_| VecDeque::with_capacity(AVERAGING_ITERATIONS))
			.collect();

		Ok(Self {
			device,
			sampler,
			computer,
			previous,
			current,
			busy_readings,
		})
	}

	pub fn device(&self) -> &D {
		&self.device
	}

	pub fn core_count(&self) -> usize {
		self.previous.core_count()
	}

	/// Takes the baseline snapshot
	pub fn prime(&mut self) -> Result<()> {
		self.sampler.update(&mut self.previous, &self.device)
	}

	/// Takes a snapshot and compares it with the previous one
	///
	/// Returns `Ok(None)` when there was no usable baseline; the new snapshot
	/// becomes the baseline. After an inconsistent pair the newer snapshot is
	/// kept as the baseline as well.
	pub fn sample(&mut self) -> Result<Option<UtilizationReport>> {
		self.sampler.update(&mut self.current, &self.device)?;

		if !self.previous.is_ready() {
			mem::swap(&mut self.previous, &mut self.current);
			debug!(device = self.device.name(), "baseline re-taken");
			return Ok(None);
		}

		let delta = self.computer.delta(&self.previous, &self.current);
		mem::swap(&mut self.previous, &mut self.current);
		let delta = delta?;

		debug!(
			device = self.device.name(),
			elapsed_ticks = delta.elapsed_ticks,
			cores = delta.core_count(),
			"interval sampled"
		);

		self.update_readings(&delta);
		Ok(Some(self.report(&delta)))
	}

	/// Pushes this interval's busy fraction for every core that recorded ticks
	fn update_readings(&mut self, delta: &PerCoreDelta) {
		for (readings, utilization) in self.busy_readings.iter_mut().zip(delta.utilizations()) {
			if let Some(busy) = utilization.busy() {
				readings.push_back(busy);
				if readings.len() > AVERAGING_ITERATIONS {
					readings.pop_front();
				}
			}
		}
	}

	fn report(&self, delta: &PerCoreDelta) -> UtilizationReport {
		UtilizationReport {
			device_name: self.device.name().to_string(),
			elapsed: delta.elapsed(),
			core_busy: self.busy_readings.iter().map(average_percent).collect(),
			aggregate_busy: delta.aggregate_utilization().busy().map(|b| b * 100.0),
			device: delta.device_utilization(),
		}
	}
}

fn average_percent(readings: &VecDeque<f64>) -> Option<f64> {
	if readings.is_empty() {
		return None;
	}
	let total: f64 = readings.iter().sum();
	Some(total / readings.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::counters::CounterKind;
	use crate::counters::testing::CountingAllocator;
	use crate::device::mock::{Frame, MockDevice};
	use crate::error::{Field, Inconsistency, SamplerError};

	fn busy_frame(jiffy: u64, idle: u64, user: u64) -> Frame {
		Frame::new(jiffy, 100, 2)
			.with_counters(CounterKind::Idle, vec![idle, idle])
			.with_counters(CounterKind::User, vec![user, 0])
			.with_sum(CounterKind::Idle, idle * 2)
			.with_sum(CounterKind::User, user)
	}

	fn monitor(device: MockDevice) -> UtilizationMonitor<MockDevice> {
		UtilizationMonitor::new(device, Sampler::new(), DeltaComputer::default()).unwrap()
	}

	#[test]
	fn reports_average_busy_per_core() {
		let device = MockDevice::new(2, 1);
		device.push_frame(busy_frame(0, 0, 0));
		device.push_frame(busy_frame(100, 50, 50));
		device.push_frame(busy_frame(200, 150, 50));
		let mut monitor = monitor(device);

		monitor.prime().unwrap();
		let first = monitor.sample().unwrap().unwrap();
		assert_eq!(first.core_busy, vec![Some(50.0), Some(0.0)]);
		assert_eq!(first.elapsed, Duration::from_secs(1));

		let second = monitor.sample().unwrap().unwrap();
		// core 0: 50% then 0%
		assert_eq!(second.core_busy, vec![Some(25.0), Some(0.0)]);
		assert_eq!(second.aggregate_busy, Some(0.0));
	}

	#[test]
	fn unprimed_monitor_takes_baseline_first() {
		let device = MockDevice::new(2, 1);
		device.push_frame(busy_frame(0, 0, 0));
		device.push_frame(busy_frame(100, 100, 0));
		let mut monitor = monitor(device);

		assert!(monitor.sample().unwrap().is_none());
		assert!(monitor.sample().unwrap().is_some());
	}

	#[test]
	fn failed_update_keeps_baseline() {
		let device = MockDevice::new(2, 1);
		device.push_frame(busy_frame(0, 0, 0));
		device.push_frame(busy_frame(100, 50, 50));
		let mut monitor = monitor(device);
		monitor.prime().unwrap();

		monitor.device().fail_on(Field::Sum(CounterKind::User));
		let err = monitor.sample().unwrap_err();
		assert_eq!(err.field(), Some(Field::Sum(CounterKind::User)));

		monitor.device().clear_faults();
		let report = monitor.sample().unwrap().unwrap();
		assert_eq!(report.core_busy[0], Some(50.0));
	}

	#[test]
	fn inconsistent_interval_moves_baseline_forward() {
		let device = MockDevice::new(1, 1);
		device.push_frame(Frame::new(0, 100, 1));
		device.push_frame(Frame::new(100, 250, 1));
		device.push_frame(Frame::new(200, 250, 1).with_counters(CounterKind::Idle, vec![100]));
		let mut monitor = monitor(device);
		monitor.prime().unwrap();

		let err = monitor.sample().unwrap_err();
		assert!(matches!(
			err,
			SamplerError::Inconsistent(Inconsistency::TickRateMismatch { before: 100, after: 250 })
		));

		let report = monitor.sample().unwrap().unwrap();
		assert_eq!(report.core_busy, vec![Some(0.0)]);
	}

	#[test]
	fn dropping_monitor_releases_both_handles() {
		let allocator = Arc::new(CountingAllocator::new());
		let sampler = Sampler::with_allocator(allocator.clone());
		{
			let _monitor = UtilizationMonitor::new(MockDevice::new(3, 1), sampler, DeltaComputer::default()).unwrap();
			assert_eq!(allocator.live(), 8);
		}
		assert_eq!(allocator.live(), 0);
	}

	#[test]
	fn second_acquire_failure_releases_first_handle() {
		let allocator = Arc::new(CountingAllocator::failing_on(6));
		let sampler = Sampler::with_allocator(allocator.clone());

		let result = UtilizationMonitor::new(MockDevice::new(3, 1), sampler, DeltaComputer::default());

		assert!(matches!(result, Err(SamplerError::Allocation(_))));
		assert_eq!(allocator.live(), 0);
	}
}
