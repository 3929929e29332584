use std::time::Duration;

use crate::constants::{DEFAULT_MAX_INTERVAL_SECS, PERCENT_SCALE};
use crate::counters::CounterKind;
use crate::error::{Field, Inconsistency, Result};
use crate::snapshot::SnapshotHandle;
use crate::util::counter_step;

/// Ticks accumulated by each counter kind between two snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreDelta {
	pub idle: u64,
	pub nice: u64,
	pub sys: u64,
	pub user: u64,
}

impl CoreDelta {
	pub fn get(&self, kind: CounterKind) -> u64 {
		match kind {
			CounterKind::Idle => self.idle,
			CounterKind::Nice => self.nice,
			CounterKind::Sys => self.sys,
			CounterKind::User => self.user,
		}
	}

	fn set(&mut self, kind: CounterKind, value: u64) {
		match kind {
			CounterKind::Idle => self.idle = value,
			CounterKind::Nice => self.nice = value,
			CounterKind::Sys => self.sys = value,
			CounterKind::User => self.user = value,
		}
	}

	/// Sum of the four deltas
	pub fn total(&self) -> u64 {
		self.idle
			.saturating_add(self.nice)
			.saturating_add(self.sys)
			.saturating_add(self.user)
	}

	/// Share of the total taken by each kind
	pub fn utilization(&self) -> CoreUtilization {
		let total = self.total();
		if total == 0 {
			return CoreUtilization::Undefined;
		}
		let share = |v: u64| v as f64 / total as f64;
		CoreUtilization::Measured {
			idle: share(self.idle),
			nice: share(self.nice),
			sys: share(self.sys),
			user: share(self.user),
		}
	}
}

/// Fraction of a core's ticks spent in each state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoreUtilization {
	/// No ticks were recorded for the core between the two snapshots
	Undefined,
	Measured { idle: f64, nice: f64, sys: f64, user: f64 },
}

impl CoreUtilization {
	pub fn is_defined(&self) -> bool {
		matches!(self, CoreUtilization::Measured { .. })
	}

	pub fn fraction(&self, kind: CounterKind) -> Option<f64> {
		match *self {
			CoreUtilization::Undefined => None,
			CoreUtilization::Measured { idle, nice, sys, user } => Some(match kind {
				CounterKind::Idle => idle,
				CounterKind::Nice => nice,
				CounterKind::Sys => sys,
				CounterKind::User => user,
			}),
		}
	}

	/// Everything but idle
	pub fn busy(&self) -> Option<f64> {
		self.fraction(CounterKind::Idle).map(|idle| 1.0 - idle)
	}
}

/// Percentages as reported by the card's management tool
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UtilizationPercent {
	pub user: f64,
	pub sys: f64,
	pub idle: f64,
}

impl UtilizationPercent {
	fn from_ticks(user: u64, sys: u64, ticks_available: f64) -> Self {
		let user = (user as f64 * PERCENT_SCALE / ticks_available).min(PERCENT_SCALE);
		let sys = (sys as f64 * PERCENT_SCALE / ticks_available).min(PERCENT_SCALE);
		let idle = (PERCENT_SCALE - (user + sys)).max(0.0);
		Self { user, sys, idle }
	}
}

/// Device-wide and per-core percentages normalised to elapsed jiffies
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUtilization {
	pub device: UtilizationPercent,
	pub cores: Vec<UtilizationPercent>,
}

/// Counter deltas between two snapshots of the same device
#[derive(Debug, Clone, PartialEq)]
pub struct PerCoreDelta {
	pub elapsed_ticks: u64,
	pub tick_rate: u32,
	pub threads_per_core: u32,
	/// Indexed by core
	pub cores: Vec<CoreDelta>,
	/// Deltas of the device-maintained sums
	pub aggregate: CoreDelta,
}

impl PerCoreDelta {
	pub fn core_count(&self) -> usize {
		self.cores.len()
	}

	pub fn elapsed_secs(&self) -> f64 {
		self.elapsed_ticks as f64 / f64::from(self.tick_rate)
	}

	/// Saturates at [`Duration::MAX`]
	pub fn elapsed(&self) -> Duration {
		Duration::try_from_secs_f64(self.elapsed_secs()).unwrap_or(Duration::MAX)
	}

	/// Utilization of one core, `None` when `core` is out of range
	///
	/// Undefined when no jiffies elapsed between the snapshots.
	pub fn utilization(&self, core: usize) -> Option<CoreUtilization> {
		let delta = self.cores.get(core)?;
		if self.elapsed_ticks == 0 {
			return Some(CoreUtilization::Undefined);
		}
		Some(delta.utilization())
	}

	pub fn utilizations(&self) -> Vec<CoreUtilization> {
		(0..self.cores.len()).filter_map(|core| self.utilization(core)).collect()
	}

	/// Utilization computed from the device-maintained sums
	pub fn aggregate_utilization(&self) -> CoreUtilization {
		if self.elapsed_ticks == 0 {
			return CoreUtilization::Undefined;
		}
		self.aggregate.utilization()
	}

	/// User, sys and idle percentages relative to the ticks that elapsed
	///
	/// Each core has `threads_per_core × elapsed_ticks` ticks available.
	/// User and sys are capped at 100% and idle is whatever remains.
	/// Returns `None` when nothing elapsed or the layout is empty.
	pub fn device_utilization(&self) -> Option<DeviceUtilization> {
		let core_count = self.cores.len();
		if self.elapsed_ticks == 0 || self.threads_per_core == 0 || core_count == 0 {
			return None;
		}
		let per_core_ticks = f64::from(self.threads_per_core) * self.elapsed_ticks as f64;

		let device = UtilizationPercent::from_ticks(
			self.aggregate.user,
			self.aggregate.sys,
			per_core_ticks * core_count as f64,
		);
		let cores = self
			.cores
			.iter()
			.map(|d| UtilizationPercent::from_ticks(d.user, d.sys, per_core_ticks))
			.collect();

		Some(DeviceUtilization { device, cores })
	}
}

/// Compares two snapshots taken from the same device
#[derive(Debug, Clone, Copy)]
pub struct DeltaComputer {
	max_interval: Duration,
}

impl Default for DeltaComputer {
	fn default() -> Self {
		Self::new(Duration::from_secs(DEFAULT_MAX_INTERVAL_SECS))
	}
}

impl DeltaComputer {
	/// `max_interval` bounds how much time a wrapped jiffy counter may span
	pub fn new(max_interval: Duration) -> Self {
		Self { max_interval }
	}

	pub fn max_interval(&self) -> Duration {
		self.max_interval
	}

	/// Computes the counter deltas from `before` to `after`
	///
	/// Both handles must have completed an update and agree on core count
	/// and tick rate. A counter that went backwards is taken to have wrapped
	/// once; a wrapped delta larger than the elapsed time allows is rejected.
	pub fn delta(&self, before: &SnapshotHandle, after: &SnapshotHandle) -> Result<PerCoreDelta> {
		if !before.is_ready() || !after.is_ready() {
			return Err(Inconsistency::NotSampled.into());
		}
		if before.core_count() != after.core_count() {
			return Err(Inconsistency::CoreCountMismatch {
				before: before.core_count(),
				after: after.core_count(),
			}
			.into());
		}
		if before.tick_rate() != after.tick_rate() {
			return Err(Inconsistency::TickRateMismatch {
				before: before.tick_rate(),
				after: after.tick_rate(),
			}
			.into());
		}
		let tick_rate = after.tick_rate();
		if tick_rate == 0 {
			return Err(Inconsistency::ZeroTickRate.into());
		}

		let max_elapsed = self.max_interval.as_secs().saturating_mul(u64::from(tick_rate));
		let elapsed_ticks = checked_step(
			before.jiffy_counter(),
			after.jiffy_counter(),
			max_elapsed,
			Field::JiffyCounter,
			None,
		)?;

		let threads_per_core = after.threads_per_core();
		let core_bound = elapsed_ticks
			.saturating_add(u64::from(tick_rate))
			.saturating_mul(u64::from(threads_per_core.max(1)));
		let sum_bound = core_bound.saturating_mul(after.core_count() as u64);

		let mut cores = vec![CoreDelta::default(); after.core_count()];
		let mut aggregate = CoreDelta::default();
		for kind in CounterKind::ALL {
			let field = Field::PerCore(kind);
			for (core, (&start, &end)) in before.per_core(kind).iter().zip(after.per_core(kind)).enumerate() {
				let step = checked_step(start, end, core_bound, field, Some(core))?;
				cores[core].set(kind, step);
			}

			let step = checked_step(before.sum(kind), after.sum(kind), sum_bound, Field::Sum(kind), None)?;
			aggregate.set(kind, step);
		}

		Ok(PerCoreDelta {
			elapsed_ticks,
			tick_rate,
			threads_per_core,
			cores,
			aggregate,
		})
	}
}

fn checked_step(start: u64, end: u64, bound: u64, field: Field, core: Option<usize>) -> Result<u64> {
	let step = counter_step(start, end);
	if step.wrapped && step.value > bound {
		return Err(Inconsistency::ImplausibleDelta {
			field,
			core,
			delta: step.value,
			bound,
		}
		.into());
	}
	Ok(step.value)
}
