use crate::counters::{CounterKind, CounterStore};

/// Where a handle is in its acquire/update/release lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
	/// Acquired, never updated
	Empty,
	/// Last update completed
	Ready,
	/// Last update failed part of the way; no field can be trusted
	Indeterminate,
	Released,
}

/// One utilization snapshot of a device
///
/// Core count and threads per core are fixed at acquire time. Every other
/// field is refilled by each update.
#[derive(Debug)]
pub struct SnapshotHandle {
	pub(crate) core_count: usize,
	pub(crate) threads_per_core: u32,
	pub(crate) jiffy_counter: u64,
	pub(crate) tick_rate: u32,
	pub(crate) sums: [u64; 4],
	pub(crate) counters: CounterStore,
	pub(crate) state: HandleState,
}

impl SnapshotHandle {
	pub(crate) fn new(core_count: usize, threads_per_core: u32, counters: CounterStore) -> Self {
		Self {
			core_count,
			threads_per_core,
			jiffy_counter: 0,
			tick_rate: 0,
			sums: [0; 4],
			counters,
			state: HandleState::Empty,
		}
	}

	pub fn core_count(&self) -> usize {
		self.core_count
	}

	pub fn threads_per_core(&self) -> u32 {
		self.threads_per_core
	}

	/// Device tick counter at query time
	pub fn jiffy_counter(&self) -> u64 {
		self.jiffy_counter
	}

	/// Ticks per second
	pub fn tick_rate(&self) -> u32 {
		self.tick_rate
	}

	/// Device-maintained aggregate for one counter kind
	///
	/// Not necessarily equal to the sum of the per-core counters.
	pub fn sum(&self, kind: CounterKind) -> u64 {
		self.sums[kind.index()]
	}

	pub fn idle_sum(&self) -> u64 {
		self.sum(CounterKind::Idle)
	}

	pub fn nice_sum(&self) -> u64 {
		self.sum(CounterKind::Nice)
	}

	pub fn sys_sum(&self) -> u64 {
		self.sum(CounterKind::Sys)
	}

	pub fn user_sum(&self) -> u64 {
		self.sum(CounterKind::User)
	}

	/// Per-core counters of one kind, indexed by core
	pub fn per_core(&self, kind: CounterKind) -> &[u64] {
		self.counters.counters(kind)
	}

	pub fn idle_counters(&self) -> &[u64] {
		self.per_core(CounterKind::Idle)
	}

	pub fn nice_counters(&self) -> &[u64] {
		self.per_core(CounterKind::Nice)
	}

	pub fn sys_counters(&self) -> &[u64] {
		self.per_core(CounterKind::Sys)
	}

	pub fn user_counters(&self) -> &[u64] {
		self.per_core(CounterKind::User)
	}

	pub fn counters(&self) -> &CounterStore {
		&self.counters
	}

	pub fn state(&self) -> HandleState {
		self.state
	}

	/// True when the last update completed
	pub fn is_ready(&self) -> bool {
		self.state == HandleState::Ready
	}

	/// Frees the counter buffers; safe to call in any state, any number of times
	pub fn release(&mut self) {
		self.counters.release();
		self.state = HandleState::Released;
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::counters::testing::CountingAllocator;

	#[test]
	fn new_handle_is_empty_and_zeroed() {
		let store = CounterStore::allocate(3, Arc::new(CountingAllocator::new())).unwrap();
		let handle = SnapshotHandle::new(3, 4, store);

		assert_eq!(handle.state(), HandleState::Empty);
		assert!(!handle.is_ready());
		assert_eq!(handle.core_count(), 3);
		assert_eq!(handle.threads_per_core(), 4);
		assert_eq!(handle.idle_counters(), &[0, 0, 0]);
		assert_eq!(handle.user_sum(), 0);
	}

	#[test]
	fn sums_are_addressed_by_kind() {
		let mut handle = SnapshotHandle::new(0, 1, CounterStore::unallocated());
		handle.sums = [1, 2, 3, 4];

		assert_eq!(handle.idle_sum(), 1);
		assert_eq!(handle.nice_sum(), 2);
		assert_eq!(handle.sys_sum(), 3);
		assert_eq!(handle.user_sum(), 4);
	}

	#[test]
	fn release_twice_frees_once() {
		let allocator = Arc::new(CountingAllocator::new());
		let store = CounterStore::allocate(2, allocator.clone()).unwrap();
		let mut handle = SnapshotHandle::new(2, 1, store);

		handle.release();
		handle.release();

		assert_eq!(handle.state(), HandleState::Released);
		assert_eq!(allocator.live(), 0);
		assert!(handle.sys_counters().is_empty());
	}
}
