use std::fmt::Debug;
use std::sync::Arc;

use crate::error::AllocError;

/// The four per-core tick counters kept by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
	Idle,
	Nice,
	Sys,
	User,
}

impl CounterKind {
	/// All kinds, in the order the sampler reads them
	pub const ALL: [CounterKind; 4] = [CounterKind::Idle, CounterKind::Nice, CounterKind::Sys, CounterKind::User];

	pub fn as_str(&self) -> &'static str {
		match self {
			CounterKind::Idle => "idle",
			CounterKind::Nice => "nice",
			CounterKind::Sys => "sys",
			CounterKind::User => "user",
		}
	}

	pub(crate) const fn index(self) -> usize {
		match self {
			CounterKind::Idle => 0,
			CounterKind::Nice => 1,
			CounterKind::Sys => 2,
			CounterKind::User => 3,
		}
	}
}

/// Source of the per-core counter buffers
///
/// Every buffer handed out by `allocate` is given back through `release`
/// exactly once, either when its store is released or when a multi-buffer
/// acquisition fails part of the way through.
pub trait BufferAllocator: Debug + Send + Sync {
	/// Returns a zeroed buffer of `len` counters
	fn allocate(&self, kind: CounterKind, len: usize) -> Result<Vec<u64>, AllocError>;

	/// Takes back a buffer obtained from `allocate`
	fn release(&self, buffer: Vec<u64>) {
		drop(buffer);
	}
}

/// Heap allocator that reports exhaustion instead of aborting
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl BufferAllocator for SystemAllocator {
	fn allocate(&self, kind: CounterKind, len: usize) -> Result<Vec<u64>, AllocError> {
		let mut buffer = Vec::new();
		buffer.try_reserve_exact(len).map_err(|_| AllocError { kind, len })?;
		buffer.resize(len, 0);
		Ok(buffer)
	}
}

/// Buffers acquired so far in one all-or-nothing allocation
///
/// Dropping the scope without committing hands every buffer back to the allocator.
struct AllocationScope<'a> {
	allocator: &'a dyn BufferAllocator,
	len: usize,
	acquired: Vec<Vec<u64>>,
}

impl<'a> AllocationScope<'a> {
	fn new(allocator: &'a dyn BufferAllocator, len: usize) -> Self {
		Self {
			allocator,
			len,
			acquired: Vec::with_capacity(CounterKind::ALL.len()),
		}
	}

	fn acquire(&mut self, kind: CounterKind) -> Result<(), AllocError> {
		let buffer = self.allocator.allocate(kind, self.len)?;
		if buffer.len() != self.len {
			self.allocator.release(buffer);
			return Err(AllocError { kind, len: self.len });
		}
		self.acquired.push(buffer);
		Ok(())
	}

	fn commit(mut self) -> Result<[Vec<u64>; 4], AllocError> {
		let acquired = std::mem::take(&mut self.acquired);
		acquired.try_into().map_err(|partial: Vec<Vec<u64>>| {
			let kind = CounterKind::ALL[partial.len().min(CounterKind::ALL.len() - 1)];
			self.acquired = partial;
			AllocError { kind, len: self.len }
		})
	}
}

impl Drop for AllocationScope<'_> {
	fn drop(&mut self) {
		for buffer in self.acquired.drain(..) {
			self.allocator.release(buffer);
		}
	}
}

#[derive(Debug)]
struct Buffers {
	counters: [Vec<u64>; 4],
	allocator: Arc<dyn BufferAllocator>,
}

/// Per-core idle/nice/sys/user counters for one snapshot
///
/// All four sequences share one length, fixed when the store is allocated.
#[derive(Debug, Default)]
pub struct CounterStore {
	buffers: Option<Buffers>,
}

impl CounterStore {
	/// Allocates four zeroed sequences of `core_count` counters
	///
	/// Either all four buffers are obtained or none is kept.
	pub fn allocate(core_count: usize, allocator: Arc<dyn BufferAllocator>) -> Result<Self, AllocError> {
		let mut scope = AllocationScope::new(allocator.as_ref(), core_count);
		for kind in CounterKind::ALL {
			scope.acquire(kind)?;
		}
		let counters = scope.commit()?;

		Ok(Self {
			buffers: Some(Buffers { counters, allocator }),
		})
	}

	/// A store that owns no buffers
	pub fn unallocated() -> Self {
		Self::default()
	}

	pub fn is_allocated(&self) -> bool {
		self.buffers.is_some()
	}

	/// Number of cores the store was sized for, 0 once released
	pub fn len(&self) -> usize {
		self.buffers.as_ref().map_or(0, |b| b.counters[0].len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Counters of one kind, indexed by core; empty once released
	pub fn counters(&self, kind: CounterKind) -> &[u64] {
		match self.buffers.as_ref() {
			Some(b) => b.counters[kind.index()].as_slice(),
			None => &[],
		}
	}

	pub(crate) fn counters_mut(&mut self, kind: CounterKind) -> &mut [u64] {
		match self.buffers.as_mut() {
			Some(b) => b.counters[kind.index()].as_mut_slice(),
			None => &mut [],
		}
	}

	/// Hands the buffers back to their allocator; a no-op when nothing is held
	pub fn release(&mut self) {
		if let Some(Buffers { counters, allocator }) = self.buffers.take() {
			for buffer in counters {
				allocator.release(buffer);
			}
		}
	}
}

impl Drop for CounterStore {
	fn drop(&mut self) {
		self.release();
	}
}

/// Allocators for exercising failure paths
pub mod testing {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::{BufferAllocator, CounterKind};
	use crate::error::AllocError;

	/// Allocator that can refuse its Nth request and tracks live buffers
	#[derive(Debug, Default)]
	pub struct CountingAllocator {
		fail_on: Option<usize>,
		requests: AtomicUsize,
		live: AtomicUsize,
	}

	impl CountingAllocator {
		pub fn new() -> Self {
			Self::default()
		}

		/// Refuses the `n`th allocation request (1-based)
		pub fn failing_on(n: usize) -> Self {
			Self {
				fail_on: Some(n),
				..Self::default()
			}
		}

		/// Buffers handed out and not yet released
		pub fn live(&self) -> usize {
			self.live.load(Ordering::SeqCst)
		}

		pub fn requests(&self) -> usize {
			self.requests.load(Ordering::SeqCst)
		}
	}

	impl BufferAllocator for CountingAllocator {
		fn allocate(&self, kind: CounterKind, len: usize) -> Result<Vec<u64>, AllocError> {
			let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
			if self.fail_on == Some(n) {
				return Err(AllocError { kind, len });
			}
			self.live.fetch_add(1, Ordering::SeqCst);
			Ok(vec![0; len])
		}

		fn release(&self, buffer: Vec<u64>) {
			self.live.fetch_sub(1, Ordering::SeqCst);
			drop(buffer);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::testing::CountingAllocator;
	use super::*;

	#[test]
	fn allocates_four_zeroed_buffers() {
		let allocator = Arc::new(CountingAllocator::new());
		let store = CounterStore::allocate(8, allocator.clone()).unwrap();

		assert_eq!(store.len(), 8);
		for kind in CounterKind::ALL {
			assert_eq!(store.counters(kind), &[0u64; 8]);
		}
		assert_eq!(allocator.live(), 4);
	}

	#[test]
	fn failed_allocation_keeps_no_buffer() {
		for n in 1..=4 {
			let allocator = Arc::new(CountingAllocator::failing_on(n));
			let err = CounterStore::allocate(16, allocator.clone()).unwrap_err();

			assert_eq!(err.kind, CounterKind::ALL[n - 1]);
			assert_eq!(err.len, 16);
			assert_eq!(allocator.requests(), n, "stops at the failing request");
			assert_eq!(allocator.live(), 0, "buffers leaked when request {n} failed");
		}
	}

	#[test]
	fn release_is_idempotent() {
		let allocator = Arc::new(CountingAllocator::new());
		let mut store = CounterStore::allocate(2, allocator.clone()).unwrap();

		store.release();
		assert_eq!(allocator.live(), 0);
		assert!(!store.is_allocated());
		assert!(store.counters(CounterKind::User).is_empty());

		store.release();
		assert_eq!(allocator.live(), 0);
	}

	#[test]
	fn release_on_unallocated_store_is_a_no_op() {
		let mut store = CounterStore::unallocated();
		store.release();
		store.release();
		assert_eq!(store.len(), 0);
	}

	#[test]
	fn drop_returns_buffers() {
		let allocator = Arc::new(CountingAllocator::new());
		{
			let _store = CounterStore::allocate(4, allocator.clone()).unwrap();
			assert_eq!(allocator.live(), 4);
		}
		assert_eq!(allocator.live(), 0);
	}

	#[test]
	fn system_allocator_reports_impossible_sizes() {
		let err = SystemAllocator.allocate(CounterKind::Nice, usize::MAX).unwrap_err();
		assert_eq!(err.kind, CounterKind::Nice);
	}

	#[test]
	fn short_buffer_from_allocator_is_rejected() {
		#[derive(Debug)]
		struct Short;
		impl BufferAllocator for Short {
			fn allocate(&self, _kind: CounterKind, len: usize) -> Result<Vec<u64>, AllocError> {
				Ok(vec![0; len.saturating_sub(1)])
			}
		}

		let err = CounterStore::allocate(3, Arc::new(Short)).unwrap_err();
		assert_eq!(err.kind, CounterKind::Idle);
	}
}
