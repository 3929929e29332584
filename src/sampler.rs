use std::sync::Arc;

use crate::counters::{BufferAllocator, CounterKind, CounterStore, SystemAllocator};
use crate::device::Device;
use crate::error::{DeviceError, Field, Result, SamplerError};
use crate::snapshot::{HandleState, SnapshotHandle};

/// Drives the acquire, update and release lifecycle of snapshot handles
///
/// The sampler holds no device state; every call takes the device it talks to.
/// A handle must be driven by one caller at a time.
#[derive(Debug, Clone)]
pub struct Sampler {
	allocator: Arc<dyn BufferAllocator>,
}

impl Default for Sampler {
	fn default() -> Self {
		Self::new()
	}
}

impl Sampler {
	pub fn new() -> Self {
		Self::with_allocator(Arc::new(SystemAllocator))
	}

	/// Uses `allocator` for every counter buffer this sampler obtains
	pub fn with_allocator(allocator: Arc<dyn BufferAllocator>) -> Self {
		Self { allocator }
	}

	/// Queries the device layout and allocates a handle sized for it
	///
	/// Nothing is allocated when a query fails; nothing is kept when an
	/// allocation fails.
	pub fn acquire<D: Device + ?Sized>(&self, device: &D) -> Result<SnapshotHandle> {
		let core_count = device.core_count().map_err(SamplerError::query(Field::CoreCount))?;
		if core_count == 0 {
			return Err(SamplerError::DeviceQuery {
				field: Field::CoreCount,
				source: DeviceError::Malformed("device reports no cores".to_string()),
			});
		}
		let threads_per_core = device
			.threads_per_core()
			.map_err(SamplerError::query(Field::ThreadsPerCore))?;

		let counters = CounterStore::allocate(core_count, self.allocator.clone())?;
		Ok(SnapshotHandle::new(core_count, threads_per_core, counters))
	}

	/// Refills the handle from the device without reallocating
	///
	/// Reads, in order: jiffy counter, tick rate, the idle, nice, sys and user
	/// per-core arrays, then the four aggregate sums. The first failing read
	/// stops the update and is reported. Fields read before it hold the new
	/// values, later fields keep the old ones, and the handle is marked
	/// [`HandleState::Indeterminate`] until an update completes.
	///
	/// The per-core arrays are four separate device reads and may observe
	/// different instants.
	///
	/// A released handle is left untouched and reports [`SamplerError::Released`].
	pub fn update<D: Device + ?Sized>(&self, handle: &mut SnapshotHandle, device: &D) -> Result<()> {
		if handle.state == HandleState::Released {
			return Err(SamplerError::Released);
		}
		handle.state = HandleState::Indeterminate;

		handle.jiffy_counter = device.jiffy_counter().map_err(SamplerError::query(Field::JiffyCounter))?;
		handle.tick_rate = device.tick_rate().map_err(SamplerError::query(Field::TickRate))?;

		for kind in CounterKind::ALL {
			let field = Field::PerCore(kind);
			let values = device.per_core(kind).map_err(SamplerError::query(field))?;
			let expected = handle.core_count;
			let dest = handle.counters.counters_mut(kind);
			if values.len() != expected || dest.len() != expected {
				return Err(SamplerError::DeviceQuery {
					field,
					source: DeviceError::CoreCountChanged {
						expected,
						actual: values.len(),
					},
				});
			}
			dest.copy_from_slice(&values);
		}

		for kind in CounterKind::ALL {
			handle.sums[kind.index()] = device.sum(kind).map_err(SamplerError::query(Field::Sum(kind)))?;
		}

		handle.state = HandleState::Ready;
		Ok(())
	}

	/// Frees the handle's counters
	///
	/// Valid in every state, including after a failed update.
	pub fn release(&self, mut handle: SnapshotHandle) {
		handle.release();
	}
}
