pub mod host;
pub mod mock;

use std::fmt::Debug;
use std::path::Path;

use crate::counters::CounterKind;
use crate::error::DeviceError;

/// Utilization counters exposed by one device
///
/// Every query is a separate, blocking call. Two queries can observe the
/// device at different instants; in particular the four per-core arrays are
/// not read atomically with respect to each other.
pub trait Device: Debug + Send + Sync {
	/// Name used in diagnostics
	fn name(&self) -> &str;

	/// Number of logical cores the counters are kept for
	fn core_count(&self) -> Result<usize, DeviceError>;

	fn threads_per_core(&self) -> Result<u32, DeviceError>;

	/// Monotonic tick counter
	fn jiffy_counter(&self) -> Result<u64, DeviceError>;

	/// Ticks per second
	fn tick_rate(&self) -> Result<u32, DeviceError>;

	/// One counter of the given kind per core
	fn per_core(&self, kind: CounterKind) -> Result<Vec<u64>, DeviceError>;

	/// Device-maintained aggregate of the given kind
	fn sum(&self, kind: CounterKind) -> Result<u64, DeviceError>;
}

impl<D: Device + ?Sized> Device for Box<D> {
	fn name(&self) -> &str {
		(**self).name()
	}

	fn core_count(&self) -> Result<usize, DeviceError> {
		(**self).core_count()
	}

	fn threads_per_core(&self) -> Result<u32, DeviceError> {
		(**self).threads_per_core()
	}

	fn jiffy_counter(&self) -> Result<u64, DeviceError> {
		(**self).jiffy_counter()
	}

	fn tick_rate(&self) -> Result<u32, DeviceError> {
		(**self).tick_rate()
	}

	fn per_core(&self, kind: CounterKind) -> Result<Vec<u64>, DeviceError> {
		(**self).per_core(kind)
	}

	fn sum(&self, kind: CounterKind) -> Result<u64, DeviceError> {
		(**self).sum(kind)
	}
}

/// Factory function to open the device backed by the given procfs mount
pub fn open_device(proc_root: impl AsRef<Path>) -> Box<dyn Device> {
	Box::new(host::HostDevice::new(proc_root))
}
