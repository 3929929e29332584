use std::fmt;
use std::io;

use thiserror::Error;

use crate::counters::CounterKind;

/// Result type returned by the sampling core
pub type Result<T> = std::result::Result<T, SamplerError>;

/// A device attribute read by the sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
	CoreCount,
	ThreadsPerCore,
	JiffyCounter,
	TickRate,
	/// One of the four per-core counter arrays
	PerCore(CounterKind),
	/// One of the four device-wide aggregate sums
	Sum(CounterKind),
}

impl fmt::Display for Field {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Field::CoreCount => f.write_str("core count"),
			Field::ThreadsPerCore => f.write_str("threads per core"),
			Field::JiffyCounter => f.write_str("jiffy counter"),
			Field::TickRate => f.write_str("tick rate"),
			Field::PerCore(kind) => write!(f, "per-core {} counters", kind.as_str()),
			Field::Sum(kind) => write!(f, "{} sum", kind.as_str()),
		}
	}
}

/// Failure reported by a [`Device`](crate::device::Device) query
#[derive(Error, Debug)]
pub enum DeviceError {
	#[error("device I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("malformed device response: {0}")]
	Malformed(String),

	#[error("device reports {actual} cores, snapshot was sized for {expected}")]
	CoreCountChanged { expected: usize, actual: usize },

	#[error("device unavailable: {0}")]
	Unavailable(String),
}

/// A counter buffer could not be obtained
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("could not allocate {len} {} counters", .kind.as_str())]
pub struct AllocError {
	pub kind: CounterKind,
	pub len: usize,
}

/// Reason two snapshots cannot be compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
	CoreCountMismatch { before: usize, after: usize },
	TickRateMismatch { before: u32, after: u32 },
	/// A wrapped difference larger than the elapsed time allows; `core` is `None` for device-wide fields
	ImplausibleDelta {
		field: Field,
		core: Option<usize>,
		delta: u64,
		bound: u64,
	},
	/// One of the handles never completed an update
	NotSampled,
	ZeroTickRate,
}

impl fmt::Display for Inconsistency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Inconsistency::CoreCountMismatch { before, after } => {
				write!(f, "core count changed from {before} to {after}")
			},
			Inconsistency::TickRateMismatch { before, after } => {
				write!(f, "tick rate changed from {before} to {after}")
			},
			Inconsistency::ImplausibleDelta {
				field,
				core: Some(core),
				delta,
				bound,
			} => write!(f, "{field} on core {core} moved by {delta}, more than {bound}"),
			Inconsistency::ImplausibleDelta {
				field,
				core: None,
				delta,
				bound,
			} => write!(f, "{field} moved by {delta}, more than {bound}"),
			Inconsistency::NotSampled => f.write_str("snapshot has no completed update"),
			Inconsistency::ZeroTickRate => f.write_str("device reports a tick rate of zero"),
		}
	}
}

/// Errors returned by the sampling core
///
/// All variants are recoverable: retry, re-acquire, or skip the interval.
#[derive(Error, Debug)]
pub enum SamplerError {
	#[error("failed to read {field}: {source}")]
	DeviceQuery {
		field: Field,
		#[source]
		source: DeviceError,
	},

	#[error("allocation failure: {0}")]
	Allocation(#[from] AllocError),

	#[error("inconsistent snapshots: {0}")]
	Inconsistent(Inconsistency),

	#[error("snapshot handle has been released")]
	Released,
}

impl SamplerError {
	pub(crate) fn query(field: Field) -> impl FnOnce(DeviceError) -> Self {
		move |source| SamplerError::DeviceQuery { field, source }
	}

	/// The device attribute that failed, if this is a query failure
	pub fn field(&self) -> Option<Field> {
		match self {
			SamplerError::DeviceQuery { field, .. } => Some(*field),
			_ => None,
		}
	}
}

impl From<Inconsistency> for SamplerError {
	fn from(reason: Inconsistency) -> Self {
		SamplerError::Inconsistent(reason)
	}
}
