//! Scripted in-memory device for exercising the sampler without hardware.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::counters::CounterKind;
use crate::device::Device;
use crate::error::{DeviceError, Field};

/// Counter values the device reports for one update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
	pub jiffy_counter: u64,
	pub tick_rate: u32,
	pub per_core: [Vec<u64>; 4],
	pub sums: [u64; 4],
}

impl Frame {
	/// A frame with zeroed counters for `core_count` cores
	pub fn new(jiffy_counter: u64, tick_rate: u32, core_count: usize) -> Self {
		Self {
			jiffy_counter,
			tick_rate,
			per_core: std::array::from_fn(|_| vec![0; core_count]),
			sums: [0; 4],
		}
	}

	pub fn with_counters(mut self, kind: CounterKind, counters: Vec<u64>) -> Self {
		self.per_core[kind.index()] = counters;
		self
	}

	pub fn with_sum(mut self, kind: CounterKind, sum: u64) -> Self {
		self.sums[kind.index()] = sum;
		self
	}
}

#[derive(Debug)]
struct MockState {
	core_count: usize,
	threads_per_core: u32,
	frames: VecDeque<Frame>,
	current: Frame,
	faults: HashSet<Field>,
	calls: Vec<Field>,
}

/// Device whose answers come from a queue of frames
///
/// A jiffy counter query moves to the next queued frame, so each update
/// sees one frame. When the queue runs dry the last frame keeps being
/// reported. Faults can be injected per field.
#[derive(Debug)]
pub struct MockDevice {
	name: String,
	state: Mutex<MockState>,
}

impl MockDevice {
	pub fn new(core_count: usize, threads_per_core: u32) -> Self {
		Self {
			name: "mock0".to_string(),
			state: Mutex::new(MockState {
				core_count,
				threads_per_core,
				frames: VecDeque::new(),
				current: Frame::new(0, 0, core_count),
				faults: HashSet::new(),
				calls: Vec::new(),
			}),
		}
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Queues the values for a later update
	pub fn push_frame(&self, frame: Frame) {
		self.state().frames.push_back(frame);
	}

	/// Makes every query of `field` fail until cleared
	pub fn fail_on(&self, field: Field) {
		self.state().faults.insert(field);
	}

	pub fn clear_faults(&self) {
		self.state().faults.clear();
	}

	/// Changes the core count reported from now on
	pub fn set_core_count(&self, core_count: usize) {
		self.state().core_count = core_count;
	}

	/// Fields queried so far, in order
	pub fn calls(&self) -> Vec<Field> {
		self.state().calls.clone()
	}

	fn query<T>(&self, field: Field, read: impl FnOnce(&mut MockState) -> T) -> Result<T, DeviceError> {
		let mut state = self.state();
		state.calls.push(field);
		if state.faults.contains(&field) {
			return Err(DeviceError::Unavailable(format!("injected fault on {field}")));
		}
		Ok(read(&mut *state))
	}
}

impl Device for MockDevice {
	fn name(&self) -> &str {
		&self.name
	}

	fn core_count(&self) -> Result<usize, DeviceError> {
		self.query(Field::CoreCount, |s| s.core_count)
	}

	fn threads_per_core(&self) -> Result<u32, DeviceError> {
		self.query(Field::ThreadsPerCore, |s| s.threads_per_core)
	}

	fn jiffy_counter(&self) -> Result<u64, DeviceError> {
		self.query(Field::JiffyCounter, |s| {
			if let Some(next) = s.frames.pop_front() {
				s.current = next;
			}
			s.current.jiffy_counter
		})
	}

	fn tick_rate(&self) -> Result<u32, DeviceError> {
		self.query(Field::TickRate, |s| s.current.tick_rate)
	}

	fn per_core(&self, kind: CounterKind) -> Result<Vec<u64>, DeviceError> {
		self.query(Field::PerCore(kind), |s| s.current.per_core[kind.index()].clone())
	}

	fn sum(&self, kind: CounterKind) -> Result<u64, DeviceError> {
		self.query(Field::Sum(kind), |s| s.current.sums[kind.index()])
	}
}
