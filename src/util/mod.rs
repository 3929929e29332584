pub mod cpu;

/// Difference between two readings of a monotonically increasing counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterStep {
	pub value: u64,
	/// The counter passed its maximum between the two readings
	pub wrapped: bool,
}

/// Computes `end - start` for a 64-bit counter that may have wrapped
///
/// A reading lower than the previous one is treated as one wraparound:
/// `(u64::MAX - start) + end + 1`.
pub const fn counter_step(start: u64, end: u64) -> CounterStep {
	if end < start {
		// Handle counter wrap-around
		CounterStep {
			value: (u64::MAX - start).wrapping_add(end).wrapping_add(1),
			wrapped: true,
		}
	} else {
		CounterStep {
			value: end - start,
			wrapped: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn wraps_past_max() {
		let step = counter_step(u64::MAX - 2, 1);
		assert_eq!(step, CounterStep { value: 4, wrapped: true });
	}

	#[test]
	fn plain_difference_without_wrap() {
		assert_eq!(counter_step(10, 19), CounterStep { value: 9, wrapped: false });
		assert_eq!(counter_step(7, 7), CounterStep { value: 0, wrapped: false });
	}

	#[test]
	fn wrap_from_max_to_zero_is_one_tick() {
		assert_eq!(counter_step(u64::MAX, 0).value, 1);
	}

	proptest! {
		#[test]
		fn step_matches_modular_difference(start in any::<u64>(), end in any::<u64>()) {
			let step = counter_step(start, end);
			prop_assert_eq!(step.value, end.wrapping_sub(start));
			prop_assert_eq!(step.wrapped, end < start);
		}

		#[test]
		fn adding_step_recovers_end(start in any::<u64>(), delta in 0u64..1_000_000) {
			let end = start.wrapping_add(delta);
			prop_assert_eq!(counter_step(start, end).value, delta);
		}
	}
}
