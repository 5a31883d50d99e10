//! Retry policy: two delay regimes and a swap-error ceiling.
//!
//! A step either succeeds, fails for a reason unrelated to the swap (an RPC
//! hiccup, a reverted transaction), or fails because the swap itself could
//! not be completed. The first two use the generic delay and never evict.
//! Only swap-class failures count against `max_retries`.

use agi_types::IntentProgress;

/// Scheduling and eviction parameters, sourced from `SolverConfig`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub retry_delay_ms: u64,
	pub swap_retry_delay_ms: u64,
	pub max_retries: u32,
}

impl RetryPolicy {
	pub fn new(retry_delay_ms: u64, swap_retry_delay_ms: u64, max_retries: u32) -> Self {
		Self {
			retry_delay_ms,
			swap_retry_delay_ms,
			max_retries,
		}
	}

	/// Schedules the next attempt after a successful step.
	pub fn on_success(&self, progress: &mut IntentProgress, now_ms: u64) {
		progress.last_attempt_at = now_ms;
		progress.required_delay_ms = self.retry_delay_ms;
	}

	/// Schedules the next attempt after a non-swap error (view/withdraw/deposit
	/// failures). Never counts toward eviction.
	pub fn on_generic_error(&self, progress: &mut IntentProgress, now_ms: u64) {
		progress.last_attempt_at = now_ms;
		progress.required_delay_ms = self.retry_delay_ms;
	}

	/// Schedules the next attempt after a swap-class error and reports whether
	/// this intent has now exhausted `max_retries` and must be evicted.
	///
	/// The caller is expected to have already incremented `attempts` on the
	/// swap record before invoking this.
	pub fn on_swap_error(&self, progress: &mut IntentProgress, now_ms: u64) -> bool {
		progress.last_attempt_at = now_ms;
		progress.required_delay_ms = self.swap_retry_delay_ms;
		progress
			.swap
			.as_ref()
			.map(|record| record.attempts >= self.max_retries)
			.unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_types::{SwapPhase, SwapRecord};

	fn policy() -> RetryPolicy {
		RetryPolicy::new(1000, 30_000, 2)
	}

	#[test]
	fn success_uses_generic_delay() {
		let mut progress = IntentProgress::default();
		policy().on_success(&mut progress, 500);
		assert_eq!(progress.last_attempt_at, 500);
		assert_eq!(progress.required_delay_ms, 1000);
	}

	#[test]
	fn swap_error_uses_swap_delay_and_does_not_evict_below_ceiling() {
		let mut progress = IntentProgress {
			swap: Some(SwapRecord {
				amount_to_buy: None,
				phase: SwapPhase::Failed,
				attempts: 1,
			}),
			..Default::default()
		};
		let evicted = policy().on_swap_error(&mut progress, 700);
		assert_eq!(progress.required_delay_ms, 30_000);
		assert!(!evicted);
	}

	#[test]
	fn swap_error_evicts_at_ceiling() {
		let mut progress = IntentProgress {
			swap: Some(SwapRecord {
				amount_to_buy: None,
				phase: SwapPhase::Failed,
				attempts: 2,
			}),
			..Default::default()
		};
		assert!(policy().on_swap_error(&mut progress, 700));
	}
}
