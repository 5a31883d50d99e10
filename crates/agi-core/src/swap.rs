//! Swap Coordinator: an idempotent wrapper around the Swap capability.
//!
//! Keeps exactly one swap record per `orderId`. A step that finds a
//! `Completed` record never calls the capability again; a step that finds a
//! `Pending` record (only possible after a crash mid-call) treats the swap
//! as still in flight rather than starting a second one.

use agi_swap::{SwapError, SwapRequest, SwapService};
use agi_types::{IntentProgress, SwapPhase, SwapRecord, U256};
use std::sync::Arc;

/// Result of advancing an intent's swap by one step.
pub enum SwapOutcome {
	/// A swap is already in flight or past the retry ceiling; nothing to do
	/// this step.
	InFlight,
	/// The swap has completed (just now, or on a prior step) and produced
	/// this amount to deposit.
	Completed(U256),
}

pub struct SwapCoordinator {
	swap: Arc<SwapService>,
}

impl SwapCoordinator {
	pub fn new(swap: Arc<SwapService>) -> Self {
		Self { swap }
	}

	/// Advances the swap for one intent, mutating its `SwapRecord` in place.
	///
	/// On `Err`, the record's phase is left as `Failed` with `attempts`
	/// already incremented; the caller applies the retry/eviction policy.
	pub async fn advance(
		&self,
		request: SwapRequest,
		progress: &mut IntentProgress,
		max_retries: u32,
	) -> Result<SwapOutcome, SwapError> {
		if let Some(record) = &progress.swap {
			match record.phase {
				SwapPhase::Pending => return Ok(SwapOutcome::InFlight),
				SwapPhase::Completed => {
					let amount = record
						.amount_to_buy
						.expect("a completed swap record always carries an amount");
					return Ok(SwapOutcome::Completed(amount));
				}
				SwapPhase::Failed if record.attempts >= max_retries => {
					return Ok(SwapOutcome::InFlight)
				}
				SwapPhase::Failed => {}
			}
		}

		let record = progress.swap.get_or_insert_with(SwapRecord::new_pending);
		record.phase = SwapPhase::Pending;
		record.attempts += 1;

		match self.swap.execute(&request).await {
			Ok(amount_to_buy) => {
				let record = progress
					.swap
					.as_mut()
					.expect("swap record was just inserted above");
				record.phase = SwapPhase::Completed;
				record.amount_to_buy = Some(amount_to_buy);
				Ok(SwapOutcome::Completed(amount_to_buy))
			}
			Err(e) => {
				let record = progress
					.swap
					.as_mut()
					.expect("swap record was just inserted above");
				record.phase = SwapPhase::Failed;
				Err(e)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_swap::implementations::mock::{MockSwap, MockSwapConfig};
	use agi_types::Address;
	use std::collections::HashMap;

	fn request() -> SwapRequest {
		SwapRequest {
			from_token: Address::repeat_byte(1),
			to_token: Address::repeat_byte(2),
			from_amount: U256::from(1000u64),
			from_address: Address::repeat_byte(3),
			slippage: 0.05,
		}
	}

	fn coordinator_with(rates: HashMap<String, f64>, starved: Vec<String>) -> SwapCoordinator {
		let config = MockSwapConfig {
			rates,
			default_rate: 1.0,
			starved_pairs: starved,
		};
		let swap = Arc::new(SwapService::new(Box::new(MockSwap::new(config))));
		SwapCoordinator::new(swap)
	}

	#[tokio::test]
	async fn first_call_marks_completed_and_caches_amount() {
		let coordinator = coordinator_with(HashMap::new(), vec![]);
		let mut progress = IntentProgress::default();
		let outcome = coordinator
			.advance(request(), &mut progress, 2)
			.await
			.unwrap();
		assert!(matches!(outcome, SwapOutcome::Completed(_)));
		assert_eq!(progress.swap.as_ref().unwrap().attempts, 1);
		assert!(matches!(
			progress.swap.as_ref().unwrap().phase,
			SwapPhase::Completed
		));
	}

	#[tokio::test]
	async fn completed_record_is_never_re_executed() {
		let coordinator = coordinator_with(HashMap::new(), vec![]);
		let mut progress = IntentProgress::default();
		let first = coordinator
			.advance(request(), &mut progress, 2)
			.await
			.unwrap();
		let SwapOutcome::Completed(first_amount) = first else {
			panic!("expected Completed");
		};

		let second = coordinator
			.advance(request(), &mut progress, 2)
			.await
			.unwrap();
		let SwapOutcome::Completed(second_amount) = second else {
			panic!("expected Completed");
		};
		assert_eq!(first_amount, second_amount);
		assert_eq!(progress.swap.as_ref().unwrap().attempts, 1);
	}

	#[tokio::test]
	async fn failure_increments_attempts_and_propagates_error() {
		let starved_key = format!(
			"{:#x}-{:#x}",
			Address::repeat_byte(1),
			Address::repeat_byte(2)
		);
		let coordinator = coordinator_with(HashMap::new(), vec![starved_key]);
		let mut progress = IntentProgress::default();
		let err = coordinator.advance(request(), &mut progress, 2).await;
		assert!(err.is_err());
		assert_eq!(progress.swap.as_ref().unwrap().attempts, 1);
		assert!(matches!(
			progress.swap.as_ref().unwrap().phase,
			SwapPhase::Failed
		));
	}
}
