//! Intent state model.
//!
//! Owns no storage of its own — `IntentProgress` lives in the queue's
//! worker-local map. This module holds the one rule that turns a contract
//! status plus local progress into the status the Reconciler actually acts
//! on.

use agi_types::{ExtendedStatus, IntentProgress, OrderStatus};

/// Computes the effective status for a step.
///
/// If the contract reports `DispensedPendingProceeds` and an internal
/// `ext_status` has already been recorded for this intent, the internal
/// status wins — it is strictly more advanced than what the contract alone
/// can express (swap in progress, swap done). For every other contract
/// status, the contract is authoritative.
pub fn effective_status(contract_status: OrderStatus, progress: &IntentProgress) -> ExtendedStatus {
	if contract_status == OrderStatus::DispensedPendingProceeds {
		if let Some(internal) = progress.ext_status {
			return internal;
		}
	}
	ExtendedStatus::from(contract_status)
}

/// True once an intent's swap has failed `max_retries` times — it is no
/// longer eligible for processing and must be refused on re-admission.
pub fn is_exhausted(progress: &IntentProgress, max_retries: u32) -> bool {
	matches!(
		&progress.swap,
		Some(record) if record.phase == agi_types::SwapPhase::Failed && record.attempts >= max_retries
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_types::{SwapPhase, SwapRecord};

	#[test]
	fn contract_status_wins_outside_dispensed_pending() {
		let progress = IntentProgress {
			ext_status: Some(ExtendedStatus::SwapCompleted),
			..Default::default()
		};
		assert_eq!(
			effective_status(OrderStatus::PendingDispense, &progress) as u8,
			ExtendedStatus::PendingDispense as u8
		);
		assert_eq!(
			effective_status(OrderStatus::ProceedsReceived, &progress) as u8,
			ExtendedStatus::ProceedsReceived as u8
		);
	}

	#[test]
	fn internal_status_wins_when_dispensed_pending_and_recorded() {
		let progress = IntentProgress {
			ext_status: Some(ExtendedStatus::SwapInitiated),
			..Default::default()
		};
		assert_eq!(
			effective_status(OrderStatus::DispensedPendingProceeds, &progress) as u8,
			ExtendedStatus::SwapInitiated as u8
		);
	}

	#[test]
	fn contract_status_used_when_no_internal_status_recorded() {
		let progress = IntentProgress::default();
		assert_eq!(
			effective_status(OrderStatus::DispensedPendingProceeds, &progress) as u8,
			ExtendedStatus::DispensedPendingProceeds as u8
		);
	}

	#[test]
	fn exhaustion_requires_failed_phase_and_ceiling() {
		let mut progress = IntentProgress {
			swap: Some(SwapRecord {
				amount_to_buy: None,
				phase: SwapPhase::Failed,
				attempts: 2,
			}),
			..Default::default()
		};
		assert!(is_exhausted(&progress, 2));
		progress.swap.as_mut().unwrap().attempts = 1;
		assert!(!is_exhausted(&progress, 2));
		progress.swap.as_mut().unwrap().attempts = 2;
		progress.swap.as_mut().unwrap().phase = SwapPhase::Completed;
		assert!(!is_exhausted(&progress, 2));
	}
}
