//! Core data types for Agent Generated Intents (AGIs).
//!
//! This module defines the on-chain intent shape, the extended status used
//! internally to track work that the contract itself cannot represent, and the
//! per-intent progress record mutated by the queue's single worker.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// The only `intentType` value the escrow contract and this solver support.
pub const TRADE_INTENT_TYPE: u8 = 0;

/// Authoritative on-chain order status, as returned by `viewAGI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
	PendingDispense = 0,
	DispensedPendingProceeds = 1,
	ProceedsReceived = 2,
}

impl OrderStatus {
	pub fn from_u8(value: u8) -> Option<Self> {
		match value {
			0 => Some(Self::PendingDispense),
			1 => Some(Self::DispensedPendingProceeds),
			2 => Some(Self::ProceedsReceived),
			_ => None,
		}
	}
}

/// The on-chain AGI record returned by `viewAGI(orderId)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
	pub order_id: u64,
	pub intent_type: u8,
	pub asset_to_sell: Address,
	pub amount_to_sell: U256,
	pub asset_to_buy: Address,
	pub order_status: OrderStatus,
}

/// The union of contract statuses and internal, solver-only statuses.
///
/// Values 0, 1, 2 come from the contract; 3 and 4 exist only in
/// [`IntentProgress::ext_status`] and are never written on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExtendedStatus {
	PendingDispense = 0,
	DispensedPendingProceeds = 1,
	SwapInitiated = 3,
	SwapCompleted = 4,
	ProceedsReceived = 2,
}

impl From<OrderStatus> for ExtendedStatus {
	fn from(status: OrderStatus) -> Self {
		match status {
			OrderStatus::PendingDispense => Self::PendingDispense,
			OrderStatus::DispensedPendingProceeds => Self::DispensedPendingProceeds,
			OrderStatus::ProceedsReceived => Self::ProceedsReceived,
		}
	}
}

/// Phase of the in-flight or completed swap for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapPhase {
	Pending,
	Completed,
	Failed,
}

/// Idempotency record kept by the Swap Coordinator for a single `orderId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
	pub amount_to_buy: Option<U256>,
	pub phase: SwapPhase,
	pub attempts: u32,
}

impl SwapRecord {
	pub fn new_pending() -> Self {
		Self {
			amount_to_buy: None,
			phase: SwapPhase::Pending,
			attempts: 0,
		}
	}
}

/// In-memory progress for one `orderId`, mutated exclusively by the queue's
/// single worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentProgress {
	pub ext_status: Option<ExtendedStatus>,
	pub swap: Option<SwapRecord>,
	pub last_attempt_at: u64,
	pub required_delay_ms: u64,
}

impl IntentProgress {
	/// True once enough time has elapsed since the last attempt for this
	/// intent to be eligible for another step.
	pub fn is_ready(&self, now_ms: u64) -> bool {
		now_ms.saturating_sub(self.last_attempt_at) >= self.required_delay_ms
	}
}

/// A durable record of an intent evicted after exhausting swap retries.
///
/// Mirrors the `failed_swaps` table schema: `agi_id` is the primary key and
/// `order_id` is carried as a separate column even though both hold the same
/// value, matching the persisted schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSwapRecord {
	pub timestamp: u64,
	pub agi_id: u64,
	pub error_message: String,
	pub intent_type: u8,
	pub asset_to_sell: Address,
	pub amount_to_sell: U256,
	pub asset_to_buy: Address,
	pub order_id: u64,
	pub order_status: u8,
}

/// Event payload for `AGIPublished`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgiPublished {
	pub order_id: u64,
	pub intent_type: u8,
	pub asset_to_sell: Address,
	pub amount_to_sell: U256,
	pub asset_to_buy: Address,
}
