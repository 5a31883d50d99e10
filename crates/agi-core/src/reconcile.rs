//! Reconciler: the per-intent step function.
//!
//! Every tick of the Queue Core's ticker calls `Reconciler::step` exactly
//! once for exactly one intent. The step reads the contract, computes the
//! effective status, and dispatches to the handler for that status —
//! advancing at most one state transition per call.

use crate::intent_state::effective_status;
use crate::retry::RetryPolicy;
use crate::swap::{SwapCoordinator, SwapOutcome};
use crate::tx::TxExecutor;
use agi_chain::ChainService;
use agi_storage::StorageService;
use agi_swap::SwapRequest;
use agi_types::{
	Address, ExtendedStatus, FailedSwapRecord, Intent, IntentProgress, TRADE_INTENT_TYPE,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// What the Queue Core should do with this intent's queue/progress entry
/// after a step.
pub enum StepOutcome {
	/// Stays in the queue; `IntentProgress` has been updated in place.
	Retry,
	/// The intent reached `ProceedsReceived`; remove it from the queue and
	/// delete its progress entirely.
	Completed,
	/// The intent exhausted its swap retries; remove it from the queue but
	/// keep a stripped progress entry (swap record only) so `FailedSwapReport`
	/// and re-admission refusal keep working.
	Evicted,
}

pub struct Reconciler {
	chain: Arc<ChainService>,
	tx: TxExecutor,
	swap_coordinator: SwapCoordinator,
	storage: Arc<StorageService>,
	retry: RetryPolicy,
	solver_address: Address,
	default_slippage: f64,
}

impl Reconciler {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		chain: Arc<ChainService>,
		tx: TxExecutor,
		swap_coordinator: SwapCoordinator,
		storage: Arc<StorageService>,
		retry: RetryPolicy,
		solver_address: Address,
		default_slippage: f64,
	) -> Self {
		Self {
			chain,
			tx,
			swap_coordinator,
			storage,
			retry,
			solver_address,
			default_slippage,
		}
	}

	#[tracing::instrument(skip(self, progress), fields(order_id))]
	pub async fn step(&self, order_id: u64, progress: &mut IntentProgress) -> StepOutcome {
		let now = now_ms();
		if !progress.is_ready(now) {
			return StepOutcome::Retry;
		}

		let intent = match self.chain.view_agi(order_id).await {
			Ok(intent) => intent,
			Err(e) => {
				tracing::warn!(order_id, error = %e, "failed to read AGI, will retry");
				self.retry.on_generic_error(progress, now);
				return StepOutcome::Retry;
			}
		};

		if intent.intent_type != TRADE_INTENT_TYPE {
			tracing::error!(
				order_id,
				intent_type = intent.intent_type,
				"unsupported intentType, evicting"
			);
			self.reject_unsupported_intent(order_id, &intent).await;
			return StepOutcome::Evicted;
		}

		match effective_status(intent.order_status, progress) {
			ExtendedStatus::PendingDispense => self.handle_pending_dispense(order_id, progress, now).await,
			ExtendedStatus::DispensedPendingProceeds => {
				progress.ext_status = Some(ExtendedStatus::SwapInitiated);
				self.retry.on_success(progress, now);
				StepOutcome::Retry
			}
			ExtendedStatus::SwapInitiated => {
				self.handle_swap_initiated(order_id, &intent, progress, now).await
			}
			ExtendedStatus::SwapCompleted => {
				self.handle_swap_completed(order_id, &intent, progress, now).await
			}
			ExtendedStatus::ProceedsReceived => {
				if let Err(e) = self.storage.delete(order_id).await {
					tracing::warn!(order_id, error = %e, "failed to clear FailedSwaps record");
				}
				StepOutcome::Completed
			}
		}
	}

	async fn handle_pending_dispense(
		&self,
		order_id: u64,
		progress: &mut IntentProgress,
		now: u64,
	) -> StepOutcome {
		match self.tx.withdraw(order_id).await {
			Ok(()) => {
				self.retry.on_success(progress, now);
				StepOutcome::Retry
			}
			Err(e) => {
				tracing::warn!(order_id, error = %e, "withdrawAsset failed, will retry");
				self.retry.on_generic_error(progress, now);
				StepOutcome::Retry
			}
		}
	}

	async fn handle_swap_initiated(
		&self,
		order_id: u64,
		intent: &Intent,
		progress: &mut IntentProgress,
		now: u64,
	) -> StepOutcome {
		let request = SwapRequest {
			from_token: intent.asset_to_sell,
			to_token: intent.asset_to_buy,
			from_amount: intent.amount_to_sell,
			from_address: self.solver_address,
			slippage: self.default_slippage,
		};

		match self
			.swap_coordinator
			.advance(request, progress, self.retry.max_retries)
			.await
		{
			Ok(SwapOutcome::InFlight) => {
				self.retry.on_success(progress, now);
				StepOutcome::Retry
			}
			Ok(SwapOutcome::Completed(_)) => {
				progress.ext_status = Some(ExtendedStatus::SwapCompleted);
				self.retry.on_success(progress, now);
				StepOutcome::Retry
			}
			Err(e) => {
				tracing::warn!(order_id, error = %e, "swap failed");
				let evicted = self.retry.on_swap_error(progress, now);
				if evicted {
					self.evict(order_id, intent, progress).await;
					StepOutcome::Evicted
				} else {
					StepOutcome::Retry
				}
			}
		}
	}

	async fn handle_swap_completed(
		&self,
		order_id: u64,
		intent: &Intent,
		progress: &mut IntentProgress,
		now: u64,
	) -> StepOutcome {
		let amount_to_buy = progress
			.swap
			.as_ref()
			.and_then(|s| s.amount_to_buy)
			.expect("SwapCompleted always carries a cached amount");

		match self
			.tx
			.deposit(order_id, intent.asset_to_buy, amount_to_buy)
			.await
		{
			Ok(()) => {
				progress.ext_status = Some(ExtendedStatus::ProceedsReceived);
				if let Err(e) = self.storage.delete(order_id).await {
					tracing::warn!(order_id, error = %e, "failed to clear FailedSwaps record");
				}
				self.retry.on_success(progress, now);
				StepOutcome::Retry
			}
			Err(e) => {
				tracing::warn!(order_id, error = %e, "depositAsset failed, will retry");
				self.retry.on_generic_error(progress, now);
				StepOutcome::Retry
			}
		}
	}

	async fn evict(&self, order_id: u64, intent: &Intent, progress: &mut IntentProgress) {
		let attempts = progress.swap.as_ref().map(|s| s.attempts).unwrap_or(0);
		let record = FailedSwapRecord {
			timestamp: now_unix_seconds(),
			agi_id: order_id,
			error_message: format!("Swap failed for AGI {order_id} at attempt {attempts}"),
			intent_type: intent.intent_type,
			asset_to_sell: intent.asset_to_sell,
			amount_to_sell: intent.amount_to_sell,
			asset_to_buy: intent.asset_to_buy,
			order_id,
			order_status: intent.order_status as u8,
		};

		if let Err(e) = self.storage.record(record).await {
			tracing::error!(order_id, error = %e, "failed to persist FailedSwaps record");
		}
		tracing::error!(order_id, attempts, "evicted after exhausting swap retries");

		progress.ext_status = None;
		progress.last_attempt_at = 0;
		progress.required_delay_ms = 0;
	}

	/// Evicts an AGI whose `intentType` is not the one trade type the
	/// contract and this solver support (spec §3: "only 0 = trade is
	/// supported — reject others").
	async fn reject_unsupported_intent(&self, order_id: u64, intent: &Intent) {
		let record = FailedSwapRecord {
			timestamp: now_unix_seconds(),
			agi_id: order_id,
			error_message: format!(
				"Unsupported intentType {} for AGI {order_id}",
				intent.intent_type
			),
			intent_type: intent.intent_type,
			asset_to_sell: intent.asset_to_sell,
			amount_to_sell: intent.amount_to_sell,
			asset_to_buy: intent.asset_to_buy,
			order_id,
			order_status: intent.order_status as u8,
		};

		if let Err(e) = self.storage.record(record).await {
			tracing::error!(order_id, error = %e, "failed to persist FailedSwaps record");
		}
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

fn now_unix_seconds() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_account::{AccountError, AccountInterface, AccountService};
	use agi_chain::{ChainCall, ChainError, ChainInterface, WatchHandle};
	use agi_storage::implementations::memory::MemoryStorage;
	use agi_swap::{SwapError, SwapInterface, SwapService};
	use agi_types::{
		AgiPublished, ConfigSchema, OrderStatus, ReceiptStatus, SecretString, Signature,
		Transaction, TransactionHash, TransactionReceipt, TRADE_INTENT_TYPE, U256,
	};
	use std::sync::Mutex;
	use tokio::sync::mpsc;

	struct FakeAccount {
		address: Address,
	}

	#[async_trait::async_trait]
	impl AccountInterface for FakeAccount {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn address(&self) -> Result<Address, AccountError> {
			Ok(self.address)
		}
		async fn sign_transaction(&self, _tx: &Transaction) -> Result<Signature, AccountError> {
			unimplemented!()
		}
		async fn sign_message(&self, _message: &[u8]) -> Result<Signature, AccountError> {
			unimplemented!()
		}
		fn get_private_key(&self) -> SecretString {
			SecretString::from("0x0")
		}
	}

	/// Drives `order_status` forward on successful withdraw/deposit calls, so
	/// a sequence of steps can walk an intent across its full lifecycle.
	struct FakeChain {
		order_status: Mutex<OrderStatus>,
		asset_to_sell: Address,
		amount_to_sell: U256,
		asset_to_buy: Address,
		withdraw_failures_remaining: Mutex<u32>,
	}

	#[async_trait::async_trait]
	impl ChainInterface for FakeChain {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn view_agi(&self, order_id: u64) -> Result<Intent, ChainError> {
			Ok(Intent {
				order_id,
				intent_type: TRADE_INTENT_TYPE,
				asset_to_sell: self.asset_to_sell,
				amount_to_sell: self.amount_to_sell,
				asset_to_buy: self.asset_to_buy,
				order_status: *self.order_status.lock().unwrap(),
			})
		}
		async fn simulate_and_send(&self, call: ChainCall) -> Result<TransactionHash, ChainError> {
			match call {
				ChainCall::WithdrawAsset { .. } => {
					let mut remaining = self.withdraw_failures_remaining.lock().unwrap();
					if *remaining > 0 {
						*remaining -= 1;
						return Err(ChainError::Network("rpc timeout".to_string()));
					}
					*self.order_status.lock().unwrap() = OrderStatus::DispensedPendingProceeds;
				}
				ChainCall::DepositAsset { .. } => {
					*self.order_status.lock().unwrap() = OrderStatus::ProceedsReceived;
				}
				ChainCall::ApproveErc20 { .. } => {}
			}
			Ok(TransactionHash(vec![1]))
		}
		async fn wait_receipt(&self, hash: &TransactionHash) -> Result<TransactionReceipt, ChainError> {
			Ok(TransactionReceipt {
				hash: hash.clone(),
				status: ReceiptStatus::Success,
				block_number: 1,
			})
		}
		async fn next_order_id(&self) -> Result<u64, ChainError> {
			unimplemented!()
		}
		async fn processed_agis_length(&self) -> Result<u64, ChainError> {
			unimplemented!()
		}
		async fn get_processed_agis(&self, _start: u64, _end: u64) -> Result<Vec<u64>, ChainError> {
			unimplemented!()
		}
		async fn erc20_allowance(
			&self,
			_token: Address,
			_owner: Address,
			_spender: Address,
		) -> Result<U256, ChainError> {
			Ok(U256::MAX)
		}
		async fn watch_agi_published(
			&self,
		) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError> {
			unimplemented!()
		}
		async fn unwatch(&self, _handle: WatchHandle) -> Result<(), ChainError> {
			unimplemented!()
		}
	}

	/// Reports a fixed, non-trade `intentType` regardless of order id.
	struct NonTradeChain;

	#[async_trait::async_trait]
	impl ChainInterface for NonTradeChain {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn view_agi(&self, order_id: u64) -> Result<Intent, ChainError> {
			Ok(Intent {
				order_id,
				intent_type: 1,
				asset_to_sell: Address::repeat_byte(1),
				amount_to_sell: U256::from(1000u64),
				asset_to_buy: Address::repeat_byte(2),
				order_status: OrderStatus::PendingDispense,
			})
		}
		async fn simulate_and_send(&self, _call: ChainCall) -> Result<TransactionHash, ChainError> {
			unimplemented!()
		}
		async fn wait_receipt(&self, _hash: &TransactionHash) -> Result<TransactionReceipt, ChainError> {
			unimplemented!()
		}
		async fn next_order_id(&self) -> Result<u64, ChainError> {
			unimplemented!()
		}
		async fn processed_agis_length(&self) -> Result<u64, ChainError> {
			unimplemented!()
		}
		async fn get_processed_agis(&self, _start: u64, _end: u64) -> Result<Vec<u64>, ChainError> {
			unimplemented!()
		}
		async fn erc20_allowance(
			&self,
			_token: Address,
			_owner: Address,
			_spender: Address,
		) -> Result<U256, ChainError> {
			unimplemented!()
		}
		async fn watch_agi_published(
			&self,
		) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError> {
			unimplemented!()
		}
		async fn unwatch(&self, _handle: WatchHandle) -> Result<(), ChainError> {
			unimplemented!()
		}
	}

	/// Fails the configured number of times, then always succeeds with a
	/// fixed output amount.
	struct FlakySwap {
		failures_remaining: Mutex<u32>,
		amount_out: U256,
	}

	#[async_trait::async_trait]
	impl SwapInterface for FlakySwap {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn quote(&self, _request: &agi_swap::SwapRequest) -> Result<U256, SwapError> {
			unimplemented!()
		}
		async fn execute(&self, _request: &agi_swap::SwapRequest) -> Result<U256, SwapError> {
			let mut remaining = self.failures_remaining.lock().unwrap();
			if *remaining > 0 {
				*remaining -= 1;
				return Err(SwapError::InsufficientLiquidity("no route".to_string()));
			}
			Ok(self.amount_out)
		}
	}

	fn reconciler(
		chain: Arc<ChainService>,
		swap_failures: u32,
		storage: Arc<StorageService>,
	) -> Reconciler {
		let account = Arc::new(AccountService::new(Box::new(FakeAccount {
			address: Address::repeat_byte(9),
		})));
		let tx = TxExecutor::new(chain.clone(), account, Address::repeat_byte(0xAA));
		let swap = Arc::new(SwapService::new(Box::new(FlakySwap {
			failures_remaining: Mutex::new(swap_failures),
			amount_out: U256::from(900u64),
		})));
		let swap_coordinator = SwapCoordinator::new(swap);
		Reconciler::new(
			chain,
			tx,
			swap_coordinator,
			storage,
			RetryPolicy::new(1000, 30_000, 2),
			Address::repeat_byte(9),
			0.05,
		)
	}

	fn fresh_chain() -> Arc<ChainService> {
		Arc::new(ChainService::new(Box::new(FakeChain {
			order_status: Mutex::new(OrderStatus::PendingDispense),
			asset_to_sell: Address::repeat_byte(1),
			amount_to_sell: U256::from(1000u64),
			asset_to_buy: Address::repeat_byte(2),
			withdraw_failures_remaining: Mutex::new(0),
		})))
	}

	/// Forces the next `step` call to be eligible regardless of wall-clock
	/// time, since `IntentProgress::is_ready` gates on real time.
	fn force_ready(progress: &mut IntentProgress) {
		progress.required_delay_ms = 0;
	}

	#[tokio::test]
	async fn happy_path_walks_through_all_states() {
		let chain = fresh_chain();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let reconciler = reconciler(chain, 0, storage);
		let mut progress = IntentProgress::default();

		// PendingDispense -> withdraw -> contract moves to DispensedPendingProceeds.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		force_ready(&mut progress);

		// DispensedPendingProceeds (no internal status yet) -> SwapInitiated.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		assert_eq!(progress.ext_status, Some(ExtendedStatus::SwapInitiated));
		force_ready(&mut progress);

		// SwapInitiated -> swap succeeds -> SwapCompleted.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		assert_eq!(progress.ext_status, Some(ExtendedStatus::SwapCompleted));
		force_ready(&mut progress);

		// SwapCompleted -> deposit -> contract moves to ProceedsReceived.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		assert_eq!(progress.ext_status, Some(ExtendedStatus::ProceedsReceived));
		force_ready(&mut progress);

		// ProceedsReceived -> done.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Completed
		));
	}

	#[tokio::test]
	async fn swap_retry_then_success() {
		let chain = fresh_chain();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let reconciler = reconciler(chain, 1, storage);
		let mut progress = IntentProgress {
			ext_status: Some(ExtendedStatus::SwapInitiated),
			..Default::default()
		};

		// First attempt fails, schedules a swap-delay retry, does not evict.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		assert_eq!(progress.swap.as_ref().unwrap().attempts, 1);
		assert_eq!(progress.required_delay_ms, 30_000);
		force_ready(&mut progress);

		// Second attempt succeeds.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		assert_eq!(progress.ext_status, Some(ExtendedStatus::SwapCompleted));
	}

	#[tokio::test]
	async fn swap_ceiling_evicts_with_exact_message() {
		let chain = fresh_chain();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let reconciler = reconciler(chain, 10, storage.clone());
		let mut progress = IntentProgress {
			ext_status: Some(ExtendedStatus::SwapInitiated),
			..Default::default()
		};

		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		force_ready(&mut progress);

		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Evicted
		));

		let records = storage.list().await.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].error_message, "Swap failed for AGI 9 at attempt 2");
		assert_eq!(progress.ext_status, None);
	}

	#[tokio::test]
	async fn non_trade_intent_type_is_evicted_with_exact_message() {
		let chain = Arc::new(ChainService::new(Box::new(NonTradeChain)));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let reconciler = reconciler(chain, 0, storage.clone());
		let mut progress = IntentProgress::default();

		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Evicted
		));

		let records = storage.list().await.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(
			records[0].error_message,
			"Unsupported intentType 1 for AGI 9"
		);
	}

	#[tokio::test]
	async fn transport_flake_on_withdraw_retries_then_succeeds() {
		let chain = Arc::new(ChainService::new(Box::new(FakeChain {
			order_status: Mutex::new(OrderStatus::PendingDispense),
			asset_to_sell: Address::repeat_byte(1),
			amount_to_sell: U256::from(1000u64),
			asset_to_buy: Address::repeat_byte(2),
			withdraw_failures_remaining: Mutex::new(1),
		})));
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let reconciler = reconciler(chain, 0, storage);
		let mut progress = IntentProgress::default();

		// First attempt: transport failure, generic retry delay, no eviction.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
		assert_eq!(progress.required_delay_ms, 1000);
		assert!(progress.swap.is_none());
		force_ready(&mut progress);

		// Second attempt succeeds.
		assert!(matches!(
			reconciler.step(9, &mut progress).await,
			StepOutcome::Retry
		));
	}
}
