//! Chain and Events capability for the AGI solver system.
//!
//! This module wraps the escrow contract's read/write surface and its event
//! stream behind a single capability. The core never talks to an RPC node
//! directly: it reads intents, submits the `withdrawAsset`/`depositAsset`/
//! `approve` calls, and watches `AGIPublished` entirely through this trait.

use agi_account::AccountService;
use agi_types::{AgiPublished, ConfigSchema, Intent, TransactionHash, TransactionReceipt};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Re-export implementations.
pub mod implementations {
	pub mod alloy;
}

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
	/// Error that occurs during network communication (RPC, transport).
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a simulated call (`eth_call`) reverts.
	#[error("Simulation reverted: {0}")]
	SimulationReverted(String),
	/// Error that occurs when a mined transaction's receipt reports failure.
	#[error("Transaction reverted: {0}")]
	TransactionReverted(String),
	/// Error that occurs when a receipt cannot be obtained within the poll budget.
	#[error("Timed out waiting for receipt")]
	ReceiptTimeout,
}

/// One of the escrow contract's write operations, independent of its ABI
/// encoding. Implementations translate these into calldata.
#[derive(Debug, Clone)]
pub enum ChainCall {
	/// `withdrawAsset(orderId)`.
	WithdrawAsset { order_id: u64 },
	/// `depositAsset(orderId, amount)`.
	DepositAsset { order_id: u64, amount_to_buy: U256 },
	/// ERC-20 `approve(spender, amount)` against `token`.
	ApproveErc20 {
		token: Address,
		spender: Address,
		amount: U256,
	},
}

/// Opaque handle to an active event subscription, returned by
/// [`ChainInterface::watch_agi_published`] and passed back to
/// [`ChainInterface::unwatch`].
pub struct WatchHandle(oneshot::Sender<()>);

impl WatchHandle {
	/// Wraps a subscription's stop signal.
	pub fn new(stop: oneshot::Sender<()>) -> Self {
		Self(stop)
	}

	/// Signals the subscription's monitoring task to stop.
	pub fn stop(self) {
		let _ = self.0.send(());
	}
}

/// Trait defining the interface for chain implementations.
///
/// Implementations connect to a single escrow contract on a single network
/// and provide reads, simulate-then-send writes, receipt polling, and
/// `AGIPublished` event watching.
#[async_trait]
pub trait ChainInterface: Send + Sync {
	/// Returns the configuration schema for this chain implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Reads `viewAGI(orderId)` from the escrow contract.
	async fn view_agi(&self, order_id: u64) -> Result<Intent, ChainError>;

	/// Simulates the call, and if it would succeed, signs and submits it.
	///
	/// Signing is delegated to the account capability; this method never
	/// holds key material itself.
	async fn simulate_and_send(&self, call: ChainCall) -> Result<TransactionHash, ChainError>;

	/// Polls for a transaction's receipt, bounded by the implementation's
	/// configured interval and attempt cap.
	async fn wait_receipt(&self, hash: &TransactionHash) -> Result<TransactionReceipt, ChainError>;

	/// Reads the contract's `nextOrderId()`.
	async fn next_order_id(&self) -> Result<u64, ChainError>;

	/// Reads the contract's `processedAGIsLength()`.
	async fn processed_agis_length(&self) -> Result<u64, ChainError>;

	/// Reads `getProcessedAGIs(start, end)`.
	async fn get_processed_agis(&self, start: u64, end: u64) -> Result<Vec<u64>, ChainError>;

	/// Reads the ERC-20 `allowance(owner, spender)` for `token`.
	async fn erc20_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError>;

	/// Starts watching for `AGIPublished` events, delivering each decoded
	/// event over the returned channel until [`ChainInterface::unwatch`] is
	/// called with the returned handle.
	async fn watch_agi_published(
		&self,
	) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError>;

	/// Stops a subscription started by `watch_agi_published`.
	async fn unwatch(&self, handle: WatchHandle) -> Result<(), ChainError>;
}

/// Type alias for chain factory functions.
pub type ChainFactory =
	fn(&toml::Value, Arc<AccountService>) -> Result<Box<dyn ChainInterface>, ChainError>;

/// Registry trait for chain implementations.
pub trait ChainRegistry: agi_types::ImplementationRegistry<Factory = ChainFactory> {}

/// Get all registered chain implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ChainFactory)> {
	use agi_types::ImplementationRegistry;
	use implementations::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Service that wraps a single chain implementation for use by the core.
///
/// Unlike the teacher's multi-chain `DeliveryService`, this wraps exactly one
/// implementation: the solver talks to one escrow contract on one network.
pub struct ChainService {
	implementation: Box<dyn ChainInterface>,
}

impl ChainService {
	/// Creates a new ChainService with the specified implementation.
	pub fn new(implementation: Box<dyn ChainInterface>) -> Self {
		Self { implementation }
	}

	/// Reads `viewAGI(orderId)`.
	pub async fn view_agi(&self, order_id: u64) -> Result<Intent, ChainError> {
		self.implementation.view_agi(order_id).await
	}

	/// Simulates then submits a write call.
	pub async fn simulate_and_send(&self, call: ChainCall) -> Result<TransactionHash, ChainError> {
		self.implementation.simulate_and_send(call).await
	}

	/// Waits for a transaction's receipt.
	pub async fn wait_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, ChainError> {
		self.implementation.wait_receipt(hash).await
	}

	/// Reads `nextOrderId()`.
	pub async fn next_order_id(&self) -> Result<u64, ChainError> {
		self.implementation.next_order_id().await
	}

	/// Reads `processedAGIsLength()`.
	pub async fn processed_agis_length(&self) -> Result<u64, ChainError> {
		self.implementation.processed_agis_length().await
	}

	/// Reads `getProcessedAGIs(start, end)`.
	pub async fn get_processed_agis(&self, start: u64, end: u64) -> Result<Vec<u64>, ChainError> {
		self.implementation.get_processed_agis(start, end).await
	}

	/// Reads the ERC-20 allowance for `owner` → `spender` on `token`.
	pub async fn erc20_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		self
			.implementation
			.erc20_allowance(token, owner, spender)
			.await
	}

	/// Starts watching for `AGIPublished` events.
	pub async fn watch_agi_published(
		&self,
	) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError> {
		self.implementation.watch_agi_published().await
	}

	/// Stops a subscription.
	pub async fn unwatch(&self, handle: WatchHandle) -> Result<(), ChainError> {
		self.implementation.unwatch(handle).await
	}
}
