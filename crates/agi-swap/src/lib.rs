//! Swap capability for the AGI solver system.
//!
//! Wraps an external DEX aggregator. The Swap Coordinator in the core calls
//! into this capability to convert a withdrawn asset into the asset an
//! intent wants to buy; this crate knows nothing about intents, retries, or
//! idempotency — that belongs entirely to the caller.

use agi_types::{ConfigSchema, ImplementationRegistry};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;

/// Re-export implementations.
pub mod implementations {
	pub mod http_aggregator;
	pub mod mock;
}

/// Errors that can occur once a swap request has reached the capability.
///
/// Errors raised before this point (amount parsing, zero-address checks) are
/// the caller's concern and must not be wrapped in this type.
#[derive(Debug, Error)]
pub enum SwapError {
	/// Error that occurs during network communication with the aggregator.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when the aggregator has no route with enough depth.
	#[error("Insufficient liquidity: {0}")]
	InsufficientLiquidity(String),
	/// Error that occurs when the realized price falls outside the slippage tolerance.
	#[error("Slippage exceeded: {0}")]
	SlippageExceeded(String),
	/// Error that occurs when the aggregator rejects the request outright.
	#[error("Swap rejected: {0}")]
	Rejected(String),
}

/// A request to quote or execute a single-hop swap.
#[derive(Debug, Clone)]
pub struct SwapRequest {
	pub from_token: Address,
	pub to_token: Address,
	pub from_amount: U256,
	pub from_address: Address,
	pub slippage: f64,
}

/// Trait defining the interface for swap implementations.
///
/// This trait must be implemented by any aggregator integration that wants
/// to integrate with the solver system.
#[async_trait]
pub trait SwapInterface: Send + Sync {
	/// Returns the configuration schema for this swap implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Estimates the amount to buy for a request without committing to it.
	async fn quote(&self, request: &SwapRequest) -> Result<U256, SwapError>;

	/// Executes the swap and returns the amount actually bought.
	async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError>;
}

/// Type alias for swap factory functions.
pub type SwapFactory = fn(&toml::Value) -> Result<Box<dyn SwapInterface>, SwapError>;

/// Registry trait for swap implementations.
pub trait SwapRegistry: ImplementationRegistry<Factory = SwapFactory> {}

/// Get all registered swap implementations.
pub fn get_all_implementations() -> Vec<(&'static str, SwapFactory)> {
	use implementations::{http_aggregator, mock};

	vec![
		(mock::Registry::NAME, mock::Registry::factory()),
		(
			http_aggregator::Registry::NAME,
			http_aggregator::Registry::factory(),
		),
	]
}

/// Service that wraps a single swap implementation for use by the core.
pub struct SwapService {
	implementation: Box<dyn SwapInterface>,
}

impl SwapService {
	/// Creates a new SwapService with the specified implementation.
	pub fn new(implementation: Box<dyn SwapInterface>) -> Self {
		Self { implementation }
	}

	/// Estimates the amount to buy for a request without committing to it.
	pub async fn quote(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		self.implementation.quote(request).await
	}

	/// Executes the swap and returns the amount actually bought.
	pub async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		self.implementation.execute(request).await
	}
}
