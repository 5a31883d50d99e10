//! Deterministic in-memory swap implementation for local development and tests.
//!
//! Applies a fixed exchange rate (configurable per token-pair) and the
//! caller's slippage tolerance, with no network calls.

use crate::{SwapError, SwapFactory, SwapInterface, SwapRegistry, SwapRequest};
use agi_types::{ConfigSchema, ImplementationRegistry, ValidationError};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the mock swap implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockSwapConfig {
	/// Per-pair exchange rates, keyed by "fromToken-toToken" (lowercase hex), as
	/// `toAmount / fromAmount`. Pairs not listed use `default_rate`.
	#[serde(default)]
	pub rates: HashMap<String, f64>,
	/// Exchange rate used for any pair not present in `rates`.
	#[serde(default = "default_rate")]
	pub default_rate: f64,
	/// Token pairs, keyed the same way as `rates`, that should always fail
	/// with `InsufficientLiquidity`. Useful for exercising the retry path.
	#[serde(default)]
	pub starved_pairs: Vec<String>,
}

fn default_rate() -> f64 {
	1.0
}

impl ConfigSchema for MockSwapConfig {
	fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
		if self.default_rate <= 0.0 {
			return Err(ValidationError::InvalidValue {
				field: "default_rate".to_string(),
				message: "default_rate must be positive".to_string(),
			});
		}
		Ok(())
	}
}

/// Mock swap implementation.
pub struct MockSwap {
	config: MockSwapConfig,
}

impl MockSwap {
	pub fn new(config: MockSwapConfig) -> Self {
		Self { config }
	}

	fn pair_key(from_token: Address, to_token: Address) -> String {
		format!("{:#x}-{:#x}", from_token, to_token)
	}

	fn rate_for(&self, from_token: Address, to_token: Address) -> f64 {
		let key = Self::pair_key(from_token, to_token);
		*self.config.rates.get(&key).unwrap_or(&self.config.default_rate)
	}

	fn amount_out(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		let key = Self::pair_key(request.from_token, request.to_token);
		if self.config.starved_pairs.contains(&key) {
			return Err(SwapError::InsufficientLiquidity(format!(
				"no route configured for {key}"
			)));
		}

		let rate = self.rate_for(request.from_token, request.to_token);
		let tolerance = 1.0 - request.slippage.clamp(0.0, 1.0);
		let effective_rate = rate * tolerance;

		// U256 has no native floating-point multiply; scale by a fixed-point
		// factor to keep the mock deterministic without losing precision for
		// realistic rates and amounts.
		const SCALE: u64 = 1_000_000;
		let scaled_rate = (effective_rate * SCALE as f64).round() as u64;
		let amount_out = request
			.from_amount
			.saturating_mul(U256::from(scaled_rate))
			/ U256::from(SCALE);

		Ok(amount_out)
	}
}

#[async_trait]
impl SwapInterface for MockSwap {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(self.config.clone())
	}

	async fn quote(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		self.amount_out(request)
	}

	async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		self.amount_out(request)
	}
}

/// Registry for the mock swap implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = SwapFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn SwapInterface>, SwapError> {
			let mock_config: MockSwapConfig = config
				.clone()
				.try_into()
				.map_err(|e| SwapError::Rejected(format!("invalid mock swap config: {e}")))?;
			mock_config
				.validate(config)
				.map_err(|e| SwapError::Rejected(e.to_string()))?;
			Ok(Box::new(MockSwap::new(mock_config)))
		}
	}
}

impl SwapRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	#[tokio::test]
	async fn default_rate_applies_with_no_slippage() {
		let swap = MockSwap::new(MockSwapConfig::default());
		let request = SwapRequest {
			from_token: addr(1),
			to_token: addr(2),
			from_amount: U256::from(1_000u64),
			from_address: addr(3),
			slippage: 0.0,
		};
		let amount = swap.execute(&request).await.unwrap();
		assert_eq!(amount, U256::from(1_000u64));
	}

	#[tokio::test]
	async fn slippage_reduces_output() {
		let swap = MockSwap::new(MockSwapConfig::default());
		let request = SwapRequest {
			from_token: addr(1),
			to_token: addr(2),
			from_amount: U256::from(1_000u64),
			from_address: addr(3),
			slippage: 0.05,
		};
		let amount = swap.execute(&request).await.unwrap();
		assert_eq!(amount, U256::from(950u64));
	}

	#[tokio::test]
	async fn starved_pair_fails_with_insufficient_liquidity() {
		let from_token = addr(1);
		let to_token = addr(2);
		let mut config = MockSwapConfig::default();
		config
			.starved_pairs
			.push(MockSwap::pair_key(from_token, to_token));
		let swap = MockSwap::new(config);
		let request = SwapRequest {
			from_token,
			to_token,
			from_amount: U256::from(1_000u64),
			from_address: addr(3),
			slippage: 0.0,
		};
		let result = swap.execute(&request).await;
		assert!(matches!(result, Err(SwapError::InsufficientLiquidity(_))));
	}
}
