//! DEX aggregator swap implementation over HTTP.
//!
//! Issues requests to a configured aggregator endpoint (a 1inch/0x-style
//! `/quote` and `/swap` API) and translates its response into an
//! `amountToBuy`. This implementation does not itself sign or submit
//! anything on-chain; the returned amount is handed back to the Swap
//! Coordinator, which drives the deposit through the chain capability.

use crate::{SwapError, SwapFactory, SwapInterface, SwapRegistry, SwapRequest};
use agi_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the HTTP aggregator swap implementation.
#[derive(Debug, Clone)]
pub struct HttpAggregatorConfig {
	pub endpoint: String,
	pub api_key: Option<String>,
	pub timeout_ms: u64,
}

impl ConfigSchema for HttpAggregatorConfig {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("endpoint", FieldType::String)],
			vec![
				Field::new("api_key", FieldType::String),
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Response shape returned by the aggregator's `/quote` and `/swap` endpoints.
#[derive(Debug, Deserialize)]
struct AggregatorResponse {
	#[serde(rename = "toAmount")]
	to_amount: String,
}

/// Error body returned by the aggregator when a request cannot be routed.
#[derive(Debug, Deserialize)]
struct AggregatorErrorBody {
	error: String,
}

/// HTTP-backed DEX aggregator implementation.
pub struct HttpAggregatorSwap {
	config: HttpAggregatorConfig,
	client: reqwest::Client,
}

impl HttpAggregatorSwap {
	pub fn new(config: HttpAggregatorConfig) -> Result<Self, SwapError> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_millis(config.timeout_ms))
			.build()
			.map_err(|e| SwapError::Network(format!("failed to build http client: {e}")))?;
		Ok(Self { config, client })
	}

	async fn call(&self, path: &str, request: &SwapRequest) -> Result<U256, SwapError> {
		let mut builder = self
			.client
			.get(format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path))
			.query(&[
				("fromTokenAddress", format!("{:#x}", request.from_token)),
				("toTokenAddress", format!("{:#x}", request.to_token)),
				("amount", request.from_amount.to_string()),
				("fromAddress", format!("{:#x}", request.from_address)),
				("slippage", request.slippage.to_string()),
			]);

		if let Some(api_key) = &self.config.api_key {
			builder = builder.bearer_auth(api_key);
		}

		let response = builder
			.send()
			.await
			.map_err(|e| SwapError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response
				.json::<AggregatorErrorBody>()
				.await
				.map(|b| b.error)
				.unwrap_or_else(|_| status.to_string());

			return Err(classify_aggregator_error(status.as_u16(), &body));
		}

		let parsed: AggregatorResponse = response
			.json()
			.await
			.map_err(|e| SwapError::Network(format!("invalid aggregator response: {e}")))?;

		parsed
			.to_amount
			.parse::<U256>()
			.map_err(|e| SwapError::Network(format!("invalid toAmount '{}': {e}", parsed.to_amount)))
	}
}

/// Maps an aggregator's HTTP status and error message onto a `SwapError`
/// variant. Aggregators differ in exact wording, so this matches on
/// conventional substrings rather than a fixed error code.
fn classify_aggregator_error(status: u16, message: &str) -> SwapError {
	let lower = message.to_lowercase();
	if lower.contains("liquidity") {
		SwapError::InsufficientLiquidity(message.to_string())
	} else if lower.contains("slippage") {
		SwapError::SlippageExceeded(message.to_string())
	} else if status == 400 || status == 403 {
		SwapError::Rejected(message.to_string())
	} else {
		SwapError::Network(format!("aggregator returned {status}: {message}"))
	}
}

#[async_trait]
impl SwapInterface for HttpAggregatorSwap {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(self.config.clone())
	}

	async fn quote(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		self.call("quote", request).await
	}

	async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		self.call("swap", request).await
	}
}

/// Registry for the HTTP aggregator swap implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http_aggregator";
	type Factory = SwapFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn SwapInterface>, SwapError> {
			let schema = HttpAggregatorConfig {
				endpoint: String::new(),
				api_key: None,
				timeout_ms: 5000,
			};
			schema
				.validate(config)
				.map_err(|e| SwapError::Rejected(e.to_string()))?;

			let endpoint = config
				.get("endpoint")
				.and_then(|v| v.as_str())
				.ok_or_else(|| SwapError::Rejected("endpoint is required".to_string()))?
				.to_string();
			let api_key = config
				.get("api_key")
				.and_then(|v| v.as_str())
				.map(|s| s.to_string());
			let timeout_ms = config
				.get("timeout_ms")
				.and_then(|v| v.as_integer())
				.unwrap_or(5000) as u64;

			HttpAggregatorSwap::new(HttpAggregatorConfig {
				endpoint,
				api_key,
				timeout_ms,
			})
			.map(|swap| Box::new(swap) as Box<dyn SwapInterface>)
		}
	}
}

impl SwapRegistry for Registry {}
