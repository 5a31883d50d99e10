//! Configuration module for the AGI solver system.
//!
//! This module provides structures and utilities for managing solver configuration.
//! It supports loading configuration from TOML files and provides validation to ensure
//! all required configuration values are properly set.

pub mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Top-level configuration for the AGI solver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity and scheduling parameters for the queue manager.
	pub solver: SolverConfig,
	/// The escrow contract and RPC transport.
	pub chain: ChainConfig,
	/// The DEX aggregator capability.
	pub swap: SwapConfig,
	/// The solver's signing identity.
	pub account: AccountConfig,
	/// The FailedSwaps durable store.
	pub storage: StorageConfig,
}

fn default_check_interval_ms() -> u64 {
	2000
}
fn default_retry_delay_ms() -> u64 {
	1000
}
fn default_swap_retry_delay_ms() -> u64 {
	30_000
}
fn default_max_retries() -> u32 {
	2
}
fn default_slippage() -> f64 {
	0.05
}

/// Scheduling and retry parameters for the AGI Queue Manager (§6 of the
/// configuration table).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
	/// Unique identifier for this solver instance.
	pub id: String,
	/// Queue ticker period, in milliseconds.
	#[serde(default = "default_check_interval_ms")]
	pub check_interval_ms: u64,
	/// Delay after a successful step or a non-swap error, in milliseconds.
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Delay after a swap-class error, in milliseconds.
	#[serde(default = "default_swap_retry_delay_ms")]
	pub swap_retry_delay_ms: u64,
	/// Swap-error ceiling before an intent is evicted to FailedSwaps.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// Default slippage tolerance passed to the Swap capability.
	#[serde(default = "default_slippage")]
	pub default_slippage: f64,
}

fn default_min_confirmations() -> u64 {
	1
}
fn default_receipt_poll_interval_ms() -> u64 {
	3000
}
fn default_receipt_poll_max_attempts() -> u32 {
	1000
}

/// Configuration for the escrow contract and its RPC transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// HTTP RPC endpoint used for reads, simulation, and submission.
	pub rpc_http_url: String,
	/// WebSocket RPC endpoint used for event subscriptions, if configured.
	pub rpc_ws_url: Option<String>,
	/// Address of the escrow contract.
	pub contract_address: String,
	/// Chain ID the escrow contract is deployed on.
	pub chain_id: u64,
	/// Confirmations required before a receipt is considered final.
	#[serde(default = "default_min_confirmations")]
	pub min_confirmations: u64,
	/// Poll interval while waiting for a transaction receipt, in milliseconds.
	#[serde(default = "default_receipt_poll_interval_ms")]
	pub receipt_poll_interval_ms: u64,
	/// Maximum number of receipt polls before giving up on a single wait.
	#[serde(default = "default_receipt_poll_max_attempts")]
	pub receipt_poll_max_attempts: u32,
}

/// Configuration for the Swap capability.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwapConfig {
	/// Which implementation to use (e.g. "mock", "http_aggregator").
	pub primary: String,
	/// Per-implementation configuration, keyed by implementation name.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the signing identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// The type of account provider to use (e.g. "local").
	pub provider: String,
	/// Provider-specific configuration parameters as raw TOML values.
	pub config: toml::Value,
}

/// Configuration for the FailedSwaps durable store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary (e.g. "sqlite", "memory").
	pub primary: String,
	/// Per-implementation configuration, keyed by implementation name.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable `VAR_NAME`.
/// Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).unwrap();
		let var_name = cap.get(1).unwrap().as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => {
				if let Some(default) = default_value {
					default.to_string()
				} else {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			}
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(*start..*end, &value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file at the specified path.
	///
	/// Environment variables can be referenced using:
	/// - `${VAR_NAME}` - Required environment variable
	/// - `${VAR_NAME:-default}` - With default value if not set
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let resolved = resolve_env_vars(&content)?;
		resolved.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.solver.id.is_empty() {
			return Err(ConfigError::Validation("Solver ID cannot be empty".into()));
		}
		if self.solver.check_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"solver.check_interval_ms must be greater than 0".into(),
			));
		}
		if self.solver.max_retries == 0 {
			return Err(ConfigError::Validation(
				"solver.max_retries must be at least 1".into(),
			));
		}
		if !(0.0..1.0).contains(&self.solver.default_slippage) {
			return Err(ConfigError::Validation(
				"solver.default_slippage must be in [0, 1)".into(),
			));
		}

		if self.chain.rpc_http_url.is_empty() {
			return Err(ConfigError::Validation(
				"chain.rpc_http_url cannot be empty".into(),
			));
		}
		if self.chain.contract_address.is_empty() {
			return Err(ConfigError::Validation(
				"chain.contract_address cannot be empty".into(),
			));
		}
		if self.chain.receipt_poll_max_attempts == 0 {
			return Err(ConfigError::Validation(
				"chain.receipt_poll_max_attempts must be greater than 0".into(),
			));
		}

		if self.swap.primary.is_empty() {
			return Err(ConfigError::Validation(
				"swap.primary cannot be empty".into(),
			));
		}
		if !self.swap.implementations.contains_key(&self.swap.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary swap implementation '{}' not found in swap.implementations",
				self.swap.primary
			)));
		}

		if self.account.provider.is_empty() {
			return Err(ConfigError::Validation(
				"account.provider cannot be empty".into(),
			));
		}

		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"storage.primary cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage implementation '{}' not found in storage.implementations",
				self.storage.primary
			)));
		}
		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is automatically
/// validated after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_config(id: &str) -> String {
		format!(
			r#"
[solver]
id = "{id}"
check_interval_ms = 2000
max_retries = 2

[chain]
rpc_http_url = "http://localhost:8545"
contract_address = "0x1234567890123456789012345678901234567890"
chain_id = 31337

[swap]
primary = "mock"
[swap.implementations.mock]

[account]
provider = "local"
[account.config]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[storage]
primary = "memory"
[storage.implementations.memory]
"#
		)
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_HOST", "localhost");
		std::env::set_var("TEST_PORT", "5432");

		let input = "host = \"${TEST_HOST}:${TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("TEST_HOST");
		std::env::remove_var("TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("TEST_SOLVER_ID", "test-solver");
		let config_str = sample_config("${TEST_SOLVER_ID}");
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.solver.id, "test-solver");
		std::env::remove_var("TEST_SOLVER_ID");
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = sample_config("solver-1").parse().unwrap();
		assert_eq!(config.solver.swap_retry_delay_ms, 30_000);
		assert_eq!(config.solver.retry_delay_ms, 1000);
		assert_eq!(config.chain.receipt_poll_interval_ms, 3000);
		assert_eq!(config.chain.receipt_poll_max_attempts, 1000);
	}

	#[test]
	fn test_rejects_unknown_primary_swap() {
		let mut bad = sample_config("solver-1").replace("primary = \"mock\"", "primary = \"dex\"");
		// replace() above also touches storage.primary if it matched "mock"; it
		// doesn't here, so only swap.primary changes.
		bad.push('\n');
		let result: Result<Config, _> = bad.parse();
		assert!(result.is_err());
	}
}
