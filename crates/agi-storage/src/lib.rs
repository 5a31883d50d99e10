//! FailedSwaps capability for the AGI solver system.
//!
//! This is the solver's only durable state: a record of intents evicted after
//! exhausting swap retries (§4.3/§7). The queue itself is never persisted —
//! it is reconstructed on startup by the Admission Source from the contract's
//! own backlog.

use agi_types::{ConfigSchema, FailedSwapRecord, ImplementationRegistry};
use async_trait::async_trait;
use thiserror::Error;

/// Re-export implementations.
pub mod implementations {
	pub mod memory;
	pub mod sqlite;
}

/// Errors that can occur during FailedSwaps operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs in the storage backend (connection, query, I/O).
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for the FailedSwaps store.
///
/// Implementations must make `record` idempotent on `agi_id` (insert-or-ignore:
/// a second `record` for an already-present id is a no-op, not an overwrite —
/// the first recorded attempt count is what operators see) and `delete`
/// no-op-if-absent.
#[async_trait]
pub trait FailedSwapsStore: Send + Sync {
	/// Returns the configuration schema for this store implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Persists a failure record, keyed by `agi_id`. A no-op if a record for
	/// that id already exists.
	async fn record(&self, record: FailedSwapRecord) -> Result<(), StorageError>;

	/// Removes the record for `agi_id`, if any. A no-op if absent.
	async fn delete(&self, agi_id: u64) -> Result<(), StorageError>;

	/// Lists every currently recorded failure, for `FailedSwapReport`.
	async fn list(&self) -> Result<Vec<FailedSwapRecord>, StorageError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn FailedSwapsStore>, StorageError>;

/// Registry trait for FailedSwaps store implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered FailedSwaps store implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{memory, sqlite};

	vec![
		(sqlite::Registry::NAME, sqlite::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service that wraps a single FailedSwaps store implementation for use by
/// the core.
pub struct StorageService {
	backend: Box<dyn FailedSwapsStore>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn FailedSwapsStore>) -> Self {
		Self { backend }
	}

	/// Persists a failure record, keyed by `agi_id`.
	pub async fn record(&self, record: FailedSwapRecord) -> Result<(), StorageError> {
		self.backend.record(record).await
	}

	/// Removes the record for `agi_id`, if any.
	pub async fn delete(&self, agi_id: u64) -> Result<(), StorageError> {
		self.backend.delete(agi_id).await
	}

	/// Lists every currently recorded failure.
	pub async fn list(&self) -> Result<Vec<FailedSwapRecord>, StorageError> {
		self.backend.list().await
	}
}
