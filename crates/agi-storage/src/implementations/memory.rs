//! In-memory FailedSwaps store, for tests.
//!
//! No persistence across restarts; useful wherever a `FailedSwapsStore` is
//! needed but a real SQLite file isn't, such as unit tests for the Reconciler
//! and Retry Policy.

use crate::{FailedSwapsStore, StorageError, StorageFactory, StorageRegistry};
use agi_types::{ConfigSchema, FailedSwapRecord, ImplementationRegistry, Schema};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory FailedSwaps store implementation.
#[derive(Default)]
pub struct MemoryStorage {
	records: RwLock<HashMap<u64, FailedSwapRecord>>,
}

impl MemoryStorage {
	/// Creates a new, empty MemoryStorage instance.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl FailedSwapsStore for MemoryStorage {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn record(&self, record: FailedSwapRecord) -> Result<(), StorageError> {
		let mut records = self.records.write().await;
		records.entry(record.agi_id).or_insert(record);
		Ok(())
	}

	async fn delete(&self, agi_id: u64) -> Result<(), StorageError> {
		let mut records = self.records.write().await;
		records.remove(&agi_id);
		Ok(())
	}

	async fn list(&self) -> Result<Vec<FailedSwapRecord>, StorageError> {
		let records = self.records.read().await;
		Ok(records.values().cloned().collect())
	}
}

/// Configuration schema for MemoryStorage; takes no fields.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), agi_types::ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Registry for the memory FailedSwaps store.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn FailedSwapsStore>, StorageError> {
			MemoryStorageSchema
				.validate(config)
				.map_err(|e| StorageError::Configuration(e.to_string()))?;
			Ok(Box::new(MemoryStorage::new()))
		}
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_types::Address;

	fn sample(agi_id: u64) -> FailedSwapRecord {
		FailedSwapRecord {
			timestamp: 1_700_000_000,
			agi_id,
			error_message: format!("Swap failed for AGI {agi_id} at attempt 2"),
			intent_type: 0,
			asset_to_sell: Address::repeat_byte(1),
			amount_to_sell: agi_types::U256::from(100u64),
			asset_to_buy: Address::repeat_byte(2),
			order_id: agi_id,
			order_status: 1,
		}
	}

	#[tokio::test]
	async fn record_then_list_round_trips() {
		let store = MemoryStorage::new();
		store.record(sample(9)).await.unwrap();
		let records = store.list().await.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].agi_id, 9);
	}

	#[tokio::test]
	async fn record_is_insert_or_ignore() {
		let store = MemoryStorage::new();
		store.record(sample(9)).await.unwrap();
		let mut second = sample(9);
		second.error_message = "overwritten".to_string();
		store.record(second).await.unwrap();

		let records = store.list().await.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(
			records[0].error_message,
			"Swap failed for AGI 9 at attempt 2"
		);
	}

	#[tokio::test]
	async fn delete_is_noop_if_absent() {
		let store = MemoryStorage::new();
		store.delete(42).await.unwrap();
		assert!(store.list().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn delete_removes_recorded_entry() {
		let store = MemoryStorage::new();
		store.record(sample(9)).await.unwrap();
		store.delete(9).await.unwrap();
		assert!(store.list().await.unwrap().is_empty());
	}
}
