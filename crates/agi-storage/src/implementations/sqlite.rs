//! SQLite-backed FailedSwaps store.
//!
//! Schema: `timestamp INTEGER, agi_id INTEGER PRIMARY KEY, error_message TEXT,
//! intent_type INTEGER, asset_to_sell TEXT, amount_to_sell TEXT,
//! asset_to_buy TEXT, order_id INTEGER, order_status INTEGER`. `amount_to_sell`
//! is stored as decimal text to preserve the full 256-bit value.

use crate::{FailedSwapsStore, StorageError, StorageFactory, StorageRegistry};
use agi_types::{Address, ConfigSchema, FailedSwapRecord, ImplementationRegistry, Schema, U256};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Configuration for the SQLite FailedSwaps store.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
	pub path: String,
}

impl ConfigSchema for SqliteConfig {
	fn validate(&self, config: &toml::Value) -> Result<(), agi_types::ValidationError> {
		let schema = Schema::new(
			vec![agi_types::Field::new("path", agi_types::FieldType::String)],
			vec![],
		);
		schema.validate(config)
	}
}

/// SQLite-backed implementation of [`FailedSwapsStore`].
pub struct SqliteStorage {
	pool: SqlitePool,
}

impl SqliteStorage {
	/// Opens (creating if necessary) the SQLite database at `path` and
	/// ensures the `failed_swaps` table exists.
	pub async fn connect(path: &str) -> Result<Self, StorageError> {
		let options = SqliteConnectOptions::from_str(path)
			.map_err(|e| StorageError::Configuration(format!("invalid sqlite path: {e}")))?
			.create_if_missing(true);

		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		sqlx::query(
			"CREATE TABLE IF NOT EXISTS failed_swaps (
				timestamp INTEGER NOT NULL,
				agi_id INTEGER PRIMARY KEY,
				error_message TEXT NOT NULL,
				intent_type INTEGER NOT NULL,
				asset_to_sell TEXT NOT NULL,
				amount_to_sell TEXT NOT NULL,
				asset_to_buy TEXT NOT NULL,
				order_id INTEGER NOT NULL,
				order_status INTEGER NOT NULL
			)",
		)
		.execute(&pool)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(Self { pool })
	}
}

#[async_trait]
impl FailedSwapsStore for SqliteStorage {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SqliteConfig {
			path: String::new(),
		})
	}

	async fn record(&self, record: FailedSwapRecord) -> Result<(), StorageError> {
		sqlx::query(
			"INSERT OR IGNORE INTO failed_swaps
			(timestamp, agi_id, error_message, intent_type, asset_to_sell,
			 amount_to_sell, asset_to_buy, order_id, order_status)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(record.timestamp as i64)
		.bind(record.agi_id as i64)
		.bind(&record.error_message)
		.bind(record.intent_type as i64)
		.bind(format!("{:#x}", record.asset_to_sell))
		.bind(record.amount_to_sell.to_string())
		.bind(format!("{:#x}", record.asset_to_buy))
		.bind(record.order_id as i64)
		.bind(record.order_status as i64)
		.execute(&self.pool)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, agi_id: u64) -> Result<(), StorageError> {
		sqlx::query("DELETE FROM failed_swaps WHERE agi_id = ?")
			.bind(agi_id as i64)
			.execute(&self.pool)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn list(&self) -> Result<Vec<FailedSwapRecord>, StorageError> {
		let rows = sqlx::query(
			"SELECT timestamp, agi_id, error_message, intent_type, asset_to_sell,
			 amount_to_sell, asset_to_buy, order_id, order_status
			 FROM failed_swaps",
		)
		.fetch_all(&self.pool)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;

		let mut records = Vec::with_capacity(rows.len());
		for row in rows {
			let asset_to_sell: String = row.get("asset_to_sell");
			let asset_to_buy: String = row.get("asset_to_buy");
			let amount_to_sell: String = row.get("amount_to_sell");

			records.push(FailedSwapRecord {
				timestamp: row.get::<i64, _>("timestamp") as u64,
				agi_id: row.get::<i64, _>("agi_id") as u64,
				error_message: row.get("error_message"),
				intent_type: row.get::<i64, _>("intent_type") as u8,
				asset_to_sell: parse_address(&asset_to_sell)?,
				amount_to_sell: parse_u256(&amount_to_sell)?,
				asset_to_buy: parse_address(&asset_to_buy)?,
				order_id: row.get::<i64, _>("order_id") as u64,
				order_status: row.get::<i64, _>("order_status") as u8,
			});
		}

		Ok(records)
	}
}

fn parse_address(text: &str) -> Result<Address, StorageError> {
	Address::from_str(text)
		.map_err(|e| StorageError::Backend(format!("corrupt address '{text}': {e}")))
}

fn parse_u256(text: &str) -> Result<U256, StorageError> {
	U256::from_str(text)
		.map_err(|e| StorageError::Backend(format!("corrupt amount '{text}': {e}")))
}

/// Registry for the SQLite FailedSwaps store.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "sqlite";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn FailedSwapsStore>, StorageError> {
			let schema = SqliteConfig {
				path: String::new(),
			};
			schema
				.validate(config)
				.map_err(|e| StorageError::Configuration(e.to_string()))?;

			let path = config
				.get("path")
				.and_then(|v| v.as_str())
				.ok_or_else(|| StorageError::Configuration("path is required".to_string()))?
				.to_string();

			// `connect` is async; implementation factories are sync, so the
			// actual pool is established lazily on first use via a blocking
			// handoff is not available here. Instead the connection happens
			// eagerly using the current Tokio runtime, mirroring how the
			// teacher's account providers resolve network state at factory time.
			tokio::task::block_in_place(|| {
				tokio::runtime::Handle::current().block_on(SqliteStorage::connect(&path))
			})
			.map(|storage| Box::new(storage) as Box<dyn FailedSwapsStore>)
		}
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_types::FailedSwapRecord;

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	async fn temp_store() -> SqliteStorage {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("failed_swaps.db");
		// leak the tempdir so the file outlives this function
		std::mem::forget(dir);
		SqliteStorage::connect(path.to_str().unwrap()).await.unwrap()
	}

	fn sample(agi_id: u64) -> FailedSwapRecord {
		FailedSwapRecord {
			timestamp: 1_700_000_000,
			agi_id,
			error_message: format!("Swap failed for AGI {agi_id} at attempt 2"),
			intent_type: 0,
			asset_to_sell: addr(1),
			amount_to_sell: U256::from(100u64),
			asset_to_buy: addr(2),
			order_id: agi_id,
			order_status: 1,
		}
	}

	#[tokio::test]
	async fn record_then_list_round_trips() {
		let store = temp_store().await;
		store.record(sample(9)).await.unwrap();
		let records = store.list().await.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].agi_id, 9);
		assert_eq!(records[0].amount_to_sell, U256::from(100u64));
	}

	#[tokio::test]
	async fn record_is_insert_or_ignore() {
		let store = temp_store().await;
		store.record(sample(9)).await.unwrap();
		let mut second = sample(9);
		second.error_message = "a different message".to_string();
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
		let store = temp_store().await;
		store.delete(42).await.unwrap();
		assert!(store.list().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn delete_removes_recorded_entry() {
		let store = temp_store().await;
		store.record(sample(9)).await.unwrap();
		store.delete(9).await.unwrap();
		assert!(store.list().await.unwrap().is_empty());
	}
}
