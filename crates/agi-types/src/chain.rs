//! Shared chain-facing types used by the `agi-chain` capability and the core
//! transaction executor.

use serde::{Deserialize, Serialize};

/// A transaction hash, kept as raw bytes so callers can format it however
/// they like (hex for logs, bytes for storage).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl TransactionHash {
	pub fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(&self.0))
	}
}

/// Whether a mined transaction succeeded or reverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
	Success,
	Reverted,
}

/// The outcome of waiting for a transaction to be mined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
	pub hash: TransactionHash,
	pub status: ReceiptStatus,
	pub block_number: u64,
}
