//! Account-related types shared between the signing capability and the chain
//! capability.

use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

pub use alloy_primitives::Address;

/// An unsigned transaction ready to be signed by an [`crate::account`]
/// implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
	pub chain_id: u64,
	pub nonce: Option<u64>,
	pub gas_limit: Option<u64>,
}

/// A signature produced by signing a [`Transaction`] or an arbitrary message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
	pub r: U256,
	pub s: U256,
	pub v: u64,
	pub raw: Bytes,
}
