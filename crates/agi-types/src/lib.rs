//! Common types module for the AGI solver system.
//!
//! This module defines the core data types and structures used throughout
//! the solver: the account/signing types, the chain-facing transaction
//! types, the intent state model, and the configuration validation
//! framework shared by every capability crate.

/// Account-related types for managing solver identities and signatures.
pub mod account;
/// Chain-facing types: transaction hashes and receipts.
pub mod chain;
/// Intent state model: `Intent`, `ExtendedStatus`, `IntentProgress`, `SwapRecord`.
pub mod intent;
/// Secure string type for private keys and other secrets.
pub mod secret_string;
/// Implementation registry trait used by every capability crate.
pub mod registry;
/// Utility functions for common type conversions.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use account::{Signature, Transaction};
pub use alloy_primitives::{Address, U256};
pub use chain::{ReceiptStatus, TransactionHash, TransactionReceipt};
pub use intent::{
	AgiPublished, ExtendedStatus, FailedSwapRecord, Intent, IntentProgress, OrderStatus,
	SwapPhase, SwapRecord, TRADE_INTENT_TYPE,
};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use utils::{format_token_amount, truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::{ConfigSchema, Field, FieldType, Schema, ValidationError};
