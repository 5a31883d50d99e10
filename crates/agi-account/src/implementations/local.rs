//! Local, private-key-backed account implementation.
//!
//! Holds a single `PrivateKeySigner` in memory and signs with it directly.
//! Suitable for development and for solvers that manage their own key
//! material; a KMS- or hardware-wallet-backed implementation would satisfy
//! the same `AccountInterface` without any change to the core.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use agi_types::{
	Address as AgiAddress, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, Signature as AgiSignature, Transaction as AgiTransaction, ValidationError,
};
use alloy_consensus::{SignableTransaction, TxEip1559};
use alloy_network::TxSignerSync;
use alloy_primitives::TxKind;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

/// Account implementation backed by a single in-memory private key.
pub struct LocalAccount {
	signer: PrivateKeySigner,
	private_key_hex: SecretString,
}

impl LocalAccount {
	pub fn new(private_key_hex: &str) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key_hex
			.parse()
			.map_err(|e| AccountError::InvalidKey(format!("{e}")))?;
		Ok(Self {
			signer,
			private_key_hex: SecretString::from(agi_types::with_0x_prefix(private_key_hex).as_str()),
		})
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAccountSchema)
	}

	async fn address(&self) -> Result<AgiAddress, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_transaction(&self, tx: &AgiTransaction) -> Result<AgiSignature, AccountError> {
		let mut unsigned = TxEip1559 {
			chain_id: tx.chain_id,
			nonce: tx.nonce.unwrap_or_default(),
			gas_limit: tx.gas_limit.unwrap_or(500_000),
			to: TxKind::Call(tx.to),
			value: tx.value,
			input: tx.data.clone(),
			..Default::default()
		};
		let signer = self.signer.clone().with_chain_id(Some(tx.chain_id));
		let sig = signer
			.sign_transaction_sync(&mut unsigned)
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		Ok(AgiSignature {
			r: sig.r(),
			s: sig.s(),
			v: sig.v() as u64,
			raw: sig.as_bytes().to_vec().into(),
		})
	}

	async fn sign_message(&self, message: &[u8]) -> Result<AgiSignature, AccountError> {
		let sig = self
			.signer
			.sign_message(message)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		Ok(AgiSignature {
			r: sig.r(),
			s: sig.s(),
			v: sig.v() as u64,
			raw: sig.as_bytes().to_vec().into(),
		})
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key_hex.clone()
	}
}

/// Configuration schema for the local account implementation.
pub struct LocalAccountSchema;

impl ConfigSchema for LocalAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::String)],
			vec![],
		);
		schema.validate(config)
	}
}

/// Registers the local account implementation with the factory registry.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_local_account
	}
}

impl AccountRegistry for Registry {}

fn create_local_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalAccountSchema
		.validate(config)
		.map_err(|e| AccountError::Implementation(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::Implementation("private_key is required".to_string()))?;

	Ok(Box::new(LocalAccount::new(private_key)?))
}
