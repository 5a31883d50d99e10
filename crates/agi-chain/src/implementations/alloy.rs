//! Alloy-based implementation of the chain capability.
//!
//! Talks to a single escrow contract over HTTP for reads, simulation, and
//! submission, and over WebSocket (falling back to log polling when no
//! WebSocket endpoint is configured) for `AGIPublished` events.

use crate::{ChainCall, ChainError, ChainInterface, WatchHandle};
use agi_account::AccountService;
use agi_types::{
	AgiPublished, ConfigSchema, Field, FieldType, Intent, OrderStatus, ReceiptStatus, Schema,
	Signature as AgiSignature, Transaction as AgiTransaction, TransactionHash, TransactionReceipt,
};
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, FixedBytes, Signature as PrimitiveSignature, TxKind, U256};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types::{Filter, TransactionRequest};
use alloy_sol_types::{sol, SolCall, SolEvent};
use alloy_transport_http::Http;
use alloy_transport_ws::WsConnect;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

sol! {
	function viewAGI(uint256 orderId) external view returns (
		uint8 intentType,
		address assetToSell,
		uint256 amountToSell,
		address assetToBuy,
		uint256 orderId,
		uint8 orderStatus
	);
	function withdrawAsset(uint256 orderId) external;
	function depositAsset(uint256 orderId, uint256 amount) external;
	function nextOrderId() external view returns (uint256 next);
	function processedAGIsLength() external view returns (uint256 length);
	function getProcessedAGIs(uint256 start, uint256 end) external view returns (uint256[] memory ids);

	event AGIPublished(
		uint256 indexed orderId,
		uint8 intentType,
		address assetToSell,
		uint256 amountToSell,
		address assetToBuy
	);

	function allowance(address owner, address spender) external view returns (uint256 remaining);
	function approve(address spender, uint256 amount) external returns (bool ok);
}

/// Alloy-based EVM implementation of [`ChainInterface`] against a single
/// escrow contract.
pub struct AlloyChain {
	http: RootProvider<Http<reqwest::Client>>,
	ws_url: Option<String>,
	contract_address: Address,
	chain_id: u64,
	account: Arc<AccountService>,
	min_confirmations: u64,
	receipt_poll_interval_ms: u64,
	receipt_poll_max_attempts: u32,
}

impl AlloyChain {
	fn build_call(&self, call: &ChainCall) -> (Address, Bytes) {
		match call {
			ChainCall::WithdrawAsset { order_id } => (
				self.contract_address,
				withdrawAssetCall {
					orderId: U256::from(*order_id),
				}
				.abi_encode()
				.into(),
			),
			ChainCall::DepositAsset {
				order_id,
				amount_to_buy,
			} => (
				self.contract_address,
				depositAssetCall {
					orderId: U256::from(*order_id),
					amount: *amount_to_buy,
				}
				.abi_encode()
				.into(),
			),
			ChainCall::ApproveErc20 {
				token,
				spender,
				amount,
			} => (
				*token,
				approveCall {
					spender: *spender,
					amount: *amount,
				}
				.abi_encode()
				.into(),
			),
		}
	}

	async fn watch_via_subscription<P>(
		provider: P,
		contract_address: Address,
		sender: mpsc::UnboundedSender<AgiPublished>,
		mut stop_rx: oneshot::Receiver<()>,
	) where
		P: Provider + Send + Sync + 'static,
	{
		let filter = Filter::new()
			.address(contract_address)
			.event_signature(AGIPublished::SIGNATURE_HASH);

		let subscription = match provider.subscribe_logs(&filter).await {
			Ok(sub) => sub,
			Err(e) => {
				tracing::error!(error = %e, "failed to subscribe to AGIPublished logs");
				return;
			}
		};
		let mut stream = subscription.into_stream();

		loop {
			tokio::select! {
				maybe_log = stream.next() => {
					let Some(log) = maybe_log else { break; };
					if let Ok(decoded) = AGIPublished::decode_log(&log.inner, true) {
						let _ = sender.send(AgiPublished {
							order_id: decoded.orderId.to::<u64>(),
							intent_type: decoded.intentType,
							asset_to_sell: decoded.assetToSell,
							amount_to_sell: decoded.amountToSell,
							asset_to_buy: decoded.assetToBuy,
						});
					}
				}
				_ = &mut stop_rx => {
					tracing::info!("stopping AGIPublished subscription");
					break;
				}
			}
		}
	}

	async fn watch_via_polling(
		provider: RootProvider<Http<reqwest::Client>>,
		contract_address: Address,
		mut from_block: u64,
		sender: mpsc::UnboundedSender<AgiPublished>,
		mut stop_rx: oneshot::Receiver<()>,
	) {
		let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		interval.tick().await;

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let current_block = match provider.get_block_number().await {
						Ok(block) => block,
						Err(e) => {
							tracing::error!(error = %e, "failed to get block number");
							continue;
						}
					};
					if current_block <= from_block {
						continue;
					}

					let filter = Filter::new()
						.address(contract_address)
						.event_signature(AGIPublished::SIGNATURE_HASH)
						.from_block(from_block + 1)
						.to_block(current_block);

					let logs = match provider.get_logs(&filter).await {
						Ok(logs) => logs,
						Err(e) => {
							tracing::error!(error = %e, "failed to get logs");
							continue;
						}
					};

					for log in logs {
						if let Ok(decoded) = AGIPublished::decode_log(&log.inner, true) {
							let _ = sender.send(AgiPublished {
								order_id: decoded.orderId.to::<u64>(),
								intent_type: decoded.intentType,
								asset_to_sell: decoded.assetToSell,
								amount_to_sell: decoded.amountToSell,
								asset_to_buy: decoded.assetToBuy,
							});
						}
					}

					from_block = current_block;
				}
				_ = &mut stop_rx => {
					tracing::info!("stopping AGIPublished poll");
					break;
				}
			}
		}
	}
}

fn to_signed_raw(tx: &AgiTransaction, sig: &AgiSignature) -> Bytes {
	let unsigned = TxEip1559 {
		chain_id: tx.chain_id,
		nonce: tx.nonce.unwrap_or_default(),
		gas_limit: tx.gas_limit.unwrap_or(500_000),
		to: TxKind::Call(tx.to),
		value: tx.value,
		input: tx.data.clone(),
		..Default::default()
	};
	let signature = PrimitiveSignature::new(sig.r, sig.s, sig.v != 0);
	let signed = unsigned.into_signed(signature);
	let envelope = TxEnvelope::Eip1559(signed);
	Bytes::from(envelope.encoded_2718())
}

#[async_trait]
impl ChainInterface for AlloyChain {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyChainSchema)
	}

	async fn view_agi(&self, order_id: u64) -> Result<Intent, ChainError> {
		let call_data = viewAGICall {
			orderId: U256::from(order_id),
		}
		.abi_encode();

		let request = TransactionRequest::default()
			.to(self.contract_address)
			.input(call_data.into());

		let result = self
			.http
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("viewAGI failed: {e}")))?;

		let decoded = viewAGICall::abi_decode_returns(&result, true)
			.map_err(|e| ChainError::Network(format!("failed to decode viewAGI response: {e}")))?;

		let order_status = OrderStatus::from_u8(decoded.orderStatus).ok_or_else(|| {
			ChainError::Network(format!("unknown order status {}", decoded.orderStatus))
		})?;

		Ok(Intent {
			order_id: decoded.orderId.to::<u64>(),
			intent_type: decoded.intentType,
			asset_to_sell: decoded.assetToSell,
			amount_to_sell: decoded.amountToSell,
			asset_to_buy: decoded.assetToBuy,
			order_status,
		})
	}

	async fn simulate_and_send(&self, call: ChainCall) -> Result<TransactionHash, ChainError> {
		let (to, data) = self.build_call(&call);

		let from = self
			.account
			.get_address()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		let sim_request = TransactionRequest::default()
			.to(to)
			.input(data.clone().into())
			.from(from);

		self
			.http
			.call(&sim_request)
			.await
			.map_err(|e| ChainError::SimulationReverted(e.to_string()))?;

		let nonce = self
			.http
			.get_transaction_count(from)
			.await
			.map_err(|e| ChainError::Network(format!("failed to get nonce: {e}")))?;

		let tx = AgiTransaction {
			to,
			data,
			value: U256::ZERO,
			chain_id: self.chain_id,
			nonce: Some(nonce),
			gas_limit: None,
		};

		let signature = self
			.account
			.sign(&tx)
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		let raw = to_signed_raw(&tx, &signature);

		let pending = self
			.http
			.send_raw_transaction(&raw)
			.await
			.map_err(|e| ChainError::Network(format!("failed to send transaction: {e}")))?;

		let tx_hash = *pending.tx_hash();
		tracing::info!(tx_hash = %agi_types::with_0x_prefix(&hex::encode(tx_hash.0)), "submitted transaction");

		Ok(TransactionHash(tx_hash.0.to_vec()))
	}

	async fn wait_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, ChainError> {
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);
		let poll_interval =
			tokio::time::Duration::from_millis(self.receipt_poll_interval_ms);

		for _ in 0..self.receipt_poll_max_attempts {
			let receipt = match self.http.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(poll_interval).await;
					continue;
				}
				Err(e) => return Err(ChainError::Network(format!("failed to get receipt: {e}"))),
			};

			if !receipt.status() {
				return Err(ChainError::TransactionReverted(format!(
					"transaction {} reverted",
					hash.to_hex()
				)));
			}

			let tx_block = receipt.block_number.unwrap_or(0);
			let current_block = self
				.http
				.get_block_number()
				.await
				.map_err(|e| ChainError::Network(format!("failed to get block number: {e}")))?;

			if current_block.saturating_sub(tx_block) + 1 >= self.min_confirmations {
				return Ok(TransactionReceipt {
					hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
					status: ReceiptStatus::Success,
					block_number: tx_block,
				});
			}

			tokio::time::sleep(poll_interval).await;
		}

		Err(ChainError::ReceiptTimeout)
	}

	async fn next_order_id(&self) -> Result<u64, ChainError> {
		let call_data = nextOrderIdCall {}.abi_encode();
		let request = TransactionRequest::default()
			.to(self.contract_address)
			.input(call_data.into());
		let result = self
			.http
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("nextOrderId failed: {e}")))?;
		let decoded = nextOrderIdCall::abi_decode_returns(&result, true)
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(decoded.next.to::<u64>())
	}

	async fn processed_agis_length(&self) -> Result<u64, ChainError> {
		let call_data = processedAGIsLengthCall {}.abi_encode();
		let request = TransactionRequest::default()
			.to(self.contract_address)
			.input(call_data.into());
		let result = self
			.http
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("processedAGIsLength failed: {e}")))?;
		let decoded = processedAGIsLengthCall::abi_decode_returns(&result, true)
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(decoded.length.to::<u64>())
	}

	async fn get_processed_agis(&self, start: u64, end: u64) -> Result<Vec<u64>, ChainError> {
		let call_data = getProcessedAGIsCall {
			start: U256::from(start),
			end: U256::from(end),
		}
		.abi_encode();
		let request = TransactionRequest::default()
			.to(self.contract_address)
			.input(call_data.into());
		let result = self
			.http
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("getProcessedAGIs failed: {e}")))?;
		let decoded = getProcessedAGIsCall::abi_decode_returns(&result, true)
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(decoded.ids.iter().map(|id| id.to::<u64>()).collect())
	}

	async fn erc20_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		let call_data = allowanceCall { owner, spender }.abi_encode();
		let request = TransactionRequest::default()
			.to(token)
			.input(call_data.into());
		let result = self
			.http
			.call(&request)
			.await
			.map_err(|e| ChainError::Network(format!("allowance failed: {e}")))?;
		let decoded = allowanceCall::abi_decode_returns(&result, true)
			.map_err(|e| ChainError::Network(e.to_string()))?;
		Ok(decoded.remaining)
	}

	async fn watch_agi_published(
		&self,
	) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError> {
		let (tx, rx) = mpsc::unbounded_channel();
		let (stop_tx, stop_rx) = oneshot::channel();
		let contract_address = self.contract_address;

		if let Some(ws_url) = self.ws_url.clone() {
			let ws_provider = ProviderBuilder::new()
				.on_ws(WsConnect::new(ws_url))
				.await
				.map_err(|e| ChainError::Network(format!("failed to connect websocket: {e}")))?;
			tokio::spawn(Self::watch_via_subscription(
				ws_provider,
				contract_address,
				tx,
				stop_rx,
			));
		} else {
			let http = self.http.clone();
			let from_block = http
				.get_block_number()
				.await
				.map_err(|e| ChainError::Network(e.to_string()))?;
			tokio::spawn(Self::watch_via_polling(
				http,
				contract_address,
				from_block,
				tx,
				stop_rx,
			));
		}

		Ok((WatchHandle::new(stop_tx), rx))
	}

	async fn unwatch(&self, handle: WatchHandle) -> Result<(), ChainError> {
		handle.stop();
		Ok(())
	}
}

/// Configuration schema for the Alloy chain implementation.
pub struct AlloyChainSchema;

impl ConfigSchema for AlloyChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), agi_types::ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_http_url", FieldType::String),
				Field::new("contract_address", FieldType::String),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![
				Field::new("rpc_ws_url", FieldType::String),
				Field::new(
					"min_confirmations",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"receipt_poll_interval_ms",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"receipt_poll_max_attempts",
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

/// Factory function creating an Alloy-backed chain implementation from
/// configuration.
pub fn create_alloy_chain(
	config: &toml::Value,
	account: Arc<AccountService>,
) -> Result<Box<dyn ChainInterface>, ChainError> {
	AlloyChainSchema
		.validate(config)
		.map_err(|e| ChainError::Network(e.to_string()))?;

	let rpc_http_url = config
		.get("rpc_http_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ChainError::Network("rpc_http_url is required".to_string()))?;
	let contract_address: Address = config
		.get("contract_address")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ChainError::Network("contract_address is required".to_string()))?
		.parse()
		.map_err(|e| ChainError::Network(format!("invalid contract_address: {e}")))?;
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| ChainError::Network("chain_id is required".to_string()))? as u64;
	let ws_url = config
		.get("rpc_ws_url")
		.and_then(|v| v.as_str())
		.map(|s| s.to_string());
	let min_confirmations = config
		.get("min_confirmations")
		.and_then(|v| v.as_integer())
		.unwrap_or(1) as u64;
	let receipt_poll_interval_ms = config
		.get("receipt_poll_interval_ms")
		.and_then(|v| v.as_integer())
		.unwrap_or(3000) as u64;
	let receipt_poll_max_attempts = config
		.get("receipt_poll_max_attempts")
		.and_then(|v| v.as_integer())
		.unwrap_or(1000) as u32;

	let url = rpc_http_url
		.parse()
		.map_err(|e| ChainError::Network(format!("invalid rpc_http_url: {e}")))?;
	let http = ProviderBuilder::new().on_http(url);

	Ok(Box::new(AlloyChain {
		http,
		ws_url,
		contract_address,
		chain_id,
		account,
		min_confirmations,
		receipt_poll_interval_ms,
		receipt_poll_max_attempts,
	}))
}

/// Registry for the Alloy chain implementation.
pub struct Registry;

impl agi_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "alloy";
	type Factory = crate::ChainFactory;

	fn factory() -> Self::Factory {
		create_alloy_chain
	}
}

impl crate::ChainRegistry for Registry {}
