//! Transaction Executor: the Reconciler's only path to the chain capability.
//!
//! Wraps `withdrawAsset`/`depositAsset`/ERC-20 `approve` with the
//! simulate-then-send-then-poll-receipt discipline; `ChainService` already
//! turns a reverted receipt into `ChainError::TransactionReverted`, so
//! callers here only ever see success or a single error type.

use agi_account::AccountService;
use agi_chain::{ChainCall, ChainError, ChainService};
use agi_types::{Address, U256};
use std::sync::Arc;

pub struct TxExecutor {
	chain: Arc<ChainService>,
	account: Arc<AccountService>,
	contract_address: Address,
}

impl TxExecutor {
	pub fn new(chain: Arc<ChainService>, account: Arc<AccountService>, contract_address: Address) -> Self {
		Self {
			chain,
			account,
			contract_address,
		}
	}

	/// Submits `withdrawAsset(orderId)` and waits for it to be mined.
	pub async fn withdraw(&self, order_id: u64) -> Result<(), ChainError> {
		let hash = self
			.chain
			.simulate_and_send(ChainCall::WithdrawAsset { order_id })
			.await?;
		self.chain.wait_receipt(&hash).await?;
		Ok(())
	}

	/// Submits `depositAsset(orderId, amountToBuy)`, approving the escrow
	/// contract for `amount_to_buy` of `asset_to_buy` first if the solver's
	/// current allowance is insufficient.
	///
	/// `amount_to_buy` must be the amount cached by the Swap Coordinator at
	/// swap completion time, never a fresh quote — re-quoting here would
	/// break the idempotency a retried deposit depends on.
	pub async fn deposit(
		&self,
		order_id: u64,
		asset_to_buy: Address,
		amount_to_buy: U256,
	) -> Result<(), ChainError> {
		let owner = self
			.account
			.get_address()
			.await
			.map_err(|e| ChainError::Network(e.to_string()))?;

		let allowance = self
			.chain
			.erc20_allowance(asset_to_buy, owner, self.contract_address)
			.await?;
		if allowance < amount_to_buy {
			self.approve_erc20(asset_to_buy, self.contract_address, amount_to_buy)
				.await?;
		}

		let hash = self
			.chain
			.simulate_and_send(ChainCall::DepositAsset {
				order_id,
				amount_to_buy,
			})
			.await?;
		self.chain.wait_receipt(&hash).await?;
		Ok(())
	}

	/// Submits an ERC-20 `approve(spender, amount)` and waits for it to be
	/// mined.
	pub async fn approve_erc20(
		&self,
		token: Address,
		spender: Address,
		amount: U256,
	) -> Result<(), ChainError> {
		let hash = self
			.chain
			.simulate_and_send(ChainCall::ApproveErc20 {
				token,
				spender,
				amount,
			})
			.await?;
		self.chain.wait_receipt(&hash).await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_account::{AccountError, AccountInterface};
	use agi_chain::{ChainInterface, WatchHandle};
	use agi_types::{AgiPublished, ConfigSchema, Intent, ReceiptStatus, SecretString, Signature, Transaction, TransactionHash, TransactionReceipt};
	use async_trait::async_trait;
	use std::sync::Mutex;
	use tokio::sync::mpsc;

	struct FakeAccount {
		address: Address,
	}

	#[async_trait]
	impl AccountInterface for FakeAccount {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn address(&self) -> Result<Address, AccountError> {
			Ok(self.address)
		}
		async fn sign_transaction(&self, _tx: &Transaction) -> Result<Signature, AccountError> {
			unimplemented!()
		}
		async fn sign_message(&self, _message: &[u8]) -> Result<Signature, AccountError> {
			unimplemented!()
		}
		fn get_private_key(&self) -> SecretString {
			SecretString::from("0x0")
		}
	}

	struct FakeChain {
		allowance: U256,
		calls: Mutex<Vec<ChainCall>>,
		fail_simulate: bool,
	}

	#[async_trait]
	impl ChainInterface for FakeChain {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn view_agi(&self, _order_id: u64) -> Result<Intent, ChainError> {
			unimplemented!()
		}
		async fn simulate_and_send(&self, call: ChainCall) -> Result<TransactionHash, ChainError> {
			if self.fail_simulate {
				return Err(ChainError::Network("rpc unreachable".to_string()));
			}
			self.calls.lock().unwrap().push(call);
			Ok(TransactionHash(vec![1]))
		}
		async fn wait_receipt(&self, hash: &TransactionHash) -> Result<TransactionReceipt, ChainError> {
			Ok(TransactionReceipt {
				hash: hash.clone(),
				status: ReceiptStatus::Success,
				block_number: 1,
			})
		}
		async fn next_order_id(&self) -> Result<u64, ChainError> {
			unimplemented!()
		}
		async fn processed_agis_length(&self) -> Result<u64, ChainError> {
			unimplemented!()
		}
		async fn get_processed_agis(&self, _start: u64, _end: u64) -> Result<Vec<u64>, ChainError> {
			unimplemented!()
		}
		async fn erc20_allowance(
			&self,
			_token: Address,
			_owner: Address,
			_spender: Address,
		) -> Result<U256, ChainError> {
			Ok(self.allowance)
		}
		async fn watch_agi_published(
			&self,
		) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError> {
			unimplemented!()
		}
		async fn unwatch(&self, _handle: WatchHandle) -> Result<(), ChainError> {
			unimplemented!()
		}
	}

	fn executor(allowance: U256, fail_simulate: bool) -> TxExecutor {
		let chain = Arc::new(ChainService::new(Box::new(FakeChain {
			allowance,
			calls: Mutex::new(Vec::new()),
			fail_simulate,
		})));
		let account = Arc::new(AccountService::new(Box::new(FakeAccount {
			address: Address::repeat_byte(9),
		})));
		TxExecutor::new(chain, account, Address::repeat_byte(0xAA))
	}

	#[tokio::test]
	async fn withdraw_submits_and_waits() {
		let executor = executor(U256::ZERO, false);
		executor.withdraw(7).await.unwrap();
	}

	#[tokio::test]
	async fn deposit_skips_approval_when_allowance_sufficient() {
		let executor = executor(U256::from(1000u64), false);
		executor
			.deposit(7, Address::repeat_byte(2), U256::from(500u64))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn deposit_propagates_simulation_failure() {
		let executor = executor(U256::from(1000u64), true);
		let result = executor
			.deposit(7, Address::repeat_byte(2), U256::from(500u64))
			.await;
		assert!(matches!(result, Err(ChainError::Network(_))));
	}
}
