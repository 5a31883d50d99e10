//! Builder for wiring a running AGI solver from configuration.
//!
//! Looks up each capability's implementation by name from its registry,
//! validates its configuration against the implementation's own schema, and
//! assembles the Reconciler, the Queue Core, and the Admission Source around
//! them. Mirrors the teacher's `SolverBuilder`: factories keyed by name,
//! structured `tracing::info!`/`tracing::error!` per component loaded.

use crate::queue::{AgiQueue, QueueHandle};
use crate::retry::RetryPolicy;
use crate::swap::SwapCoordinator;
use crate::tx::TxExecutor;
use crate::{admission, reconcile::Reconciler};
use agi_account::{AccountError, AccountService};
use agi_chain::{ChainError, ChainService};
use agi_config::Config;
use agi_storage::{StorageError, StorageService};
use agi_swap::{SwapError, SwapService};
use agi_types::Address;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Swap error: {0}")]
	Swap(#[from] SwapError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Everything needed to run a solver instance: the spawned Queue Core and the
/// live event watch, both already started.
pub struct AgiSolver {
	pub queue: QueueHandle,
	pub chain: Arc<ChainService>,
}

impl AgiSolver {
	/// Reconstructs the queue from the contract's backlog and starts watching
	/// for new `AGIPublished` events. Call once, right after `build`.
	pub async fn start(&self) -> Result<(), ChainError> {
		let admitted = admission::scan_backlog(&self.chain, &self.queue).await?;
		tracing::info!(admitted, "backlog scan complete");
		admission::watch_new_intents(self.chain.clone(), self.queue.clone()).await?;
		tracing::info!("watching for new AGIPublished events");
		Ok(())
	}
}

/// Builds an [`AgiSolver`] from configuration, looking up each capability's
/// implementation by name in the registries the given factory maps describe.
pub struct AgiSolverBuilder {
	config: Config,
}

impl AgiSolverBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build(self) -> Result<AgiSolver, BuilderError> {
		let account_factories: std::collections::HashMap<_, _> =
			agi_account::get_all_implementations().into_iter().collect();
		let account_factory = account_factories
			.get(self.config.account.provider.as_str())
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"unknown account provider '{}'",
					self.config.account.provider
				))
			})?;
		let account_impl = account_factory(&self.config.account.config).map_err(|e| {
			tracing::error!(component = "account", implementation = %self.config.account.provider, error = %e, "failed to create account provider");
			e
		})?;
		let account = Arc::new(AccountService::new(account_impl));
		tracing::info!(component = "account", implementation = %self.config.account.provider, "loaded");

		let chain_factories: std::collections::HashMap<_, _> =
			agi_chain::get_all_implementations().into_iter().collect();
		// The escrow contract has exactly one implementation today ("alloy"),
		// selected implicitly; configuration lives directly under `[chain]`
		// rather than behind an `implementations` table like swap/storage.
		let chain_factory = chain_factories.get("alloy").ok_or_else(|| {
			BuilderError::Config("no chain implementation registered".to_string())
		})?;
		let chain_config = toml::Value::try_from(&self.config.chain)
			.map_err(|e| BuilderError::Config(format!("invalid chain configuration: {e}")))?;
		let chain_impl = chain_factory(&chain_config, account.clone()).map_err(|e| {
			tracing::error!(component = "chain", error = %e, "failed to create chain implementation");
			e
		})?;
		let chain = Arc::new(ChainService::new(chain_impl));
		tracing::info!(component = "chain", chain_id = self.config.chain.chain_id, "loaded");

		let swap_factories: std::collections::HashMap<_, _> =
			agi_swap::get_all_implementations().into_iter().collect();
		let swap_factory = swap_factories
			.get(self.config.swap.primary.as_str())
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"unknown swap implementation '{}'",
					self.config.swap.primary
				))
			})?;
		let swap_config = self
			.config
			.swap
			.implementations
			.get(&self.config.swap.primary)
			.cloned()
			.unwrap_or(toml::Value::Table(Default::default()));
		let swap_impl = swap_factory(&swap_config).map_err(|e| {
			tracing::error!(component = "swap", implementation = %self.config.swap.primary, error = %e, "failed to create swap implementation");
			e
		})?;
		let swap = Arc::new(SwapService::new(swap_impl));
		tracing::info!(component = "swap", implementation = %self.config.swap.primary, "loaded");

		let storage_factories: std::collections::HashMap<_, _> =
			agi_storage::get_all_implementations().into_iter().collect();
		let storage_factory = storage_factories
			.get(self.config.storage.primary.as_str())
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"unknown storage backend '{}'",
					self.config.storage.primary
				))
			})?;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(&self.config.storage.primary)
			.cloned()
			.unwrap_or(toml::Value::Table(Default::default()));
		let storage_impl = storage_factory(&storage_config).map_err(|e| {
			tracing::error!(component = "storage", implementation = %self.config.storage.primary, error = %e, "failed to create storage backend");
			e
		})?;
		let storage = Arc::new(StorageService::new(storage_impl));
		tracing::info!(component = "storage", implementation = %self.config.storage.primary, "loaded");

		let solver_address: Address = account
			.get_address()
			.await
			.map_err(BuilderError::from)?;
		let contract_address: Address = self
			.config
			.chain
			.contract_address
			.parse()
			.map_err(|e| BuilderError::Config(format!("invalid contract_address: {e}")))?;

		let tx = TxExecutor::new(chain.clone(), account, contract_address);
		let swap_coordinator = SwapCoordinator::new(swap);
		let retry = RetryPolicy::new(
			self.config.solver.retry_delay_ms,
			self.config.solver.swap_retry_delay_ms,
			self.config.solver.max_retries,
		);
		let reconciler = Reconciler::new(
			chain.clone(),
			tx,
			swap_coordinator,
			storage,
			retry,
			solver_address,
			self.config.solver.default_slippage,
		);

		let check_interval = Duration::from_millis(self.config.solver.check_interval_ms);
		let queue = AgiQueue::new(reconciler, check_interval, self.config.solver.max_retries);
		let handle = queue.spawn();
		tracing::info!(solver_id = %self.config.solver.id, "queue core started");

		Ok(AgiSolver {
			queue: handle,
			chain,
		})
	}
}
