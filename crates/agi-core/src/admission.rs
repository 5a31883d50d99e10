//! Admission Source: the only way order ids reach the queue.
//!
//! On startup, the queue itself holds nothing — it is rebuilt by diffing the
//! contract's own backlog against what it has already processed. After that
//! backlog scan, a live `AGIPublished` subscription feeds new ids as they
//! arrive.

use crate::queue::QueueHandle;
use agi_chain::{ChainError, ChainService};
use std::collections::HashSet;
use std::sync::Arc;

/// Anything that can admit an order id into the queue. Exists so the backlog
/// scan can be tested without spinning up a full [`crate::queue::AgiQueue`].
pub trait Admit {
	fn add(&self, order_id: u64);
}

impl Admit for QueueHandle {
	fn add(&self, order_id: u64) {
		QueueHandle::add(self, order_id)
	}
}

/// Scans the contract's backlog on startup and admits every unprocessed id.
///
/// Reads `nextOrderId` and the processed set, then computes
/// `{1..nextOrderId-1} \ processed` and admits each — this is how the
/// queue, which is never itself persisted, is reconstructed after a restart.
pub async fn scan_backlog(chain: &ChainService, admit: &impl Admit) -> Result<usize, ChainError> {
	let next_order_id = chain.next_order_id().await?;
	let processed_length = chain.processed_agis_length().await?;
	let processed: HashSet<u64> = if processed_length == 0 {
		HashSet::new()
	} else {
		chain
			.get_processed_agis(0, processed_length)
			.await?
			.into_iter()
			.collect()
	};

	let mut admitted = 0;
	for order_id in 1..next_order_id {
		if !processed.contains(&order_id) {
			admit.add(order_id);
			admitted += 1;
		}
	}

	tracing::info!(
		next_order_id,
		processed_length,
		admitted,
		"backlog scan complete"
	);
	Ok(admitted)
}

/// Starts watching for `AGIPublished` events and forwards every order id to
/// the queue. Runs until `stop` is dropped or fires, at which point it calls
/// [`agi_chain::ChainInterface::unwatch`] via the returned handle.
pub async fn watch_new_intents(
	chain: Arc<ChainService>,
	queue: QueueHandle,
) -> Result<(), ChainError> {
	let (watch_handle, mut events) = chain.watch_agi_published().await?;

	tokio::spawn(async move {
		while let Some(event) = events.recv().await {
			tracing::info!(order_id = event.order_id, "AGIPublished received");
			queue.add(event.order_id);
		}
	});

	// The subscription lives for the lifetime of the process; there is no
	// shutdown path that calls `unwatch` today, so the handle is dropped
	// here rather than threaded through the caller's shutdown sequence.
	drop(watch_handle);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use agi_chain::{ChainCall, ChainInterface, WatchHandle};
	use agi_types::{AgiPublished, Address, ConfigSchema, Intent, TransactionHash, TransactionReceipt, U256};
	use async_trait::async_trait;
	use std::sync::Mutex;
	use tokio::sync::{mpsc, oneshot};

	struct FakeChain {
		next_order_id: u64,
		processed: Vec<u64>,
	}

	#[async_trait]
	impl ChainInterface for FakeChain {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			unimplemented!()
		}
		async fn view_agi(&self, _order_id: u64) -> Result<Intent, ChainError> {
			unimplemented!()
		}
		async fn simulate_and_send(&self, _call: ChainCall) -> Result<TransactionHash, ChainError> {
			unimplemented!()
		}
		async fn wait_receipt(&self, _hash: &TransactionHash) -> Result<TransactionReceipt, ChainError> {
			unimplemented!()
		}
		async fn next_order_id(&self) -> Result<u64, ChainError> {
			Ok(self.next_order_id)
		}
		async fn processed_agis_length(&self) -> Result<u64, ChainError> {
			Ok(self.processed.len() as u64)
		}
		async fn get_processed_agis(&self, start: u64, end: u64) -> Result<Vec<u64>, ChainError> {
			Ok(self.processed[start as usize..end as usize].to_vec())
		}
		async fn erc20_allowance(
			&self,
			_token: Address,
			_owner: Address,
			_spender: Address,
		) -> Result<U256, ChainError> {
			unimplemented!()
		}
		async fn watch_agi_published(
			&self,
		) -> Result<(WatchHandle, mpsc::UnboundedReceiver<AgiPublished>), ChainError> {
			let (stop_tx, _stop_rx) = oneshot::channel();
			let (_events_tx, events_rx) = mpsc::unbounded_channel();
			Ok((WatchHandle::new(stop_tx), events_rx))
		}
		async fn unwatch(&self, _handle: WatchHandle) -> Result<(), ChainError> {
			Ok(())
		}
	}

	#[derive(Default)]
	struct RecordingAdmit {
		added: Mutex<Vec<u64>>,
	}

	impl Admit for RecordingAdmit {
		fn add(&self, order_id: u64) {
			self.added.lock().unwrap().push(order_id);
		}
	}

	#[tokio::test]
	async fn backlog_scan_admits_only_unprocessed_ids() {
		let chain = ChainService::new(Box::new(FakeChain {
			next_order_id: 6,
			processed: vec![1, 3],
		}));
		let admit = RecordingAdmit::default();

		let admitted = scan_backlog(&chain, &admit).await.unwrap();

		assert_eq!(admitted, 3);
		let mut got = admit.added.lock().unwrap().clone();
		got.sort();
		assert_eq!(got, vec![2, 4, 5]);
	}

	#[tokio::test]
	async fn backlog_scan_is_noop_when_nothing_is_pending() {
		let chain = ChainService::new(Box::new(FakeChain {
			next_order_id: 1,
			processed: vec![],
		}));
		let admit = RecordingAdmit::default();

		let admitted = scan_backlog(&chain, &admit).await.unwrap();

		assert_eq!(admitted, 0);
		assert!(admit.added.lock().unwrap().is_empty());
	}
}
