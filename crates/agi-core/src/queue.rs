//! Queue Core: the single-flight ticker that drives the Reconciler.
//!
//! Owns the queue and all `IntentProgress` state on one task — there is no
//! locking between intents, because only this task ever touches them.
//! `Add`/`Close`/`FailedSwapReport` reach it over a channel so they can be
//! called from any context (the Admission Source, a signal handler, tests).

use crate::intent_state::is_exhausted;
use crate::reconcile::{Reconciler, StepOutcome};
use agi_types::IntentProgress;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Result of `FailedSwapReport`: every intent currently evicted for
/// exhausting its swap retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedSwapReport {
	pub count: usize,
	pub order_ids: Vec<u64>,
}

enum Command {
	Add(u64),
	Close,
	Report(oneshot::Sender<FailedSwapReport>),
}

/// A cheaply cloneable handle to a running [`AgiQueue`].
#[derive(Clone)]
pub struct QueueHandle {
	commands: mpsc::UnboundedSender<Command>,
}

impl QueueHandle {
	/// Admits `order_id`. A no-op if it is already queued; refused (logged,
	/// not an error) if it previously exhausted its swap retries.
	pub fn add(&self, order_id: u64) {
		let _ = self.commands.send(Command::Add(order_id));
	}

	/// Stops the ticker after its current tick finishes.
	pub fn close(&self) {
		let _ = self.commands.send(Command::Close);
	}

	/// Returns every intent currently evicted for exhausting its swap
	/// retries.
	pub async fn failed_swap_report(&self) -> FailedSwapReport {
		let (tx, rx) = oneshot::channel();
		if self.commands.send(Command::Report(tx)).is_err() {
			return FailedSwapReport::default();
		}
		rx.await.unwrap_or_default()
	}
}

/// The queue's single worker: one ticker, one queue, one progress map.
pub struct AgiQueue {
	reconciler: Reconciler,
	check_interval: Duration,
	max_retries: u32,
}

impl AgiQueue {
	pub fn new(reconciler: Reconciler, check_interval: Duration, max_retries: u32) -> Self {
		Self {
			reconciler,
			check_interval,
			max_retries,
		}
	}

	/// Spawns the worker task and returns a handle to talk to it.
	pub fn spawn(self) -> QueueHandle {
		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(self.run(rx));
		QueueHandle { commands: tx }
	}

	async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
		let mut queue: VecDeque<u64> = VecDeque::new();
		let mut queued_ids: HashSet<u64> = HashSet::new();
		let mut progress: HashMap<u64, IntentProgress> = HashMap::new();

		let mut ticker = tokio::time::interval(self.check_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				command = commands.recv() => {
					match command {
						Some(Command::Add(order_id)) => {
							if queued_ids.contains(&order_id) {
								tracing::debug!(order_id, "already queued, ignoring Add");
								continue;
							}
							if progress
								.get(&order_id)
								.is_some_and(|p| is_exhausted(p, self.max_retries))
							{
								tracing::warn!(order_id, "refusing to re-admit exhausted intent");
								continue;
							}
							queue.push_back(order_id);
							queued_ids.insert(order_id);
							progress.insert(order_id, IntentProgress::default());
							tracing::info!(order_id, "admitted");
						}
						Some(Command::Close) | None => {
							tracing::info!("queue closing");
							return;
						}
						Some(Command::Report(reply)) => {
							let order_ids: Vec<u64> = progress
								.iter()
								.filter(|(_, p)| is_exhausted(p, self.max_retries))
								.map(|(id, _)| *id)
								.collect();
							let _ = reply.send(FailedSwapReport {
								count: order_ids.len(),
								order_ids,
							});
						}
					}
				}
				// Guarded on non-empty so the ticker stops driving work the
				// instant the queue empties, rather than firing no-op ticks.
				_ = ticker.tick(), if !queue.is_empty() => {
					let Some(order_id) = queue.pop_front() else {
						continue;
					};
					queue.push_back(order_id);

					let mut entry = progress.remove(&order_id).unwrap_or_default();
					let outcome = self.reconciler.step(order_id, &mut entry).await;

					match outcome {
						StepOutcome::Retry => {
							progress.insert(order_id, entry);
						}
						StepOutcome::Completed => {
							queue.retain(|id| *id != order_id);
							queued_ids.remove(&order_id);
						}
						StepOutcome::Evicted => {
							queue.retain(|id| *id != order_id);
							queued_ids.remove(&order_id);
							progress.insert(order_id, entry);
						}
					}
				}
			}
		}
	}
}
