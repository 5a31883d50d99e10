//! Core solver logic for the AGI escrow solver.
//!
//! Owns the queue/progress state machine described by the Reconciler and
//! Queue Core modules below, and the Admission Source that feeds it. This is
//! the only crate that knows about order lifecycle semantics; the capability
//! crates (`agi-chain`, `agi-swap`, `agi-account`, `agi-storage`) know nothing
//! about intents, retries, or the queue.

pub mod admission;
pub mod intent_state;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod solver_builder;
pub mod swap;
pub mod tx;

pub use queue::{AgiQueue, FailedSwapReport, QueueHandle};
pub use reconcile::{Reconciler, StepOutcome};
pub use solver_builder::{AgiSolver, AgiSolverBuilder, BuilderError};
