//! Utility functions for common type conversions and transformations.
//!
//! This module provides helper functions for string formatting and time handling
//! used throughout the solver system.

pub mod formatting;
pub mod helpers;

pub use formatting::{format_token_amount, truncate_id, with_0x_prefix, without_0x_prefix};
pub use helpers::current_timestamp;
