//! Shared helpers used across layers

pub mod shutdown;
pub mod utills;

pub use shutdown::{listen_for_shutdown_signals, ShutdownSignal};
pub use utills::retry::{retry_with_backoff, RetryConfig};
