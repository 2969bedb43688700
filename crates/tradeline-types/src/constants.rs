//! Protocol-wide constants for Tradeline.

/// Default wait for a counterparty's message within a session (milliseconds).
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 5_000;

/// Default wait for the finality service to commit or reject (milliseconds).
pub const DEFAULT_FINALITY_TIMEOUT_MS: u64 = 10_000;

/// Buffered messages per session direction before `send` waits.
pub const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Buffered incoming sessions per party before `open` waits.
pub const INBOX_CHANNEL_CAPACITY: usize = 64;

/// Description attached to orders placed without one.
pub const DEFAULT_ORDER_DESCRIPTION: &str = "order";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name.
pub const PROTOCOL_NAME: &str = "Tradeline";
