// src/constants.rs
//
// Application-wide constants shared by the configuration defaults and the
// infrastructure adapters. Each constant is documented with its usage context.

/// Protocol version sent in every remote envelope.
///
/// The remote automation service changes reply shapes between versions; version 6
/// is the one whose replies are always `{result, error}`.
///
/// Used in: `infrastructure/envelope.rs`, `infrastructure/config.rs`
pub const API_VERSION: u32 = 6;

/// Default endpoint of the remote automation service.
///
/// Used in: `infrastructure/config.rs`
pub const DEFAULT_REMOTE_URL: &str = "http://localhost:8765";

/// Timeout in milliseconds for remote calls and media downloads.
///
/// Used in: `infrastructure/config.rs`
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default TCP port of the session-control listener.
///
/// Used in: `infrastructure/config.rs`
pub const DEFAULT_SESSION_PORT: u16 = 19898;

/// Interval in milliseconds between accept polls of the session-control listener.
///
/// The listener runs on a non-blocking socket so it can notice `exit` without a
/// pending connection. Shorter intervals cost CPU; longer ones delay replies.
///
/// Used in: `infrastructure/session_server.rs`
pub const SESSION_POLL_INTERVAL_MS: u64 = 25;

/// Milliseconds a session client may stay silent before its connection is dropped.
///
/// The listener serves one connection at a time, so an idle client would
/// otherwise hold off every other client.
///
/// Used in: `infrastructure/config.rs`, `infrastructure/session_server.rs`
pub const SESSION_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Environment variable overriding the listener's bind address.
///
/// Used in: `infrastructure/config.rs`
pub const BIND_ADDRESS_ENV: &str = "ANKICONNECT_BIND_ADDRESS";
