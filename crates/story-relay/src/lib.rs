//! Story relay server.
//!
//! Bridges one upstream assistant run per request to a `text/event-stream`
//! response, and forwards image prompts to the configured image provider.

/// Environment-driven configuration.
pub mod config;
/// Relay error type and its HTTP mapping.
pub mod error;
/// Process-wide logging setup.
pub mod observability;
/// Upstream-run to outbound-message translation.
pub mod relay;
/// HTTP routes and shared request state.
pub mod routes;

#[cfg(test)]
mod test_support;

pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::{Session, Terminal, relay_stream};
pub use routes::{AppState, router};
