//! HTTP client factory with consistent timeout configuration.
//!
//! Gateway clients MUST start from `client_builder()` rather than
//! constructing `reqwest::Client` directly, so every outbound call shares
//! the same timeouts whatever TLS identity it carries.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Default connect timeout (TCP handshake + TLS).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (total request/response time).
///
/// Gateway calls are expected to complete within seconds. Calls are never
/// retried, so a timeout surfaces directly as a gateway error.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder preloaded with the default timeouts.
pub fn client_builder() -> ClientBuilder {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
}
