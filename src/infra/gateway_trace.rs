//! Request/response interceptor for gateway calls.
//!
//! The hook is handed to the client at construction time. It never sees the
//! OAuth exchange, so credentials and tokens do not reach it.

use reqwest::Method;
use tracing::debug;

/// One outbound gateway request, as seen by a trace hook
#[derive(Debug)]
pub struct TracedRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub body: Option<&'a serde_json::Value>,
}

/// The gateway's answer (or transport failure) to a traced request
#[derive(Debug)]
pub struct TracedResponse<'a> {
    pub status: Option<u16>,
    pub body: &'a str,
    pub elapsed_ms: u128,
}

pub trait GatewayTraceHook: Send + Sync {
    fn on_request(&self, request: &TracedRequest<'_>);
    fn on_response(&self, request: &TracedRequest<'_>, response: &TracedResponse<'_>);
}

/// Emits every gateway exchange as a `debug` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTraceHook;

impl GatewayTraceHook for TracingTraceHook {
    fn on_request(&self, request: &TracedRequest<'_>) {
        debug!(
            method = %request.method,
            path = request.path,
            body = ?request.body,
            "Gateway request"
        );
    }

    fn on_response(&self, request: &TracedRequest<'_>, response: &TracedResponse<'_>) {
        debug!(
            method = %request.method,
            path = request.path,
            status = ?response.status,
            elapsed_ms = response.elapsed_ms as u64,
            body = response.body,
            "Gateway response"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceHook;

impl GatewayTraceHook for NoopTraceHook {
    fn on_request(&self, _request: &TracedRequest<'_>) {}
    fn on_response(&self, _request: &TracedRequest<'_>, _response: &TracedResponse<'_>) {}
}

/// Select the hook for the `GATEWAY_TRACE` toggle.
pub fn trace_hook_for(enabled: bool) -> std::sync::Arc<dyn GatewayTraceHook> {
    if enabled {
        std::sync::Arc::new(TracingTraceHook)
    } else {
        std::sync::Arc::new(NoopTraceHook)
    }
}
