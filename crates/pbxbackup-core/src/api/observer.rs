//! Request/response debug records.
//!
//! Every round trip made by `ApiClient` is reported to an `HttpObserver`
//! as an `HttpExchange`. The client decides what is recorded; the observer
//! decides how (or whether) it is rendered.

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use tracing::{debug, trace};

/// One completed HTTP round trip.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub method: Method,
    pub url: String,
    pub request_headers: HeaderMap,
    pub request_body: Option<String>,
    pub status: StatusCode,
    pub response_headers: HeaderMap,
    /// `None` for streamed downloads.
    pub response_body: Option<String>,
}

pub trait HttpObserver: Send + Sync {
    fn on_exchange(&self, exchange: &HttpExchange);
}

/// Renders exchanges as `tracing` events. Bearer tokens are redacted and
/// bodies only appear at TRACE level, since the login body holds the password.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if name == AUTHORIZATION {
                    "<redacted>".to_string()
                } else {
                    value.to_str().unwrap_or("<binary>").to_string()
                };
                (name.to_string(), value)
            })
            .collect()
    }
}

impl HttpObserver for TracingObserver {
    fn on_exchange(&self, exchange: &HttpExchange) {
        debug!(
            method = %exchange.method,
            url = %exchange.url,
            status = exchange.status.as_u16(),
            request_headers = ?Self::redacted_headers(&exchange.request_headers),
            response_headers = ?Self::redacted_headers(&exchange.response_headers),
            "HTTP exchange"
        );
        trace!(
            url = %exchange.url,
            request_body = exchange.request_body.as_deref().unwrap_or(""),
            response_body = exchange.response_body.as_deref().unwrap_or(""),
            "HTTP exchange bodies"
        );
    }
}
