//! REST API client module for the PBX administrative API.
//!
//! This module provides the `ApiClient` for logging in and driving the
//! backup lifecycle: trigger, poll, download, delete.
//!
//! Authenticated calls use a bearer token obtained by exchanging the
//! refresh token from the web client login endpoint.

pub mod client;
pub mod endpoint;
pub mod error;
pub mod observer;
mod user_agent;

pub use client::{ApiClient, ClientOptions};
pub use endpoint::ServerEndpoint;
pub use error::ApiError;
pub use observer::{HttpExchange, HttpObserver, TracingObserver};
