//! Core library for pbxbackup.
//!
//! Talks to a PBX management server's administrative API: logs in,
//! triggers an on-demand backup, waits for the artifact, downloads it and
//! optionally deletes it from the server.

pub mod api;
pub mod auth;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, ClientOptions, HttpExchange, HttpObserver, ServerEndpoint};
pub use auth::{AuthenticatedSession, Credentials};
pub use models::{BackupReadiness, BackupRecord, BackupTrigger, PollPolicy};
