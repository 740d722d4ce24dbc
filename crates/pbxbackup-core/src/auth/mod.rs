//! Authentication types.
//!
//! This module provides:
//! - `Credentials`: username/password pair held in memory for login
//! - `AuthenticatedSession`: the token set produced by a successful login
//!
//! Nothing here is persisted; a new process logs in again.

pub mod credentials;
pub mod session;

pub use credentials::Credentials;
pub use session::AuthenticatedSession;
