//! Authentication module for the Echo token lifecycle.
//!
//! This module provides:
//! - `SessionManager`: holds the current token, probes the ingest service to
//!   detect a token it no longer accepts, and mints and persists a
//!   replacement
//! - `CredentialRecord`: the account details sent to the token service
//! - `CredentialStore`: secure OS-level password storage via keyring
//!
//! Tokens are persisted in the config file and reused across invocations.

pub mod credentials;
pub mod session;
pub mod token;

pub use credentials::{CredentialRecord, CredentialStore};
pub use session::{Session, SessionManager};
