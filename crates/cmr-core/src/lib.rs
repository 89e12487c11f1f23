//! Client library for the CMR metadata catalog REST API.
//!
//! `cmr-core` covers searching, validating, ingesting and deleting
//! collection and granule records, plus the Echo token lifecycle that the
//! ingest endpoints require:
//!
//! - [`config`]: the file-backed configuration store (endpoints,
//!   credentials, last known token)
//! - [`auth`]: token minting, expiry probing and the [`SessionManager`]
//! - [`api`]: the [`CmrClient`] with one method per catalog operation
//! - [`models`]: search result types
//! - [`metadata`]: identifier extraction from ECHO10 metadata documents

pub mod api;
pub mod auth;
pub mod config;
pub mod metadata;
pub mod models;

pub use api::{ApiError, CmrClient, IngestOutcome, Validation};
pub use auth::{Session, SessionManager};
pub use config::{CmrConfig, ConfigError, ConfigStore};
