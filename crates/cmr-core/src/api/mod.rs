//! REST API client module for the CMR search and ingest services.
//!
//! This module provides the `CmrClient` for searching collections and
//! granules, and for validating, ingesting and deleting them under the
//! configured provider.
//!
//! Ingest endpoints authenticate with an Echo token obtained through the
//! token service; see [`crate::auth`].

pub mod client;
pub mod error;
pub mod search;

pub use client::{CmrClient, IngestOutcome, Validation};
pub use error::ApiError;
