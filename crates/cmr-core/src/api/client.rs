//! API client for the CMR search and ingest services.
//!
//! This module provides the `CmrClient` struct. Search requests are
//! anonymous; validate, ingest and delete requests carry the Echo token and
//! go through [`SessionManager::fresh_headers`] first, so an expired token is
//! replaced once before the request is sent.

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{header::HeaderMap, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::search::{self, page_count};
use super::ApiError;
use crate::auth::SessionManager;
use crate::config::{CmrConfig, ConfigStore};
use crate::metadata;
use crate::models::{Collection, Granule, Reference};

// ============================================================================
// Constants
// ============================================================================

/// Header identifying this client to the search service
const CLIENT_ID_HEADER: &str = "client-id";

/// Result of a validation request. A rejected document is not an error; the
/// server's explanation is in `body`.
#[derive(Debug, Clone)]
pub struct Validation {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of an ingest or update.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Validation passed; the body of the ingest response.
    Ingested(Bytes),
    /// Validation failed and nothing was ingested.
    Rejected(Validation),
}

/// API client for CMR.
pub struct CmrClient {
    client: Client,
    session: SessionManager,
    config: CmrConfig,
}

impl CmrClient {
    /// Create a client from a config store, minting a token if the store has
    /// none.
    ///
    /// No request timeout is set; slow ingests run as long as the transport
    /// allows.
    pub async fn new(store: ConfigStore) -> Result<Self> {
        let client = Client::builder().build().map_err(ApiError::from)?;
        Self::with_client(client, store).await
    }

    /// Create a client that sends its requests through `client`.
    pub async fn with_client(client: Client, store: ConfigStore) -> Result<Self> {
        let config = store.config().clone();
        let session = SessionManager::initialize(client.clone(), store).await?;
        Ok(Self {
            client,
            session,
            config,
        })
    }

    /// Open the config file at `path` and create a client from it.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let store = ConfigStore::open(path)?;
        Self::new(store).await
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn config(&self) -> &CmrConfig {
        &self.config
    }

    fn provider_url(&self, segments: &[&str]) -> Result<Url> {
        provider_url(
            &self.config.ingest.ingest_url,
            &self.config.credentials.provider,
            segments,
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<String>,
    ) -> Result<(StatusCode, Bytes)> {
        debug!(%method, url, "Sending request");
        let mut request = self.client.request(method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to read response from {}", url))?;
        debug!(%status, url, "Response received");
        Ok((status, bytes))
    }

    async fn get_anonymous(&self, url: &str) -> Result<Bytes> {
        let (_, body) = self.send(Method::GET, url, HeaderMap::new(), None).await?;
        Ok(body)
    }

    // ===== Validation =====

    /// Validate collection metadata without ingesting it.
    pub async fn validate_collection(&self, data: &str, dataset_id: &str) -> Result<Validation> {
        let headers = self.session.fresh_headers().await?;
        self.post_validation("collection", data, dataset_id, headers).await
    }

    /// Validate granule metadata without ingesting it.
    pub async fn validate_granule(&self, data: &str, short_name: &str) -> Result<Validation> {
        let headers = self.session.fresh_headers().await?;
        self.post_validation("granule", data, short_name, headers).await
    }

    async fn post_validation(
        &self,
        kind: &str,
        data: &str,
        native_id: &str,
        headers: HeaderMap,
    ) -> Result<Validation> {
        let url = self.provider_url(&["validate", kind, native_id])?;
        let (status, body) = self
            .send(Method::POST, url.as_str(), headers, Some(data.to_string()))
            .await?;
        Ok(Validation { status, body })
    }

    // ===== Collections =====

    /// Validate and ingest the collection document at `path`, keyed by its
    /// `DataSetId`.
    pub async fn ingest_collection(&self, path: &Path) -> Result<IngestOutcome> {
        let data = metadata::read_document(path).await?;
        let dataset_id = metadata::dataset_id(&data)?;
        self.ingest("collection", "collections", &data, &dataset_id)
            .await
    }

    /// Same as [`Self::ingest_collection`]; CMR replaces an existing record.
    pub async fn update_collection(&self, path: &Path) -> Result<IngestOutcome> {
        self.ingest_collection(path).await
    }

    /// Delete a collection by dataset id and return the response body.
    pub async fn delete_collection(&self, dataset_id: &str) -> Result<Bytes> {
        self.delete("collections", dataset_id).await
    }

    /// Raw search response for a collection short name.
    pub async fn collection_by_short_name(&self, short_name: &str) -> Result<Bytes> {
        let url = format!("{}{}", self.config.search.collection_by_shortname, short_name);
        self.get_anonymous(&url).await
    }

    // ===== Granules =====

    /// Validate and ingest the granule document at `path`, keyed by its
    /// parent collection's `ShortName`.
    pub async fn ingest_granule(&self, path: &Path) -> Result<IngestOutcome> {
        let data = metadata::read_document(path).await?;
        let short_name = metadata::short_name(&data)?;
        self.ingest("granule", "granules", &data, &short_name).await
    }

    /// Same as [`Self::ingest_granule`]; CMR replaces an existing record.
    pub async fn update_granule(&self, path: &Path) -> Result<IngestOutcome> {
        self.ingest_granule(path).await
    }

    /// Delete a granule by native id and return the response body.
    pub async fn delete_granule(&self, native_id: &str) -> Result<Bytes> {
        self.delete("granules", native_id).await
    }

    /// Raw search response for a granule UR.
    pub async fn granule_by_ur(&self, granule_ur: &str) -> Result<Bytes> {
        let url = format!("{}{}", self.config.search.granule_by_ur, granule_ur);
        self.get_anonymous(&url).await
    }

    // ===== Ingest plumbing =====

    async fn ingest(
        &self,
        kind: &str,
        collection_path: &str,
        data: &str,
        native_id: &str,
    ) -> Result<IngestOutcome> {
        let headers = self.session.fresh_headers().await?;

        let validation = self
            .post_validation(kind, data, native_id, headers.clone())
            .await?;
        if !validation.is_valid() {
            info!(kind, native_id, status = %validation.status, "Validation failed, not ingesting");
            return Ok(IngestOutcome::Rejected(validation));
        }

        let url = self.provider_url(&[collection_path, native_id])?;
        let (status, body) = self
            .send(Method::PUT, url.as_str(), headers, Some(data.to_string()))
            .await?;
        info!(kind, native_id, %status, "Ingest request completed");
        Ok(IngestOutcome::Ingested(body))
    }

    async fn delete(&self, collection_path: &str, native_id: &str) -> Result<Bytes> {
        let headers = self.session.fresh_headers().await?;
        let url = self.provider_url(&[collection_path, native_id])?;
        let (status, body) = self
            .send(Method::DELETE, url.as_str(), headers, None)
            .await?;
        info!(native_id, %status, "Delete request completed");
        Ok(body)
    }

    // ===== Search =====

    /// Search collections, returning at most `limit` entries.
    ///
    /// Each entry is paired with the metadata location of the reference
    /// search hit at the same position.
    pub async fn search_collections(
        &self,
        limit: usize,
        params: &[(String, String)],
    ) -> Result<Vec<Collection>> {
        let mut collections: Vec<Collection> = self
            .search_feed(&self.config.search.collection_meta_url, limit, params)
            .await?;
        let references = self
            .search_references(&self.config.search.collection_url, limit, params)
            .await?;

        collections.truncate(references.len().min(limit));
        for (collection, reference) in collections.iter_mut().zip(references) {
            collection.location = Some(reference.location);
        }
        Ok(collections)
    }

    /// Search granules, returning at most `limit` entries.
    pub async fn search_granules(
        &self,
        limit: usize,
        params: &[(String, String)],
    ) -> Result<Vec<Granule>> {
        let mut granules: Vec<Granule> = self
            .search_feed(&self.config.search.granule_meta_url, limit, params)
            .await?;
        granules.truncate(limit);
        Ok(granules)
    }

    /// Reference hits (name, id, location) of an XML search.
    pub async fn search_references(
        &self,
        template: &str,
        limit: usize,
        params: &[(String, String)],
    ) -> Result<Vec<Reference>> {
        let mut references = Vec::new();
        for page in 1..=page_count(limit) {
            let url = search::page_url(template, page, params)?;
            let body = self.search_page(url).await?;
            references.extend(search::parse_references(&String::from_utf8_lossy(&body)));
        }
        references.truncate(limit);
        Ok(references)
    }

    async fn search_feed<T: DeserializeOwned>(
        &self,
        template: &str,
        limit: usize,
        params: &[(String, String)],
    ) -> Result<Vec<T>> {
        let mut entries = Vec::new();
        for page in 1..=page_count(limit) {
            let url = search::page_url(template, page, params)?;
            let body = self.search_page(url).await?;
            entries.extend(search::parse_feed::<T>(&String::from_utf8_lossy(&body))?);
        }
        Ok(entries)
    }

    async fn search_page(&self, url: Url) -> Result<Bytes> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_ID_HEADER,
            self.config
                .credentials
                .client_id
                .parse()
                .context("Client id is not a valid header value")?,
        );
        let (_, body) = self.send(Method::GET, url.as_str(), headers, None).await?;
        Ok(body)
    }
}

/// `<base>/<provider>/<segments...>`, with each segment percent-encoded as a
/// single path segment. Native ids may contain `/`, `?` or `#`.
pub(crate) fn provider_url(base: &str, provider: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid ingest URL: {}", base))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Ingest URL cannot have a path: {}", base))?
        .pop_if_empty()
        .push(provider)
        .extend(segments);
    Ok(url)
}
