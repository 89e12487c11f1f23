use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::token::{self, PROBE_COLLECTION};
use super::CredentialRecord;
use crate::api::client::provider_url;
use crate::api::ApiError;
use crate::config::ConfigStore;

/// Header carrying the token on ingest requests
pub const ECHO_TOKEN_HEADER: &str = "echo-token";

/// Content type of the token request body
const TOKEN_REQUEST_CONTENT_TYPE: &str = "application/xml";

/// The current token and the request headers derived from it.
///
/// The headers are only ever built together with the token, so a request
/// never carries a token other than `token()`.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    content_type: String,
    headers: HeaderMap,
}

impl Session {
    pub fn new(token: String, content_type: String) -> Result<Self> {
        let headers = build_headers(&content_type, &token)?;
        Ok(Self {
            token,
            content_type,
            headers,
        })
    }

    /// A session for `token` with the same content type
    pub fn with_token(&self, token: String) -> Result<Self> {
        Self::new(token, self.content_type.clone())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// `Content-type` and `Echo-Token` headers for ingest requests
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

fn build_headers(content_type: &str, token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type).context("Invalid content type")?,
    );
    headers.insert(
        HeaderName::from_static(ECHO_TOKEN_HEADER),
        HeaderValue::from_str(token).context("Token is not a valid header value")?,
    );
    Ok(headers)
}

/// Owns the session and keeps it valid.
///
/// The session lock is held for a whole probe/refresh sequence, so
/// concurrent callers never mint two tokens for one expiry and never write
/// the config file at the same time.
pub struct SessionManager {
    client: Client,
    store: Mutex<ConfigStore>,
    session: Mutex<Session>,
    probe_url: String,
    request_token_url: String,
}

impl SessionManager {
    /// Load the session from the config store, minting and persisting a
    /// token first if the store has none.
    pub async fn initialize(client: Client, mut store: ConfigStore) -> Result<Self> {
        let config = store.config().clone();
        let probe_url = provider_url(
            &config.ingest.ingest_validation_url,
            &config.credentials.provider,
            &["collections", PROBE_COLLECTION],
        )?
        .to_string();
        let request_token_url = config.request.request_token_url.clone();

        let token = match store.token() {
            Some(token) => token.to_string(),
            None => {
                info!("No token in config file");
                let record = CredentialRecord::from_config(&config)?;
                let token = request_token(&client, &request_token_url, record).await?;
                store.persist_token(&token)?;
                token
            }
        };
        let session = Session::new(token, config.ingest.content_type.clone())?;

        Ok(Self {
            client,
            store: Mutex::new(store),
            session: Mutex::new(session),
            probe_url,
            request_token_url,
        })
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Ask the ingest service whether it still knows the current token.
    pub async fn is_expired(&self) -> Result<bool> {
        let session = self.session.lock().await;
        self.probe(&session).await
    }

    /// Request a new token from the token service.
    pub async fn acquire(&self) -> Result<String> {
        let record = {
            let store = self.store.lock().await;
            CredentialRecord::from_config(store.config())?
        };
        request_token(&self.client, &self.request_token_url, record).await
    }

    /// Replace the token unconditionally and return the new headers.
    pub async fn refresh(&self) -> Result<HeaderMap> {
        let mut session = self.session.lock().await;
        self.refresh_locked(&mut session).await?;
        Ok(session.headers().clone())
    }

    /// Headers for a token-bearing request, refreshing the token first if
    /// the probe reports it expired.
    pub async fn fresh_headers(&self) -> Result<HeaderMap> {
        let mut session = self.session.lock().await;
        if self.probe(&session).await? {
            warn!("Token has expired");
            self.refresh_locked(&mut session).await?;
        }
        Ok(session.headers().clone())
    }

    async fn probe(&self, session: &Session) -> Result<bool> {
        debug!(url = %self.probe_url, "Probing token");
        let response = self
            .client
            .put(&self.probe_url)
            .headers(session.headers().clone())
            .send()
            .await
            .map_err(ApiError::from)
            .context("Failed to send token probe")?;
        let body = response
            .text()
            .await
            .map_err(ApiError::from)
            .context("Failed to read token probe response")?;
        Ok(token::is_token_missing(&body, session.token()))
    }

    /// Mint a token, persist it, then swap it into `session`. On any failure
    /// both the session and the config file keep the previous token.
    async fn refresh_locked(&self, session: &mut Session) -> Result<()> {
        info!("Replacing the Echo token");
        let token = self.acquire().await?;
        let refreshed = session.with_token(token)?;
        self.store.lock().await.persist_token(refreshed.token())?;
        *session = refreshed;
        info!("Echo token replaced");
        Ok(())
    }
}

async fn request_token(client: &Client, url: &str, record: CredentialRecord) -> Result<String> {
    info!("Requesting a new token");
    let body = token::token_request_body(&record);
    drop(record);

    let response = client
        .post(url)
        .header(header::CONTENT_TYPE, TOKEN_REQUEST_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .map_err(ApiError::from)
        .context("Failed to send token request")?;
    let text = response
        .text()
        .await
        .map_err(ApiError::from)
        .context("Failed to read token response")?;
    token::extract_token(&text)
}
