//! Persisted client configuration.
//!
//! The configuration file holds the CMR endpoint URLs, the provider
//! credentials, the ingest content type and the last Echo token that was
//! issued. It is a TOML document with four tables:
//!
//! ```toml
//! [search]
//! granule_url = "https://cmr.earthdata.nasa.gov/search/granules?page_size=50&page_num={}"
//! granule_meta_url = "https://cmr.earthdata.nasa.gov/search/granules.json?page_size=50&page_num={}"
//! collection_url = "https://cmr.earthdata.nasa.gov/search/collections?page_size=50&page_num={}"
//! collection_meta_url = "https://cmr.earthdata.nasa.gov/search/collections.json?page_size=50&page_num={}"
//! collection_by_shortname = "https://cmr.earthdata.nasa.gov/search/collections?short_name="
//! granule_by_ur = "https://cmr.earthdata.nasa.gov/search/granules?granule_ur="
//!
//! [ingest]
//! ingest_url = "https://cmr.earthdata.nasa.gov/ingest/providers/"
//! ingest_validation_url = "https://cmr.earthdata.nasa.gov/ingest/providers/"
//! content_type = "application/echo10+xml"
//! echo_token = "..."
//!
//! [credentials]
//! provider = "PROV1"
//! username = "user"
//! password = "secret"
//! client_id = "my-client"
//!
//! [request]
//! request_token_url = "https://api.echo.nasa.gov/echo-rest/tokens/"
//! ```
//!
//! The file is the only durable state of the client: a refreshed token is
//! written back into `ingest.echo_token` before it is used.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml_edit::DocumentMut;
use tracing::debug;

/// Application name used for the config directory path
const APP_NAME: &str = "cmr-client";

/// Config file name
const CONFIG_FILE: &str = "cmr.toml";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "CMR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The config file {path:?} can't be opened for reading and writing: {source}")]
    Inaccessible {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not parse config file: {0}")]
    Parse(#[from] toml_edit::TomlError),

    #[error("Invalid config file: {0}")]
    Invalid(#[from] toml_edit::de::Error),

    #[error("Could not write config file: {0}")]
    Write(std::io::Error),

    #[error("Could not find config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmrConfig {
    pub search: SearchConfig,
    pub ingest: IngestConfig,
    pub credentials: CredentialsConfig,
    pub request: RequestConfig,
}

/// Search endpoints. The paged URLs contain a `{}` placeholder for the page
/// number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub granule_url: String,
    pub granule_meta_url: String,
    pub collection_url: String,
    pub collection_meta_url: String,
    pub collection_by_shortname: String,
    pub granule_by_ur: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub ingest_url: String,
    pub ingest_validation_url: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_token: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub provider: String,
    pub username: String,
    /// Falls back to the OS keychain when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub client_id: String,
    /// Discovered from the outbound interface when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ip_address: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("provider", &self.provider)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("user_ip_address", &self.user_ip_address)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub request_token_url: String,
}

/// The configuration file together with its parsed document, so the token
/// can be rewritten without disturbing the rest of the file.
pub struct ConfigStore {
    path: PathBuf,
    document: DocumentMut,
    config: CmrConfig,
}

// The raw document holds the password, so only the parsed config is shown.
impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Open and parse the config file.
    ///
    /// The file must be readable and writable, since a refreshed token is
    /// written back into it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let inaccessible = |source: std::io::Error| ConfigError::Inaccessible {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(inaccessible)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(inaccessible)?;

        let document: DocumentMut = contents.parse()?;
        let config: CmrConfig = toml_edit::de::from_str(&contents)?;
        debug!(path = ?path, has_token = config.ingest.echo_token.is_some(), "Config loaded");

        Ok(Self {
            path,
            document,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CmrConfig {
        &self.config
    }

    /// The last token written to the config file, if any
    pub fn token(&self) -> Option<&str> {
        self.config.ingest.echo_token.as_deref()
    }

    /// Write `token` into `ingest.echo_token` and persist the file.
    ///
    /// The file is replaced atomically through a temporary file in the same
    /// directory as the resolved target, so a symlinked config stays a
    /// symlink and the file keeps its permissions. The in-memory copy only
    /// changes once the write succeeded.
    pub fn persist_token(&mut self, token: &str) -> Result<(), ConfigError> {
        let mut document = self.document.clone();
        document["ingest"]["echo_token"] = toml_edit::value(token);

        let target = fs::canonicalize(&self.path).map_err(ConfigError::Write)?;
        let permissions = fs::metadata(&target)
            .map_err(ConfigError::Write)?
            .permissions();
        let dir = target.parent().unwrap_or_else(|| Path::new("."));

        let mut tempfile = tempfile::Builder::new()
            .prefix(".cmr-config")
            .tempfile_in(dir)
            .map_err(ConfigError::Write)?;
        tempfile
            .write_all(document.to_string().as_bytes())
            .map_err(ConfigError::Write)?;
        tempfile
            .as_file()
            .set_permissions(permissions)
            .map_err(ConfigError::Write)?;
        tempfile
            .persist(&target)
            .map_err(|e| ConfigError::Write(e.error))?;

        self.document = document;
        self.config.ingest.echo_token = Some(token.to_string());
        debug!(path = ?self.path, "Token written to config file");
        Ok(())
    }
}

/// Location of the config file: `$CMR_CONFIG` when set, otherwise
/// `<config dir>/cmr-client/cmr.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
}
