use std::fmt;
use std::net::{IpAddr, UdpSocket};

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::config::CmrConfig;

const SERVICE_NAME: &str = "cmr-client";

/// Any routable address works; connecting a UDP socket sends nothing.
const IP_DISCOVERY_TARGET: &str = "8.8.8.8:80";

/// Account details sent to the token service.
///
/// Built right before a token request and dropped once the token has been
/// read from the response.
#[derive(Clone)]
pub struct CredentialRecord {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub provider: String,
    pub user_ip_address: String,
}

impl CredentialRecord {
    /// Build a record from the config file, resolving the password (config
    /// file first, then the OS keychain) and the host address.
    pub fn from_config(config: &CmrConfig) -> Result<Self> {
        let credentials = &config.credentials;
        let password = match credentials.password {
            Some(ref password) => password.clone(),
            None => CredentialStore::password(&credentials.username)?.ok_or_else(|| {
                anyhow!(
                    "No password for {} in config file or keychain",
                    credentials.username
                )
            })?,
        };
        let user_ip_address = match credentials.user_ip_address {
            Some(ref ip) => ip.clone(),
            None => local_ip_address()?.to_string(),
        };

        Ok(Self {
            username: credentials.username.clone(),
            password,
            client_id: credentials.client_id.clone(),
            provider: credentials.provider.clone(),
            user_ip_address,
        })
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("provider", &self.provider)
            .field("user_ip_address", &self.user_ip_address)
            .finish()
    }
}

/// Address of the interface this host uses for outbound traffic.
pub fn local_ip_address() -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind UDP socket")?;
    socket
        .connect(IP_DISCOVERY_TARGET)
        .context("Failed to determine outbound interface")?;
    let addr = socket
        .local_addr()
        .context("Failed to read local socket address")?;
    debug!(ip = %addr.ip(), "Discovered local IP address");
    Ok(addr.ip())
}

/// Account passwords kept in the OS keychain, keyed by username.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(username: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, username).context("Failed to open keychain entry")
    }

    pub fn store(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// The stored password, or `None` if the keychain has no entry
    pub fn password(username: &str) -> Result<Option<String>> {
        match Self::entry(username)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve password from keychain"),
        }
    }

    /// Remove the stored password. Returns false if there was none.
    pub fn delete(username: &str) -> Result<bool> {
        match Self::entry(username)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }

    pub fn has_credentials(username: &str) -> bool {
        matches!(Self::password(username), Ok(Some(_)))
    }
}
