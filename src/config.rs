//! Client configuration.
//!
//! Credentials select the auth variant: OAuth1 (client key/secret + access
//! token) is preferred for production; username/password falls back to basic
//! auth for development setups. Validation happens at client construction,
//! before any network activity.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::executor::DEFAULT_MAX_RETRY_ATTEMPTS;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The WordPress REST API slug appended to bare site URLs for signed auth.
const WP_JSON_SLUG: &str = "wp-json";

/// Connection and credential settings for one client instance.
///
/// Empty strings mean "not configured"; this keeps the TOML surface flat.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API endpoint URL. Required.
    pub endpoint: String,
    /// OAuth1 consumer key.
    pub client_key: String,
    /// OAuth1 consumer secret.
    pub client_secret: String,
    /// OAuth1 access token.
    pub access_token: String,
    /// OAuth1 access token secret.
    pub access_token_secret: String,
    /// Basic-auth username (development only).
    pub username: String,
    /// Basic-auth password (development only).
    pub password: String,
    /// Upper bound on retried attempts per operation.
    pub max_retry_attempts: u32,
    /// Per-attempt transport timeout.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            client_key: String::new(),
            client_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            username: String::new(),
            password: String::new(),
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Authentication variant selected by the configured credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    OAuth1,
    Basic,
}

impl ClientConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(raw)?;
        Ok(config)
    }

    fn has_signed_credentials(&self) -> bool {
        !self.client_key.trim().is_empty()
            && !self.client_secret.trim().is_empty()
            && !self.access_token.trim().is_empty()
    }

    fn has_basic_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.trim().is_empty()
    }

    /// Validate credentials and pick the auth variant. Signed auth wins when
    /// fully present, even if basic credentials are also configured.
    pub fn auth_scheme(&self) -> Result<AuthScheme, ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("Specify valid endpoint.".to_string()));
        }
        if self.has_signed_credentials() {
            return Ok(AuthScheme::OAuth1);
        }
        if self.has_basic_credentials() {
            return Ok(AuthScheme::Basic);
        }
        Err(ConfigError::Invalid(
            "Either specify client_key, client_secret & access_token for OAuth1 [production] \
             or username and password for basic auth [development only]."
                .to_string(),
        ))
    }

    /// The API root requests are issued against.
    ///
    /// Signed auth accepts a bare site URL and appends the `wp-json` slug
    /// when missing; basic auth uses the endpoint exactly as configured.
    pub(crate) fn api_root(&self) -> Result<String, ConfigError> {
        let scheme = self.auth_scheme()?;
        let base = self.endpoint.trim().trim_end_matches('/');
        match scheme {
            AuthScheme::OAuth1 if !base.ends_with(&format!("/{WP_JSON_SLUG}")) => {
                Ok(format!("{base}/{WP_JSON_SLUG}"))
            }
            _ => Ok(base.to_string()),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    ClientConfig::from_toml_str(&raw)
}
