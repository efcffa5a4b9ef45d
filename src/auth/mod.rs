//! Authentication capability for outbound requests.
//!
//! The client supports two variants behind the [`Signer`] trait:
//! - [`OAuth1Signer`]: signed requests for production traffic.
//! - [`BasicSigner`]: `Authorization: Basic` for development setups only.
//!
//! Trait dispatch keeps the variants closed: the executor and builder only
//! ever see a `dyn Signer`.

mod basic;
mod oauth1;

use std::sync::Arc;

pub use basic::BasicSigner;
pub use oauth1::OAuth1Signer;

use crate::config::{AuthScheme, ClientConfig};
use crate::error::{ApiError, ConfigError};
use crate::request::Method;

/// Produces the `Authorization` header for one send attempt.
///
/// Called once per attempt so implementations needing per-attempt freshness
/// (OAuth1 nonce and timestamp) regenerate on every retry. `query` carries
/// the request's query parameters, which signed variants fold into the
/// signature. `None` means the request goes out without an auth header.
pub trait Signer: Send + Sync {
    fn authorize(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Option<String>, ApiError>;
}

/// Build the signer selected by the configured credentials.
///
/// Signed auth wins when client key, client secret and access token are all
/// present; otherwise username/password selects basic auth.
pub fn signer_from_config(config: &ClientConfig) -> Result<Arc<dyn Signer>, ConfigError> {
    match config.auth_scheme()? {
        AuthScheme::OAuth1 => Ok(Arc::new(OAuth1Signer::new(
            &config.client_key,
            &config.client_secret,
            &config.access_token,
            &config.access_token_secret,
        ))),
        AuthScheme::Basic => {
            tracing::warn!(
                "basic auth selected; intended for development only, never for untrusted networks"
            );
            Ok(Arc::new(BasicSigner::new(&config.username, &config.password)))
        }
    }
}
