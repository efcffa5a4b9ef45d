//! Basic authentication signer.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use super::Signer;
use crate::error::ApiError;
use crate::request::Method;

/// `Authorization: Basic base64(username:password)`.
///
/// Sends credentials in cleartext-equivalent form on every request;
/// development use only.
pub struct BasicSigner {
    username: String,
    password: String,
}

impl BasicSigner {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Signer for BasicSigner {
    fn authorize(
        &self,
        _method: Method,
        _url: &str,
        _query: &[(String, String)],
    ) -> Result<Option<String>, ApiError> {
        let credentials = format!("{}:{}", self.username, self.password);
        Ok(Some(format!("Basic {}", B64.encode(credentials))))
    }
}
