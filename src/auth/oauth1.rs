//! OAuth1 request signer.
//!
//! Produces the `Authorization: OAuth …` header for one attempt: HMAC-SHA1
//! over the RFC 5849 signature base string, with a fresh nonce and timestamp
//! every call. Token exchange and the authorize flow are not part of this
//! crate; the signer consumes an already-issued access token.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

use super::Signer;
use crate::error::ApiError;
use crate::request::{percent_encode, Method};

const NONCE_LEN: usize = 16;
const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Signs requests with OAuth1 consumer + access-token credentials.
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

impl OAuth1Signer {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        token: impl Into<String>,
        token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: token.into(),
            token_secret: token_secret.into(),
        }
    }

    fn signing_key(&self) -> String {
        format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.token_secret)
        )
    }
}

fn nonce() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..NONCE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// RFC 5849 §3.4.1: uppercase method, encoded base URL, and the encoded
/// sorted parameter string, joined with `&`.
fn signature_base(method: Method, url: &str, pairs: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    encoded.sort();
    let params = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(url),
        percent_encode(&params)
    )
}

impl Signer for OAuth1Signer {
    fn authorize(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Option<String>, ApiError> {
        let oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), unix_now_secs().to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];

        let mut pairs: Vec<(String, String)> = query.to_vec();
        pairs.extend(oauth_params.iter().cloned());
        let base = signature_base(method, url, &pairs);

        let mut mac = Hmac::<Sha1>::new_from_slice(self.signing_key().as_bytes())
            .map_err(|e| ApiError::fatal(format!("failed to derive OAuth1 signing key: {e}")))?;
        mac.update(base.as_bytes());
        let signature = B64.encode(mac.finalize().into_bytes());

        let mut header_params = oauth_params;
        header_params.push(("oauth_signature".to_string(), signature));
        let header = header_params
            .iter()
            .map(|(key, value)| format!("{key}=\"{}\"", percent_encode(value)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Some(format!("OAuth {header}")))
    }
}
