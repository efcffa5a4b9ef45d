//! WordPress REST API client.
//!
//! This crate issues authenticated CRUD requests against a WordPress
//! `wp-json` endpoint, classifies the many ways a request can fail
//! (transient network trouble, rate limits, nonce collisions, missing or
//! conflicting resources, garbage responses), and retries the transient
//! ones inside a bounded loop. Pagination metadata from the response
//! headers is exposed alongside the decoded body.
//!
//! Authentication is either OAuth1 (production) or basic auth (development
//! only), selected by the configured credentials.
//!
//! # Quick start
//!
//! ```no_run
//! use wp_client::{Client, ClientConfig, FetchOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig {
//!     endpoint: "https://example.com/wp-json".to_string(),
//!     username: "admin".to_string(),
//!     password: "secret".to_string(),
//!     ..ClientConfig::default()
//! };
//! let mut client = Client::new(&config)?;
//! let posts = client
//!     .fetch("posts", FetchOptions::default())
//!     .await?
//!     .as_array()?;
//! println!("{} posts of {:?} total", posts.len(), client.total_records());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod request;
pub mod transport;

pub use client::{Client, Context, FetchOptions};
pub use config::{load_config, AuthScheme, ClientConfig};
pub use error::{ApiError, ConfigError, ErrorKind};
pub use executor::{ApiResult, Backoff, RetryPolicy};
