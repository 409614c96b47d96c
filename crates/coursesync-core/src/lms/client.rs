//! Pooled, retrying HTTP GET client for the LMS REST API.
//!
//! One [`FetchClient`] is built per host process and cloned into every
//! concurrent fetch; clones share the same connection pool.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::credentials::Credential;
use crate::storage::config::HttpConfig;

const USER_AGENT: &str = concat!("coursesync/", env!("CARGO_PKG_VERSION"));
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_ERROR_BODY: usize = 512;

/// Why a single remote fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or other transport failure (after retries).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Remote answered 429.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Body was not the JSON shape we expected.
    #[error("unexpected payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

/// HTTP client shared by all resource fetchers.
#[derive(Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl FetchClient {
    /// Build a client with its own connection pool.
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// GET `url` with the credential's bearer token and parse the body as JSON.
    ///
    /// Transport errors are retried up to `max_retries` times with linear
    /// backoff. Non-2xx responses are returned immediately.
    pub async fn get_json(&self, url: &str, credential: &Credential) -> Result<Value, FetchError> {
        let mut attempt = 0;
        let resp = loop {
            let sent = self
                .http
                .get(url)
                .header(reqwest::header::AUTHORIZATION, credential.bearer())
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(FetchError::from);

            match sent {
                Ok(resp) => break resp,
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(%url, attempt, error = %err, "retrying GET");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        };

        let resp = check_response(resp).await?;
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Map non-success statuses onto [`FetchError`].
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if !status.is_success() {
        let mut message = resp.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        return Err(FetchError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
