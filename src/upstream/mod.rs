//! Client for the upstream log-pull API.
//!
//! Key constraints enforced before any request is issued:
//! - maximum pull window per request (provider limit: 1 hour),
//! - logs are available only after a minimum delay (provider limit: 1 minute),
//! - logs are retained upstream for a bounded number of days, which caps
//!   how far a missed pull can be backfilled.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::UpstreamConfig;

/// Cap on how much of an upstream error body is kept in the error message.
const BODY_SNIPPET_LIMIT: usize = 4096;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("window of {requested_secs}s exceeds upstream maximum of {max_secs}s")]
    WindowTooLarge { requested_secs: i64, max_secs: i64 },

    #[error("logs not yet available: window end must be at least {min_delay_secs}s in the past")]
    NotYetAvailable { min_delay_secs: i64 },

    #[error("rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream HTTP {status}: {snippet}")]
    Upstream { status: u16, snippet: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Capability used by the pull processor to fetch one window of raw
/// newline-delimited log lines. Kept narrow so tests can substitute it.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch(
        &self,
        zone_id: &str,
        api_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        fields: &[String],
    ) -> Result<Bytes>;
}

/// HTTP implementation of [`LogSource`] against the provider's log-pull
/// endpoint. Transport gzip is decompressed transparently, so callers
/// always see plain NDJSON bytes.
pub struct LogPullClient {
    http: Client,
    base_url: String,
    max_window: chrono::Duration,
    min_delay: chrono::Duration,
}

impl LogPullClient {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            max_window: chrono::Duration::seconds(cfg.max_window_secs as i64),
            min_delay: chrono::Duration::seconds(cfg.min_delay_secs as i64),
        })
    }

    fn check_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<()> {
        let requested = to - from;
        if requested > self.max_window {
            return Err(UpstreamError::WindowTooLarge {
                requested_secs: requested.num_seconds(),
                max_secs: self.max_window.num_seconds(),
            });
        }
        if Utc::now() - to < self.min_delay {
            return Err(UpstreamError::NotYetAvailable {
                min_delay_secs: self.min_delay.num_seconds(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LogSource for LogPullClient {
    async fn fetch(
        &self,
        zone_id: &str,
        api_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        fields: &[String],
    ) -> Result<Bytes> {
        self.check_window(from, to)?;

        let url = format!("{}/zones/{}/logs/received", self.base_url, zone_id);
        let mut request = self
            .http
            .get(&url)
            .bearer_auth(api_token)
            .query(&[
                ("start", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("end", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("timestamps", "rfc3339".to_string()),
            ]);
        if !fields.is_empty() {
            request = request.query(&[("fields", fields.join(","))]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(30);
            return Err(UpstreamError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let end = body.len().min(BODY_SNIPPET_LIMIT);
            return Err(UpstreamError::Upstream {
                status: status.as_u16(),
                snippet: String::from_utf8_lossy(&body[..end]).into_owned(),
            });
        }

        let bytes = response.bytes().await?;
        debug!(zone_id, size = bytes.len(), "log window fetched");
        Ok(bytes)
    }
}
