//! Shared HTTP plumbing for the upstream adapters

use crate::config::SourcesConfig;
use crate::error::{Result, WendeError};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;

const AGENT: &str = concat!("wende/", env!("CARGO_PKG_VERSION"));

/// reqwest client with per-request timeout and retry on transient failures
#[derive(Clone)]
pub struct HttpClient {
    source: &'static str,
    client: reqwest::Client,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    logger: StructuredLogger,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

impl HttpClient {
    pub fn new(source: &'static str, settings: &SourcesConfig) -> Result<Self> {
        Self::with_settings(
            source,
            Duration::from_secs(settings.fetch_timeout_secs),
            settings.retry_attempts,
            Duration::from_millis(settings.retry_delay_ms),
        )
    }

    pub fn with_settings(
        source: &'static str,
        timeout: Duration,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WendeError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            source,
            client,
            timeout,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
            logger: get_logger(source),
        })
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// GET `url` and return status and body. Timeouts and connection
    /// failures are retried; HTTP error statuses are returned to the caller.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<(reqwest::StatusCode, String)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_once(url, query).await {
                Ok(out) => return Ok(out),
                Err(e) if attempt < self.retry_attempts && is_transient(&e) => {
                    self.logger.warn(&format!(
                        "GET {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        url, attempt, self.retry_attempts, e, self.retry_delay
                    ));
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    self.logger.error(&format!(
                        "GET {} failed after {} attempts: {}",
                        url, attempt, e
                    ));
                    return Err(e);
                }
            }
        }
    }

    /// Like [`get_text`](Self::get_text) but non-2xx is a fetch error
    pub async fn get_ok_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let (status, body) = self.get_text(url, query).await?;
        if !status.is_success() {
            return Err(WendeError::fetch(
                self.source,
                format!("{} returned {}: {}", url, status, snippet(&body)),
            ));
        }
        Ok(body)
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<(reqwest::StatusCode, String)> {
        let request = self
            .client
            .get(url)
            .query(query)
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, "*/*")
            .send();
        let resp = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                WendeError::timeout(format!("{} did not answer within {:?}", url, self.timeout))
            })??;
        let status = resp.status();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

fn is_transient(err: &WendeError) -> bool {
    matches!(err, WendeError::Timeout { .. } | WendeError::Network { .. })
}

/// First characters of a body for log and error messages
pub(crate) fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
