use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::core::config::UpstreamConfig;
use crate::osm::element::VectorElement;
use crate::osm::query::parse_elements;
use crate::{ChunkError, Result};

/// Shared async HTTP client. Building it once keeps one TLS setup and one
/// connection pool for every upstream mirror and chunk fetch.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|err| {
            log::warn!("falling back to default HTTP client: {}", err);
            Client::new()
        })
});

/// One query against one mirror
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Run `query` against `endpoint`.
    ///
    /// A 429 must map to [`ChunkError::UpstreamRateLimited`] carrying the
    /// server's retry hint, other failures to `UpstreamUnavailable` or
    /// `UpstreamTimeout`.
    async fn execute(&self, endpoint: &str, query: &str) -> Result<Vec<VectorElement>>;
}

/// Overpass over HTTP: a form-encoded POST of `data=<query>`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            timeout: config.request_timeout,
            user_agent: config.user_agent.clone(),
        }
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn execute(&self, endpoint: &str, query: &str) -> Result<Vec<VectorElement>> {
        let response = self
            .client
            .post(endpoint)
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .form(&[("data", query)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| parse_retry_after(value, Utc::now()));
            return Err(ChunkError::UpstreamRateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChunkError::UpstreamUnavailable(format!(
                "{} answered {}: {}",
                endpoint,
                status,
                truncate(&body, 200)
            )));
        }

        let body = response.text().await?;
        parse_elements(&body).map_err(|err| {
            ChunkError::UpstreamUnavailable(format!("{} sent an unreadable body: {}", endpoint, err))
        })
    }
}

/// Parse a `Retry-After` value: delta seconds or an HTTP date.
///
/// Dates in the past, unparseable values and values too large for a
/// `Duration` give `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    (at.with_timezone(&Utc) - now).to_std().ok()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("2", now), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("-3", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("NaN", now), None);
        assert_eq!(parse_retry_after("1e30", now), None);
        assert_eq!(parse_retry_after("inf", now), None);
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(10))
        );
        // Already passed
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:27:00 GMT", now), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
