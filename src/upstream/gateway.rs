use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::queue::RequestQueue;
use super::transport::{HttpTransport, UpstreamTransport};
use crate::core::config::UpstreamConfig;
use crate::core::geo::BoundingBox;
use crate::osm::element::VectorElement;
use crate::osm::query::build_chunk_query;
use crate::osm::tags::RoadClass;
use crate::runtime::async_utils::{async_delay, jitter};
use crate::traits::ElementSource;
use crate::{ChunkError, Result};

/// The only way the pipeline reaches the shared vector-data service.
///
/// Every attempt, retries included, goes through one [`RequestQueue`], so
/// the configured spacing holds across all callers sharing this gateway.
/// Mirrors are tried in order on each pass; a 429 waits for the server's
/// hint (or `(attempt + 1) * fallback_backoff`), capped at `max_retry_wait`,
/// plus jitter before moving on. Any other failure moves on at once.
pub struct UpstreamGateway {
    config: UpstreamConfig,
    queue: RequestQueue,
    transport: Arc<dyn UpstreamTransport>,
    calls: AtomicU64,
}

impl UpstreamGateway {
    /// Gateway speaking HTTP to the configured endpoints
    pub fn new(config: UpstreamConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: UpstreamConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            queue: RequestQueue::new(config.min_interval),
            config,
            transport,
            calls: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Upstream calls made so far, retries included
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Run a raw Overpass query with the full retry policy
    pub async fn run_query(&self, query: &str) -> Result<Vec<VectorElement>> {
        if self.config.endpoints.is_empty() {
            return Err(ChunkError::UpstreamUnavailable(
                "no upstream endpoints configured".to_string(),
            ));
        }

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            for endpoint in &self.config.endpoints {
                let result = self
                    .queue
                    .run(|| {
                        self.calls.fetch_add(1, Ordering::Relaxed);
                        self.transport.execute(endpoint, query)
                    })
                    .await;

                match result {
                    Ok(elements) => {
                        log::debug!(
                            "{} returned {} elements (attempt {})",
                            endpoint,
                            elements.len(),
                            attempt
                        );
                        return Ok(elements);
                    }
                    Err(ChunkError::UpstreamRateLimited { retry_after }) => {
                        let wait = self.backoff(attempt, retry_after);
                        log::warn!(
                            "{} rate limited us (attempt {}), waiting {:?}",
                            endpoint,
                            attempt,
                            wait
                        );
                        async_delay(wait).await;
                        last_error = Some(ChunkError::UpstreamRateLimited { retry_after });
                    }
                    Err(err) => {
                        log::warn!("{} failed (attempt {}): {}", endpoint, attempt, err);
                        last_error = Some(err);
                    }
                }
            }
        }

        let err = last_error.unwrap_or_else(|| {
            ChunkError::UpstreamUnavailable("upstream request failed".to_string())
        });
        log::error!(
            "giving up after {} upstream attempts: {}",
            self.config.max_attempts(),
            err
        );
        Err(err)
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = retry_after
            .filter(|hint| !hint.is_zero())
            .unwrap_or(self.config.fallback_backoff * (attempt + 1))
            .min(self.config.max_retry_wait);
        base + jitter(self.config.max_jitter)
    }
}

#[async_trait]
impl ElementSource for UpstreamGateway {
    async fn fetch_elements(
        &self,
        bbox: &BoundingBox,
        highways: &[RoadClass],
    ) -> Result<Vec<VectorElement>> {
        let query = build_chunk_query(bbox, highways);
        self.run_query(&query).await
    }
}
