use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::core::config::OrchestratorConfig;
use crate::tiles::payload::TilePayload;
use crate::tiles::ChunkRequest;
use crate::traits::ChunkFetcher;
use crate::upstream::transport::HTTP_CLIENT;
use crate::{ChunkError, Result};

/// Fetches chunks from a chunk server's `GET /osm/chunk`
#[derive(Debug, Clone)]
pub struct HttpChunkFetcher {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpChunkFetcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            endpoint: format!("{}/osm/chunk", base_url.trim_end_matches('/')),
        }
    }

    /// Fetcher for the chunk server configured for an orchestrator
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(&config.base_url)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChunkFetcher for HttpChunkFetcher {
    async fn fetch_chunk(&self, request: &ChunkRequest) -> Result<TilePayload> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|err| ChunkError::Fetch(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "no error body".to_string());
            return Err(ChunkError::Fetch(format!("HTTP {}: {}", status, message)));
        }

        response
            .json::<TilePayload>()
            .await
            .map_err(|err| ChunkError::Decode(err.to_string()))
    }
}
