//! OpenAI embeddings provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use raven_core::{Error, RavenConfig, Result};

use crate::embedder::Embedder;

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_CAP_MS: u64 = 4_000;

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by the OpenAI `/embeddings` endpoint.
///
/// Transient failures (429, 5xx, connection errors) are retried with
/// exponential backoff; timeouts surface as [`Error::Timeout`] once retries
/// are exhausted.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimension: usize,
    max_retries: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &RavenConfig) -> Result<Self> {
        Self::with_endpoint(
            &config.api_base,
            &config.api_key,
            &config.embed_model,
            config.embedding_dim,
            config.request_timeout_secs,
            config.max_retries,
        )
    }

    pub fn with_endpoint(
        api_base: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout_secs: u64,
        max_retries: usize,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
            max_retries,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut attempt = 0usize;
        loop {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = response
                            .json()
                            .await
                            .map_err(|e| Error::EmbeddingService(e.to_string()))?;
                        return self.extract(parsed, texts.len());
                    }
                    if !retryable_status(status) || attempt >= self.max_retries {
                        let text = response.text().await.unwrap_or_default();
                        return Err(Error::EmbeddingService(format!(
                            "embeddings request failed with {}: {}",
                            status, text
                        )));
                    }
                    warn!(
                        "Embeddings request got {}, retrying (attempt {}/{})",
                        status,
                        attempt + 1,
                        self.max_retries
                    );
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        if e.is_timeout() {
                            return Err(Error::Timeout(format!("embeddings request: {}", e)));
                        }
                        return Err(Error::EmbeddingService(e.to_string()));
                    }
                    warn!(
                        "Embeddings request error ({}), retrying (attempt {}/{})",
                        e,
                        attempt + 1,
                        self.max_retries
                    );
                }
            }

            let delay = (BACKOFF_BASE_MS << attempt.min(6)).min(BACKOFF_CAP_MS);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    fn extract(&self, mut parsed: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if parsed.data.len() != expected {
            return Err(Error::EmbeddingService(format!(
                "expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }
        // The API may return rows out of order.
        parsed.data.sort_by_key(|row| row.index);
        let mut out = Vec::with_capacity(parsed.data.len());
        for row in parsed.data {
            if row.embedding.len() != self.dimension {
                return Err(Error::EmbeddingService(format!(
                    "expected {}-dimensional embedding, got {}",
                    self.dimension,
                    row.embedding.len()
                )));
            }
            out.push(row.embedding);
        }
        Ok(out)
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::EmbeddingService("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding batch of {} texts", texts.len());
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_embedder(base_url: &str, max_retries: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::with_endpoint(base_url, "test-key", "text-embedding-ada-002", 3, 5, max_retries)
            .unwrap()
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer test-key");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0, 0.0] },
                        { "index": 0, "embedding": [1.0, 0.0, 0.0] }
                    ]
                }));
            })
            .await;

        let embedder = test_embedder(&server.base_url(), 0);
        let vectors = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0]);
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_server_errors_retried_then_fail() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(500).body("boom");
            })
            .await;

        let embedder = test_embedder(&server.base_url(), 2);
        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingService(_)));
        // Initial attempt plus two retries.
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(401).body("bad key");
            })
            .await;

        let embedder = test_embedder(&server.base_url(), 3);
        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingService(_)));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [ { "index": 0, "embedding": [1.0, 0.0] } ]
                }));
            })
            .await;

        let embedder = test_embedder(&server.base_url(), 0);
        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingService(_)));
    }
}
