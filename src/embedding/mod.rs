//! 임베딩 모듈 - Ollama API를 통한 텍스트 벡터화
//!
//! 청크와 질문을 같은 모델로 벡터화해야 검색이 의미를 가집니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::from_config(&config.model)?;
//! let embedding = embedder.embed("연차 신청 절차").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 연결 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 500;

/// Ollama 임베딩 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-embeddings
#[derive(Debug)]
pub struct OllamaEmbedding {
    base_url: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
}

impl OllamaEmbedding {
    /// 새 인스턴스 생성
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Invalid dimension: 0");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            dimension,
        })
    }

    /// 설정에서 생성
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.embed_model.clone(),
            config.embed_dimension,
            config.request_timeout(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }
}

/// Ollama 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Ollama 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Ollama 에러 응답
#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 빈 텍스트 처리
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let mut last_error: Option<anyhow::Error> = None;

        // 연결 실패는 지수 백오프로 재시도 (모델 로딩 중일 수 있음)
        for attempt in 0..=MAX_RETRIES {
            let response = match self.client.post(self.endpoint()).json(&request).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES && !e.is_timeout() {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let embed_response: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;

                if embed_response.embedding.len() != self.dimension {
                    anyhow::bail!(
                        "Embedding dimension mismatch: model '{}' returned {}, expected {}",
                        self.model,
                        embed_response.embedding.len(),
                        self.dimension
                    );
                }
                return Ok(embed_response.embedding);
            }

            if let Ok(error) = serde_json::from_str::<OllamaErrorBody>(&body) {
                anyhow::bail!("Ollama embedding error ({}): {}", status, error.error);
            }
            anyhow::bail!("Ollama embedding error ({}): {}", status, body);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OllamaEmbedding {
        OllamaEmbedding::new(
            "http://127.0.0.1:11434/",
            "nomic-embed-text",
            768,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_dimension() {
        let result = OllamaEmbedding::new("http://x", "m", 0, Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_trims_slash() {
        assert_eq!(embedder().endpoint(), "http://127.0.0.1:11434/api/embeddings");
    }

    #[test]
    fn test_from_config() {
        let config = ModelConfig::default();
        let embedder = OllamaEmbedding::from_config(&config).unwrap();
        assert_eq!(embedder.dimension(), 768);
        assert_eq!(embedder.name(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        // 네트워크 호출 없이 반환
        let embedding = embedder().embed("   ").await.unwrap();
        assert_eq!(embedding.len(), 768);
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_request_serialization() {
        let req = EmbedRequest {
            model: "nomic-embed-text",
            prompt: "hello",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "nomic-embed-text");
        assert_eq!(json["prompt"], "hello");
    }
}
