//! 답변 생성 모듈 - Ollama `/api/generate`
//!
//! 채팅 모드(직접 답변)와 문서 모드(검색 결과 기반 합성) 모두
//! `CompletionProvider`를 통해 모델을 호출합니다.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ModelConfig;

// ============================================================================
// Types
// ============================================================================

/// 생성 옵션
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 최대 생성 토큰 (num_predict)
    pub max_tokens: u32,
    pub temperature: f32,
    /// 컨텍스트 윈도우 (num_ctx)
    pub context_window: u32,
}

impl CompletionOptions {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            timeout: config.request_timeout(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            context_window: config.context_window,
        }
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

/// 생성 에러
#[derive(Debug, Error)]
pub enum CompletionError {
    /// 요청 시간 초과
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 그 밖의 서비스 오류
    #[error("{0}")]
    Service(String),
}

// ============================================================================
// CompletionProvider Trait
// ============================================================================

/// 텍스트 생성 프로바이더 트레이트
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 프롬프트에 대한 답변 생성
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Completion
// ============================================================================

/// Ollama 생성 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// 상태 확인 타임아웃
const HEALTH_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

impl OllamaCompletion {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, CompletionError> {
        // 타임아웃은 요청마다 옵션으로 지정
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CompletionError::Service(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, CompletionError> {
        Self::new(config.base_url.clone(), config.llm_model.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ollama 상태 확인 (`/api/tags`), 설치된 모델 이름 목록 반환
    pub async fn health_check(&self) -> Result<Vec<String>, CompletionError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CompletionError::Service(format!("Failed to reach Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Service(format!(
                "Ollama health check failed ({})",
                status
            )));
        }

        let tags: TagsResponse = response.json().await.map_err(|e| {
            CompletionError::Service(format!("Failed to parse model list: {}", e))
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn build_request<'a>(&'a self, prompt: &'a str, options: &CompletionOptions) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
                num_ctx: options.context_window,
            },
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let request = self.build_request(prompt, options);
        let timeout_err = || CompletionError::Timeout {
            secs: options.timeout.as_secs(),
        };

        tracing::debug!("Generating with {} ({} chars prompt)", self.model, prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    timeout_err()
                } else {
                    CompletionError::Service(format!("Failed to reach Ollama: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                timeout_err()
            } else {
                CompletionError::Service(format!("Failed to read response body: {}", e))
            }
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(CompletionError::Service(format!(
                "Ollama error ({}): {}",
                status, message
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            CompletionError::Service(format!("Failed to parse completion response: {}", e))
        })?;

        Ok(parsed.response)
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

    #[test]
    fn test_options_from_config() {
        let options = CompletionOptions::from_config(&ModelConfig::default());
        assert_eq!(options.timeout, Duration::from_secs(120));
        assert_eq!(options.max_tokens, 256);
        assert_eq!(options.context_window, 2048);
    }

    #[test]
    fn test_timeout_error_message() {
        let err = CompletionError::Timeout { secs: 120 };
        assert_eq!(err.to_string(), "request timed out after 120s");
        assert_eq!(CompletionError::Service("boom".into()).to_string(), "boom");
    }

    #[test]
    fn test_request_body() {
        let llm = OllamaCompletion::new("http://localhost:11434/", "llama3.2:3b").unwrap();
        let options = CompletionOptions::default();
        let json = serde_json::to_value(llm.build_request("hi", &options)).unwrap();

        assert_eq!(json["model"], "llama3.2:3b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 256);
        assert_eq!(json["options"]["num_ctx"], 2048);
        assert_eq!(llm.endpoint(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_generate_response_verbatim() {
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"response":"  line one\nline two\n","done":true}"#).unwrap();
        assert_eq!(parsed.response, "  line one\nline two\n");
    }

    #[test]
    fn test_tags_response_parse() {
        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"llama3.2:3b","size":2019393189}]}"#)
                .unwrap();
        assert_eq!(tags.models.len(), 1);
        assert_eq!(tags.models[0].name, "llama3.2:3b");
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let llm = OllamaCompletion::new("http://127.0.0.1:1", "llama3.2:3b").unwrap();
        let err = llm.health_check().await.unwrap_err();
        assert!(matches!(err, CompletionError::Service(_)));
    }
}
