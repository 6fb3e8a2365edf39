//! 설정 모듈
//!
//! 인덱서와 질의 라우터가 함께 쓰는 설정입니다.
//! 전역 상태 대신 `RagConfig` 값을 명시적으로 전달합니다.
//!
//! 로드 순서:
//! 1. 기본값
//! 2. TOML 파일 (`--config` 또는 `./hr-rag.toml`)
//! 3. 환경변수 (`OLLAMA_HOST`, `HR_RAG_*`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// 기본 설정 파일 이름
pub const DEFAULT_CONFIG_FILE: &str = "hr-rag.toml";

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "indexed_files.json";

/// 벡터 저장소 디렉토리 이름
pub const VECTOR_DIR: &str = "vectors.lance";

// ============================================================================
// Config Types
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub paths: PathsConfig,
    pub model: ModelConfig,
    pub chunking: ChunkConfig,
    pub query: QueryConfig,
}

/// 경로 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// 원본 PDF 폴더
    pub data_dir: PathBuf,
    /// 벡터 저장소 + 매니페스트 상위 폴더
    pub persist_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            persist_dir: PathBuf::from("./rag_store"),
        }
    }
}

impl PathsConfig {
    /// LanceDB 디렉토리 경로
    pub fn vector_dir(&self) -> PathBuf {
        self.persist_dir.join(VECTOR_DIR)
    }

    /// 매니페스트 파일 경로
    pub fn manifest_path(&self) -> PathBuf {
        self.persist_dir.join(MANIFEST_FILE)
    }
}

/// Ollama 모델 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Ollama 서버 주소
    pub base_url: String,
    /// 답변 생성 모델
    pub llm_model: String,
    /// 임베딩 모델
    pub embed_model: String,
    /// 임베딩 차원
    pub embed_dimension: usize,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 최대 생성 토큰 (num_predict)
    pub max_tokens: u32,
    pub temperature: f32,
    /// 컨텍스트 윈도우 (num_ctx)
    pub context_window: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3.2:3b".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            embed_dimension: 768,
            request_timeout_secs: 120,
            max_tokens: 256,
            temperature: 0.7,
            context_window: 2048,
        }
    }
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 청킹 설정 (단위: 공백 기준 단어)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

/// 질의 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 문서 모드 검색 결과 수
    pub top_k: usize,
    /// 채팅 모드 역할 지시문
    pub system_prompt: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            system_prompt:
                "You are a helpful HR assistant at CGI. Answer concisely in 2-3 sentences."
                    .to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl RagConfig {
    /// 설정 로드
    ///
    /// `path`가 주어지면 반드시 존재해야 하고, 없으면 `./hr-rag.toml`을
    /// 찾아보고 없을 경우 기본값을 사용합니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// 환경변수 덮어쓰기
    ///
    /// 테스트를 위해 조회 함수를 주입받습니다.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("OLLAMA_HOST") {
            self.model.base_url = normalize_base_url(&host);
        }
        if let Some(model) = get("HR_RAG_LLM_MODEL") {
            self.model.llm_model = model;
        }
        if let Some(model) = get("HR_RAG_EMBED_MODEL") {
            self.model.embed_model = model;
        }
        if let Some(dir) = get("HR_RAG_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("HR_RAG_PERSIST_DIR") {
            self.paths.persist_dir = PathBuf::from(dir);
        }
        if let Some(top_k) = get("HR_RAG_TOP_K") {
            match top_k.parse() {
                Ok(k) => self.query.top_k = k,
                Err(_) => tracing::warn!("Ignoring invalid HR_RAG_TOP_K: {}", top_k),
            }
        }
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.query.top_k == 0 {
            bail!("query.top_k must be at least 1");
        }
        if self.model.request_timeout_secs == 0 {
            bail!("model.request_timeout_secs must be greater than 0");
        }
        if self.model.embed_dimension == 0 {
            bail!("model.embed_dimension must be greater than 0");
        }
        Ok(())
    }
}

/// `OLLAMA_HOST`는 스킴 없이 `host:port`로 주어지는 경우가 많음
fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 1024);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.query.top_k, 2);
        assert_eq!(config.model.request_timeout_secs, 120);
        assert_eq!(config.model.embed_model, "nomic-embed-text");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_layout() {
        let paths = PathsConfig::default();
        assert_eq!(paths.vector_dir(), PathBuf::from("./rag_store/vectors.lance"));
        assert_eq!(
            paths.manifest_path(),
            PathBuf::from("./rag_store/indexed_files.json")
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: RagConfig = toml::from_str(
            r#"
            [model]
            llm_model = "qwen2.5:latest"

            [query]
            top_k = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.model.llm_model, "qwen2.5:latest");
        assert_eq!(config.query.top_k, 4);
        // 나머지는 기본값 유지
        assert_eq!(config.model.embed_model, "nomic-embed-text");
        assert_eq!(config.chunking, ChunkConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hr-rag.toml");
        std::fs::write(&path, "[paths]\ndata_dir = \"/srv/hr\"\n").unwrap();

        let config = RagConfig::from_file(&path).unwrap();
        assert_eq!(config.paths.data_dir, PathBuf::from("/srv/hr"));
        assert_eq!(config.paths.persist_dir, PathBuf::from("./rag_store"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OLLAMA_HOST", "127.0.0.1:11500"),
            ("HR_RAG_LLM_MODEL", "qwen2.5:latest"),
            ("HR_RAG_TOP_K", "5"),
            ("HR_RAG_EMBED_MODEL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.model.base_url, "http://127.0.0.1:11500");
        assert_eq!(config.model.llm_model, "qwen2.5:latest");
        assert_eq!(config.query.top_k, 5);
        // 빈 값은 무시
        assert_eq!(config.model.embed_model, "nomic-embed-text");
    }

    #[test]
    fn test_invalid_top_k_env_ignored() {
        let mut config = RagConfig::default();
        config.apply_env(|k| (k == "HR_RAG_TOP_K").then(|| "many".to_string()));
        assert_eq!(config.query.top_k, 2);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = 1024;
        assert!(config.validate().is_err());

        let mut config = RagConfig::default();
        config.query.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("localhost:11434"), "http://localhost:11434");
        assert_eq!(
            normalize_base_url("https://ollama.internal/"),
            "https://ollama.internal"
        );
    }
}
