//! hr-rag - 로컬 HR 문서 RAG 도우미
//!
//! PDF 폴더를 LanceDB에 색인하고, 질문을 채팅 모드(모델 직접 답변)
//! 또는 문서 모드(검색 + 합성)로 라우팅합니다. 모델은 로컬 Ollama를 사용합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod indexing;
pub mod knowledge;
pub mod llm;
pub mod query;

// Re-exports
pub use config::RagConfig;
pub use embedding::{EmbeddingProvider, OllamaEmbedding};
pub use indexing::{IndexError, IndexOutcome, IndexPolicy, IndexingController};
pub use knowledge::{LanceVectorStore, Manifest, SearchResult, VectorEntry, VectorStore};
pub use llm::{CompletionError, CompletionProvider, OllamaCompletion};
pub use query::{ChatTurn, Mode, ModePreference, QueryError, QueryRouter, Transcript};
