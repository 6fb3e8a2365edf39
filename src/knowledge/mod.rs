//! Knowledge 모듈 - 청크 벡터 저장소와 색인 매니페스트
//!
//! - Chunker: 페이지 텍스트를 단어 단위 청크로 분할
//! - VectorStore: 청크 임베딩 저장/검색 (LanceDB, 메모리)
//! - Manifest: 이미 색인된 파일명 목록 (JSON)

mod chunker;
mod lance;
mod manifest;
mod vector;

// Re-exports
pub use chunker::{chunk_text, Chunk, Chunker, WordChunker};
pub use lance::LanceVectorStore;
pub use manifest::Manifest;
pub use vector::{cosine_similarity, MemoryVectorStore, SearchResult, VectorEntry, VectorStore};
