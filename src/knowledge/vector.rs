//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 색인기는 쓰기만, 질의 라우터는 읽기만 합니다.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::chunker::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// 원본 파일명
    pub file_name: String,
    /// 페이지 라벨
    pub page_label: Option<String>,
    /// 페이지 내 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

impl VectorEntry {
    /// 청크와 임베딩으로 엔트리 생성
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            file_name: chunk.metadata.file_name.clone(),
            page_label: chunk.metadata.page_label.clone(),
            chunk_index: chunk.index as i32,
            chunk_text: chunk.text.clone(),
            embedding,
        }
    }
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub file_name: String,
    pub page_label: Option<String>,
    pub chunk_index: i32,
    pub chunk_text: String,
    /// 유사도 스코어 (0.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 저장소를 비우고 빈 상태로 다시 생성
    async fn reset(&mut self) -> Result<()>;
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 메모리 기반 벡터 저장소 (전수 코사인 검색)
///
/// 영속화가 필요 없는 경우와 테스트에서 사용합니다.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: RwLock<Vec<VectorEntry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        self.entries.write().await.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let entries = self.entries.read().await;

        let mut results: Vec<SearchResult> = entries
            .iter()
            .map(|e| SearchResult {
                file_name: e.file_name.clone(),
                page_label: e.page_label.clone(),
                chunk_index: e.chunk_index,
                chunk_text: e.chunk_text.clone(),
                // 음수 유사도는 0으로
                similarity: cosine_similarity(query_embedding, &e.embedding).max(0.0),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn reset(&mut self) -> Result<()> {
        self.entries.get_mut().clear();
        Ok(())
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file: &str, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            file_name: file.to_string(),
            page_label: Some("1".to_string()),
            chunk_index: 0,
            chunk_text: format!("text of {}", file),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatch() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_memory_store_search_ranks_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .insert_batch(&[
                entry("far.pdf", vec![0.0, 1.0]),
                entry("near.pdf", vec![1.0, 0.1]),
                entry("opposite.pdf", vec![-1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_name, "near.pdf");
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.similarity)));
    }

    #[tokio::test]
    async fn test_memory_store_reset() {
        let mut store = MemoryVectorStore::new();
        store.insert_batch(&[entry("a.pdf", vec![1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
