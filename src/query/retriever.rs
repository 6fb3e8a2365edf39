//! 문서 검색기

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{SearchResult, VectorStore};

/// 질문과 가까운 청크 검색
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>>;
}

/// 임베딩 + 벡터 저장소 검색기
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .context("failed to embed question")?;

        let mut results = self.store.search(&query_embedding, top_k).await?;
        results.truncate(top_k);

        tracing::debug!(
            "retrieved {} chunks via {}",
            results.len(),
            self.embedder.name()
        );

        Ok(results)
    }
}
