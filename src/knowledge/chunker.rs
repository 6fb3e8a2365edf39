//! Text Chunking Module
//!
//! 페이지 텍스트를 고정 크기(단어 수) 청크로 나눕니다.
//! 청크는 부모 페이지의 파일명과 페이지 라벨을 그대로 물려받습니다.

use crate::config::ChunkConfig;
use crate::extractor::{LoadedPage, PageMetadata};

// ============================================================================
// Chunk
// ============================================================================

/// 임베딩/검색 단위 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 페이지 내 청크 인덱스 (0-based)
    pub index: usize,
    pub text: String,
    pub metadata: PageMetadata,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 페이지를 청크로 분할
    fn split(&self, page: &LoadedPage) -> Vec<Chunk>;

    /// 여러 페이지 분할
    fn split_all(&self, pages: &[LoadedPage]) -> Vec<Chunk> {
        pages.iter().flat_map(|p| self.split(p)).collect()
    }
}

// ============================================================================
// WordChunker
// ============================================================================

/// 단어 단위 슬라이딩 윈도우 청커
#[derive(Debug, Clone)]
pub struct WordChunker {
    config: ChunkConfig,
}

impl WordChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }
}

impl Chunker for WordChunker {
    fn split(&self, page: &LoadedPage) -> Vec<Chunk> {
        chunk_text(&page.text, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                index,
                text,
                metadata: page.metadata.clone(),
            })
            .collect()
    }
}

/// 텍스트를 청크로 분할
///
/// # Arguments
/// * `text` - 분할할 텍스트
/// * `chunk_size` - 청크 당 단어 수
/// * `overlap` - 청크 간 중첩 단어 수 (`chunk_size`보다 작아야 함)
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.is_empty() || chunk_size == 0 {
        return vec![];
    }

    if words.len() <= chunk_size {
        return vec![words.join(" ")];
    }

    // overlap >= chunk_size면 무한 루프가 되므로 최소 1단어씩 전진
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));

        if end >= words.len() {
            break;
        }

        start += step;
    }

    chunks
}

// ============================================================================
// Tests
// ============================================================================
