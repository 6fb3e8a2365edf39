//! 문서 로더 모듈
//!
//! PDF 파일을 페이지 단위 텍스트로 읽어옵니다.
//! 각 페이지는 출처 표시에 쓰이는 파일명과 페이지 라벨을 가집니다.

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

// ============================================================================
// Loaded Page
// ============================================================================

/// 로드된 페이지
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    /// 추출된 텍스트
    pub text: String,
    /// 출처 메타데이터
    pub metadata: PageMetadata,
}

/// 페이지 메타데이터
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    /// 원본 파일명 (경로 제외)
    pub file_name: String,
    /// 페이지 라벨 (1부터 시작, 알 수 없으면 None)
    pub page_label: Option<String>,
    /// 총 페이지 수
    pub total_pages: Option<usize>,
}

// ============================================================================
// DocumentLoader Trait
// ============================================================================

/// 문서 로더 트레이트
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// 파일 하나를 페이지 목록으로 로드
    async fn load(&self, path: &Path) -> Result<Vec<LoadedPage>>;
}

// ============================================================================
// PDF Loader
// ============================================================================

/// pdf-extract 기반 로더
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, path: &Path) -> Result<Vec<LoadedPage>> {
        let file_name = file_name_of(path);

        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned))
            .await
            .context("PDF extraction task failed")??;

        let total_pages = pages.len();

        Ok(pages
            .into_iter()
            .map(|(page_num, text)| LoadedPage {
                text,
                metadata: PageMetadata {
                    file_name: file_name.clone(),
                    page_label: Some(page_num.to_string()),
                    total_pages: Some(total_pages),
                },
            })
            .collect())
    }
}

/// 경로에서 파일명만 추출
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
