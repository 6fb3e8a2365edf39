//! 원본 문서 수집 모듈
//!
//! 원본 폴더에서 색인 대상 PDF 파일명을 수집합니다.
//! 하위 폴더는 보지 않으며, 확장자는 대소문자를 구분하지 않습니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

// ============================================================================
// Source Scan
// ============================================================================

/// 원본 폴더 스캔 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceScan {
    /// 폴더가 없어서 새로 만들었음 (파일 추가 대기)
    Created(PathBuf),
    /// 폴더에 있는 PDF 파일명 (정렬됨)
    Found(Vec<String>),
}

/// PDF 확장자 여부
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

// ============================================================================
// Source Collector
// ============================================================================

/// 원본 폴더 수집기
#[derive(Debug, Clone)]
pub struct SourceCollector {
    dir: PathBuf,
}

impl SourceCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 원본 폴더 경로
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 파일명에 해당하는 전체 경로
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// 폴더 스캔
    ///
    /// 폴더가 없으면 생성 후 `SourceScan::Created`를 반환합니다.
    pub fn scan(&self) -> Result<SourceScan> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)
                .with_context(|| format!("Failed to create source directory: {:?}", self.dir))?;
            tracing::info!("Created source directory {:?}", self.dir);
            return Ok(SourceScan::Created(self.dir.clone()));
        }

        if !self.dir.is_dir() {
            anyhow::bail!("Not a directory: {:?}", self.dir);
        }

        Ok(SourceScan::Found(self.list_pdfs()?))
    }

    /// 폴더 안의 PDF 파일명 목록 (폴더가 없으면 빈 목록)
    pub fn list_pdfs(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(vec![]);
        }

        let walker = WalkBuilder::new(&self.dir)
            .max_depth(Some(1))
            .hidden(true)
            .parents(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            if !is_pdf(entry.path()) {
                continue;
            }

            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            } else {
                tracing::warn!("Skipping non UTF-8 file name: {:?}", entry.path());
            }
        }

        files.sort();
        tracing::debug!("Found {} PDFs in {:?}", files.len(), self.dir);
        Ok(files)
    }
}

// ============================================================================
// Tests
// ============================================================================
