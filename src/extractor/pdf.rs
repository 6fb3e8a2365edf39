//! PDF 텍스트 추출
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF에서 텍스트 추출
///
/// 페이지별로 텍스트를 추출하여 (페이지 번호, 텍스트) 튜플 벡터로 반환합니다.
/// 페이지 번호는 1부터 시작합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("page marker regex is valid")
    })
}

/// PDF 텍스트를 페이지별로 분리
///
/// 폼피드(`\x0c`)를 우선 사용하고, 없으면 `--- Page N ---` 형태의
/// 구분선을 찾습니다. 둘 다 없으면 전체를 한 페이지로 봅니다.
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드는 빈 페이지도 번호를 유지해야 하므로 필터링하지 않음
    let pages: Vec<String> = text.split('\x0c').map(|s| s.trim().to_string()).collect();
    if pages.len() > 1 {
        let mut pages = pages;
        // pdf-extract는 마지막 페이지 뒤에도 폼피드를 붙임
        while pages.last().is_some_and(|p| p.is_empty()) {
            pages.pop();
        }
        return pages;
    }

    let pattern = page_marker();
    if pattern.is_match(text) {
        let pages: Vec<String> = pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.trim().to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Page 1 content\x0cPage 2 content\x0cPage 3 content\x0c";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Page 1 content");
        assert_eq!(pages[2], "Page 3 content");
    }

    #[test]
    fn test_split_keeps_blank_page_numbering() {
        let text = "intro\x0c\x0cappendix";
        let pages = split_pdf_pages(text);
        assert_eq!(pages, vec!["intro", "", "appendix"]);
    }

    #[test]
    fn test_split_pdf_pages_with_markers() {
        let text = "first\n--- Page 2 ---\nsecond";
        let pages = split_pdf_pages(text);
        assert_eq!(pages, vec!["first", "second"]);
    }

    #[test]
    fn test_split_pdf_pages_no_separator() {
        let pages = split_pdf_pages("Just some text without page breaks\n");
        assert_eq!(pages, vec!["Just some text without page breaks"]);
    }
}
