//! 색인 컨트롤러
//!
//! 원본 PDF 폴더, 매니페스트, 벡터 저장소를 맞춰 둡니다.
//!
//! 1. 폴더 스캔 → `current`, 매니페스트 → `indexed`
//! 2. `new = current - indexed`, `removed = indexed - current`
//! 3. 상태별 선택지 중 정책/운영자 입력으로 동작 결정
//! 4. 새 파일 추가 또는 전체 재색인, 성공 시에만 매니페스트 저장

mod controller;
mod prompt;
mod reconcile;

use std::path::PathBuf;

use thiserror::Error;

pub use controller::{IndexOutcome, IndexPlan, IndexingController};
pub use prompt::LinePrompt;
pub use reconcile::{
    decide, IndexAction, IndexPolicy, IndexState, OperatorPrompt, Reconciliation,
};

/// 색인 에러
#[derive(Debug, Error)]
pub enum IndexError {
    /// 원본 폴더에 PDF가 없음
    #[error("no PDF files found in the source directory")]
    NoSourceDocuments,

    /// 원본 폴더를 방금 만들었음 (에러가 아닌 대기 상태)
    #[error("created source directory {dir:?}; add PDF files and run again")]
    AwaitingInput { dir: PathBuf },

    /// 문서 로드 실패
    #[error("failed to load {file}: {source:#}")]
    LoadFailure {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    /// 임베딩 실패
    #[error("failed to embed chunks of {file}: {source:#}")]
    EmbeddingFailure {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    /// 벡터 저장소 오류
    #[error("vector store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// 매니페스트 읽기/쓰기 오류
    #[error("manifest error: {0:#}")]
    Manifest(#[source] anyhow::Error),

    /// 원본 폴더 스캔 오류
    #[error("failed to scan source directory: {0:#}")]
    Scan(#[source] anyhow::Error),

    /// 대화형 선택이 필요한데 입력 수단이 없음
    #[error("an index policy must be configured when no interactive prompt is available")]
    PolicyRequired,

    /// 현재 상태에서 허용되지 않는 선택
    #[error("{action} is not a valid choice when the index state is {state:?}")]
    InvalidChoice {
        state: IndexState,
        action: IndexAction,
    },

    /// 운영자 입력 읽기 실패
    #[error("failed to read operator input: {0}")]
    Prompt(#[from] std::io::Error),
}
