//! 질의 라우터
//!
//! 질문 분류 → 채팅/문서 모드 답변 → 대화 기록

mod classify;
mod retriever;
mod router;
mod synthesize;
mod transcript;

use thiserror::Error;

use crate::llm::CompletionError;

pub use classify::{
    classify, match_rule, Mode, ModePreference, Predicate, Rule, DOCUMENT_PATTERNS,
    GENERIC_PATTERNS, LONG_QUESTION_TOKENS, ROUTING_RULES,
};
pub use retriever::{Retriever, VectorRetriever};
pub use router::{error_message, Answer, QueryRouter, NO_CONTEXT_ANSWER, RETRY_HINT};
pub use synthesize::{answer_prompt, refine_prompt, CompactSynthesizer};
pub use transcript::{ChatTurn, Role, SourceRef, Transcript};

/// 질의 에러
#[derive(Debug, Error)]
pub enum QueryError {
    /// 모델 응답 시간 초과
    #[error("request timed out after {secs}s")]
    CompletionTimeout { secs: u64 },

    /// 모델, 임베딩, 검색 등 그 밖의 실패
    #[error("{0}")]
    GenericServiceFailure(String),
}

impl QueryError {
    /// 검색 단계 실패 변환
    pub fn from_retrieval(err: anyhow::Error) -> Self {
        QueryError::GenericServiceFailure(format!("{:#}", err))
    }

    /// 시간 초과 여부 (임베딩 요청의 시간 초과 메시지 포함)
    pub fn is_timeout(&self) -> bool {
        match self {
            QueryError::CompletionTimeout { .. } => true,
            QueryError::GenericServiceFailure(msg) => msg.to_lowercase().contains("timed out"),
        }
    }
}

impl From<CompletionError> for QueryError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Timeout { secs } => QueryError::CompletionTimeout { secs },
            CompletionError::Service(msg) => QueryError::GenericServiceFailure(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_error_conversion() {
        let e: QueryError = CompletionError::Timeout { secs: 120 }.into();
        assert!(e.is_timeout());
        assert_eq!(e.to_string(), "request timed out after 120s");

        let e: QueryError = CompletionError::Service("boom".to_string()).into();
        assert!(!e.is_timeout());
        assert_eq!(e.to_string(), "boom");
    }

    #[test]
    fn test_retrieval_timeout_detected() {
        let e = QueryError::from_retrieval(anyhow::anyhow!("operation timed out").context("failed to embed question"));
        assert!(e.is_timeout());
        assert!(e.to_string().starts_with("failed to embed question"));
    }
}
