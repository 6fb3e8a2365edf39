//! 대화 기록

use chrono::{DateTime, Utc};

use super::classify::Mode;
use crate::knowledge::SearchResult;

/// 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// 답변 근거 문서
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub file_name: String,
    pub page_label: Option<String>,
    /// 유사도 (0.0 ~ 1.0)
    pub score: f32,
}

impl SourceRef {
    /// 페이지 표시 (없으면 "N/A")
    pub fn page_display(&self) -> &str {
        self.page_label.as_deref().unwrap_or("N/A")
    }

    /// 퍼센트 표시 (소수점 한 자리)
    pub fn score_display(&self) -> String {
        format!("{:.1}%", self.score * 100.0)
    }
}

impl From<&SearchResult> for SourceRef {
    fn from(r: &SearchResult) -> Self {
        Self {
            file_name: r.file_name.clone(),
            page_label: r.page_label.clone(),
            score: r.similarity,
        }
    }
}

/// 대화 한 턴
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// 답변 턴에만 기록 (에러 턴은 시도한 모드)
    pub mode: Option<Mode>,
    /// 문서 모드 답변의 근거
    pub sources: Vec<SourceRef>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            mode: None,
            sources: Vec::new(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, mode: Mode, sources: Vec<SourceRef>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            mode: Some(mode),
            sources,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn error(content: impl Into<String>, mode: Mode) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(content, mode, Vec::new())
        }
    }
}

/// 세션 대화 기록 (추가만 가능, 비우기는 전체 삭제)
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
