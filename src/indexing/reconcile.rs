//! 원본 폴더와 매니페스트 비교 및 동작 결정
//!
//! 입력 방식(터미널, 설정값)과 무관한 순수 함수로만 구성됩니다.

use std::collections::HashSet;
use std::fmt;

use super::IndexError;

// ============================================================================
// Reconciliation
// ============================================================================

/// 원본 폴더(`current`)와 매니페스트(`indexed`) 비교 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// 현재 폴더의 PDF 파일명
    pub current: Vec<String>,
    /// 매니페스트의 파일명
    pub indexed: Vec<String>,
    /// `current - indexed` (current 순서 유지)
    pub new: Vec<String>,
    /// `indexed - current` (indexed 순서 유지)
    pub removed: Vec<String>,
}

impl Reconciliation {
    pub fn compute(current: &[String], indexed: &[String]) -> Self {
        let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
        let indexed_set: HashSet<&str> = indexed.iter().map(String::as_str).collect();

        let new = current
            .iter()
            .filter(|f| !indexed_set.contains(f.as_str()))
            .cloned()
            .collect();
        let removed = indexed
            .iter()
            .filter(|f| !current_set.contains(f.as_str()))
            .cloned()
            .collect();

        Self {
            current: current.to_vec(),
            indexed: indexed.to_vec(),
            new,
            removed,
        }
    }

    /// 결정 테이블 상태
    ///
    /// 우선순위: 원본 없음 > 새 파일 > 삭제된 파일 > 최신
    pub fn state(&self) -> Result<IndexState, IndexError> {
        if self.current.is_empty() {
            Err(IndexError::NoSourceDocuments)
        } else if !self.new.is_empty() {
            Ok(IndexState::NewFiles)
        } else if !self.removed.is_empty() {
            Ok(IndexState::FilesRemoved)
        } else {
            Ok(IndexState::UpToDate)
        }
    }
}

// ============================================================================
// State / Action / Policy
// ============================================================================

/// 색인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// 새 파일이 있음
    NewFiles,
    /// 새 파일은 없고 사라진 파일이 있음
    FilesRemoved,
    /// 저장소가 폴더와 일치
    UpToDate,
}

impl IndexState {
    /// 이 상태에서 선택 가능한 동작
    pub fn choices(self) -> &'static [IndexAction] {
        match self {
            IndexState::NewFiles => &[IndexAction::AddOnly, IndexAction::Rebuild, IndexAction::Cancel],
            IndexState::FilesRemoved => &[IndexAction::Rebuild, IndexAction::LeaveUnchanged],
            IndexState::UpToDate => &[IndexAction::Rebuild, IndexAction::NoOp],
        }
    }

    /// 터미널 프롬프트 문구
    pub fn prompt(self) -> &'static str {
        match self {
            IndexState::NewFiles => "[1] 새 파일만 추가  [2] 전체 재색인  [3] 취소: ",
            IndexState::FilesRemoved => "재색인해서 삭제된 파일을 정리할까요? (y/n): ",
            IndexState::UpToDate => "그래도 전체 재색인할까요? (y/n): ",
        }
    }

    /// 이 상태에서 아무것도 바꾸지 않는 동작
    pub fn no_change(self) -> IndexAction {
        match self {
            IndexState::NewFiles => IndexAction::Cancel,
            IndexState::FilesRemoved => IndexAction::LeaveUnchanged,
            IndexState::UpToDate => IndexAction::NoOp,
        }
    }

    /// 사용자 입력 해석
    ///
    /// 새 파일 상태에서는 2/3 외의 입력을 "새 파일만 추가"로,
    /// y/n 상태에서는 y 외의 입력을 "변경 없음"으로 봅니다.
    pub fn parse_choice(self, input: &str) -> IndexAction {
        let input = input.trim().to_lowercase();
        match self {
            IndexState::NewFiles => match input.as_str() {
                "2" => IndexAction::Rebuild,
                "3" => IndexAction::Cancel,
                _ => IndexAction::AddOnly,
            },
            IndexState::FilesRemoved => match input.as_str() {
                "y" | "yes" => IndexAction::Rebuild,
                _ => IndexAction::LeaveUnchanged,
            },
            IndexState::UpToDate => match input.as_str() {
                "y" | "yes" => IndexAction::Rebuild,
                _ => IndexAction::NoOp,
            },
        }
    }
}

/// 실행할 색인 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    /// 새 파일만 임베딩해서 추가
    AddOnly,
    /// 저장소와 매니페스트를 버리고 전체 재색인
    Rebuild,
    /// 새 파일이 있지만 취소
    Cancel,
    /// 삭제된 파일이 있지만 그대로 둠
    LeaveUnchanged,
    /// 이미 최신이라 아무것도 안 함
    NoOp,
}

impl IndexAction {
    /// 저장소나 매니페스트를 변경하는 동작인지
    pub fn mutates(self) -> bool {
        matches!(self, IndexAction::AddOnly | IndexAction::Rebuild)
    }
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexAction::AddOnly => "add-only",
            IndexAction::Rebuild => "rebuild",
            IndexAction::Cancel => "cancel",
            IndexAction::LeaveUnchanged => "leave-unchanged",
            IndexAction::NoOp => "no-op",
        };
        f.write_str(s)
    }
}

/// 동작 선택 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IndexPolicy {
    /// 운영자에게 물어봄
    Prompt,
    /// 새 파일만 추가 (그 외 상태에서는 변경 없음)
    AddOnly,
    /// 항상 전체 재색인
    Rebuild,
    /// 아무것도 바꾸지 않음
    Skip,
}

/// 운영자 선택 입력
pub trait OperatorPrompt {
    fn choose(
        &mut self,
        state: IndexState,
        reconciliation: &Reconciliation,
    ) -> Result<IndexAction, IndexError>;
}

// ============================================================================
// Decision
// ============================================================================

/// 상태 + 정책(+ 운영자 입력)으로 동작 결정
///
/// 고정 정책이 현재 상태에서 허용되지 않으면 변경 없는 쪽으로 대응합니다.
pub fn decide(
    reconciliation: &Reconciliation,
    policy: IndexPolicy,
    prompt: Option<&mut dyn OperatorPrompt>,
) -> Result<IndexAction, IndexError> {
    let state = reconciliation.state()?;

    let action = match policy {
        IndexPolicy::Prompt => {
            let prompt = prompt.ok_or(IndexError::PolicyRequired)?;
            let action = prompt.choose(state, reconciliation)?;
            if !state.choices().contains(&action) {
                return Err(IndexError::InvalidChoice { state, action });
            }
            action
        }
        IndexPolicy::Rebuild => IndexAction::Rebuild,
        IndexPolicy::AddOnly => match state {
            IndexState::NewFiles => IndexAction::AddOnly,
            IndexState::FilesRemoved => IndexAction::LeaveUnchanged,
            IndexState::UpToDate => IndexAction::NoOp,
        },
        IndexPolicy::Skip => state.no_change(),
    };

    tracing::debug!("Decided {} for {:?} (policy {:?})", action, state, policy);
    Ok(action)
}


// ============================================================================
// Tests
// ============================================================================
