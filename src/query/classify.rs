//! 질문 분류 - 채팅 모드 vs 문서 모드
//!
//! 규칙은 `ROUTING_RULES` 순서대로 평가되고 처음 맞는 규칙이 이깁니다.
//! 인사말 규칙이 문서 키워드 규칙보다 앞에 있으므로
//! "hi, what is the timesheet deadline?" 같은 질문은 채팅 모드로 갑니다.

use std::fmt;
use std::str::FromStr;

/// 답변 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// 모델 직접 답변
    Chat,
    /// 문서 검색 기반 답변
    Document,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Chat => f.write_str("chat"),
            Mode::Document => f.write_str("document"),
        }
    }
}

/// 사용자가 고른 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModePreference {
    /// 질문 내용으로 자동 판단
    #[default]
    Auto,
    /// 항상 채팅 모드
    #[value(alias = "llm")]
    Chat,
    /// 항상 문서 모드
    #[value(aliases = ["doc", "docs", "rag"])]
    Document,
}

impl fmt::Display for ModePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModePreference::Auto => f.write_str("auto"),
            ModePreference::Chat => f.write_str("chat"),
            ModePreference::Document => f.write_str("document"),
        }
    }
}

impl FromStr for ModePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ModePreference::Auto),
            "chat" | "llm" => Ok(ModePreference::Chat),
            "document" | "doc" | "docs" | "rag" => Ok(ModePreference::Document),
            other => Err(format!("unknown mode '{}' (auto, chat, document)", other)),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// 인사/일반 대화 패턴
pub const GENERIC_PATTERNS: &[&str] = &[
    "hello",
    "hi ",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "what can you do",
    "who are you",
    "help",
    "can you help",
    "can you act",
    "act as",
    "introduce yourself",
    "what are you",
    "tell me about yourself",
    "your name",
    "your purpose",
    "thank you",
    "thanks",
    "bye",
    "goodbye",
    "what is cgi",
    "about cgi",
];

/// 문서 질의 패턴
pub const DOCUMENT_PATTERNS: &[&str] = &[
    "transition cost",
    "contract cost",
    "time report",
    "timesheet",
    "according to",
    "in the document",
    "in the policy",
    "page ",
    "what does the document",
    "find in",
    "search for",
    "procedure for",
    "how to submit",
    "approval process",
    "guideline for",
    "form for",
];

/// 이 단어 수를 넘는 질문은 문서 모드
pub const LONG_QUESTION_TOKENS: usize = 8;

/// 규칙 조건 (정규화된 질문에 대해 평가)
#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    ContainsAny(&'static [&'static str]),
    MoreTokensThan(usize),
    Always,
}

impl Predicate {
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Predicate::ContainsAny(patterns) => patterns.iter().any(|p| normalized.contains(p)),
            Predicate::MoreTokensThan(n) => normalized.split_whitespace().count() > *n,
            Predicate::Always => true,
        }
    }
}

/// 분류 규칙
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub mode: Mode,
}

/// 자동 모드 분류 규칙 (우선순위 순)
pub const ROUTING_RULES: &[Rule] = &[
    Rule {
        name: "generic",
        predicate: Predicate::ContainsAny(GENERIC_PATTERNS),
        mode: Mode::Chat,
    },
    Rule {
        name: "document-keyword",
        predicate: Predicate::ContainsAny(DOCUMENT_PATTERNS),
        mode: Mode::Document,
    },
    Rule {
        name: "long-question",
        predicate: Predicate::MoreTokensThan(LONG_QUESTION_TOKENS),
        mode: Mode::Document,
    },
    Rule {
        name: "short-question",
        predicate: Predicate::Always,
        mode: Mode::Chat,
    },
];

// ============================================================================
// Classification
// ============================================================================

/// 질문 분류
pub fn classify(question: &str, preference: ModePreference) -> Mode {
    match preference {
        ModePreference::Chat => Mode::Chat,
        ModePreference::Document => Mode::Document,
        ModePreference::Auto => match_rule(question).mode,
    }
}

/// 자동 모드에서 처음 맞는 규칙
pub fn match_rule(question: &str) -> &'static Rule {
    let normalized = question.trim().to_lowercase();

    ROUTING_RULES
        .iter()
        .find(|rule| rule.predicate.matches(&normalized))
        .unwrap_or(&ROUTING_RULES[ROUTING_RULES.len() - 1])
}

// ============================================================================
// Tests
// ============================================================================
