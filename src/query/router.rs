//! 질의 라우터
//!
//! 질문을 분류해서 채팅 모드(모델 직접 답변) 또는
//! 문서 모드(검색 + compact 합성)로 보내고 결과를 대화 기록에 남깁니다.

use std::sync::Arc;

use super::classify::{classify, match_rule, Mode, ModePreference};
use super::retriever::Retriever;
use super::synthesize::CompactSynthesizer;
use super::transcript::{ChatTurn, SourceRef, Transcript};
use super::QueryError;
use crate::config::RagConfig;
use crate::llm::{CompletionOptions, CompletionProvider};

/// 검색 결과가 없을 때의 답변
pub const NO_CONTEXT_ANSWER: &str = "관련된 문서 내용을 찾지 못했습니다.";

/// 시간 초과 시 덧붙이는 안내
pub const RETRY_HINT: &str =
    "응답 시간이 초과되었습니다. 채팅 모드로 바꾸거나 질문을 더 짧게 해서 다시 시도해 보세요.";

/// 라우팅된 답변
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub mode: Mode,
    pub sources: Vec<SourceRef>,
}

/// 질의 라우터
pub struct QueryRouter {
    llm: Arc<dyn CompletionProvider>,
    retriever: Arc<dyn Retriever>,
    synthesizer: CompactSynthesizer,
    options: CompletionOptions,
    system_prompt: String,
    top_k: usize,
}

impl QueryRouter {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        retriever: Arc<dyn Retriever>,
        config: &RagConfig,
    ) -> Self {
        let options = CompletionOptions::from_config(&config.model);
        Self {
            llm,
            retriever,
            synthesizer: CompactSynthesizer::from_options(&options),
            options,
            system_prompt: config.query.system_prompt.clone(),
            top_k: config.query.top_k,
        }
    }

    /// 채팅 모드 프롬프트
    pub fn chat_prompt(&self, question: &str) -> String {
        format!("{}\n\nQuestion: {}\n\nAnswer:", self.system_prompt, question)
    }

    /// 모드 결정
    pub fn route(&self, question: &str, preference: ModePreference) -> Mode {
        let mode = classify(question, preference);
        if preference == ModePreference::Auto {
            tracing::debug!("auto mode: rule '{}' -> {}", match_rule(question).name, mode);
        }
        mode
    }

    /// 정해진 모드로 답변
    pub async fn answer(&self, question: &str, mode: Mode) -> Result<Answer, QueryError> {
        match mode {
            Mode::Chat => {
                let text = self
                    .llm
                    .complete(&self.chat_prompt(question), &self.options)
                    .await?;
                Ok(Answer {
                    text,
                    mode,
                    sources: Vec::new(),
                })
            }
            Mode::Document => {
                let results = self
                    .retriever
                    .retrieve(question, self.top_k)
                    .await
                    .map_err(QueryError::from_retrieval)?;

                let chunks: Vec<&str> = results.iter().map(|r| r.chunk_text.as_str()).collect();
                let text = self
                    .synthesizer
                    .synthesize(self.llm.as_ref(), &self.options, question, &chunks)
                    .await?
                    .unwrap_or_else(|| NO_CONTEXT_ANSWER.to_string());

                Ok(Answer {
                    text,
                    mode,
                    sources: results.iter().map(SourceRef::from).collect(),
                })
            }
        }
    }

    /// 질문 하나 처리
    ///
    /// 사용자 턴과 답변 턴(또는 에러 턴)을 기록하고 답변 턴을 돌려줍니다.
    /// 실패해도 에러를 올리지 않고 에러 턴으로 남깁니다.
    pub async fn ask(
        &self,
        question: &str,
        preference: ModePreference,
        transcript: &mut Transcript,
    ) -> ChatTurn {
        transcript.push(ChatTurn::user(question));

        let mode = self.route(question, preference);
        tracing::info!("answering in {} mode via {}", mode, self.llm.name());

        let turn = match self.answer(question, mode).await {
            Ok(answer) => ChatTurn::assistant(answer.text, answer.mode, answer.sources),
            Err(e) => {
                tracing::warn!("query failed in {} mode: {}", mode, e);
                ChatTurn::error(error_message(&e), mode)
            }
        };

        transcript.push(turn.clone());
        turn
    }
}

/// 에러 턴 내용
pub fn error_message(err: &QueryError) -> String {
    let mut message = format!("오류: {}", err);
    if err.is_timeout() {
        message.push_str("\n\n");
        message.push_str(RETRY_HINT);
    }
    message
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::SearchResult;
    use crate::llm::CompletionError;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Behavior {
        Echo,
        Timeout,
        Fail,
    }

    struct FakeLlm {
        behavior: Behavior,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeLlm {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for FakeLlm {
        async fn complete(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.behavior {
                Behavior::Echo => Ok(" generated answer ".to_string()),
                Behavior::Timeout => Err(CompletionError::Timeout {
                    secs: options.timeout.as_secs(),
                }),
                Behavior::Fail => Err(CompletionError::Service("model not found".to_string())),
            }
        }

        fn name(&self) -> &str {
            "fake-llm"
        }
    }

    struct FakeRetriever {
        results: Vec<SearchResult>,
        calls: AtomicUsize,
    }

    impl FakeRetriever {
        fn new(results: Vec<SearchResult>) -> Arc<Self> {
            Arc::new(Self {
                results,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn retrieve(&self, _question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.iter().take(top_k).cloned().collect())
        }
    }

    struct BrokenRetriever;

    #[async_trait]
    impl Retriever for BrokenRetriever {
        async fn retrieve(&self, _question: &str, _top_k: usize) -> Result<Vec<SearchResult>> {
            anyhow::bail!("connection refused")
        }
    }

    fn result(file: &str, page: Option<&str>, text: &str, similarity: f32) -> SearchResult {
        SearchResult {
            file_name: file.to_string(),
            page_label: page.map(str::to_string),
            chunk_index: 0,
            chunk_text: text.to_string(),
            similarity,
        }
    }

    fn router(llm: Arc<FakeLlm>, retriever: Arc<dyn Retriever>) -> QueryRouter {
        QueryRouter::new(llm, retriever, &RagConfig::default())
    }

    #[tokio::test]
    async fn test_chat_mode_uses_system_prompt() {
        let llm = FakeLlm::new(Behavior::Echo);
        let retriever = FakeRetriever::new(Vec::new());
        let r = router(llm.clone(), retriever.clone());
        let mut t = Transcript::new();

        let turn = r.ask("Good morning!", ModePreference::Auto, &mut t).await;

        assert_eq!(turn.mode, Some(Mode::Chat));
        // 화면에 그릴 때만 다듬고 기록에는 모델 출력 그대로
        assert_eq!(turn.content, " generated answer ");
        assert!(turn.sources.is_empty());
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "You are a helpful HR assistant at CGI. Answer concisely in 2-3 sentences.\n\n\
             Question: Good morning!\n\nAnswer:"
        );
    }

    #[tokio::test]
    async fn test_document_mode_attaches_sources() {
        let llm = FakeLlm::new(Behavior::Echo);
        let retriever = FakeRetriever::new(vec![
            result("policy.pdf", Some("4"), "Transition costs are billed monthly.", 0.82),
            result("faq.pdf", None, "Ask your manager.", 0.61),
            result("other.pdf", Some("9"), "Unrelated.", 0.10),
        ]);
        let r = router(llm.clone(), retriever);
        let mut t = Transcript::new();

        let turn = r
            .ask(
                "What are transition costs per the policy document on page 4?",
                ModePreference::Auto,
                &mut t,
            )
            .await;

        assert_eq!(turn.mode, Some(Mode::Document));
        assert!(!turn.is_error);
        // top_k = 2
        assert_eq!(turn.sources.len(), 2);
        assert_eq!(turn.sources[0].file_name, "policy.pdf");
        assert_eq!(turn.sources[0].score_display(), "82.0%");
        assert_eq!(turn.sources[1].page_display(), "N/A");

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Transition costs are billed monthly."));
        assert!(!prompts[0].contains("Unrelated."));
    }

    #[test]
    fn test_route_follows_classifier() {
        let r = router(FakeLlm::new(Behavior::Echo), FakeRetriever::new(Vec::new()));
        for q in ["Good morning!", "timesheet deadline", "what is the policy on overtime pay for weekend shifts"] {
            for pref in [ModePreference::Auto, ModePreference::Chat, ModePreference::Document] {
                assert_eq!(r.route(q, pref), classify(q, pref), "{} / {}", q, pref);
            }
        }
    }

    #[tokio::test]
    async fn test_document_mode_without_results() {
        let llm = FakeLlm::new(Behavior::Echo);
        let r = router(llm.clone(), FakeRetriever::new(Vec::new()));

        let answer = r.answer("anything", Mode::Document).await.unwrap();

        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert!(answer.sources.is_empty());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_override_forces_mode() {
        let llm = FakeLlm::new(Behavior::Echo);
        let retriever = FakeRetriever::new(vec![result("a.pdf", Some("1"), "text", 0.5)]);
        let r = router(llm, retriever.clone());
        let mut t = Transcript::new();

        let turn = r.ask("Good morning!", ModePreference::Document, &mut t).await;
        assert_eq!(turn.mode, Some(Mode::Document));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);

        let turn = r.ask("timesheet deadline", ModePreference::Chat, &mut t).await;
        assert_eq!(turn.mode, Some(Mode::Chat));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_turn_with_hint() {
        let llm = FakeLlm::new(Behavior::Timeout);
        let r = router(llm, FakeRetriever::new(Vec::new()));
        let mut t = Transcript::new();

        let turn = r.ask("Hello", ModePreference::Auto, &mut t).await;

        assert!(turn.is_error);
        assert_eq!(turn.mode, Some(Mode::Chat));
        assert!(turn.content.starts_with("오류: "));
        assert!(turn.content.contains("timed out"));
        assert!(turn.content.contains(RETRY_HINT));

        // 사용자 턴 + 에러 턴
        assert_eq!(t.len(), 2);
        assert!(t.last().unwrap().is_error);
    }

    #[tokio::test]
    async fn test_service_failure_has_no_hint() {
        let llm = FakeLlm::new(Behavior::Fail);
        let r = router(llm, FakeRetriever::new(Vec::new()));
        let mut t = Transcript::new();

        let turn = r.ask("Hello", ModePreference::Auto, &mut t).await;

        assert!(turn.is_error);
        assert!(turn.content.contains("model not found"));
        assert!(!turn.content.contains(RETRY_HINT));
    }

    #[tokio::test]
    async fn test_retrieval_failure_in_document_mode() {
        let llm = FakeLlm::new(Behavior::Echo);
        let r = router(llm.clone(), Arc::new(BrokenRetriever));
        let mut t = Transcript::new();

        let turn = r.ask("search for overtime", ModePreference::Auto, &mut t).await;

        assert!(turn.is_error);
        assert_eq!(turn.mode, Some(Mode::Document));
        assert!(turn.content.contains("connection refused"));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_continues_after_error() {
        let failing = router(FakeLlm::new(Behavior::Timeout), FakeRetriever::new(Vec::new()));
        let working = router(FakeLlm::new(Behavior::Echo), FakeRetriever::new(Vec::new()));
        let mut t = Transcript::new();

        failing.ask("Hello", ModePreference::Auto, &mut t).await;
        let turn = working.ask("Hello again", ModePreference::Auto, &mut t).await;

        assert!(!turn.is_error);
        assert_eq!(t.len(), 4);
    }
}
