//! 검색 결과 기반 답변 합성 (compact + refine)
//!
//! 검색된 청크를 컨텍스트 윈도우에 맞는 블록으로 묶은 뒤
//! 첫 블록으로 답을 만들고 남은 블록마다 답을 다듬습니다.

use crate::llm::{CompletionError, CompletionOptions, CompletionProvider};

/// 토큰당 문자 수 근사치 (보수적으로)
const CHARS_PER_TOKEN: usize = 3;
/// 프롬프트 틀이 차지하는 토큰
const TEMPLATE_TOKENS: usize = 160;
/// 블록 최소 크기 (문자)
const MIN_BLOCK_CHARS: usize = 512;

/// 첫 답변 프롬프트
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information from HR documents is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Using only the context above, answer the question.\n\
         Question: {}\n\
         Answer: ",
        context, question
    )
}

/// 답변 보완 프롬프트
pub fn refine_prompt(question: &str, existing: &str, context: &str) -> String {
    format!(
        "Question: {}\n\
         Current answer: {}\n\
         Additional context from HR documents is below.\n\
         ---------------------\n\
         {}\n\
         ---------------------\n\
         Improve the current answer using the additional context if it is relevant. \
         Otherwise repeat the current answer unchanged.\n\
         Refined answer: ",
        question, existing, context
    )
}

/// compact 합성기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactSynthesizer {
    block_chars: usize,
}

impl CompactSynthesizer {
    pub fn new(block_chars: usize) -> Self {
        Self {
            block_chars: block_chars.max(MIN_BLOCK_CHARS),
        }
    }

    /// 컨텍스트 윈도우에서 생성 토큰과 프롬프트 틀을 뺀 만큼을 블록 크기로
    pub fn from_options(options: &CompletionOptions) -> Self {
        let available = (options.context_window as usize)
            .saturating_sub(options.max_tokens as usize)
            .saturating_sub(TEMPLATE_TOKENS);
        Self::new(available * CHARS_PER_TOKEN)
    }

    pub fn block_chars(&self) -> usize {
        self.block_chars
    }

    /// 청크를 블록으로 묶기
    ///
    /// 블록 하나에 들어가지 않는 청크는 단어 경계에서 나눕니다.
    pub fn pack<S: AsRef<str>>(&self, chunks: &[S]) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut current = String::new();

        for chunk in chunks {
            let text = chunk.as_ref().trim();
            if text.is_empty() {
                continue;
            }

            for piece in split_to_fit(text, self.block_chars) {
                let needed = if current.is_empty() {
                    piece.len()
                } else {
                    current.len() + 2 + piece.len()
                };

                if needed > self.block_chars && !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(&piece);
            }
        }

        if !current.is_empty() {
            blocks.push(current);
        }
        blocks
    }

    /// 블록별로 답변 생성 후 보완
    pub async fn synthesize<S: AsRef<str>>(
        &self,
        llm: &dyn CompletionProvider,
        options: &CompletionOptions,
        question: &str,
        chunks: &[S],
    ) -> Result<Option<String>, CompletionError> {
        let blocks = self.pack(chunks);
        let mut blocks = blocks.iter();

        let Some(first) = blocks.next() else {
            return Ok(None);
        };

        let mut answer = llm.complete(&answer_prompt(first, question), options).await?;

        for (i, block) in blocks.enumerate() {
            tracing::debug!("refining answer with block {}", i + 2);
            let refined = llm
                .complete(&refine_prompt(question, answer.trim(), block), options)
                .await?;
            // 빈 보완 결과는 무시하고 이전 답 유지
            if !refined.trim().is_empty() {
                answer = refined;
            }
        }

        Ok(Some(answer))
    }
}

/// 단어 경계에서 `limit` 이하 조각으로 나누기 (한 단어가 더 길면 그대로)
fn split_to_fit(text: &str, limit: usize) -> Vec<String> {
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    for word in text.split_whitespace() {
        if !piece.is_empty() && piece.len() + 1 + word.len() > limit {
            pieces.push(std::mem::take(&mut piece));
        }
        if !piece.is_empty() {
            piece.push(' ');
        }
        piece.push_str(word);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 받은 프롬프트를 기록하고 호출 순번을 답하는 모델
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionProvider for Recorder {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!(" answer {} ", prompts.len()))
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    #[test]
    fn test_block_size_from_options() {
        let options = CompletionOptions::default();
        let s = CompactSynthesizer::from_options(&options);
        assert_eq!(s.block_chars(), (2048 - 256 - TEMPLATE_TOKENS) * CHARS_PER_TOKEN);

        let tiny = CompletionOptions {
            context_window: 100,
            ..options
        };
        assert_eq!(CompactSynthesizer::from_options(&tiny).block_chars(), MIN_BLOCK_CHARS);
    }

    #[test]
    fn test_pack_merges_small_chunks() {
        let s = CompactSynthesizer::new(1000);
        let blocks = s.pack(&["first chunk", "second chunk"]);
        assert_eq!(blocks, vec!["first chunk\n\nsecond chunk".to_string()]);
    }

    #[test]
    fn test_pack_splits_oversized_chunk() {
        let s = CompactSynthesizer::new(MIN_BLOCK_CHARS);
        let long = vec!["word"; 300].join(" ");
        let blocks = s.pack(&[long.as_str(), "tail"]);

        assert!(blocks.len() >= 3);
        assert!(blocks.iter().all(|b| b.len() <= MIN_BLOCK_CHARS));
        assert!(blocks.last().unwrap().ends_with("tail"));
    }

    #[test]
    fn test_pack_skips_blank() {
        let s = CompactSynthesizer::new(1000);
        assert!(s.pack(&["  ", ""]).is_empty());
    }

    #[tokio::test]
    async fn test_synthesize_refines_per_block() {
        let llm = Recorder {
            prompts: Mutex::new(Vec::new()),
        };
        let s = CompactSynthesizer::new(MIN_BLOCK_CHARS);
        let a = vec!["alpha"; 80].join(" ");
        let b = vec!["beta"; 80].join(" ");

        let answer = s
            .synthesize(&llm, &CompletionOptions::default(), "what?", &[a, b])
            .await
            .unwrap();

        assert_eq!(answer.as_deref(), Some(" answer 2 "));
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("alpha"));
        assert!(prompts[1].contains("Current answer: answer 1"));
        assert!(prompts[1].contains("beta"));
    }

    /// 첫 답 이후로는 빈 문자열만 돌려주는 모델
    struct BlankRefiner {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CompletionProvider for BlankRefiner {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, CompletionError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok("first answer\n".to_string())
            } else {
                Ok("  \n".to_string())
            }
        }

        fn name(&self) -> &str {
            "blank-refiner"
        }
    }

    #[tokio::test]
    async fn test_blank_refinement_keeps_answer() {
        let llm = BlankRefiner {
            calls: Mutex::new(0),
        };
        let s = CompactSynthesizer::new(MIN_BLOCK_CHARS);
        let a = vec!["alpha"; 80].join(" ");
        let b = vec!["beta"; 80].join(" ");

        let answer = s
            .synthesize(&llm, &CompletionOptions::default(), "what?", &[a, b])
            .await
            .unwrap();

        assert_eq!(answer.as_deref(), Some("first answer\n"));
        assert_eq!(*llm.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_synthesize_without_chunks() {
        let llm = Recorder {
            prompts: Mutex::new(Vec::new()),
        };
        let s = CompactSynthesizer::new(1000);
        let chunks: Vec<String> = Vec::new();

        let answer = s
            .synthesize(&llm, &CompletionOptions::default(), "what?", &chunks)
            .await
            .unwrap();
        assert!(answer.is_none());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }
}
