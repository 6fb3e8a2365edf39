//! CLI 모듈
//!
//! hr-rag CLI 명령어 정의 및 구현

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::SourceCollector;
use crate::config::RagConfig;
use crate::embedding::{EmbeddingProvider, OllamaEmbedding};
use crate::extractor::PdfLoader;
use crate::indexing::{
    decide, IndexAction, IndexError, IndexOutcome, IndexPlan, IndexPolicy, IndexState,
    IndexingController, LinePrompt,
};
use crate::knowledge::{LanceVectorStore, Manifest, VectorStore, WordChunker};
use crate::llm::OllamaCompletion;
use crate::query::{
    ChatTurn, Mode, ModePreference, QueryRouter, Role, Transcript, VectorRetriever,
};

/// 저장소가 준비되지 않았을 때 안내
const NOT_INITIALIZED: &str = "시스템이 초기화되지 않았습니다. 먼저 `hr-rag index`를 실행하세요.";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "hr-rag")]
#[command(version, about = "로컬 HR 문서 RAG 도우미", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: ./hr-rag.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 원본 폴더의 PDF를 색인
    Index {
        /// 동작 선택 정책 (prompt는 터미널에서만 가능)
        #[arg(short, long, value_enum, default_value_t = IndexPolicy::Prompt)]
        policy: IndexPolicy,
    },

    /// 대화형 질의
    Chat {
        /// 답변 모드
        #[arg(short, long, value_enum, default_value_t = ModePreference::Auto)]
        mode: ModePreference,
    },

    /// 질문 하나에 답변
    Ask {
        /// 질문
        question: String,

        /// 답변 모드
        #[arg(short, long, value_enum, default_value_t = ModePreference::Auto)]
        mode: ModePreference,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    match cli.command {
        Commands::Index { policy } => cmd_index(&config, policy).await,
        Commands::Chat { mode } => cmd_chat(&config, mode).await,
        Commands::Ask { question, mode } => cmd_ask(&config, &question, mode).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 색인 명령어 (index)
///
/// 원본 폴더와 매니페스트를 비교하고 정책/운영자 선택에 따라 색인합니다.
async fn cmd_index(config: &RagConfig, policy: IndexPolicy) -> Result<()> {
    let embedder = OllamaEmbedding::from_config(&config.model).context("임베딩 클라이언트 생성 실패")?;
    let store = LanceVectorStore::open(&config.paths.vector_dir(), config.model.embed_dimension)
        .await
        .context("벡터 저장소 열기 실패")?;

    let mut controller = IndexingController::new(
        SourceCollector::new(config.paths.data_dir.clone()),
        config.paths.manifest_path(),
        Box::new(PdfLoader::new()),
        Box::new(WordChunker::new(config.chunking)),
        Box::new(embedder),
        Box::new(store),
    );

    println!("[*] 원본 폴더: {}", config.paths.data_dir.display());

    let plan = match controller.plan().await {
        Ok(plan) => plan,
        Err(IndexError::AwaitingInput { dir }) => {
            println!("[*] 원본 폴더를 만들었습니다: {}", dir.display());
            println!("    PDF 파일을 넣은 뒤 다시 실행하세요.");
            return Ok(());
        }
        Err(IndexError::NoSourceDocuments) => {
            bail!(
                "원본 폴더에 PDF 파일이 없습니다: {}",
                config.paths.data_dir.display()
            );
        }
        Err(e) => return Err(e.into()),
    };

    print_plan(&plan);

    let action = if policy == IndexPolicy::Prompt {
        if !std::io::stdin().is_terminal() {
            return Err(IndexError::PolicyRequired)
                .context("터미널이 아니면 --policy add-only|rebuild|skip 중 하나를 지정해야 합니다");
        }
        let stdin = std::io::stdin();
        let mut prompt = LinePrompt::new(stdin.lock(), std::io::stdout());
        decide(&plan.reconciliation, policy, Some(&mut prompt))?
    } else {
        decide(&plan.reconciliation, policy, None)?
    };

    if action.mutates() {
        println!("[*] 색인 중 ({})... PDF 수와 크기에 따라 시간이 걸릴 수 있습니다.", action);
    }

    let outcome = controller.execute(&plan, action).await?;
    print_outcome(&outcome);

    Ok(())
}

/// 대화 명령어 (chat)
async fn cmd_chat(config: &RagConfig, mode: ModePreference) -> Result<()> {
    let (router, chunk_count) = open_router(config).await?;
    let mut preference = mode;
    let mut transcript = Transcript::new();

    println!("hr-rag v{} - HR 문서 도우미", env!("CARGO_PKG_VERSION"));
    println!("[OK] 색인된 청크: {}, 모델: {}", chunk_count, config.model.llm_model);
    println!("[*] 현재 모드: {}", describe_preference(preference));
    println!("    /help 로 명령어를 확인하세요.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n[{}] > ", preference);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("입력 읽기 실패")? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Help => print_repl_help(),
            ReplCommand::Clear => {
                transcript.clear();
                println!("[OK] 대화 기록을 지웠습니다.");
            }
            ReplCommand::History => print_history(&transcript),
            ReplCommand::SetMode(p) => {
                preference = p;
                println!("[OK] 모드 변경: {}", describe_preference(p));
            }
            ReplCommand::Invalid(msg) => println!("[!] {}", msg),
            ReplCommand::Question(question) => {
                println!("[*] 답변 생성 중...");
                let turn = router.ask(&question, preference, &mut transcript).await;
                println!("\n{}", render_turn(&turn));
            }
        }
    }

    println!("\n[*] 세션을 종료합니다.");
    Ok(())
}

/// 단일 질문 명령어 (ask)
async fn cmd_ask(config: &RagConfig, question: &str, mode: ModePreference) -> Result<()> {
    if question.trim().is_empty() {
        bail!("질문이 비어 있습니다");
    }

    let (router, _) = open_router(config).await?;
    let mut transcript = Transcript::new();

    let turn = router.ask(question.trim(), mode, &mut transcript).await;
    println!("{}", render_turn(&turn));

    if turn.is_error {
        bail!("답변 생성 실패");
    }
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("hr-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // 원본 폴더
    let collector = SourceCollector::new(config.paths.data_dir.clone());
    println!("[*] 원본 폴더: {}", config.paths.data_dir.display());
    if collector.dir().is_dir() {
        let files = collector.list_pdfs().context("원본 폴더 읽기 실패")?;
        let total_size: u64 = files
            .iter()
            .filter_map(|f| std::fs::metadata(collector.path_of(f)).ok())
            .map(|m| m.len())
            .sum();
        println!(
            "[OK] PDF 파일: {} 개 ({})",
            files.len(),
            format_bytes(total_size as usize)
        );
    } else {
        println!("[!] 원본 폴더가 없습니다. `hr-rag index`가 만들어 줍니다.");
    }

    // 매니페스트
    let manifest_path = config.paths.manifest_path();
    match Manifest::load(&manifest_path) {
        Ok(manifest) => {
            println!("[OK] 색인된 파일: {} 개", manifest.len());
            for file in manifest.files() {
                println!("     - {}", short_file_name(file));
            }
        }
        Err(e) => println!("[!] 매니페스트 읽기 실패: {:#}", e),
    }

    // 벡터 저장소
    let vector_dir = config.paths.vector_dir();
    println!("[*] 벡터 저장소: {}", vector_dir.display());
    if vector_dir.exists() {
        match LanceVectorStore::open(&vector_dir, config.model.embed_dimension).await {
            Ok(store) => match store.count().await {
                Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
                Err(e) => println!("[!] 청크 수 조회 실패: {:#}", e),
            },
            Err(e) => println!("[!] 벡터 저장소 열기 실패: {:#}", e),
        }
    } else {
        println!("[!] 벡터 저장소가 없습니다. {}", NOT_INITIALIZED);
    }

    // Ollama
    let llm = OllamaCompletion::from_config(&config.model)?;
    match llm.health_check().await {
        Ok(installed) => {
            println!("[OK] Ollama: {}", config.model.base_url);
            for model in [&config.model.llm_model, &config.model.embed_model] {
                if model_installed(&installed, model) {
                    println!("     {}: 설치됨", model);
                } else {
                    println!("[!]  {}: 없음 (ollama pull {})", model, model);
                }
            }
        }
        Err(e) => {
            println!("[!] Ollama 연결 실패: {}", config.model.base_url);
            tracing::debug!("Ollama health check failed: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Query Setup
// ============================================================================

/// 저장소를 열고 질의 라우터 구성
///
/// 저장소가 없거나 비어 있으면 초기화 안내와 함께 실패합니다.
async fn open_router(config: &RagConfig) -> Result<(QueryRouter, usize)> {
    let vector_dir = config.paths.vector_dir();
    if !vector_dir.exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = match LanceVectorStore::open(&vector_dir, config.model.embed_dimension).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("Failed to open vector store: {:#}", e);
            bail!(NOT_INITIALIZED);
        }
    };

    let chunk_count = store.count().await.context("청크 수 조회 실패")?;
    if chunk_count == 0 {
        bail!(NOT_INITIALIZED);
    }

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        OllamaEmbedding::from_config(&config.model).context("임베딩 클라이언트 생성 실패")?,
    );
    let llm = OllamaCompletion::from_config(&config.model).context("LLM 클라이언트 생성 실패")?;
    let retriever = VectorRetriever::new(embedder, Arc::new(store));

    Ok((
        QueryRouter::new(Arc::new(llm), Arc::new(retriever), config),
        chunk_count,
    ))
}

// ============================================================================
// REPL
// ============================================================================

/// REPL 입력 한 줄
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Empty,
    Question(String),
    SetMode(ModePreference),
    Clear,
    History,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }

        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Question(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        match name.as_str() {
            "quit" | "exit" | "q" => ReplCommand::Quit,
            "clear" => ReplCommand::Clear,
            "history" => ReplCommand::History,
            "help" => ReplCommand::Help,
            "mode" => match arg {
                Some(a) => match a.parse() {
                    Ok(p) => ReplCommand::SetMode(p),
                    Err(e) => ReplCommand::Invalid(e),
                },
                None => ReplCommand::Invalid("사용법: /mode <auto|chat|document>".to_string()),
            },
            other => ReplCommand::Invalid(format!("알 수 없는 명령: /{} (/help 참고)", other)),
        }
    }
}

fn print_repl_help() {
    println!("  /mode <auto|chat|document>  모드 변경");
    println!("  /clear                      대화 기록 지우기");
    println!("  /history                    대화 기록 보기");
    println!("  /quit                       종료");
}

fn print_history(transcript: &Transcript) {
    if transcript.is_empty() {
        println!("[*] 대화 기록이 없습니다.");
        return;
    }

    for turn in transcript.turns() {
        let time = turn.created_at.with_timezone(&chrono::Local).format("%H:%M:%S");
        println!("\n[{}] {}", time, render_turn(turn));
    }
}

fn describe_preference(preference: ModePreference) -> &'static str {
    match preference {
        ModePreference::Auto => "auto (질문에 따라 자동 선택)",
        ModePreference::Chat => "chat (모델 직접 답변)",
        ModePreference::Document => "document (문서 검색 기반)",
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn print_plan(plan: &IndexPlan) {
    let r = &plan.reconciliation;
    println!(
        "[*] PDF {} 개, 색인됨 {} 개, 현재 청크 {} 개",
        r.current.len(),
        r.indexed.len(),
        plan.chunk_count
    );

    match plan.state {
        IndexState::NewFiles => println!("[*] 새 파일 {} 개", r.new.len()),
        IndexState::FilesRemoved => println!("[!] 폴더에서 사라진 파일 {} 개", r.removed.len()),
        IndexState::UpToDate => {}
    }
}

fn print_outcome(outcome: &IndexOutcome) {
    match outcome.action {
        IndexAction::Cancel => println!("[*] 취소했습니다. 색인은 바뀌지 않았습니다."),
        IndexAction::LeaveUnchanged => println!("[*] 기존 색인을 그대로 사용합니다."),
        IndexAction::NoOp => println!("[OK] 색인이 이미 최신입니다."),
        IndexAction::AddOnly | IndexAction::Rebuild => {
            println!("[OK] 색인 완료 ({})", outcome.action);
            println!(
                "     파일: {}, 페이지: {}, 추가된 청크: {}",
                outcome.files_processed, outcome.pages_loaded, outcome.chunks_inserted
            );
            println!(
                "     전체 청크: {}, 매니페스트: {} 개 파일",
                outcome.total_chunks, outcome.manifest_len
            );
        }
    }
}

/// 대화 턴 출력 형식
fn render_turn(turn: &ChatTurn) -> String {
    if turn.role == Role::User {
        return format!("[YOU] {}", turn.content);
    }

    let badge = match turn.mode {
        Some(Mode::Document) => "[DOC]",
        Some(Mode::Chat) | None => "[CHAT]",
    };

    // 모델 출력 앞뒤 공백은 화면에서만 정리
    let content = turn.content.trim();
    let mut out = if turn.is_error {
        format!("{} [!] {}", badge, content)
    } else {
        format!("{} {}", badge, content)
    };

    if !turn.sources.is_empty() {
        out.push_str("\n\n참고 문서:");
        for (i, source) in turn.sources.iter().enumerate() {
            out.push_str(&format!(
                "\n  {}. {} - Page {} ({})",
                i + 1,
                source.file_name,
                source.page_display(),
                source.score_display()
            ));
        }
    }

    out
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Ollama 모델 목록에 있는지 (태그 생략 시 `:latest` 등 어떤 태그든 허용)
fn model_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model
            || (!model.contains(':')
                && name
                    .strip_prefix(model)
                    .is_some_and(|rest| rest.starts_with(':')))
    })
}

/// 긴 파일명은 앞 32자 + "..." 로 줄이기
fn short_file_name(name: &str) -> String {
    const MAX_CHARS: usize = 35;
    const KEEP_CHARS: usize = 32;

    if name.chars().count() > MAX_CHARS {
        let head: String = name.chars().take(KEEP_CHARS).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
