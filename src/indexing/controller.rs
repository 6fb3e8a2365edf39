//! 색인 실행
//!
//! 저장소 쓰기는 여기서만 일어납니다. 매니페스트는 저장소 작업이
//! 모두 성공한 뒤에만 저장되므로, 중간에 실패하면 이전 매니페스트가 남습니다.

use std::path::{Path, PathBuf};

use crate::collector::{SourceCollector, SourceScan};
use crate::embedding::EmbeddingProvider;
use crate::extractor::DocumentLoader;
use crate::knowledge::{Chunker, Manifest, VectorEntry, VectorStore};

use super::reconcile::{decide, IndexAction, IndexPolicy, IndexState, OperatorPrompt, Reconciliation};
use super::IndexError;

// ============================================================================
// Types
// ============================================================================

/// 실행 전 색인 계획
#[derive(Debug, Clone)]
pub struct IndexPlan {
    pub reconciliation: Reconciliation,
    pub state: IndexState,
    /// 현재 저장소 청크 수
    pub chunk_count: usize,
}

/// 색인 결과 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub action: IndexAction,
    /// 처리한 파일 수
    pub files_processed: usize,
    /// 로드한 페이지 수
    pub pages_loaded: usize,
    /// 새로 넣은 청크 수
    pub chunks_inserted: usize,
    /// 작업 후 저장소 청크 수
    pub total_chunks: usize,
    /// 작업 후 매니페스트 파일 수
    pub manifest_len: usize,
}

#[derive(Debug, Default)]
struct IngestStats {
    files: usize,
    pages: usize,
    chunks: usize,
}

// ============================================================================
// IndexingController
// ============================================================================

/// 색인 컨트롤러
pub struct IndexingController {
    collector: SourceCollector,
    manifest_path: PathBuf,
    loader: Box<dyn DocumentLoader>,
    chunker: Box<dyn Chunker>,
    embedder: Box<dyn EmbeddingProvider>,
    store: Box<dyn VectorStore>,
}

impl IndexingController {
    pub fn new(
        collector: SourceCollector,
        manifest_path: impl Into<PathBuf>,
        loader: Box<dyn DocumentLoader>,
        chunker: Box<dyn Chunker>,
        embedder: Box<dyn EmbeddingProvider>,
        store: Box<dyn VectorStore>,
    ) -> Self {
        Self {
            collector,
            manifest_path: manifest_path.into(),
            loader,
            chunker,
            embedder,
            store,
        }
    }

    /// 벡터 저장소 (읽기용)
    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// 폴더와 매니페스트를 비교해서 계획 수립
    pub async fn plan(&self) -> Result<IndexPlan, IndexError> {
        let current = match self.collector.scan().map_err(IndexError::Scan)? {
            SourceScan::Created(dir) => return Err(IndexError::AwaitingInput { dir }),
            SourceScan::Found(files) => files,
        };

        let manifest = Manifest::load(&self.manifest_path).map_err(IndexError::Manifest)?;
        let reconciliation = Reconciliation::compute(&current, manifest.files());
        let state = reconciliation.state()?;
        let chunk_count = self.store.count().await.map_err(IndexError::Store)?;

        tracing::info!(
            "Index plan: {} current, {} indexed, {} new, {} removed, {} chunks",
            reconciliation.current.len(),
            reconciliation.indexed.len(),
            reconciliation.new.len(),
            reconciliation.removed.len(),
            chunk_count
        );

        Ok(IndexPlan {
            reconciliation,
            state,
            chunk_count,
        })
    }

    /// 계획 수립 → 동작 결정 → 실행
    pub async fn run(
        &mut self,
        policy: IndexPolicy,
        prompt: Option<&mut dyn OperatorPrompt>,
    ) -> Result<IndexOutcome, IndexError> {
        let plan = self.plan().await?;
        let action = decide(&plan.reconciliation, policy, prompt)?;
        self.execute(&plan, action).await
    }

    /// 결정된 동작 실행
    pub async fn execute(
        &mut self,
        plan: &IndexPlan,
        action: IndexAction,
    ) -> Result<IndexOutcome, IndexError> {
        match action {
            IndexAction::Rebuild => self.rebuild(&plan.reconciliation.current).await,
            IndexAction::AddOnly => self.add_only(&plan.reconciliation).await,
            IndexAction::Cancel | IndexAction::LeaveUnchanged | IndexAction::NoOp => {
                tracing::info!("Index unchanged ({})", action);
                Ok(IndexOutcome {
                    action,
                    files_processed: 0,
                    pages_loaded: 0,
                    chunks_inserted: 0,
                    total_chunks: plan.chunk_count,
                    manifest_len: plan.reconciliation.indexed.len(),
                })
            }
        }
    }

    /// 전체 재색인: 저장소 삭제 → 재생성 → 모든 파일 적재 → 매니페스트 덮어쓰기
    async fn rebuild(&mut self, current: &[String]) -> Result<IndexOutcome, IndexError> {
        tracing::info!("Rebuilding index from {} files", current.len());

        self.store.reset().await.map_err(IndexError::Store)?;
        self.build_all(current, IndexAction::Rebuild).await
    }

    /// 새 파일만 추가 (저장소가 비어 있으면 전체 적재)
    async fn add_only(&mut self, reconciliation: &Reconciliation) -> Result<IndexOutcome, IndexError> {
        let existing = self.store.count().await.map_err(IndexError::Store)?;
        if existing == 0 {
            tracing::info!("Vector store is empty, building from all files");
            return self
                .build_all(&reconciliation.current, IndexAction::AddOnly)
                .await;
        }

        let stats = self.ingest(&reconciliation.new).await?;

        let mut manifest = Manifest::new(reconciliation.indexed.clone());
        manifest.extend(reconciliation.new.iter().cloned());
        manifest
            .save(&self.manifest_path)
            .map_err(IndexError::Manifest)?;

        self.finish(IndexAction::AddOnly, stats, manifest.len()).await
    }

    async fn build_all(
        &mut self,
        current: &[String],
        action: IndexAction,
    ) -> Result<IndexOutcome, IndexError> {
        let stats = self.ingest(current).await?;

        let manifest = Manifest::new(current.to_vec());
        manifest
            .save(&self.manifest_path)
            .map_err(IndexError::Manifest)?;

        self.finish(action, stats, manifest.len()).await
    }

    async fn finish(
        &self,
        action: IndexAction,
        stats: IngestStats,
        manifest_len: usize,
    ) -> Result<IndexOutcome, IndexError> {
        let total_chunks = self.store.count().await.map_err(IndexError::Store)?;

        tracing::info!(
            "Index {} done: {} files, {} pages, {} chunks inserted, {} total",
            action,
            stats.files,
            stats.pages,
            stats.chunks,
            total_chunks
        );

        Ok(IndexOutcome {
            action,
            files_processed: stats.files,
            pages_loaded: stats.pages,
            chunks_inserted: stats.chunks,
            total_chunks,
            manifest_len,
        })
    }

    /// 파일 목록을 로드 → 청킹 → 임베딩 → 저장
    async fn ingest(&self, files: &[String]) -> Result<IngestStats, IndexError> {
        let mut stats = IngestStats::default();

        for (i, file) in files.iter().enumerate() {
            tracing::info!("[{}/{}] Processing {}", i + 1, files.len(), file);

            let path = self.collector.path_of(file);
            let pages = self
                .loader
                .load(&path)
                .await
                .map_err(|source| IndexError::LoadFailure {
                    file: file.clone(),
                    source,
                })?;

            let chunks = self.chunker.split_all(&pages);
            if chunks.is_empty() {
                tracing::warn!("No text chunks in {}", file);
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await.map_err(|source| {
                IndexError::EmbeddingFailure {
                    file: file.clone(),
                    source,
                }
            })?;

            if embeddings.len() != chunks.len() {
                return Err(IndexError::EmbeddingFailure {
                    file: file.clone(),
                    source: anyhow::anyhow!(
                        "expected {} embeddings, got {}",
                        chunks.len(),
                        embeddings.len()
                    ),
                });
            }

            let entries: Vec<VectorEntry> = chunks
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| VectorEntry::from_chunk(chunk, embedding))
                .collect();

            let inserted = self
                .store
                .insert_batch(&entries)
                .await
                .map_err(IndexError::Store)?;

            tracing::debug!("{}: {} pages, {} chunks", file, pages.len(), inserted);

            stats.files += 1;
            stats.pages += pages.len();
            stats.chunks += inserted;
        }

        Ok(stats)
    }
}

// ============================================================================
// Tests
// ============================================================================
