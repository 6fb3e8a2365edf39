//! LanceDB Vector Store - 영속 벡터 저장소
//!
//! 재색인 시에는 디렉토리를 통째로 지우고 빈 저장소를 다시 만듭니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{SearchResult, VectorEntry, VectorStore};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "hr_documents";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    path: PathBuf,
    dimension: i32,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기 (없으면 생성)
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        let db = Self::connect(path).await?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
            dimension: i32::try_from(dimension).context("Embedding dimension too large")?,
        })
    }

    async fn connect(path: &Path) -> Result<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")
    }

    /// 저장소 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 벡터 테이블 스키마
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("file_name", DataType::Utf8, false),
            Field::new("page_label", DataType::Utf8, true),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != self.dimension as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch for {}: got {}, expected {}",
                bad.file_name,
                bad.embedding.len(),
                self.dimension
            );
        }

        let file_names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
        let page_labels: Vec<Option<&str>> =
            entries.iter().map(|e| e.page_label.as_deref()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(file_names)),
                Arc::new(StringArray::from(page_labels)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// 테이블 존재 여부 확인
    ///
    /// 디렉토리가 아직 없으면 목록 조회가 실패할 수 있으므로 false로 취급
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == TABLE_NAME))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let results = self
            .open_table()
            .await?
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;
        let mut search_results = Vec::new();

        for batch in batches {
            let file_names: &StringArray = column(&batch, "file_name")?;
            let page_labels: &StringArray = column(&batch, "page_label")?;
            let chunk_indices: &Int32Array = column(&batch, "chunk_index")?;
            let chunk_texts: &StringArray = column(&batch, "chunk_text")?;
            // LanceDB가 붙이는 L2 거리
            let distances: &Float32Array = column(&batch, "_distance")?;

            for i in 0..batch.num_rows() {
                let page_label =
                    (!page_labels.is_null(i)).then(|| page_labels.value(i).to_string());

                search_results.push(SearchResult {
                    file_name: file_names.value(i).to_string(),
                    page_label,
                    chunk_index: chunk_indices.value(i),
                    chunk_text: chunk_texts.value(i).to_string(),
                    similarity: distance_to_similarity(distances.value(i)),
                });
            }
        }

        search_results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(search_results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        self.open_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    async fn reset(&mut self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => tracing::info!("Removed vector store {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Vector store {:?} already absent", self.path);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {:?}", self.path));
            }
        }

        self.db = Self::connect(&self.path).await?;
        Ok(())
    }
}

/// L2 거리 → (0, 1] 유사도
fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// 이름으로 타입 지정 컬럼 꺼내기
fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Missing or mistyped column: {}", name))
}

// ============================================================================
// Tests
// ============================================================================
