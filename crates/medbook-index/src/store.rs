use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use arrow_array::{
    FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use tracing::{debug, info, warn};

use medbook_core::error::{Error, Result};
use medbook_core::traits::{Embedder, Retriever};
use medbook_core::types::{DocumentChunk, Meta, RetrievedChunk, SOURCE_KEY};

use crate::schema::collection_schema;

const EMBED_BATCH_SIZE: usize = 64;
const WRITE_BATCH_SIZE: usize = 1000;

/// A named, persistent collection addressed by `(persist_dir, collection)`.
///
/// Reuse semantics: a non-empty collection at that address is taken as-is;
/// the store never diffs stored chunks against the ones passed in, so the
/// caller owns the decision of whether the corpus changed. There is no
/// cross-process locking either: two processes racing the first build of
/// the same collection may both build (known gap; only the existence check
/// guards re-entry).
pub struct IndexStore {
    db: Connection,
    collection_name: String,
}

impl IndexStore {
    /// Ensures the persistence directory exists and opens the database
    /// connection under it.
    pub async fn connect(
        persist_dir: impl Into<PathBuf>,
        collection_name: impl Into<String>,
    ) -> Result<Self> {
        let persist_dir = persist_dir.into();
        std::fs::create_dir_all(&persist_dir).map_err(|e| {
            Error::IndexBuild(format!("cannot create {}: {e}", persist_dir.display()))
        })?;
        let db = connect(persist_dir.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| Error::IndexBuild(format!("cannot open vector store: {e}")))?;
        Ok(Self { db, collection_name: collection_name.into() })
    }

    /// Returns a query handle for the collection, reusing a non-empty
    /// existing one and otherwise embedding `chunks` into a fresh build.
    /// On reuse the chunks argument is ignored entirely.
    pub async fn build_or_load(
        &self,
        chunks: &[DocumentChunk],
        embedder: Arc<dyn Embedder>,
    ) -> Result<VectorIndex> {
        if let Some(index) = self.try_open_existing(embedder.clone()).await {
            return Ok(index);
        }
        self.build(chunks, embedder).await
    }

    /// Probes for a usable existing collection. Absence is a normal branch,
    /// not an error: a missing table, an empty table, corruption, or schema
    /// drift all report `None` so the caller falls through to a fresh build.
    pub async fn try_open_existing(&self, embedder: Arc<dyn Embedder>) -> Option<VectorIndex> {
        match self.probe(embedder).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    collection = %self.collection_name,
                    error = %e,
                    "probe failed, treating collection as absent"
                );
                None
            }
        }
    }

    async fn probe(&self, embedder: Arc<dyn Embedder>) -> anyhow::Result<Option<VectorIndex>> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&self.collection_name) {
            return Ok(None);
        }
        let table = self.db.open_table(&self.collection_name).execute().await?;
        let rows = table.count_rows(None).await?;
        if rows == 0 {
            debug!(collection = %self.collection_name, "existing collection is empty");
            return Ok(None);
        }
        info!(collection = %self.collection_name, rows, "reusing existing collection");
        Ok(Some(VectorIndex { table, embedder }))
    }

    async fn build(
        &self,
        chunks: &[DocumentChunk],
        embedder: Arc<dyn Embedder>,
    ) -> Result<VectorIndex> {
        self.build_inner(chunks, embedder)
            .await
            .map_err(|e| Error::IndexBuild(e.to_string()))
    }

    /// All-or-nothing: every chunk is embedded before anything is written,
    /// and the table is created in a single call, so a failed build never
    /// leaves a partially-filled collection that would pass the non-empty
    /// probe.
    async fn build_inner(
        &self,
        chunks: &[DocumentChunk],
        embedder: Arc<dyn Embedder>,
    ) -> anyhow::Result<VectorIndex> {
        if chunks.is_empty() {
            return Err(anyhow!("no chunks to index"));
        }
        info!(
            collection = %self.collection_name,
            chunks = chunks.len(),
            "building collection"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let mut vectors = embedder.embed_batch(batch)?;
            embeddings.append(&mut vectors);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedding complete");

        let dim = i32::try_from(embedder.dim())?;
        let schema = collection_schema(dim);
        let mut batches = Vec::new();
        for start in (0..chunks.len()).step_by(WRITE_BATCH_SIZE) {
            let end = (start + WRITE_BATCH_SIZE).min(chunks.len());
            batches.push(Ok(chunks_to_record_batch(
                schema.clone(),
                &chunks[start..end],
                &embeddings[start..end],
                dim,
            )?));
        }
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));

        // A stale table may occupy the name (the probe found it empty or
        // unreadable); clear it so the create below is the only writer.
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.collection_name) {
            self.db.drop_table(&self.collection_name).await?;
        }
        let table = self
            .db
            .create_table(&self.collection_name, reader)
            .execute()
            .await?;
        info!(
            collection = %self.collection_name,
            rows = chunks.len(),
            "collection built and persisted"
        );
        Ok(VectorIndex { table, embedder })
    }
}

/// Read-only similarity-query handle over a built collection.
pub struct VectorIndex {
    table: Table,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Up to `k` chunks ranked by the index's own relevance order. The order
    /// of the result stream is preserved as-is; no re-sorting or re-ranking
    /// happens here or downstream.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.search_inner(query, k)
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))
    }

    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))
    }

    async fn search_inner(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
        let mut query_vectors = self.embedder.embed_batch(&[query.to_string()])?;
        if query_vectors.is_empty() {
            return Err(anyhow!("embedder returned no vector for the query"));
        }
        let query_vector = query_vectors.remove(0);

        let mut stream = self
            .table
            .vector_search(query_vector)?
            .limit(k)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            for row in 0..batch.num_rows() {
                let content = string_value(&batch, "content", row)?;
                let source = string_value(&batch, "source", row)?;
                let score = match distance_value(&batch, row) {
                    Some(distance) => 1.0 - distance,
                    None => 0.0,
                };
                let mut metadata = Meta::new();
                metadata.insert(SOURCE_KEY.to_string(), source);
                hits.push(RetrievedChunk { content, metadata, score });
            }
        }
        debug!(query_chars = query.len(), hits = hits.len(), "similarity query served");
        Ok(hits)
    }
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn retrieve(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
        Ok(self.search(query, k).await?)
    }
}

fn chunks_to_record_batch(
    schema: Arc<arrow_schema::Schema>,
    chunks: &[DocumentChunk],
    embeddings: &[Vec<f32>],
    dim: i32,
) -> anyhow::Result<RecordBatch> {
    assert_eq!(chunks.len(), embeddings.len(), "chunks and embeddings length must match");
    let mut ids = Vec::new();
    let mut sources = Vec::new();
    let mut contents = Vec::new();
    let mut chunk_indices = Vec::new();
    let mut total_chunks = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for (chunk, vector) in chunks.iter().zip(embeddings.iter()) {
        ids.push(chunk.id.clone());
        sources.push(chunk.source().to_string());
        contents.push(chunk.content.clone());
        chunk_indices.push(i32::try_from(chunk.chunk_index)?);
        total_chunks.push(i32::try_from(chunk.total_chunks)?);
        vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(total_chunks)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<
                arrow_array::types::Float32Type,
                _,
                _,
            >(vectors.into_iter(), dim)),
        ],
    )?;
    Ok(batch)
}

fn string_value(batch: &RecordBatch, name: &str, row: usize) -> anyhow::Result<String> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("column '{name}' missing from result batch"))?;
    let array = column
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column '{name}' is not utf8"))?;
    Ok(array.value(row).to_string())
}

fn distance_value(batch: &RecordBatch, row: usize) -> Option<f32> {
    batch
        .column_by_name("_distance")
        .and_then(|column| column.as_any().downcast_ref::<Float32Array>())
        .map(|array| array.value(row))
}
