//! SQLite-backed [`VectorIndex`].
//!
//! Each collection is a slice of the `records` / `record_vectors` tables
//! keyed by `(collection, id)`. Vectors are stored as little-endian f32
//! BLOBs. Queries load the collection, apply the metadata filter in Rust
//! and rank the survivors by brute-force cosine distance, which is plenty
//! for a few thousand exam questions and lecture chunks.
//!
//! Upserts hash each document with SHA-256 and only call the embedder for
//! records whose text (or embedding model) changed since the last ingest.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use exam_forge_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use exam_forge_core::filter::Filter;
use exam_forge_core::models::{IndexedMetadata, Metadata, QueryHit, Record};
use exam_forge_core::store::VectorIndex;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::migrate;

pub struct SqliteIndex {
    pool: SqlitePool,
    collection: String,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

/// Outcome of [`SqliteIndex::upsert_counted`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertStats {
    pub written: usize,
    pub embedded: usize,
}

impl SqliteIndex {
    /// Open `collection`, creating the schema if needed.
    pub async fn open(pool: SqlitePool, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        migrate::apply_schema(&pool).await?;
        Ok(Self {
            pool,
            collection: collection.to_string(),
            embedder,
            batch_size: 64,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Drop every record of this collection. Returns the number removed.
    pub async fn reset(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM record_vectors WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed)
    }

    /// Content hashes and models of the stored vectors, by id.
    async fn stored_hashes(&self) -> Result<HashMap<String, (String, String)>> {
        let rows = sqlx::query("SELECT id, hash, model FROM record_vectors WHERE collection = ?")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("id"), (r.get("hash"), r.get("model"))))
            .collect())
    }

    /// Like [`VectorIndex::upsert`], reporting how many records needed a
    /// fresh embedding.
    pub async fn upsert_counted(&self, records: &[Record]) -> Result<UpsertStats> {
        if records.is_empty() {
            return Ok(UpsertStats::default());
        }

        let existing = self.stored_hashes().await?;
        let model = self.embedder.model_name().to_string();
        let hashes: Vec<String> = records.iter().map(|r| hash_text(&r.document)).collect();

        let stale: Vec<usize> = records
            .iter()
            .zip(&hashes)
            .enumerate()
            .filter(|(_, (r, h))| match existing.get(&r.id) {
                Some((stored_hash, stored_model)) => stored_hash != *h || *stored_model != model,
                None => true,
            })
            .map(|(i, _)| i)
            .collect();

        let mut vectors: HashMap<usize, Vec<f32>> = HashMap::with_capacity(stale.len());
        for batch in stale.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|&i| records[i].document.clone()).collect();
            let embedded = self
                .embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Failed to embed {} records", texts.len()))?;
            if embedded.len() != batch.len() {
                return Err(anyhow!(
                    "embedder returned {} vectors for {} records",
                    embedded.len(),
                    batch.len()
                ));
            }
            vectors.extend(batch.iter().copied().zip(embedded));
        }
        tracing::debug!(
            collection = %self.collection,
            records = records.len(),
            embedded = vectors.len(),
            "upserting records"
        );

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for (i, (record, hash)) in records.iter().zip(&hashes).enumerate() {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            let payload_json = record.payload.as_ref().map(serde_json::to_string).transpose()?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, document, metadata_json, payload_json, hash, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    metadata_json = excluded.metadata_json,
                    payload_json = excluded.payload_json,
                    hash = excluded.hash,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.document)
            .bind(&metadata_json)
            .bind(&payload_json)
            .bind(hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if let Some(vector) = vectors.get(&i) {
                sqlx::query(
                    r#"
                    INSERT INTO record_vectors (collection, id, model, dims, hash, embedding)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        model = excluded.model,
                        dims = excluded.dims,
                        hash = excluded.hash,
                        embedding = excluded.embedding
                    "#,
                )
                .bind(&self.collection)
                .bind(&record.id)
                .bind(&model)
                .bind(vector.len() as i64)
                .bind(hash)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;

        Ok(UpsertStats {
            written: records.len(),
            embedded: vectors.len(),
        })
    }
}

/// Open one of the configured collections with the configured embedder.
pub async fn open_collection(config: &Config, pool: &SqlitePool, collection: &str) -> Result<SqliteIndex> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(SqliteIndex::open(pool.clone(), collection, embedder)
        .await?
        .with_batch_size(config.embedding.batch_size))
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_metadata(json: &str, id: &str) -> Result<Metadata> {
    serde_json::from_str(json).with_context(|| format!("Corrupt metadata for record {}", id))
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, records: &[Record]) -> Result<()> {
        self.upsert_counted(records).await.map(|_| ())
    }

    async fn query(&self, text: &str, k: usize, filter: Option<&Filter>) -> Result<Vec<QueryHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;

        let rows = sqlx::query(
            r#"
            SELECT r.id, r.document, r.metadata_json, r.payload_json, v.embedding
            FROM records r
            JOIN record_vectors v ON v.collection = r.collection AND v.id = r.id
            WHERE r.collection = ?
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::new();
        for row in &rows {
            let id: String = row.get("id");
            let metadata = parse_metadata(row.get("metadata_json"), &id)?;
            if !filter.map_or(true, |f| f.matches(&metadata)) {
                continue;
            }
            let blob: Vec<u8> = row.get("embedding");
            let payload: Option<String> = row.get("payload_json");
            hits.push(QueryHit {
                distance: cosine_distance(&query_vec, &blob_to_vec(&blob)),
                document: row.get("document"),
                payload: payload.as_deref().map(serde_json::from_str).transpose()?,
                metadata,
                id,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(&self, filter: Option<&Filter>) -> Result<Vec<IndexedMetadata>> {
        let rows = sqlx::query("SELECT id, metadata_json FROM records WHERE collection = ? ORDER BY id")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.get("id");
            let metadata = parse_metadata(row.get("metadata_json"), &id)?;
            if filter.map_or(true, |f| f.matches(&metadata)) {
                out.push(IndexedMetadata { id, metadata });
            }
        }
        Ok(out)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_forge_core::embedding::FeatureHashEmbedder;
    use exam_forge_core::filter::{compile, Clause};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        inner: FeatureHashEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
        fn dims(&self) -> usize {
            self.inner.dims()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn record(id: &str, text: &str, kind: &str) -> Record {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), kind.into());
        metadata.insert("year".into(), 2024i64.into());
        Record {
            id: id.into(),
            document: text.into(),
            metadata,
            payload: Some(serde_json::json!({"id": id})),
        }
    }

    #[tokio::test]
    async fn test_reingest_embeds_only_changed_records() {
        let embedder = Arc::new(CountingEmbedder {
            inner: FeatureHashEmbedder::new(32),
            calls: AtomicUsize::new(0),
        });
        let index = SqliteIndex::open(memory_pool().await, "exams", embedder.clone())
            .await
            .unwrap();

        let first = vec![record("a", "deadlock", "Open"), record("b", "paging", "Open")];
        let stats = index.upsert_counted(&first).await.unwrap();
        assert_eq!(stats, UpsertStats { written: 2, embedded: 2 });

        let second = vec![record("a", "deadlock", "Open"), record("b", "segmentation", "Open")];
        let stats = index.upsert_counted(&second).await.unwrap();
        assert_eq!(stats.embedded, 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_filters_and_restores_payload() {
        let pool = memory_pool().await;
        let index = SqliteIndex::open(pool, "exams", Arc::new(FeatureHashEmbedder::new(64)))
            .await
            .unwrap();
        index
            .upsert(&[
                record("q1", "fork creates a child process", "Open"),
                record("q2", "fork and exec", "MultipleChoice"),
                record("q3", "disk scheduling elevator", "Open"),
            ])
            .await
            .unwrap();

        let filter = compile(&[Clause::eq("type", "Open")]);
        let hits = index.query("fork child", 5, filter.as_ref()).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "q1");
        assert_eq!(hits[0].payload, Some(serde_json::json!({"id": "q1"})));
        assert_eq!(hits[0].meta_i64("year"), Some(2024));
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_collections_are_isolated_and_resettable() {
        let pool = memory_pool().await;
        let embedder: Arc<dyn Embedder> = Arc::new(FeatureHashEmbedder::new(16));
        let exams = SqliteIndex::open(pool.clone(), "exams", embedder.clone()).await.unwrap();
        let lectures = SqliteIndex::open(pool, "lectures", embedder).await.unwrap();

        exams.upsert(&[record("x", "one", "Open")]).await.unwrap();
        lectures
            .upsert(&[record("x", "two", "Open"), record("y", "three", "Open")])
            .await
            .unwrap();

        assert_eq!(exams.count().await.unwrap(), 1);
        assert_eq!(lectures.get(None).await.unwrap().len(), 2);
        assert_eq!(lectures.reset().await.unwrap(), 2);
        assert_eq!(lectures.count().await.unwrap(), 0);
        assert_eq!(exams.count().await.unwrap(), 1);
    }
}
