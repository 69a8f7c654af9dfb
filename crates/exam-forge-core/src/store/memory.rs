//! In-memory [`VectorIndex`] implementation for tests and offline runs.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Queries filter
//! first, then rank the survivors by brute-force cosine distance.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_distance, Embedder, FeatureHashEmbedder};
use crate::filter::Filter;
use crate::models::{IndexedMetadata, QueryHit, Record};

use super::VectorIndex;

struct StoredRecord {
    record: Record,
    vector: Vec<f32>,
}

pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Index backed by a [`FeatureHashEmbedder`] of the given size.
    pub fn hashing(dims: usize) -> Self {
        Self::new(Arc::new(FeatureHashEmbedder::new(dims)))
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.document.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            return Err(anyhow!(
                "embedder returned {} vectors for {} records",
                vectors.len(),
                records.len()
            ));
        }
        let mut stored = self.records.write().map_err(poisoned)?;
        for (record, vector) in records.iter().zip(vectors) {
            stored.insert(
                record.id.clone(),
                StoredRecord {
                    record: record.clone(),
                    vector,
                },
            );
        }
        Ok(())
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
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;

        let stored = self.records.read().map_err(poisoned)?;
        let mut hits: Vec<QueryHit> = stored
            .values()
            .filter(|s| filter.map_or(true, |f| f.matches(&s.record.metadata)))
            .map(|s| QueryHit {
                id: s.record.id.clone(),
                distance: cosine_distance(&query_vec, &s.vector),
                document: s.record.document.clone(),
                metadata: s.record.metadata.clone(),
                payload: s.record.payload.clone(),
            })
            .collect();
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
        let stored = self.records.read().map_err(poisoned)?;
        Ok(stored
            .values()
            .filter(|s| filter.map_or(true, |f| f.matches(&s.record.metadata)))
            .map(|s| IndexedMetadata {
                id: s.record.id.clone(),
                metadata: s.record.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{compile, Clause};
    use crate::models::Metadata;

    fn record(id: &str, text: &str, kind: &str) -> Record {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), kind.into());
        Record {
            id: id.into(),
            document: text.into(),
            metadata,
            payload: None,
        }
    }

    async fn seeded() -> InMemoryIndex {
        let index = InMemoryIndex::hashing(128);
        index
            .upsert(&[
                record("a", "semaphore wait and signal", "Open"),
                record("b", "page table walk and TLB miss", "MultipleChoice"),
                record("c", "semaphore based producer consumer", "MultipleChoice"),
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_id() {
        let index = seeded().await;
        index
            .upsert(&[record("a", "replaced text", "Open")])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
        let all = index.get(None).await.unwrap();
        assert_eq!(all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = seeded().await;
        let hits = index.query("semaphore wait and signal", 3, None).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_query_respects_filter_and_k() {
        let index = seeded().await;
        let filter = compile(&[Clause::eq("type", "MultipleChoice")]).unwrap();
        let hits = index.query("semaphore", 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.meta_str("type") == Some("MultipleChoice")));

        let hits = index.query("semaphore", 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_get_with_filter() {
        let index = seeded().await;
        let filter = compile(&[Clause::eq("type", "Open")]).unwrap();
        let got = index.get(Some(&filter)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "a");
    }
}
