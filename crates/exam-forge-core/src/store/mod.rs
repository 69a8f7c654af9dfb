//! Vector index abstraction.
//!
//! A [`VectorIndex`] is one named collection of [`Record`]s: embedded text,
//! flat filterable metadata and an optional structured payload. Retrieval,
//! ingestion and the batch jobs only talk to this trait, so the SQLite
//! backend and the in-memory backend are interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::filter::Filter;
use crate::models::{IndexedMetadata, QueryHit, Record};

/// Abstract nearest-neighbour index over one collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace records by id |
/// | [`query`](VectorIndex::query) | Top-k by cosine distance, after filtering |
/// | [`get`](VectorIndex::get) | Metadata of every record matching a filter |
/// | [`count`](VectorIndex::count) | Number of records |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records. Re-upserting an id overwrites it.
    async fn upsert(&self, records: &[Record]) -> Result<()>;

    /// Return at most `k` hits ordered by ascending distance to `text`.
    /// Records that do not satisfy `filter` are never returned.
    async fn query(&self, text: &str, k: usize, filter: Option<&Filter>) -> Result<Vec<QueryHit>>;

    /// Id and metadata of every matching record, ordered by id.
    async fn get(&self, filter: Option<&Filter>) -> Result<Vec<IndexedMetadata>>;

    async fn count(&self) -> Result<usize>;
}
