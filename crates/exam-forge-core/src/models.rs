//! Core data models shared by the ingestion, retrieval and generation paths.
//!
//! Metadata is deliberately flat: a [`MetaValue`] can only be a scalar, which
//! is the only shape the vector index can filter on. Structured question
//! payloads travel separately in [`Record::payload`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A filterable scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            MetaValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Int(i) => Some(*i as f64),
            MetaValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Scalar equality; integers and floats compare numerically.
    pub fn loosely_eq(&self, other: &MetaValue) -> bool {
        match (self, other) {
            (MetaValue::Int(_) | MetaValue::Float(_), MetaValue::Int(_) | MetaValue::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Int(i) => write!(f, "{}", i),
            MetaValue::Float(x) => write!(f, "{}", x),
            MetaValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

impl From<usize> for MetaValue {
    fn from(i: usize) -> Self {
        MetaValue::Int(i as i64)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

impl From<f64> for MetaValue {
    fn from(x: f64) -> Self {
        MetaValue::Float(x)
    }
}

/// Flat, ordered metadata map attached to every indexed record.
pub type Metadata = BTreeMap<String, MetaValue>;

/// An indexed unit: one exam question or one lecture chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Deterministic id derived from source + position. Re-ingesting the
    /// same source upserts under the same id.
    pub id: String,
    /// Text that gets embedded.
    pub document: String,
    pub metadata: Metadata,
    /// Raw structured payload, stored apart from the filterable metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// A ranked result from [`VectorIndex::query`](crate::store::VectorIndex::query).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    /// Cosine distance, `1 - similarity`. Lower is closer.
    pub distance: f32,
    pub document: String,
    pub metadata: Metadata,
    pub payload: Option<serde_json::Value>,
}

impl QueryHit {
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetaValue::as_str)
    }

    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(MetaValue::as_i64)
    }
}

/// Id + metadata pair returned by [`VectorIndex::get`](crate::store::VectorIndex::get).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedMetadata {
    pub id: String,
    pub metadata: Metadata,
}

/// One unit of work in a batch generation run.
///
/// `dimension` is the question type for the exam plan and the subject for
/// the theory plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanItem {
    pub hint: String,
    pub dimension: String,
    pub difficulty: String,
}

impl PlanItem {
    pub fn new(hint: &str, dimension: &str, difficulty: &str) -> Self {
        Self {
            hint: hint.to_string(),
            dimension: dimension.to_string(),
            difficulty: difficulty.to_string(),
        }
    }
}

/// Token counters reported by the generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Provenance block of a generated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub source: String,
    pub subject: String,
    pub topic_hint: String,
    pub requested_type: String,
    pub requested_difficulty: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples_used: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_chunks_used: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_lectures: Option<Vec<i64>>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}

/// The checkpoint document written once per successful plan item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub metadata: ArtifactMetadata,
    pub question: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_value_untagged_roundtrip() {
        let mut meta = Metadata::new();
        meta.insert("year".into(), 2024i64.into());
        meta.insert("type".into(), "Open".into());
        meta.insert("has_code".into(), true.into());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"has_code":true,"type":"Open","year":2024}"#);
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_loosely_eq_numeric() {
        assert!(MetaValue::Int(3).loosely_eq(&MetaValue::Float(3.0)));
        assert!(!MetaValue::Int(3).loosely_eq(&MetaValue::Str("3".into())));
        assert!(MetaValue::Str("a".into()).loosely_eq(&MetaValue::Str("a".into())));
    }

    #[test]
    fn test_artifact_omits_absent_counts() {
        let artifact = GeneratedArtifact {
            metadata: ArtifactMetadata {
                source: "ai_generated".into(),
                subject: "Concurrency".into(),
                topic_hint: "Deadlocks".into(),
                requested_type: "Open".into(),
                requested_difficulty: "Hard".into(),
                generated_at: "2026-01-01 10:00:00".into(),
                examples_used: Some(3),
                context_chunks_used: None,
                context_lectures: None,
                token_usage: None,
            },
            question: serde_json::json!({"id": 1}),
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["metadata"]["examples_used"], 3);
        assert!(value["metadata"].get("context_chunks_used").is_none());
    }
}
