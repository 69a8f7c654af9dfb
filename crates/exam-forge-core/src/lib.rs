//! # Exam Forge Core
//!
//! Pure logic for retrieval-driven question generation: data models,
//! chunking, ingestion tagging, metadata filters, the vector index
//! abstraction, fallback retrieval, batch plans, prompts, response parsing,
//! answer shuffling and the per-item batch jobs.
//!
//! This crate does no filesystem or database I/O and does not depend on
//! tokio or sqlx. The `exam-forge` app crate supplies the SQLite index,
//! embedding providers, the Gemini client and the resumable executor.

pub mod catalog;
pub mod chunk;
pub mod embedding;
pub mod filter;
pub mod generation;
pub mod job;
pub mod models;
pub mod plan;
pub mod prompt;
pub mod retrieve;
pub mod shuffle;
pub mod store;
pub mod tagger;
