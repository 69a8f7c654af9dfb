//! # Exam Forge
//!
//! Retrieval-driven bulk generation of exam questions.
//!
//! Past exam questions and chunked lecture notes are embedded into a
//! SQLite-backed vector index. A deterministic plan then drives a
//! resumable batch job: for every plan item the most relevant examples
//! are retrieved (relaxing metadata filters when too few match), a
//! prompt is assembled, Gemini generates a new question, and the result
//! is written as its own JSON file.
//!
//! ```text
//! ┌───────────────┐   ┌────────────────┐   ┌──────────────┐
//! │ exams/*.json  │──▶│ tag + chunk +  │──▶│ SQLite index │
//! │ lectures/*.txt│   │ embed          │   │ (2 colls)    │
//! └───────────────┘   └────────────────┘   └──────┬───────┘
//!                                                 │ retrieve
//!                  ┌──────────┐   ┌───────────┐   ▼
//!                  │ artifacts│◀──│ run_batch │◀──plan
//!                  │ (*.json) │   │ + Gemini  │
//!                  └──────────┘   └───────────┘
//! ```
//!
//! Domain logic (chunking, filters, planning, prompts, shuffling, jobs)
//! lives in `exam-forge-core`; this crate wires it to storage, remote
//! providers and the CLI.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`db`] / [`migrate`] | SQLite pool and schema |
//! | [`sqlite_index`] | Persistent [`VectorIndex`](exam_forge_core::store::VectorIndex) |
//! | [`embedding`] | Embedding providers |
//! | [`gemini`] | Gemini generation client |
//! | [`batch`] | Resumable executor |
//! | [`progress`] | Progress reporting |
//! | [`ingest`], [`search`], [`generate_cmd`], [`stats`] | CLI commands |

pub mod batch;
pub mod config;
pub mod db;
pub mod embedding;
pub mod gemini;
pub mod generate_cmd;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sqlite_index;
pub mod stats;
