//! TOML configuration for the `forge` CLI.
//!
//! Every section except `[db]` is optional; missing keys fall back to the
//! defaults below. See `config/forge.example.toml` for a commented example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Logical collection names inside the SQLite store.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_exams_collection")]
    pub exams_collection: String,
    #[serde(default = "default_lectures_collection")]
    pub lectures_collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            exams_collection: default_exams_collection(),
            lectures_collection: default_lectures_collection(),
        }
    }
}

fn default_exams_collection() -> String {
    "os_exam_questions".to_string()
}
fn default_lectures_collection() -> String {
    "os_summary_chunks".to_string()
}

/// Lecture chunking, in characters.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

pub const EMBEDDING_PROVIDERS: [&str; 4] = ["local", "ollama", "openai", "hashing"];

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            base_url: default_generation_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_generation_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_generation_timeout() -> u64 {
    120
}

/// Executor pacing and output locations.
#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    #[serde(default = "default_exams_output_dir")]
    pub exams_output_dir: PathBuf,
    #[serde(default = "default_theory_output_dir")]
    pub theory_output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            rate_limit_backoff_secs: default_rate_limit_backoff(),
            progress_every: default_progress_every(),
            exams_output_dir: default_exams_output_dir(),
            theory_output_dir: default_theory_output_dir(),
        }
    }
}

fn default_throttle_ms() -> u64 {
    1500
}
fn default_rate_limit_backoff() -> u64 {
    30
}
fn default_progress_every() -> usize {
    50
}
fn default_exams_output_dir() -> PathBuf {
    PathBuf::from("aiGenerated")
}
fn default_theory_output_dir() -> PathBuf {
    PathBuf::from("aiTheory")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_exam_examples")]
    pub exam_examples: usize,
    #[serde(default = "default_theory_context")]
    pub theory_context: usize,
    #[serde(default = "default_search_results")]
    pub search_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            exam_examples: default_exam_examples(),
            theory_context: default_theory_context(),
            search_results: default_search_results(),
        }
    }
}

fn default_exam_examples() -> usize {
    3
}
fn default_theory_context() -> usize {
    5
}
fn default_search_results() -> usize {
    5
}

/// Where `forge ingest` reads from.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_exams_dir")]
    pub exams_dir: PathBuf,
    #[serde(default = "default_lectures_dir")]
    pub lectures_dir: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            exams_dir: default_exams_dir(),
            lectures_dir: default_lectures_dir(),
        }
    }
}

fn default_exams_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_lectures_dir() -> PathBuf {
    PathBuf::from("summaryBOOK")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    if config.batch.progress_every == 0 {
        bail!("batch.progress_every must be > 0");
    }

    if config.retrieval.exam_examples == 0 || config.retrieval.theory_context == 0 {
        bail!("retrieval.exam_examples and retrieval.theory_context must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if config.generation.provider != "gemini" {
        bail!(
            "Unknown generation provider: '{}'. Must be gemini.",
            config.generation.provider
        );
    }

    if config.index.exams_collection == config.index.lectures_collection {
        bail!("index.exams_collection and index.lectures_collection must differ");
    }

    let embedding = &config.embedding;
    if !EMBEDDING_PROVIDERS.contains(&embedding.provider.as_str()) {
        bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, openai, or hashing.",
            embedding.provider
        );
    }
    if embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if matches!(embedding.provider.as_str(), "ollama" | "openai") {
        if embedding.dims.is_none() {
            bail!(
                "embedding.dims must be set when provider is '{}'",
                embedding.provider
            );
        }
        if embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                embedding.provider
            );
        }
    }

    Ok(config)
}
