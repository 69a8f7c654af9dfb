//! `forge generate` and `forge reshuffle`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use exam_forge_core::catalog::{EXAM_PLAN, THEORY_PLAN};
use exam_forge_core::generation::Generator;
use exam_forge_core::job::{BatchJob, ExamJob, TheoryJob};
use exam_forge_core::models::PlanItem;
use exam_forge_core::plan::{build_plan, Distribution, PlanTables};
use exam_forge_core::shuffle::shuffle_options;
use exam_forge_core::store::VectorIndex;

use crate::batch::{run_batch, BatchOptions, BatchStats};
use crate::config::Config;
use crate::db;
use crate::gemini::GeminiClient;
use crate::ingest::{file_name, list_files};
use crate::progress::{format_number, ProgressMode};
use crate::sqlite_index::open_collection;

/// Which batch to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Exam-style questions from past exams.
    Exams,
    /// Multiple-choice theory questions from lecture notes.
    Theory,
}

impl JobKind {
    fn tables(&self) -> &'static PlanTables {
        match self {
            JobKind::Exams => &EXAM_PLAN,
            JobKind::Theory => &THEORY_PLAN,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            JobKind::Exams => "Exam Question Generator (from past exams)",
            JobKind::Theory => "Theory MC Question Generator (from lecture notes)",
        }
    }

    fn output_dir<'a>(&self, config: &'a Config) -> &'a Path {
        match self {
            JobKind::Exams => &config.batch.exams_output_dir,
            JobKind::Theory => &config.batch.theory_output_dir,
        }
    }

    fn collection<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            JobKind::Exams => &config.index.exams_collection,
            JobKind::Theory => &config.index.lectures_collection,
        }
    }

    /// Label of `PlanItem::dimension` in this plan.
    fn dimension_label(&self) -> &'static str {
        match self {
            JobKind::Exams => "type",
            JobKind::Theory => "subject",
        }
    }
}

/// The plan for `kind`, cut to the first `limit` items.
pub fn plan_for(kind: JobKind, limit: Option<usize>) -> Vec<PlanItem> {
    let mut plan = build_plan(kind.tables());
    if let Some(limit) = limit {
        plan.truncate(limit);
    }
    plan
}

pub struct GenerateArgs {
    pub resume: bool,
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub progress: ProgressMode,
}

pub async fn run_generate(config: &Config, kind: JobKind, args: GenerateArgs) -> Result<()> {
    let plan = plan_for(kind, args.limit);
    let out_dir = kind.output_dir(config);

    println!("{}", "=".repeat(51));
    println!("  {}", kind.title());
    println!("{}", "=".repeat(51));
    println!("  Plan: {} questions to generate", format_number(plan.len() as u64));
    println!("  Output: {}", out_dir.display());
    println!("  Resume mode: {}", args.resume);
    if let Some(limit) = args.limit {
        println!("  Limit: {} questions", limit);
    }
    println!();

    if args.dry_run {
        print_distribution(kind, &Distribution::of(&plan));
        return Ok(());
    }

    let generator: Arc<dyn Generator> = Arc::new(GeminiClient::from_config(&config.generation)?);
    let pool = db::connect(config).await?;
    let index = open_collection(config, &pool, kind.collection(config)).await?;
    let documents = index.count().await?;
    if documents == 0 {
        bail!(
            "Collection '{}' is empty. Run `forge ingest {}` first.",
            kind.collection(config),
            match kind {
                JobKind::Exams => "exams",
                JobKind::Theory => "lectures",
            }
        );
    }
    println!("  Collection has {} documents", format_number(documents as u64));
    println!("  Model: {}", generator.model_name());
    println!();

    let index: Arc<dyn VectorIndex> = Arc::new(index);
    let job: Box<dyn BatchJob> = match kind {
        JobKind::Exams => Box::new(ExamJob::new(index, generator, config.retrieval.exam_examples)),
        JobKind::Theory => Box::new(TheoryJob::new(index, generator, config.retrieval.theory_context)),
    };

    let options = BatchOptions::from_config(&config.batch, args.resume);
    let reporter = args.progress.reporter();
    let stats = run_batch(job.as_ref(), &plan, out_dir, &options, reporter.as_ref()).await?;
    print_summary(&stats, out_dir);

    pool.close().await;
    Ok(())
}

fn print_distribution(kind: JobKind, dist: &Distribution) {
    let pairs = |counts: &[(String, usize)]| {
        counts
            .iter()
            .map(|(k, n)| format!("{}: {}", k, n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("By {}: {}", kind.dimension_label(), pairs(&dist.by_dimension));
    println!("By difficulty: {}", pairs(&dist.by_difficulty));
    println!();
    println!("By topic:");
    for (hint, n) in &dist.by_hint {
        println!("  {}: {}", hint, n);
    }
    println!();
    println!("Total: {}", dist.total);
}

fn print_summary(stats: &BatchStats, out_dir: &Path) {
    println!();
    println!("{}", "=".repeat(50));
    println!("Done!");
    println!("  Generated: {}", stats.succeeded);
    println!("  Skipped:   {}", stats.skipped);
    println!("  Failed:    {}", stats.failed);
    println!("  Deferred:  {}", stats.deferred);
    println!("  Total:     {}/{}", stats.processed(), stats.planned);
    println!("  Output:    {}", out_dir.display());
    println!();
    println!("{}", "=".repeat(50));
    println!("Token Usage Summary:");
    println!("  Total Prompt Tokens:  {}", format_number(stats.prompt_tokens));
    println!("  Total Output Tokens:  {}", format_number(stats.output_tokens));
    println!("  Total Tokens:         {}", format_number(stats.total_tokens));
    if stats.succeeded > 0 {
        println!(
            "  Avg per question:     {} tokens",
            format_number(stats.total_tokens / stats.succeeded as u64)
        );
    }
    if stats.deferred > 0 {
        println!();
        println!(
            "{} item(s) were rate limited or timed out; rerun with --resume to retry them.",
            stats.deferred
        );
    }
}

/// Counts from a reshuffle pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReshuffleStats {
    pub files: usize,
    pub reshuffled: usize,
    pub skipped: usize,
}

fn has_options_and_marker(question: &Value) -> bool {
    let has_options = question
        .pointer("/content/options")
        .and_then(Value::as_array)
        .map_or(false, |o| !o.is_empty());
    let has_marker = question
        .pointer("/solution/correct_option")
        .and_then(Value::as_str)
        .map_or(false, |m| !m.is_empty());
    has_options && has_marker
}

fn reshuffle_file(path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut data: Value = serde_json::from_str(&content)?;
    let Some(question) = data.get("question") else {
        return Ok(false);
    };
    if !has_options_and_marker(question) {
        return Ok(false);
    }
    data["question"] = shuffle_options(question);
    std::fs::write(path, serde_json::to_string_pretty(&data)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Reshuffle the answer options of every artifact in `dir`.
pub fn reshuffle_dir(dir: &Path) -> Result<ReshuffleStats> {
    let mut stats = ReshuffleStats::default();
    if !dir.is_dir() {
        return Ok(stats);
    }
    for path in list_files(dir, "json")? {
        stats.files += 1;
        match reshuffle_file(&path) {
            Ok(true) => stats.reshuffled += 1,
            Ok(false) => {}
            Err(e) => {
                stats.skipped += 1;
                eprintln!("  SKIP {}: {:#}", file_name(&path), e);
            }
        }
    }
    Ok(stats)
}

/// `forge reshuffle`.
pub fn run_reshuffle(config: &Config) -> Result<()> {
    let dir = &config.batch.theory_output_dir;
    let stats = reshuffle_dir(dir)?;
    if stats.files == 0 {
        println!("No files found in {}", dir.display());
        return Ok(());
    }
    println!(
        "Done. Reshuffled {}/{} files ({} unreadable).",
        stats.reshuffled, stats.files, stats.skipped
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_limit_keeps_prefix() {
        let full = plan_for(JobKind::Exams, None);
        let limited = plan_for(JobKind::Exams, Some(10));
        assert_eq!(full.len(), 1936);
        assert_eq!(limited.as_slice(), &full[..10]);
        assert_eq!(plan_for(JobKind::Theory, None).len(), 570);
    }

    #[test]
    fn test_reshuffle_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = json!({
            "metadata": {"source": "ai_generated_from_summary"},
            "question": {
                "content": {"options": ["א. a", "ב. b", "ג. c", "ד. d"]},
                "solution": {"correct_option": "ב", "explanation": "x"}
            }
        });
        std::fs::write(
            dir.path().join("0001.json"),
            serde_json::to_string_pretty(&artifact).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("0002.json"), r#"{"question": {"content": {}}}"#).unwrap();
        std::fs::write(dir.path().join("0003.json"), "{broken").unwrap();

        let stats = reshuffle_dir(dir.path()).unwrap();
        assert_eq!(
            stats,
            ReshuffleStats {
                files: 3,
                reshuffled: 1,
                skipped: 1
            }
        );

        let content = std::fs::read_to_string(dir.path().join("0001.json")).unwrap();
        let data: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(data["metadata"], artifact["metadata"]);
        let label = data["question"]["solution"]["correct_option"].as_str().unwrap();
        let correct = data["question"]["content"]["options"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .find(|o| o.starts_with(label))
            .unwrap();
        assert_eq!(correct, format!("{}. b", label));
    }

    #[test]
    fn test_reshuffle_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(reshuffle_dir(&dir.path().join("none")).unwrap(), ReshuffleStats::default());
    }
}
