//! Resumable, checkpointed batch executor.
//!
//! Walks a plan in order and runs each item through a [`BatchJob`]. Every
//! success is persisted immediately as its own JSON file, so the output
//! directory *is* the checkpoint: with `resume` set, an item whose file
//! already exists and parses as a JSON object is skipped without any
//! remote call. Corrupt files are regenerated.
//!
//! Per item:
//!
//! | Outcome | Counted as | Pause afterwards |
//! |---------|-----------|------------------|
//! | valid checkpoint on disk (resume) | skipped | none |
//! | artifact generated and written | succeeded | throttle |
//! | no context, unparseable reply, permanent error, write error | failed | throttle |
//! | rate limit or timeout | deferred | rate-limit backoff |
//!
//! Deferred items are left for the next `--resume` run. Only startup
//! problems (output directory cannot be created) are returned as errors;
//! item failures never abort the batch.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use exam_forge_core::generation::{classify_error, FailureKind};
use exam_forge_core::job::{BatchJob, ItemOutcome};
use exam_forge_core::models::{GeneratedArtifact, PlanItem, TokenUsage};

use crate::config::BatchConfig;
use crate::progress::{BatchProgressEvent, BatchProgressReporter};

/// Final state of one plan item within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Skipped,
    Succeeded,
    Failed,
    Deferred,
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Skipped => "skipped",
            ItemStatus::Succeeded => "ok",
            ItemStatus::Failed => "failed",
            ItemStatus::Deferred => "deferred",
        }
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub planned: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deferred: usize,
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl BatchStats {
    fn add_usage(&mut self, usage: Option<&TokenUsage>) {
        if let Some(u) = usage {
            self.prompt_tokens += u.prompt_tokens;
            self.output_tokens += u.output_tokens;
            self.total_tokens += u.total_tokens;
        }
    }

    fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Skipped => self.skipped += 1,
            ItemStatus::Succeeded => self.succeeded += 1,
            ItemStatus::Failed => self.failed += 1,
            ItemStatus::Deferred => self.deferred += 1,
        }
    }

    /// Items that reached a final state this run.
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed + self.deferred
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub resume: bool,
    /// Pause after every attempted item.
    pub throttle: Duration,
    /// Pause after a rate-limited or timed-out item.
    pub rate_limit_backoff: Duration,
    /// Emit an aggregate progress event every this many items.
    pub progress_every: usize,
}

impl BatchOptions {
    pub fn from_config(config: &BatchConfig, resume: bool) -> Self {
        Self {
            resume,
            throttle: Duration::from_millis(config.throttle_ms),
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
            progress_every: config.progress_every.max(1),
        }
    }
}

/// True when `path` holds a JSON object, i.e. a finished artifact.
pub fn checkpoint_is_valid(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
        .map_or(false, |v| v.is_object())
}

/// Write the artifact as pretty JSON in one whole-file write.
pub fn write_artifact(path: &Path, artifact: &GeneratedArtifact) -> Result<()> {
    let json = serde_json::to_string_pretty(artifact)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Run `job` over `plan`, writing artifacts into `out_dir`.
pub async fn run_batch(
    job: &dyn BatchJob,
    plan: &[PlanItem],
    out_dir: &Path,
    options: &BatchOptions,
    reporter: &dyn BatchProgressReporter,
) -> Result<BatchStats> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let total = plan.len();
    let mut stats = BatchStats {
        planned: total,
        ..Default::default()
    };

    tracing::info!(job = job.name(), total, resume = options.resume, "batch started");
    reporter.report(BatchProgressEvent::Started {
        job: job.name().to_string(),
        total,
        out_dir: out_dir.display().to_string(),
    });

    for (i, item) in plan.iter().enumerate() {
        let seq = i + 1;
        let artifact = job.artifact_name(seq, item);
        let path = out_dir.join(&artifact);

        let (status, detail) = if options.resume && checkpoint_is_valid(&path) {
            (ItemStatus::Skipped, None)
        } else {
            let (status, detail) = match job.run_item(item).await {
                Ok(ItemOutcome::Generated(generated)) => {
                    let usage = generated.metadata.token_usage;
                    stats.add_usage(usage.as_ref());
                    match write_artifact(&path, &generated) {
                        Ok(()) => (
                            ItemStatus::Succeeded,
                            usage.map(|u| format!("tokens: {}", u.total_tokens)),
                        ),
                        Err(e) => (ItemStatus::Failed, Some(format!("{:#}", e))),
                    }
                }
                Ok(ItemOutcome::NoContext) => {
                    (ItemStatus::Failed, Some("no usable context".to_string()))
                }
                Ok(ItemOutcome::Unparseable { usage }) => {
                    stats.add_usage(usage.as_ref());
                    (ItemStatus::Failed, Some("invalid JSON response".to_string()))
                }
                Err(e) => match classify_error(&e) {
                    FailureKind::Permanent => (ItemStatus::Failed, Some(format!("{:#}", e))),
                    kind => {
                        let reason = match kind {
                            FailureKind::RateLimited => "rate limited",
                            _ => "timed out",
                        };
                        (
                            ItemStatus::Deferred,
                            Some(format!(
                                "{}, waiting {}s",
                                reason,
                                options.rate_limit_backoff.as_secs()
                            )),
                        )
                    }
                },
            };
            if status != ItemStatus::Succeeded {
                tracing::warn!(
                    job = job.name(),
                    seq,
                    artifact = %artifact,
                    status = status.label(),
                    detail = detail.as_deref().unwrap_or(""),
                    "item not generated"
                );
            }
            (status, detail)
        };

        stats.record(status);
        reporter.report(BatchProgressEvent::Item {
            job: job.name().to_string(),
            seq,
            total,
            artifact,
            status,
            detail,
        });

        match status {
            ItemStatus::Skipped => {}
            ItemStatus::Deferred => pause(options.rate_limit_backoff).await,
            ItemStatus::Succeeded | ItemStatus::Failed => pause(options.throttle).await,
        }

        if seq % options.progress_every == 0 {
            reporter.report(BatchProgressEvent::Aggregate {
                job: job.name().to_string(),
                seq,
                total,
                stats: stats.clone(),
            });
        }
    }

    tracing::info!(
        job = job.name(),
        succeeded = stats.succeeded,
        skipped = stats.skipped,
        failed = stats.failed,
        deferred = stats.deferred,
        "batch finished"
    );
    Ok(stats)
}
