//! Batch generation progress reporting.
//!
//! Reports what `forge generate` is doing: one line per attempted item and
//! an aggregate line every `batch.progress_every` items. Progress goes to
//! **stderr** so stdout stays reserved for the final summary.

use std::io::Write;

use anyhow::{bail, Result};

use crate::batch::{BatchStats, ItemStatus};

/// A single progress event from the executor.
#[derive(Clone, Debug)]
pub enum BatchProgressEvent {
    Started {
        job: String,
        total: usize,
        out_dir: String,
    },
    Item {
        job: String,
        seq: usize,
        total: usize,
        artifact: String,
        status: ItemStatus,
        /// Failure reason, or the token count of a success.
        detail: Option<String>,
    },
    Aggregate {
        job: String,
        seq: usize,
        total: usize,
        stats: BatchStats,
    },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, event: BatchProgressEvent);
}

/// Human-friendly progress on stderr: `[  12/1936] ok        0012__Deadlocks__Open__Easy.json`.
///
/// Skipped items are only counted, so a resumed run does not print a line
/// for every existing artifact.
pub struct StderrProgress;

impl StderrProgress {
    fn format(event: &BatchProgressEvent) -> Option<String> {
        match event {
            BatchProgressEvent::Started {
                job,
                total,
                out_dir,
            } => Some(format!(
                "generate {}  {} items -> {}\n",
                job,
                format_number(*total as u64),
                out_dir
            )),
            BatchProgressEvent::Item {
                status: ItemStatus::Skipped,
                ..
            } => None,
            BatchProgressEvent::Item {
                seq,
                total,
                artifact,
                status,
                detail,
                ..
            } => {
                let width = total.to_string().len();
                let mut line = format!(
                    "[{:>width$}/{}] {:<9} {}",
                    seq,
                    total,
                    status.label(),
                    artifact,
                    width = width
                );
                if let Some(detail) = detail {
                    line.push_str(&format!("  ({})", detail));
                }
                line.push('\n');
                Some(line)
            }
            BatchProgressEvent::Aggregate { stats, total, .. } => Some(format!(
                "\n  -- progress: {} ok / {} failed / {} deferred / {} skipped / {} total --\n\n",
                stats.succeeded,
                stats.failed,
                stats.deferred,
                stats.skipped,
                format_number(*total as u64)
            )),
        }
    }
}

impl BatchProgressReporter for StderrProgress {
    fn report(&self, event: BatchProgressEvent) {
        if let Some(line) = Self::format(&event) {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(line.as_bytes());
            let _ = err.flush();
        }
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &BatchProgressEvent) -> serde_json::Value {
        match event {
            BatchProgressEvent::Started {
                job,
                total,
                out_dir,
            } => serde_json::json!({
                "event": "started",
                "job": job,
                "total": total,
                "out_dir": out_dir
            }),
            BatchProgressEvent::Item {
                job,
                seq,
                total,
                artifact,
                status,
                detail,
            } => serde_json::json!({
                "event": "item",
                "job": job,
                "seq": seq,
                "total": total,
                "artifact": artifact,
                "status": status,
                "detail": detail
            }),
            BatchProgressEvent::Aggregate {
                job,
                seq,
                total,
                stats,
            } => serde_json::json!({
                "event": "progress",
                "job": job,
                "seq": seq,
                "total": total,
                "stats": stats
            }),
        }
    }
}

impl BatchProgressReporter for JsonProgress {
    fn report(&self, event: BatchProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _event: BatchProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse `--progress`; `None` picks [`ProgressMode::default_for_tty`].
    pub fn from_flag(flag: Option<&str>) -> Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some("off") => Ok(ProgressMode::Off),
            Some(other) => bail!("Unknown progress mode: '{}'. Must be human, json, or off.", other),
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: ItemStatus, detail: Option<&str>) -> BatchProgressEvent {
        BatchProgressEvent::Item {
            job: "exams".into(),
            seq: 12,
            total: 1936,
            artifact: "0012__Deadlocks__Open__Easy.json".into(),
            status,
            detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1936), "1,936");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_human_item_line() {
        let line = StderrProgress::format(&item(ItemStatus::Failed, Some("no usable context"))).unwrap();
        assert_eq!(
            line,
            "[  12/1936] failed    0012__Deadlocks__Open__Easy.json  (no usable context)\n"
        );
    }

    #[test]
    fn test_human_skips_skipped_items() {
        assert!(StderrProgress::format(&item(ItemStatus::Skipped, None)).is_none());
    }

    #[test]
    fn test_json_item_event() {
        let v = JsonProgress::to_json(&item(ItemStatus::Deferred, Some("rate limited")));
        assert_eq!(v["event"], "item");
        assert_eq!(v["status"], "deferred");
        assert_eq!(v["seq"], 12);
    }

    #[test]
    fn test_progress_flag_parsing() {
        assert_eq!(ProgressMode::from_flag(Some("json")).unwrap(), ProgressMode::Json);
        assert_eq!(ProgressMode::from_flag(Some("off")).unwrap(), ProgressMode::Off);
        assert!(ProgressMode::from_flag(Some("loud")).is_err());
    }
}
