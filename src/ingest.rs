//! `forge ingest`: load parsed exams and lecture notes into the index.
//!
//! Exams come from `sources.exams_dir/*.json` (or explicit paths), one
//! record per question. Lectures come from `sources.lectures_dir/<N>.txt`,
//! chunked and tagged with the lecture's subject and topics. Record ids are
//! deterministic, so re-running an ingest updates in place.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use exam_forge_core::chunk::chunk_text;
use exam_forge_core::store::VectorIndex;
use exam_forge_core::tagger::{exam_records, lecture_number_from_filename, lecture_records, ExamFile};

use crate::config::Config;
use crate::db;
use crate::sqlite_index::{open_collection, SqliteIndex};

/// Files directly under `dir` with the given extension, sorted by name.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Source directory not found: {}", dir.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some(extension))
        .collect();
    files.sort();
    Ok(files)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn reset_if_requested(index: &SqliteIndex, reset: bool) -> Result<()> {
    if reset {
        let removed = index.reset().await?;
        println!("Deleted {} records from '{}'", removed, index.collection());
    }
    Ok(())
}

pub fn load_exam_file(path: &Path) -> Result<ExamFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// `forge ingest exams [FILES…] [--reset]`.
pub async fn run_ingest_exams(config: &Config, files: Vec<PathBuf>, reset: bool) -> Result<()> {
    let files = if files.is_empty() {
        list_files(&config.sources.exams_dir, "json")?
    } else {
        files
    };
    if files.is_empty() {
        bail!("No JSON files found.");
    }

    let pool = db::connect(config).await?;
    let index = open_collection(config, &pool, &config.index.exams_collection).await?;
    reset_if_requested(&index, reset).await?;

    println!("ingest exams: {} file(s)", files.len());
    let mut questions = 0usize;
    let mut embedded = 0usize;
    let mut errors = 0usize;

    for (i, path) in files.iter().enumerate() {
        let name = file_name(path);
        let file = match load_exam_file(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(file = %name, error = %format!("{:#}", e), "skipping exam file");
                eprintln!("  [{}/{}] {}: skipped ({:#})", i + 1, files.len(), name, e);
                errors += 1;
                continue;
            }
        };
        let records = exam_records(&file);
        let stats = index.upsert_counted(&records).await?;
        questions += stats.written;
        embedded += stats.embedded;
        println!("  [{}/{}] {}: {} questions", i + 1, files.len(), name, records.len());
    }

    println!();
    println!("  questions indexed: {}", questions);
    println!("  embeddings computed: {}", embedded);
    println!("  files skipped: {}", errors);
    println!("  collection size: {}", index.count().await?);

    pool.close().await;
    Ok(())
}

/// `forge ingest lectures [--reset]`.
pub async fn run_ingest_lectures(config: &Config, reset: bool) -> Result<()> {
    let mut lectures: Vec<(i64, PathBuf)> = Vec::new();
    for path in list_files(&config.sources.lectures_dir, "txt")? {
        match lecture_number_from_filename(&file_name(&path)) {
            Some(n) => lectures.push((n, path)),
            None => eprintln!("  Skipping non-lecture file: {}", file_name(&path)),
        }
    }
    lectures.sort_by_key(|(n, _)| *n);
    if lectures.is_empty() {
        bail!(
            "No lecture files (<N>.txt) found in {}",
            config.sources.lectures_dir.display()
        );
    }

    let pool = db::connect(config).await?;
    let index = open_collection(config, &pool, &config.index.lectures_collection).await?;
    reset_if_requested(&index, reset).await?;

    println!("ingest lectures: {} file(s)", lectures.len());
    let mut chunks_total = 0usize;
    let mut embedded = 0usize;

    for (i, (lecture, path)) in lectures.iter().enumerate() {
        let name = file_name(path);
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let chunks = chunk_text(&text, config.chunking.chunk_size, config.chunking.overlap);
        if chunks.is_empty() {
            eprintln!("  [{}/{}] {}: no content", i + 1, lectures.len(), name);
            continue;
        }

        let records = lecture_records(&name, *lecture, &chunks);
        let subject = records
            .first()
            .and_then(|r| r.metadata.get("subject"))
            .map(|s| s.to_string())
            .unwrap_or_default();
        let stats = index.upsert_counted(&records).await?;
        chunks_total += stats.written;
        embedded += stats.embedded;
        println!(
            "  [{}/{}] {}: {} chunks (subject: {})",
            i + 1,
            lectures.len(),
            name,
            chunks.len(),
            subject
        );
    }

    println!();
    println!("  chunks indexed: {}", chunks_total);
    println!("  embeddings computed: {}", embedded);
    println!("  collection size: {}", index.count().await?);

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["os24SA.json", "os19B.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = list_files(dir.path(), "json").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["os19B.json", "os24SA.json"]);
        assert!(list_files(&dir.path().join("missing"), "json").is_err());
    }

    #[test]
    fn test_load_exam_file_tolerates_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os20A.json");
        std::fs::write(&path, r#"{"metadata": {"source_file": "os20A.pdf"}}"#).unwrap();
        let file = load_exam_file(&path).unwrap();
        assert!(file.questions.is_empty());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_exam_file(&path).is_err());
    }
}
