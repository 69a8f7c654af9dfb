//! Index and output overview for `forge stats`.
//!
//! Shows record and embedding counts per collection, the metadata
//! distributions that drive filtered retrieval, and how many artifacts
//! each generator has written so far.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use sqlx::Row;

use exam_forge_core::models::IndexedMetadata;
use exam_forge_core::store::VectorIndex;

use crate::config::Config;
use crate::db;
use crate::migrate::apply_schema;
use crate::sqlite_index::open_collection;

struct CollectionStats {
    collection: String,
    records: i64,
    embedded: i64,
    model: Option<String>,
}

/// Count of each distinct value of `key`, most frequent first, ties by value.
pub fn breakdown(records: &[IndexedMetadata], key: &str) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in records {
        let value = r
            .metadata
            .get(key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Number of `.json` artifacts in `dir`, 0 when it does not exist.
pub fn count_artifacts(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                .count()
        })
        .unwrap_or(0)
}

fn print_breakdown(title: &str, counts: &[(String, usize)]) {
    if counts.is_empty() {
        return;
    }
    println!("    {}:", title);
    for (value, n) in counts {
        println!("      {:<28} {:>6}", value, n);
    }
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Exam Forge - Index Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));

    let mut collections = Vec::new();
    for name in [&config.index.exams_collection, &config.index.lectures_collection] {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT r.id) AS records,
                COUNT(DISTINCT v.id) AS embedded,
                MAX(v.model) AS model
            FROM records r
            LEFT JOIN record_vectors v ON v.collection = r.collection AND v.id = r.id
            WHERE r.collection = ?
            "#,
        )
        .bind(name)
        .fetch_one(&pool)
        .await?;
        collections.push(CollectionStats {
            collection: name.clone(),
            records: row.get("records"),
            embedded: row.get("embedded"),
            model: row.get("model"),
        });
    }

    println!();
    println!(
        "  {:<24} {:>8} {:>10}   {}",
        "COLLECTION", "RECORDS", "EMBEDDED", "MODEL"
    );
    println!("  {}", "-".repeat(68));
    for c in &collections {
        println!(
            "  {:<24} {:>8} {:>10}   {}",
            c.collection,
            c.records,
            c.embedded,
            c.model.as_deref().unwrap_or("-")
        );
    }

    let exams = open_collection(config, &pool, &config.index.exams_collection).await?;
    let exam_records = exams.get(None).await?;
    if !exam_records.is_empty() {
        println!();
        println!("  Exam questions:");
        print_breakdown("by type", &breakdown(&exam_records, "type"));
        print_breakdown("by difficulty", &breakdown(&exam_records, "difficulty"));
        print_breakdown("by year", &breakdown(&exam_records, "year"));
    }

    let lectures = open_collection(config, &pool, &config.index.lectures_collection).await?;
    let lecture_records = lectures.get(None).await?;
    if !lecture_records.is_empty() {
        println!();
        println!("  Lecture chunks:");
        print_breakdown("by subject", &breakdown(&lecture_records, "subject"));
    }

    println!();
    println!("  Generated artifacts:");
    println!(
        "    exams   {:<24} {:>6}",
        config.batch.exams_output_dir.display(),
        count_artifacts(&config.batch.exams_output_dir)
    );
    println!(
        "    theory  {:<24} {:>6}",
        config.batch.theory_output_dir.display(),
        count_artifacts(&config.batch.theory_output_dir)
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
