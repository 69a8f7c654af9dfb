//! `forge search`: semantic search over either collection, with optional
//! metadata filters, fallback relaxation and one-off generation.

use std::sync::Arc;

use anyhow::{bail, Result};

use exam_forge_core::catalog::DEFAULT_SUBJECT;
use exam_forge_core::filter::{compile, Clause, ExamFilters, LectureFilters};
use exam_forge_core::generation::{extract_json_object, Generator};
use exam_forge_core::models::QueryHit;
use exam_forge_core::prompt::{exam_question_prompt, most_common, theory_mc_prompt};
use exam_forge_core::retrieve::{retrieve, RelaxPolicy, RelaxStep, EXAM_POLICY, LECTURE_POLICY};
use exam_forge_core::shuffle::shuffle_options;
use exam_forge_core::store::VectorIndex;

use crate::config::Config;
use crate::db;
use crate::gemini::GeminiClient;
use crate::sqlite_index::open_collection;

const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Exams,
    Lectures,
}

impl Collection {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "exams" => Ok(Collection::Exams),
            "lectures" => Ok(Collection::Lectures),
            other => bail!("Unknown collection: '{}'. Use exams or lectures.", other),
        }
    }
}

/// Everything `forge search` accepts besides the query.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub limit: Option<usize>,
    pub exam: ExamFilters,
    pub lecture: LectureFilters,
    /// Walk the fallback ladder instead of applying filters strictly.
    pub relax: bool,
    pub raw: bool,
    pub generate: bool,
}

impl SearchArgs {
    fn clauses(&self, collection: Collection) -> Vec<Clause> {
        match collection {
            Collection::Exams => self.exam.clauses(),
            Collection::Lectures => self.lecture.clauses(),
        }
    }
}

fn policy(collection: Collection) -> RelaxPolicy {
    match collection {
        Collection::Exams => EXAM_POLICY,
        Collection::Lectures => LECTURE_POLICY,
    }
}

pub async fn run_search(config: &Config, query: &str, collection: Collection, args: &SearchArgs) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let name = match collection {
        Collection::Exams => &config.index.exams_collection,
        Collection::Lectures => &config.index.lectures_collection,
    };
    let index = open_collection(config, &pool, name).await?;
    let limit = args.limit.unwrap_or(config.retrieval.search_results).max(1);
    let clauses = args.clauses(collection);

    let hits = if args.relax {
        let retrieval = retrieve(&index, query, limit, &clauses, policy(collection)).await?;
        if retrieval.step != RelaxStep::Full {
            eprintln!(
                "(retrieved with {}: {})",
                retrieval.step.label(),
                retrieval
                    .filter
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |f| f.to_json().to_string())
            );
        }
        retrieval.hits
    } else {
        index.query(query, limit, compile(&clauses).as_ref()).await?
    };

    if args.raw {
        print_raw(&hits, collection);
    } else {
        display_results(&hits, collection);
    }

    if args.generate {
        if hits.is_empty() {
            bail!("No examples found -- cannot generate.");
        }
        let client: Arc<dyn Generator> = Arc::new(GeminiClient::from_config(&config.generation)?);
        generate_from_hits(client.as_ref(), query, &hits, collection, args).await?;
    }

    pool.close().await;
    Ok(())
}

fn preview(text: &str) -> String {
    text.chars()
        .take(PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', " ")
}

fn meta(hit: &QueryHit, key: &str) -> String {
    hit.metadata
        .get(key)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn display_results(hits: &[QueryHit], collection: Collection) {
    if hits.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!();
        println!("--- Result {} (distance: {:.4}) ---", i + 1, hit.distance);
        match collection {
            Collection::Exams => {
                println!("  Source: {} Q{}", meta(hit, "source_file"), meta(hit, "question_id"));
                println!(
                    "  Type: {} | Difficulty: {} | Year: {}",
                    meta(hit, "type"),
                    meta(hit, "difficulty"),
                    meta(hit, "year")
                );
                println!("  Topics: {}", meta(hit, "topics"));
                println!("  Has solution: {}", meta(hit, "has_solution"));
            }
            Collection::Lectures => {
                println!(
                    "  Source: Lecture {} ({}), chunk {}",
                    meta(hit, "lecture_number"),
                    meta(hit, "source_file"),
                    meta(hit, "chunk_index")
                );
                println!("  Subject: {} | Topics: {}", meta(hit, "subject"), meta(hit, "topics"));
            }
        }
        println!("  Preview: {}...", preview(&hit.document));
    }
}

/// Exams: the stored question JSON. Lectures: the chunk text.
fn print_raw(hits: &[QueryHit], collection: Collection) {
    for hit in hits {
        match (collection, &hit.payload) {
            (Collection::Exams, Some(payload)) => println!("{}", payload),
            _ => println!("{}", hit.document),
        }
        println!();
    }
}

async fn generate_from_hits(
    generator: &dyn Generator,
    query: &str,
    hits: &[QueryHit],
    collection: Collection,
    args: &SearchArgs,
) -> Result<()> {
    let request = match collection {
        Collection::Exams => exam_question_prompt(
            hits,
            query,
            args.exam.question_type.as_deref(),
            args.exam.difficulty.as_deref(),
        ),
        Collection::Lectures => {
            let subject = args
                .lecture
                .subject
                .clone()
                .or_else(|| most_common(hits, "subject"))
                .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
            let difficulty = args.exam.difficulty.as_deref().unwrap_or("Medium");
            theory_mc_prompt(hits, query, &subject, difficulty)
        }
    };

    println!();
    println!("{}", "=".repeat(50));
    println!("Generating new question with {} ...", generator.model_name());
    let generation = generator.generate(&request).await?;

    println!();
    println!("=== GENERATED QUESTION ===");
    match extract_json_object(&generation.text) {
        Some(question) => {
            let question = match collection {
                Collection::Lectures => shuffle_options(&question),
                Collection::Exams => question,
            };
            println!("{}", serde_json::to_string_pretty(&question)?);
        }
        None => println!("{}", generation.text),
    }

    if let Some(usage) = generation.usage {
        println!();
        println!("=== TOKEN USAGE ===");
        println!("  prompt: {}", usage.prompt_tokens);
        println!("  output: {}", usage.output_tokens);
        println!("  total:  {}", usage.total_tokens);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_parse() {
        assert_eq!(Collection::parse("exams").unwrap(), Collection::Exams);
        assert_eq!(Collection::parse("lectures").unwrap(), Collection::Lectures);
        assert!(Collection::parse("slides").is_err());
    }

    #[test]
    fn test_clauses_follow_collection() {
        let args = SearchArgs {
            exam: ExamFilters {
                question_type: Some("Open".into()),
                ..Default::default()
            },
            lecture: LectureFilters {
                subject: Some("Disks".into()),
                lecture_number: Some(18),
            },
            ..Default::default()
        };
        assert_eq!(args.clauses(Collection::Exams), vec![Clause::eq("type", "Open")]);
        assert_eq!(args.clauses(Collection::Lectures).len(), 2);
    }

    #[test]
    fn test_preview_is_char_bounded_and_single_line() {
        let text = "שורה\n".repeat(200);
        let p = preview(&text);
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
        assert!(!p.contains('\n'));
    }
}
