//! Batch jobs: what happens to a single plan item.
//!
//! A [`BatchJob`] turns one [`PlanItem`] into a [`GeneratedArtifact`] by
//! retrieving context, prompting the generator and parsing the reply. The
//! resumable executor in the app crate owns everything around that:
//! checkpoint files, throttling, backoff and counters.
//!
//! | Job | Collection | Context | Artifact source |
//! |-----|------------|---------|-----------------|
//! | [`ExamJob`] | exam questions | 3 examples, filtered by type + difficulty | `ai_generated` |
//! | [`TheoryJob`] | lecture chunks | 5 chunks, filtered by subject | `ai_generated_from_summary` |

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::subject_for_topic;
use crate::filter::{ExamFilters, LectureFilters};
use crate::generation::{extract_json_object, Generator};
use crate::models::{ArtifactMetadata, GeneratedArtifact, PlanItem, TokenUsage};
use crate::plan::{exam_file_name, theory_file_name};
use crate::prompt::{exam_question_prompt, theory_mc_prompt};
use crate::retrieve::{retrieve, EXAM_POLICY, LECTURE_POLICY};
use crate::shuffle::shuffle_options;
use crate::store::VectorIndex;

pub const EXAM_SOURCE: &str = "ai_generated";
pub const THEORY_SOURCE: &str = "ai_generated_from_summary";

/// Result of running one plan item. Errors (`Err`) are reserved for
/// failed remote or index calls; these variants are the ordinary outcomes.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Generated(GeneratedArtifact),
    /// Retrieval found nothing even with every filter dropped.
    NoContext,
    /// The model replied, but not with a JSON object.
    Unparseable { usage: Option<TokenUsage> },
}

#[async_trait]
pub trait BatchJob: Send + Sync {
    /// Short name for logs and progress output.
    fn name(&self) -> &str;
    /// Checkpoint filename of the `seq`-th (1-based) item.
    fn artifact_name(&self, seq: usize, item: &PlanItem) -> String;
    async fn run_item(&self, item: &PlanItem) -> Result<ItemOutcome>;
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Exam-style questions from similar past exam questions.
pub struct ExamJob {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    examples: usize,
}

impl ExamJob {
    pub fn new(index: Arc<dyn VectorIndex>, generator: Arc<dyn Generator>, examples: usize) -> Self {
        Self {
            index,
            generator,
            examples,
        }
    }
}

#[async_trait]
impl BatchJob for ExamJob {
    fn name(&self) -> &str {
        "exams"
    }

    fn artifact_name(&self, seq: usize, item: &PlanItem) -> String {
        exam_file_name(seq, item)
    }

    async fn run_item(&self, item: &PlanItem) -> Result<ItemOutcome> {
        let filters = ExamFilters {
            question_type: Some(item.dimension.clone()),
            difficulty: Some(item.difficulty.clone()),
            ..Default::default()
        };
        let retrieval = retrieve(
            self.index.as_ref(),
            &item.hint,
            self.examples,
            &filters.clauses(),
            EXAM_POLICY,
        )
        .await?;
        if retrieval.is_empty() {
            return Ok(ItemOutcome::NoContext);
        }

        let request = exam_question_prompt(
            &retrieval.hits,
            &item.hint,
            Some(item.dimension.as_str()),
            Some(item.difficulty.as_str()),
        );
        let generation = self.generator.generate(&request).await?;
        let Some(question) = extract_json_object(&generation.text) else {
            return Ok(ItemOutcome::Unparseable {
                usage: generation.usage,
            });
        };

        Ok(ItemOutcome::Generated(GeneratedArtifact {
            metadata: ArtifactMetadata {
                source: EXAM_SOURCE.to_string(),
                subject: subject_for_topic(&item.hint).to_string(),
                topic_hint: item.hint.clone(),
                requested_type: item.dimension.clone(),
                requested_difficulty: item.difficulty.clone(),
                generated_at: timestamp(),
                examples_used: Some(retrieval.hits.len()),
                context_chunks_used: None,
                context_lectures: None,
                token_usage: generation.usage,
            },
            question,
        }))
    }
}

/// Multiple-choice theory questions grounded in lecture chunks.
pub struct TheoryJob {
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    context_chunks: usize,
}

impl TheoryJob {
    pub fn new(index: Arc<dyn VectorIndex>, generator: Arc<dyn Generator>, context_chunks: usize) -> Self {
        Self {
            index,
            generator,
            context_chunks,
        }
    }
}

#[async_trait]
impl BatchJob for TheoryJob {
    fn name(&self) -> &str {
        "theory"
    }

    fn artifact_name(&self, seq: usize, item: &PlanItem) -> String {
        theory_file_name(seq, item)
    }

    async fn run_item(&self, item: &PlanItem) -> Result<ItemOutcome> {
        let subject = item.dimension.as_str();
        let filters = LectureFilters {
            subject: Some(subject.to_string()),
            lecture_number: None,
        };
        let retrieval = retrieve(
            self.index.as_ref(),
            &item.hint,
            self.context_chunks,
            &filters.clauses(),
            LECTURE_POLICY,
        )
        .await?;
        if retrieval.is_empty() {
            return Ok(ItemOutcome::NoContext);
        }

        let request = theory_mc_prompt(&retrieval.hits, &item.hint, subject, &item.difficulty);
        let generation = self.generator.generate(&request).await?;
        let Some(question) = extract_json_object(&generation.text) else {
            return Ok(ItemOutcome::Unparseable {
                usage: generation.usage,
            });
        };

        let lectures: BTreeSet<i64> = retrieval
            .hits
            .iter()
            .filter_map(|h| h.meta_i64("lecture_number"))
            .collect();

        Ok(ItemOutcome::Generated(GeneratedArtifact {
            metadata: ArtifactMetadata {
                source: THEORY_SOURCE.to_string(),
                subject: subject.to_string(),
                topic_hint: item.hint.clone(),
                requested_type: "MultipleChoice".to_string(),
                requested_difficulty: item.difficulty.clone(),
                generated_at: timestamp(),
                examples_used: None,
                context_chunks_used: Some(retrieval.hits.len()),
                context_lectures: Some(lectures.into_iter().collect()),
                token_usage: generation.usage,
            },
            question: shuffle_options(&question),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::generation::{Generation, GenerationRequest};
    use crate::models::{Metadata, Record};
    use crate::store::memory::InMemoryIndex;
    use crate::tagger::lecture_records;

    struct Scripted {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(Generation {
                text: self.reply.clone(),
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    output_tokens: 5,
                    total_tokens: 15,
                }),
            })
        }
    }

    async fn exam_index() -> Arc<InMemoryIndex> {
        let index = InMemoryIndex::hashing(64);
        let records: Vec<Record> = (0..3)
            .map(|i| {
                let mut metadata = Metadata::new();
                metadata.insert("type".into(), "MultipleChoice".into());
                metadata.insert("difficulty".into(), "Hard".into());
                Record {
                    id: format!("os24SA_q{}", i),
                    document: format!("deadlock question {}", i),
                    metadata,
                    payload: Some(serde_json::json!({"id": i})),
                }
            })
            .collect();
        index.upsert(&records).await.unwrap();
        Arc::new(index)
    }

    #[tokio::test]
    async fn test_exam_job_generates_artifact() {
        let generator = Scripted::new(r#"{"id": 1, "type": "MultipleChoice"}"#);
        let job = ExamJob::new(exam_index().await, generator.clone(), 3);
        let item = PlanItem::new("Deadlocks", "MultipleChoice", "Hard");

        let ItemOutcome::Generated(artifact) = job.run_item(&item).await.unwrap() else {
            panic!("expected an artifact");
        };
        assert_eq!(artifact.metadata.source, EXAM_SOURCE);
        assert_eq!(artifact.metadata.subject, "Concurrency");
        assert_eq!(artifact.metadata.examples_used, Some(3));
        assert_eq!(artifact.metadata.token_usage.unwrap().total_tokens, 15);
        assert_eq!(artifact.question["type"], "MultipleChoice");
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
        assert_eq!(job.artifact_name(1, &item), "0001__Deadlocks__MultipleChoice__Hard.json");
    }

    #[tokio::test]
    async fn test_exam_job_without_context_skips_generation() {
        let generator = Scripted::new("{}");
        let job = ExamJob::new(Arc::new(InMemoryIndex::hashing(16)), generator.clone(), 3);
        let item = PlanItem::new("Deadlocks", "MultipleChoice", "Hard");
        assert!(matches!(job.run_item(&item).await.unwrap(), ItemOutcome::NoContext));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_reply_keeps_usage() {
        let job = ExamJob::new(exam_index().await, Scripted::new("I cannot help with that."), 3);
        let item = PlanItem::new("Deadlocks", "Open", "Easy");
        match job.run_item(&item).await.unwrap() {
            ItemOutcome::Unparseable { usage } => assert_eq!(usage.unwrap().prompt_tokens, 10),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_theory_job_tags_lectures_and_shuffles() {
        let index = InMemoryIndex::hashing(64);
        let chunks = vec!["paging and page tables".to_string(), "tlb caches translations".to_string()];
        index.upsert(&lecture_records("7.txt", 7, &chunks)).await.unwrap();
        index.upsert(&lecture_records("8.txt", 8, &chunks[..1])).await.unwrap();

        let reply = r#"{"content": {"options": ["א. right", "ב. wrong", "ג. wrong too", "ד. nope"]},
                        "solution": {"correct_option": "א"}}"#;
        let job = TheoryJob::new(Arc::new(index), Scripted::new(reply), 5);
        let item = PlanItem::new("Paging and TLB", "Virtualization", "Medium");

        let ItemOutcome::Generated(artifact) = job.run_item(&item).await.unwrap() else {
            panic!("expected an artifact");
        };
        assert_eq!(artifact.metadata.source, THEORY_SOURCE);
        assert_eq!(artifact.metadata.context_chunks_used, Some(3));
        assert_eq!(artifact.metadata.context_lectures, Some(vec![7, 8]));
        assert_eq!(artifact.metadata.requested_type, "MultipleChoice");

        let label = artifact.question["solution"]["correct_option"].as_str().unwrap();
        let options = artifact.question["content"]["options"].as_array().unwrap();
        let correct = options
            .iter()
            .map(|o| o.as_str().unwrap())
            .find(|o| o.starts_with(label))
            .unwrap();
        assert!(correct.ends_with(". right"));
        assert_eq!(
            job.artifact_name(12, &item),
            "0012__Virtualization__Paging_and_TLB__MC__Medium.json"
        );
    }
}
