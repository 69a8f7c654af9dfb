//! Retrieval with graduated filter relaxation.
//!
//! [`retrieve`] runs a semantic query under the caller's full constraint
//! set and, when that yields fewer than [`MIN_USABLE_HITS`] results, retries
//! under strictly looser constraint sets:
//!
//! 1. every clause
//! 2. every clause except the policy's *specific* fields (difficulty, year,
//!    lecture number and the like), keeping type/topic/subject
//! 3. no clauses
//!
//! Each step's clause set is a subset of the previous one, so a later step
//! can only match more of the corpus. Steps that would repeat the previous
//! clause set are skipped.

use anyhow::Result;
use serde::Serialize;

use crate::filter::{compile, Clause, Filter};
use crate::models::QueryHit;
use crate::store::VectorIndex;

/// Below this many hits a step is considered unusable and the next,
/// looser step runs.
pub const MIN_USABLE_HITS: usize = 2;

/// Which fields are dropped at the second relaxation step.
#[derive(Debug, Clone, Copy)]
pub struct RelaxPolicy {
    pub specific_fields: &'static [&'static str],
}

/// Exam collection: keep type and topics, drop everything else first.
pub const EXAM_POLICY: RelaxPolicy = RelaxPolicy {
    specific_fields: &["difficulty", "year", "has_solution", "has_code"],
};

/// Lecture collection: keep subject, drop the lecture number first.
pub const LECTURE_POLICY: RelaxPolicy = RelaxPolicy {
    specific_fields: &["lecture_number"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxStep {
    Full,
    Relaxed,
    Unfiltered,
}

impl RelaxStep {
    pub fn label(&self) -> &'static str {
        match self {
            RelaxStep::Full => "full filters",
            RelaxStep::Relaxed => "relaxed filters",
            RelaxStep::Unfiltered => "no filters",
        }
    }
}

/// Hits plus the step and filter that produced them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<QueryHit>,
    pub step: RelaxStep,
    pub filter: Option<Filter>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// The distinct clause sets tried, loosest last.
pub fn relaxation_ladder(clauses: &[Clause], policy: RelaxPolicy) -> Vec<(RelaxStep, Vec<Clause>)> {
    let relaxed: Vec<Clause> = clauses
        .iter()
        .filter(|c| !policy.specific_fields.contains(&c.field.as_str()))
        .cloned()
        .collect();

    let candidates = [
        (RelaxStep::Full, clauses.to_vec()),
        (RelaxStep::Relaxed, relaxed),
        (RelaxStep::Unfiltered, Vec::new()),
    ];

    let mut ladder: Vec<(RelaxStep, Vec<Clause>)> = Vec::new();
    for (step, set) in candidates {
        if ladder.last().map_or(false, |(_, prev)| *prev == set) {
            continue;
        }
        ladder.push((step, set));
    }
    ladder
}

/// Query `index` for `target_count` hits, relaxing constraints until at
/// least [`MIN_USABLE_HITS`] are found.
///
/// Never fails for lack of results; the last step's hits are returned even
/// when empty. Index errors propagate.
pub async fn retrieve(
    index: &dyn VectorIndex,
    query: &str,
    target_count: usize,
    clauses: &[Clause],
    policy: RelaxPolicy,
) -> Result<Retrieval> {
    let ladder = relaxation_ladder(clauses, policy);
    let mut last = Retrieval {
        hits: Vec::new(),
        step: RelaxStep::Unfiltered,
        filter: None,
    };
    for (step, set) in ladder {
        let filter = compile(&set);
        let hits = index.query(query, target_count, filter.as_ref()).await?;
        let usable = hits.len() >= MIN_USABLE_HITS;
        last = Retrieval { hits, step, filter };
        if usable {
            break;
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ExamFilters;
    use crate::models::{Metadata, Record};
    use crate::store::memory::InMemoryIndex;

    fn exam(id: &str, text: &str, kind: &str, difficulty: &str) -> Record {
        let mut metadata = Metadata::new();
        metadata.insert("type".into(), kind.into());
        metadata.insert("difficulty".into(), difficulty.into());
        Record {
            id: id.into(),
            document: text.into(),
            metadata,
            payload: None,
        }
    }

    async fn corpus() -> InMemoryIndex {
        let index = InMemoryIndex::hashing(128);
        index
            .upsert(&[
                exam("q1", "deadlock with two mutexes", "Open", "Hard"),
                exam("q2", "deadlock detection graph", "Open", "Easy"),
                exam("q3", "deadlock avoidance bankers", "Open", "Medium"),
                exam("q4", "deadlock conditions list", "MultipleChoice", "Hard"),
                exam("q5", "page replacement LRU", "MultipleChoice", "Easy"),
            ])
            .await
            .unwrap();
        index
    }

    fn exam_clauses(kind: &str, difficulty: &str) -> Vec<Clause> {
        ExamFilters {
            question_type: Some(kind.into()),
            difficulty: Some(difficulty.into()),
            ..Default::default()
        }
        .clauses()
    }

    #[test]
    fn test_ladder_drops_specific_then_all() {
        let ladder = relaxation_ladder(&exam_clauses("Open", "Hard"), EXAM_POLICY);
        let steps: Vec<RelaxStep> = ladder.iter().map(|(s, _)| *s).collect();
        assert_eq!(steps, [RelaxStep::Full, RelaxStep::Relaxed, RelaxStep::Unfiltered]);
        assert_eq!(ladder[1].1, vec![Clause::eq("type", "Open")]);
        assert!(ladder[2].1.is_empty());
    }

    #[test]
    fn test_ladder_collapses_identical_steps() {
        let subject_only = vec![Clause::eq("subject", "Disks")];
        let ladder = relaxation_ladder(&subject_only, LECTURE_POLICY);
        assert_eq!(ladder.len(), 2);
        assert_eq!(ladder[1].0, RelaxStep::Unfiltered);

        let ladder = relaxation_ladder(&[], EXAM_POLICY);
        assert_eq!(ladder.len(), 1);
    }

    #[test]
    fn test_ladder_steps_are_nested() {
        let mut clauses = exam_clauses("Open", "Hard");
        clauses.push(Clause::contains("topics", "Deadlocks"));
        clauses.push(Clause::eq("year", 2023i64));
        let ladder = relaxation_ladder(&clauses, EXAM_POLICY);
        for pair in ladder.windows(2) {
            assert!(pair[1].1.iter().all(|c| pair[0].1.contains(c)));
            assert!(pair[1].1.len() < pair[0].1.len());
        }
    }

    #[tokio::test]
    async fn test_full_filters_suffice() {
        let index = corpus().await;
        let r = retrieve(&index, "deadlock", 3, &[Clause::eq("type", "Open")], EXAM_POLICY)
            .await
            .unwrap();
        assert_eq!(r.step, RelaxStep::Full);
        assert_eq!(r.hits.len(), 3);
    }

    #[tokio::test]
    async fn test_relaxes_difficulty_before_type() {
        let index = corpus().await;
        // Only q1 is Open+Hard, so step 1 is unusable; Open alone has three.
        let r = retrieve(&index, "deadlock", 3, &exam_clauses("Open", "Hard"), EXAM_POLICY)
            .await
            .unwrap();
        assert_eq!(r.step, RelaxStep::Relaxed);
        assert!(r.hits.iter().all(|h| h.meta_str("type") == Some("Open")));
    }

    #[tokio::test]
    async fn test_falls_through_to_unfiltered() {
        let index = corpus().await;
        let r = retrieve(&index, "deadlock", 3, &exam_clauses("CodeAnalysis", "Hard"), EXAM_POLICY)
            .await
            .unwrap();
        assert_eq!(r.step, RelaxStep::Unfiltered);
        assert_eq!(r.hits.len(), 3);
        assert!(r.filter.is_none());
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_without_error() {
        let index = InMemoryIndex::hashing(16);
        let r = retrieve(&index, "anything", 3, &exam_clauses("Open", "Hard"), EXAM_POLICY)
            .await
            .unwrap();
        assert!(r.is_empty());
        assert_eq!(r.step, RelaxStep::Unfiltered);
    }

    #[tokio::test]
    async fn test_relaxation_is_monotonic() {
        let index = corpus().await;
        let ladder = relaxation_ladder(&exam_clauses("Open", "Hard"), EXAM_POLICY);
        let mut previous = 0;
        for (_, set) in ladder {
            let filter = compile(&set);
            let matched = index.get(filter.as_ref()).await.unwrap().len();
            assert!(matched >= previous);
            previous = matched;
        }
    }
}
