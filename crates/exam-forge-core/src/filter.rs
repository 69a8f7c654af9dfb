//! Metadata filter compiler.
//!
//! Callers describe constraints as a list of [`Clause`]s; [`compile`] turns
//! that list into the index's native filter expression. The index has three
//! distinct shapes for "no filter", "one condition" and "all of these
//! conditions", so compilation is a three-way case rather than a fold.
//!
//! Only conjunction is supported. There is no OR, NOT or range operator.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{MetaValue, Metadata};

/// Comparison applied by a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Scalar equality.
    Eq,
    /// Substring containment on a string field.
    Contains,
}

/// One equality or containment constraint on a metadata field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clause {
    pub field: String,
    pub op: FilterOp,
    pub value: MetaValue,
}

impl Clause {
    pub fn eq(field: &str, value: impl Into<MetaValue>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn contains(field: &str, value: impl Into<MetaValue>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Contains,
            value: value.into(),
        }
    }

    /// Evaluate this clause against a record's metadata. A missing field
    /// never matches.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let Some(actual) = metadata.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => actual.loosely_eq(&self.value),
            FilterOp::Contains => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }

    fn to_json(&self) -> Value {
        let op = match self.op {
            FilterOp::Eq => "$eq",
            FilterOp::Contains => "$contains",
        };
        json!({ self.field.clone(): { op: self.value } })
    }
}

/// A compiled filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Clause(Clause),
    And(Vec<Clause>),
}

impl Filter {
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Filter::Clause(c) => c.matches(metadata),
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
        }
    }

    /// Native expression, e.g. `{"type": {"$eq": "Open"}}` or
    /// `{"$and": [...]}`.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Clause(c) => c.to_json(),
            Filter::And(clauses) => {
                json!({ "$and": clauses.iter().map(Clause::to_json).collect::<Vec<_>>() })
            }
        }
    }

    /// The clauses this filter was compiled from, in order.
    pub fn clauses(&self) -> Vec<Clause> {
        match self {
            Filter::Clause(c) => vec![c.clone()],
            Filter::And(clauses) => clauses.clone(),
        }
    }
}

/// Compile clauses into a filter.
///
/// - no clauses: `None` (unfiltered)
/// - one clause: that clause, not wrapped
/// - more: an `And` of all clauses, in input order
///
/// ```rust
/// use exam_forge_core::filter::{compile, Clause, Filter};
///
/// assert!(compile(&[]).is_none());
/// let one = compile(&[Clause::eq("type", "Open")]).unwrap();
/// assert!(matches!(one, Filter::Clause(_)));
/// ```
pub fn compile(clauses: &[Clause]) -> Option<Filter> {
    match clauses {
        [] => None,
        [single] => Some(Filter::Clause(single.clone())),
        many => Some(Filter::And(many.to_vec())),
    }
}

/// Optional constraints over the exam-question collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamFilters {
    pub question_type: Option<String>,
    pub difficulty: Option<String>,
    pub year: Option<i64>,
    pub topic: Option<String>,
    pub has_solution: Option<bool>,
    pub has_code: Option<bool>,
}

impl ExamFilters {
    /// Clauses in fixed field order: type, difficulty, year, topics,
    /// has_solution, has_code.
    pub fn clauses(&self) -> Vec<Clause> {
        let mut out = Vec::new();
        if let Some(t) = &self.question_type {
            out.push(Clause::eq("type", t.as_str()));
        }
        if let Some(d) = &self.difficulty {
            out.push(Clause::eq("difficulty", d.as_str()));
        }
        if let Some(y) = self.year {
            out.push(Clause::eq("year", y));
        }
        if let Some(topic) = &self.topic {
            out.push(Clause::contains("topics", topic.as_str()));
        }
        if let Some(s) = self.has_solution {
            out.push(Clause::eq("has_solution", s));
        }
        if let Some(c) = self.has_code {
            out.push(Clause::eq("has_code", c));
        }
        out
    }
}

/// Optional constraints over the lecture-chunk collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LectureFilters {
    pub subject: Option<String>,
    pub lecture_number: Option<i64>,
}

impl LectureFilters {
    pub fn clauses(&self) -> Vec<Clause> {
        let mut out = Vec::new();
        if let Some(s) = &self.subject {
            out.push(Clause::eq("subject", s.as_str()));
        }
        if let Some(n) = self.lecture_number {
            out.push(Clause::eq("lecture_number", n));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam_meta() -> Metadata {
        let mut m = Metadata::new();
        m.insert("type".into(), "Open".into());
        m.insert("difficulty".into(), "Hard".into());
        m.insert("year".into(), 2024i64.into());
        m.insert("topics".into(), "Deadlocks,Semaphores".into());
        m.insert("has_code".into(), false.into());
        m
    }

    #[test]
    fn test_compile_empty_is_none() {
        assert_eq!(compile(&[]), None);
        assert_eq!(compile(&ExamFilters::default().clauses()), None);
    }

    #[test]
    fn test_compile_single_is_unwrapped() {
        let c = Clause::eq("type", "Open");
        assert_eq!(compile(&[c.clone()]), Some(Filter::Clause(c)));
    }

    #[test]
    fn test_compile_many_keeps_order() {
        let filters = ExamFilters {
            question_type: Some("Open".into()),
            difficulty: Some("Hard".into()),
            year: Some(2024),
            ..Default::default()
        };
        let compiled = compile(&filters.clauses()).unwrap();
        assert_eq!(
            compiled.to_json(),
            json!({"$and": [
                {"type": {"$eq": "Open"}},
                {"difficulty": {"$eq": "Hard"}},
                {"year": {"$eq": 2024}},
            ]})
        );
    }

    #[test]
    fn test_compile_idempotent() {
        let clauses = vec![Clause::eq("a", 1i64), Clause::eq("b", true)];
        let once = compile(&clauses).unwrap();
        let twice = compile(&once.clauses()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_matches_eq_and_contains() {
        let meta = exam_meta();
        assert!(Clause::eq("type", "Open").matches(&meta));
        assert!(Clause::eq("year", 2024i64).matches(&meta));
        assert!(Clause::contains("topics", "Semaphores").matches(&meta));
        assert!(!Clause::contains("topics", "Paging").matches(&meta));
        assert!(!Clause::eq("type", "MultipleChoice").matches(&meta));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let meta = exam_meta();
        assert!(!Clause::eq("has_solution", true).matches(&meta));
        assert!(!Clause::eq("has_solution", false).matches(&meta));
    }

    #[test]
    fn test_conflicting_filters_match_nothing() {
        let f = compile(&[Clause::eq("type", "Open"), Clause::eq("type", "MultipleChoice")])
            .unwrap();
        assert!(!f.matches(&exam_meta()));
    }

    #[test]
    fn test_lecture_filter_order() {
        let f = LectureFilters {
            subject: Some("Disks".into()),
            lecture_number: Some(18),
        };
        let clauses = f.clauses();
        assert_eq!(clauses[0].field, "subject");
        assert_eq!(clauses[1].field, "lecture_number");
    }
}
