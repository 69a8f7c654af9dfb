//! Ingestion-time tagging: turns parsed exam questions and lecture chunks
//! into [`Record`]s with deterministic ids and flat, filterable metadata.
//!
//! Exam question payloads are loosely structured JSON (produced by an
//! upstream extraction step), so they are read through `serde_json::Value`
//! and only the fields the index filters on are lifted into metadata.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::{lecture_subject, lecture_topics};
use crate::models::{MetaValue, Metadata, Record};

/// One parsed exam file: `{"metadata": {...}, "questions": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamFile {
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub questions: Vec<Value>,
}

static EXAM_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^os(\d{2})").unwrap());

fn strip_source_ext(name: &str) -> &str {
    name.trim_end_matches(".pdf").trim_end_matches(".json")
}

/// `os24SA.pdf` → 2024. Returns 0 when the name carries no year.
pub fn year_from_filename(source_file: &str) -> i64 {
    EXAM_YEAR
        .captures(strip_source_ext(source_file))
        .and_then(|c| c[1].parse::<i64>().ok())
        .map(|yy| 2000 + yy)
        .unwrap_or(0)
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(false, |x| x != 0.0),
    }
}

fn push_options(parts: &mut Vec<String>, content: &Value) {
    if let Some(options) = content.get("options").and_then(Value::as_array) {
        parts.extend(options.iter().filter_map(Value::as_str).map(str::to_string));
    }
}

/// Embedding text of an exam question: body, code, options, then every
/// sub-question's text, code and options, newline-joined.
pub fn exam_document_text(question: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();
    let content = question.get("content").unwrap_or(&Value::Null);

    if let Some(text) = str_field(content, "text") {
        parts.push(text.to_string());
    }
    if let Some(code) = str_field(content, "code_snippet") {
        parts.push(code.to_string());
    }
    push_options(&mut parts, content);

    if let Some(subs) = question.get("sub_questions").and_then(Value::as_array) {
        for sq in subs {
            if let Some(text) = str_field(sq, "text") {
                parts.push(text.to_string());
            }
            if let Some(code) = str_field(sq, "code_snippet") {
                parts.push(code.to_string());
            }
            push_options(&mut parts, sq);
        }
    }

    parts.retain(|p| !p.is_empty());
    parts.join("\n")
}

fn question_id(question: &Value) -> String {
    match question.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "0".to_string(),
    }
}

fn has_code(question: &Value) -> bool {
    let content = question.get("content").unwrap_or(&Value::Null);
    if truthy(content.get("code_snippet")) {
        return true;
    }
    question
        .get("sub_questions")
        .and_then(Value::as_array)
        .map_or(false, |subs| subs.iter().any(|sq| truthy(sq.get("code_snippet"))))
}

fn has_solution(question: &Value) -> bool {
    let present = |sol: Option<&Value>| {
        sol.and_then(|s| s.get("is_present_in_file"))
            .map_or(false, |p| truthy(Some(p)))
    };
    if present(question.get("solution")) {
        return true;
    }
    question
        .get("sub_questions")
        .and_then(Value::as_array)
        .map_or(false, |subs| subs.iter().any(|sq| present(sq.get("solution"))))
}

/// Deterministic id, e.g. `os24SA_q6`.
pub fn exam_record_id(file_meta: &Value, question: &Value) -> String {
    let source = str_field(file_meta, "source_file").unwrap_or("unknown");
    format!("{}_q{}", strip_source_ext(source), question_id(question))
}

/// Flat metadata of an exam question.
pub fn exam_metadata(file_meta: &Value, question: &Value) -> Metadata {
    let source_file = str_field(file_meta, "source_file").unwrap_or("");
    let year = match file_meta.get("year") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .unwrap_or_else(|| year_from_filename(source_file));

    let topics = question
        .get("topic")
        .and_then(Value::as_array)
        .map(|ts| ts.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(","))
        .unwrap_or_default();

    let qid = match question.get("id") {
        Some(Value::Number(n)) if n.is_i64() => MetaValue::Int(n.as_i64().unwrap_or(0)),
        _ => MetaValue::Str(question_id(question)),
    };

    let mut m = Metadata::new();
    m.insert("source_file".into(), source_file.into());
    m.insert("year".into(), year.into());
    m.insert(
        "semester".into(),
        str_field(file_meta, "semester").unwrap_or("").into(),
    );
    m.insert("moed".into(), str_field(file_meta, "moed").unwrap_or("").into());
    m.insert("question_id".into(), qid);
    m.insert(
        "type".into(),
        str_field(question, "type").unwrap_or("Unknown").into(),
    );
    m.insert("topics".into(), topics.into());
    m.insert(
        "difficulty".into(),
        str_field(question, "difficulty_estimation")
            .unwrap_or("Unknown")
            .into(),
    );
    m.insert("has_code".into(), has_code(question).into());
    m.insert("has_solution".into(), has_solution(question).into());
    m
}

/// Records for every question of an exam file. The raw question travels as
/// the payload.
pub fn exam_records(file: &ExamFile) -> Vec<Record> {
    file.questions
        .iter()
        .map(|q| Record {
            id: exam_record_id(&file.metadata, q),
            document: exam_document_text(q),
            metadata: exam_metadata(&file.metadata, q),
            payload: Some(q.clone()),
        })
        .collect()
}

/// `7.txt` → `Some(7)`. Zero and non-numeric stems are not lectures.
pub fn lecture_number_from_filename(file_name: &str) -> Option<i64> {
    file_name
        .strip_suffix(".txt")
        .unwrap_or(file_name)
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
}

/// Records for the chunks of one lecture, ids `lecture<N>_chunk<i>`.
pub fn lecture_records(file_name: &str, lecture: i64, chunks: &[String]) -> Vec<Record> {
    let subject = lecture_subject(lecture).unwrap_or("Unknown");
    let topics = lecture_topics(lecture).join(",");
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut m = Metadata::new();
            m.insert("source_file".into(), file_name.into());
            m.insert("lecture_number".into(), lecture.into());
            m.insert("subject".into(), subject.into());
            m.insert("topics".into(), topics.as_str().into());
            m.insert("chunk_index".into(), i.into());
            m.insert("total_chunks".into(), chunks.len().into());
            Record {
                id: format!("lecture{}_chunk{}", lecture, i),
                document: chunk.clone(),
                metadata: m,
                payload: None,
            }
        })
        .collect()
}
