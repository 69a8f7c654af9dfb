//! Prompt construction for both generation jobs.

use std::collections::HashMap;

use crate::generation::GenerationRequest;
use crate::models::QueryHit;

const EXAM_SYSTEM: &str = "You are an expert OS course exam writer. Output only valid JSON.";

const THEORY_SYSTEM: &str = "You are an expert OS course exam writer. \
Create theory-based multiple-choice questions grounded in the provided lecture material. \
Output only valid JSON.";

/// Maximum examples / context chunks quoted in a prompt.
pub const MAX_EXAMPLES: usize = 3;
pub const MAX_CONTEXT_CHUNKS: usize = 5;

/// Most frequent value of `field` among `hits`; ties go to the value seen
/// first. `None` when no hit carries the field.
pub fn most_common(hits: &[QueryHit], field: &str) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for value in hits.iter().filter_map(|h| h.metadata.get(field)) {
        let key = value.to_string();
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    let best = counts.iter().map(|(_, n)| *n).max()?;
    counts.into_iter().find(|(_, n)| *n == best).map(|(k, _)| k)
}

fn example_json(hit: &QueryHit) -> String {
    match &hit.payload {
        Some(p) => p.to_string(),
        None => hit.document.clone(),
    }
}

/// Few-shot prompt for one new exam-style question. Missing type or
/// difficulty is inferred from the examples.
pub fn exam_question_prompt(
    examples: &[QueryHit],
    topic_hint: &str,
    question_type: Option<&str>,
    difficulty: Option<&str>,
) -> GenerationRequest {
    let examples = &examples[..examples.len().min(MAX_EXAMPLES)];
    let question_type = question_type
        .map(str::to_string)
        .or_else(|| most_common(examples, "type"))
        .unwrap_or_else(|| "Open".to_string());
    let difficulty = difficulty
        .map(str::to_string)
        .or_else(|| most_common(examples, "difficulty"))
        .unwrap_or_else(|| "Medium".to_string());

    let mut prompt = format!(
        r#"You are an expert Operating Systems course instructor creating exam questions.

Based on the following {count} example exam questions, create ONE new, original question.

REQUIREMENTS:
1. The question must be about: {topic_hint}
2. Question type: {question_type}
3. Difficulty: {difficulty}
4. Write the question text in Hebrew (as in the examples).
5. If it involves code, use C/C++ (as in the examples).
6. Include a complete solution with explanation.
7. Output ONLY valid JSON matching this schema (no markdown, no commentary):

{{
  "id": 1,
  "type": "{question_type}",
  "topic": ["string"],
  "content": {{
    "text": "Hebrew question text",
    "code_snippet": "C code or null",
    "options": ["option1", ...] or null
  }},
  "sub_questions": null,
  "points": null,
  "solution": {{
    "is_present_in_file": true,
    "correct_option": "string or null",
    "explanation": "Hebrew explanation"
  }},
  "difficulty_estimation": "{difficulty}"
}}

EXAMPLE QUESTIONS (for reference on style and depth):
"#,
        count = examples.len(),
    );

    for (i, hit) in examples.iter().enumerate() {
        prompt.push_str(&format!("\n--- Example {} ---\n{}\n", i + 1, example_json(hit)));
    }
    prompt.push_str("\n--- YOUR NEW QUESTION (JSON only) ---");

    GenerationRequest {
        system: EXAM_SYSTEM.to_string(),
        prompt,
    }
}

/// Multiple-choice theory prompt grounded in lecture chunks.
pub fn theory_mc_prompt(
    context: &[QueryHit],
    topic_hint: &str,
    subject: &str,
    difficulty: &str,
) -> GenerationRequest {
    let mut context_text = String::new();
    for hit in context.iter().take(MAX_CONTEXT_CHUNKS) {
        let lecture = hit
            .meta_i64("lecture_number")
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        let chunk = hit
            .meta_i64("chunk_index")
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        context_text.push_str(&format!("\n--- Lecture {} (chunk {}) ---\n", lecture, chunk));
        context_text.push_str(&hit.document);
        context_text.push('\n');
    }

    let prompt = format!(
        r#"You are an expert Operating Systems course instructor creating exam questions.

You are given lecture material from an OS course. Based ONLY on the provided material,
create ONE original multiple-choice question.

REQUIREMENTS:
1. Subject category: {subject}
2. Topic focus: {topic_hint}
3. Difficulty: {difficulty}
4. The question must be a THEORY question about OS concepts.
5. Write the question text in Hebrew (as in the lecture material).
6. Provide exactly 4 answer options (labeled א, ב, ג, ד).
7. Only ONE option is correct.
8. If a code snippet helps illustrate the concept, include one in C/C++ or pseudo-code.
   Otherwise set code_snippet to null.
9. Include a detailed explanation of the correct answer in Hebrew.
10. The question must be answerable from the provided lecture material.
11. Output ONLY valid JSON matching this schema (no markdown, no commentary):

{{
  "id": 1,
  "type": "MultipleChoice",
  "subject": "{subject}",
  "topic": ["{topic_hint}"],
  "difficulty_estimation": "{difficulty}",
  "content": {{
    "text": "Hebrew question text",
    "code_snippet": "C/C++ code snippet or null",
    "options": [
      "א. option text",
      "ב. option text",
      "ג. option text",
      "ד. option text"
    ]
  }},
  "solution": {{
    "correct_option": "א/ב/ג/ד",
    "explanation": "Detailed Hebrew explanation referencing the theory"
  }}
}}

LECTURE MATERIAL (use this as your knowledge source):
{context_text}

--- YOUR NEW QUESTION (JSON only) ---"#
    );

    GenerationRequest {
        system: THEORY_SYSTEM.to_string(),
        prompt,
    }
}
