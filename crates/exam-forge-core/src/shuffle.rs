//! Multiple-choice answer shuffling.
//!
//! Models tend to put the correct answer first. [`shuffle_options`] permutes
//! a question's options, relabels them `א. `, `ב. `, … in the new order and
//! points `solution.correct_option` at the new label of the originally
//! correct text. Questions without a usable option list or answer marker,
//! or whose correct option cannot be located, come back unchanged.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::Value;

/// Option labels, in order.
pub const LABELS: [&str; 6] = ["א", "ב", "ג", "ד", "ה", "ו"];

/// Existing option prefixes, tried in order; the first that matches is
/// stripped.
static PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^[א-ו]\.\s*", r"^[א-ו]\)\s*", r"^[א-ו]\s+"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// `1. `, `2) `: a numeric label needs whitespace after its delimiter, so
/// `1.5 ms` is content, not a label.
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([1-6])[.)]\s+").unwrap());

/// True when the options are labelled `1`, `2`, … in order.
fn numbered_options(options: &[&str]) -> bool {
    options.iter().enumerate().all(|(i, o)| {
        NUMBERED
            .captures(o.trim())
            .map_or(false, |c| c[1] == (i + 1).to_string())
    })
}

/// Strategies for finding the correct option, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matcher {
    /// The option's own leading label equals the marker.
    ExplicitLabel,
    /// The marker's position in [`LABELS`].
    Positional,
}

const MATCHERS: [Matcher; 2] = [Matcher::ExplicitLabel, Matcher::Positional];

impl Matcher {
    fn locate(&self, options: &[&str], marker: &str) -> Option<usize> {
        match self {
            Matcher::ExplicitLabel => options.iter().position(|o| leading_label(o) == Some(marker)),
            Matcher::Positional => LABELS
                .iter()
                .position(|l| *l == marker)
                .filter(|&i| i < options.len()),
        }
    }
}

/// Label at the start of `text`: its first character when followed by
/// whitespace, or by `.` or `)` and then whitespace or the end.
fn leading_label(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let mut chars = text.char_indices();
    chars.next()?;
    match chars.next() {
        Some((i, next)) if next.is_whitespace() => Some(&text[..i]),
        Some((i, next)) if next == '.' || next == ')' => match chars.next() {
            None => Some(&text[..i]),
            Some((_, after)) if after.is_whitespace() => Some(&text[..i]),
            _ => None,
        },
        _ => None,
    }
}

/// `"ב."` → `"ב"`, `"ג) Paging"` → `"ג"`, `" א "` → `"א"`.
fn normalize_marker(marker: &str) -> &str {
    let marker = marker.trim().trim_end_matches('.').trim_end();
    let mut chars = marker.char_indices();
    if let (Some(_), Some((i, next))) = (chars.next(), chars.next()) {
        if next == '.' || next == ')' {
            return &marker[..i];
        }
    }
    marker
}

fn strip_prefix(option: &str, numbered: bool) -> String {
    let text = option.trim();
    if numbered {
        return NUMBERED.replace(text, "").into_owned();
    }
    for re in PREFIXES.iter() {
        if re.is_match(text) {
            return re.replace(text, "").into_owned();
        }
    }
    text.to_string()
}

/// Shuffle with the thread-local RNG.
pub fn shuffle_options(question: &Value) -> Value {
    shuffle_options_with(question, &mut rand::thread_rng())
}

/// Shuffle with a caller-supplied RNG.
pub fn shuffle_options_with<R: Rng + ?Sized>(question: &Value, rng: &mut R) -> Value {
    let Some(options) = question
        .get("content")
        .and_then(|c| c.get("options"))
        .and_then(Value::as_array)
    else {
        return question.clone();
    };
    let options: Option<Vec<&str>> = options.iter().map(Value::as_str).collect();
    let Some(options) = options else {
        return question.clone();
    };
    if options.len() < 2 || options.len() > LABELS.len() {
        return question.clone();
    }

    let marker = match question
        .get("solution")
        .and_then(|s| s.get("correct_option"))
        .and_then(Value::as_str)
    {
        Some(m) if !m.trim().is_empty() => normalize_marker(m),
        _ => return question.clone(),
    };

    let Some(correct_idx) = MATCHERS.iter().find_map(|m| m.locate(&options, marker)) else {
        return question.clone();
    };

    let numbered = numbered_options(&options);
    let mut order: Vec<(usize, String)> = options
        .iter()
        .map(|o| strip_prefix(o, numbered))
        .enumerate()
        .collect();
    order.shuffle(rng);

    let mut new_correct = LABELS[0];
    let mut relabeled = Vec::with_capacity(order.len());
    for (pos, (orig, text)) in order.into_iter().enumerate() {
        if orig == correct_idx {
            new_correct = LABELS[pos];
        }
        relabeled.push(Value::String(format!("{}. {}", LABELS[pos], text)));
    }

    let mut out = question.clone();
    out["content"]["options"] = Value::Array(relabeled);
    out["solution"]["correct_option"] = Value::String(new_correct.to_string());
    out
}
