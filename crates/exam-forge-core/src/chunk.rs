//! Paragraph-first text chunker with overlap.
//!
//! Splits lecture notes into overlapping segments for embedding. Lengths are
//! counted in characters, so Hebrew and ASCII text are sized alike.
//!
//! # Algorithm
//!
//! 1. Split the text into paragraphs on blank lines.
//! 2. Accumulate paragraphs (joined with `\n\n`) while the buffer stays
//!    within `target_size`.
//! 3. When a paragraph does not fit, flush the buffer and seed the next one
//!    with the trailing `overlap` characters of the flushed chunk, trimmed
//!    forward to a word boundary.
//! 4. A paragraph longer than `target_size` (or one that leaves no room for
//!    a seed) is split on word boundaries instead. Word-level chunks are
//!    seeded with the last `overlap / 6` words of the previous chunk.
//!
//! The two overlap measures (characters at paragraph boundaries, words
//! inside a split paragraph) are intentionally kept separate.
//!
//! # Example
//!
//! ```rust
//! use exam_forge_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("First paragraph.\n\nSecond paragraph.", 800, 200);
//! assert_eq!(chunks.len(), 1);
//! assert!(chunks[0].contains("Second paragraph."));
//! ```

/// Split `text` into ordered, overlapping chunks of at most `target_size`
/// characters.
///
/// # Guarantees
///
/// - Empty or whitespace-only input yields no chunks.
/// - No chunk exceeds `target_size` unless it is a single word longer than
///   `target_size`.
/// - With `overlap > 0`, each chunk after the first starts with a suffix of
///   the chunk before it (barring over-long words).
/// - Every word of the input appears in some chunk, in order.
pub fn chunk_text(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    let mut chunker = Chunker {
        target: target_size.max(1),
        overlap,
        chunks: Vec::new(),
        current: String::new(),
    };
    for para in paragraphs(text) {
        chunker.push_paragraph(&para);
    }
    chunker.finish()
}

struct Chunker {
    target: usize,
    overlap: usize,
    chunks: Vec<String>,
    current: String,
}

impl Chunker {
    fn push_paragraph(&mut self, para: &str) {
        let para_len = char_len(para);

        if self.current.is_empty() && self.chunks.is_empty() {
            if para_len <= self.target {
                self.current.push_str(para);
            } else {
                self.split_words(para);
            }
            return;
        }

        if char_len(&self.current) + 2 + para_len <= self.target {
            self.current.push_str("\n\n");
            self.current.push_str(para);
            return;
        }

        self.flush();

        if para_len <= self.target {
            let budget = self.target.saturating_sub(para_len + 2);
            let seed = self.char_seed(budget);
            if !seed.is_empty() {
                self.current = format!("{}\n\n{}", seed, para);
                return;
            }
            if self.overlap == 0 {
                self.current.push_str(para);
                return;
            }
        }

        self.split_words(para);
    }

    /// Word-boundary split for paragraphs that cannot be placed whole.
    fn split_words(&mut self, para: &str) {
        for word in para.split_whitespace() {
            if self.current.is_empty() {
                self.current = self.seed_with_words(word);
            } else if char_len(&self.current) + 1 + char_len(word) <= self.target {
                self.current.push(' ');
                self.current.push_str(word);
            } else {
                self.flush();
                self.current = self.seed_with_words(word);
            }
        }
    }

    /// Tail of the last chunk, at most `min(overlap, budget)` characters,
    /// starting on a word boundary. Always a suffix of that chunk.
    fn char_seed(&self, budget: usize) -> String {
        let Some(prev) = self.chunks.last() else {
            return String::new();
        };
        let take = self.overlap.min(budget);
        if take == 0 {
            return String::new();
        }

        let start = byte_offset(prev, char_len(prev).saturating_sub(take));
        let tail = &prev[start..];
        let on_boundary = start == 0
            || prev[..start].ends_with(char::is_whitespace)
            || tail.starts_with(char::is_whitespace);
        let tail = if on_boundary {
            tail
        } else {
            match tail.find(char::is_whitespace) {
                Some(i) => &tail[i..],
                None => "",
            }
        };
        tail.trim_start().to_string()
    }

    /// Start a new word-level chunk with `word`, prefixed by up to
    /// `overlap / 6` trailing words of the last chunk that still fit.
    fn seed_with_words(&self, word: &str) -> String {
        let Some(prev) = self.chunks.last() else {
            return word.to_string();
        };
        if self.overlap == 0 {
            return word.to_string();
        }

        let wanted = (self.overlap / 6).max(1);
        let starts = word_starts(prev);
        let first = starts.len().saturating_sub(wanted);
        let word_len = char_len(word);

        for &start in &starts[first..] {
            let seed = &prev[start..];
            if char_len(seed) + 1 + word_len <= self.target {
                return format!("{} {}", seed, word);
            }
        }
        word.to_string()
    }

    fn flush(&mut self) {
        let chunk = std::mem::take(&mut self.current);
        if !chunk.trim().is_empty() {
            self.chunks.push(chunk);
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Group lines into trimmed paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !lines.is_empty() {
                out.push(lines.join("\n").trim().to_string());
                lines.clear();
            }
        } else {
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        out.push(lines.join("\n").trim().to_string());
    }
    out.retain(|p| !p.is_empty());
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`-th character (clamped to the end).
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Byte offsets where each whitespace-separated word begins.
fn word_starts(s: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut prev_ws = true;
    for (i, c) in s.char_indices() {
        let ws = c.is_whitespace();
        if !ws && prev_ws {
            starts.push(i);
        }
        prev_ws = ws;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares_overlap(a: &str, b: &str) -> bool {
        b.char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .any(|end| a.ends_with(&b[..end]))
    }

    fn assert_invariants(text: &str, target: usize, overlap: usize) -> Vec<String> {
        let chunks = chunk_text(text, target, overlap);
        for c in &chunks {
            assert!(
                char_len(c) <= target || c.split_whitespace().count() == 1,
                "chunk too long ({} > {}): {:?}",
                char_len(c),
                target,
                c
            );
        }
        let long_word = |c: &String| char_len(c) > target && c.split_whitespace().count() == 1;
        if overlap > 0 {
            for pair in chunks.windows(2) {
                if long_word(&pair[0]) || long_word(&pair[1]) {
                    continue;
                }
                assert!(
                    shares_overlap(&pair[0], &pair[1]),
                    "no overlap between {:?} and {:?}",
                    pair[0],
                    pair[1]
                );
            }
        }
        let covered: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let mut pos = 0;
        for word in text.split_whitespace() {
            let found = covered[pos..].iter().position(|w| *w == word);
            assert!(found.is_some(), "word {:?} missing from chunks", word);
            pos += found.unwrap_or(0);
        }
        chunks
    }

    fn numbered_words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 800, 200).is_empty());
        assert!(chunk_text("  \n\n \t\n", 800, 200).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 800, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_paragraphs_merge_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\n\n\nThird paragraph.";
        let chunks = chunk_text(text, 800, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            "First paragraph.\n\nSecond paragraph.\n\nThird paragraph."
        );
    }

    #[test]
    fn test_char_seed_at_paragraph_boundary() {
        let text = "alpha beta gamma delta\n\nepsilon zeta eta theta iota";
        let chunks = chunk_text(text, 50, 12);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "alpha beta gamma delta");
        assert_eq!(chunks[1], "gamma delta\n\nepsilon zeta eta theta iota");
    }

    #[test]
    fn test_seed_drops_leading_word_fragment() {
        // The 8-char tail of the first chunk is "ue green", which starts
        // mid-word; only "green" may leak into the next chunk.
        let text = "red blue green\n\nyellow purple orange";
        let chunks = chunk_text(text, 30, 8);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "green\n\nyellow purple orange");
    }

    #[test]
    fn test_long_paragraph_word_split_uses_word_overlap() {
        let text = numbered_words("w", 60);
        // overlap 18 => 3 seed words
        let chunks = assert_invariants(&text, 60, 18);
        assert!(chunks.len() > 1);
        let first_tail: Vec<&str> = chunks[0].split_whitespace().rev().take(3).collect();
        let second_head: Vec<&str> = chunks[1].split_whitespace().take(3).collect();
        let mut expected = first_tail.clone();
        expected.reverse();
        assert_eq!(second_head, expected);
    }

    #[test]
    fn test_single_long_word_is_kept_whole() {
        let long = "x".repeat(120);
        let text = format!("short intro\n\n{}\n\ntrailing words here", long);
        let chunks = assert_invariants(&text, 40, 10);
        assert!(chunks.iter().any(|c| c == &long));
    }

    #[test]
    fn test_mixed_document_invariants() {
        let mut paras = Vec::new();
        for i in 0..12 {
            paras.push(numbered_words(&format!("p{}w", i), 5 + (i * 7) % 40));
        }
        let text = paras.join("\n\n");
        assert_invariants(&text, 120, 30);
        assert_invariants(&text, 80, 200);
        assert_invariants(&text, 800, 200);
    }

    #[test]
    fn test_paragraph_without_room_for_seed_is_word_split() {
        let first = numbered_words("a", 8);
        let second = numbered_words("b", 12);
        let target = char_len(&second);
        let text = format!("{}\n\n{}", first, second);
        let chunks = assert_invariants(&text, target, 30);
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_zero_overlap_has_no_seed() {
        let text = "one two three\n\nfour five six";
        let chunks = chunk_text(text, 15, 0);
        assert_eq!(chunks, vec!["one two three", "four five six"]);
    }

    #[test]
    fn test_multibyte_hebrew_counts_characters() {
        let para = "מערכת הפעלה מנהלת תהליכים וזיכרון";
        let text = format!("{}\n\n{}", para, para);
        let chunks = chunk_text(&text, char_len(para) + 2 + char_len(para), 10);
        assert_eq!(chunks.len(), 1);
        assert_invariants(&text, 20, 10);
    }

    #[test]
    fn test_deterministic() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} with some body text.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(chunk_text(&text, 100, 40), chunk_text(&text, 100, 40));
    }
}
