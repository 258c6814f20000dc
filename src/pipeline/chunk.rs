//! Recursive character splitting and excerpting.
//!
//! Long documents are split on the coarsest separator that yields pieces
//! under `chunk_size` characters (paragraphs, then lines, then words, then
//! single characters), and neighbouring pieces are merged back into chunks
//! with up to `chunk_overlap` characters repeated between them.
//!
//! The prompt then receives the chunks re-joined with a single space and
//! cut to `excerpt_chars`. Overlapping text therefore appears twice in the
//! excerpt; this matches how the paper generator has always fed documents
//! to the model and keeps the excerpt boundary stable.

use std::collections::VecDeque;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits text into overlapping chunks, measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// `chunk_overlap` is capped below `chunk_size`; `chunk_size` is at least 1.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, rest) = pick_separator(text, separators);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, rest));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying a tail of at most
    /// `chunk_overlap` characters into the next chunk.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut out, &current, separator);

                loop {
                    let joiner = if current.is_empty() { 0 } else { sep_len };
                    let too_long = total > 0 && total + len + joiner > self.chunk_size;
                    if total <= self.chunk_overlap && !too_long {
                        break;
                    }
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    let dropped_joiner = if current.is_empty() { 0 } else { sep_len };
                    total -= char_len(front) + dropped_joiner;
                }
            }

            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joiner;
        }

        push_joined(&mut out, &current, separator);
        out
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn push_joined(out: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Join chunks with a space and keep the first `max_chars` characters.
pub fn excerpt(chunks: &[String], max_chars: usize) -> String {
    let joined = chunks.join(" ");
    match joined.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => joined[..byte_idx].to_string(),
        None => joined,
    }
}
