//! Recursive separator-priority text splitter.
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text (an empty separator
//!    means "split into characters").
//! 2. Split on it, keeping the separator at the start of the following
//!    piece so no text is lost.
//! 3. Pieces shorter than `chunk_size` are merged greedily into chunks of
//!    at most `chunk_size` characters. When a chunk is emitted, trailing
//!    pieces totalling at most `chunk_overlap` characters are carried into
//!    the next one.
//! 4. Pieces that are still too long are split again with the remaining,
//!    lower-priority separators. When none remain, the piece is cut into
//!    fixed-size windows that overlap by `chunk_overlap` characters.
//!
//! All lengths are counted in `char`s. Emitted chunks are trimmed and
//! never empty.

use std::collections::VecDeque;

/// Splits text on a priority list of separators.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// `chunk_size` is raised to at least 1 and `chunk_overlap` is capped
    /// below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize, separators: &[&str]) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.extend(self.hard_cut(piece));
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_trimmed(&current) {
                    docs.push(doc);
                }
                // Keep a tail of at most `chunk_overlap` chars that still
                // leaves room for the incoming piece.
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some((_, first_len)) => total -= first_len,
                        None => break,
                    }
                }
            }
            current.push_back((piece, len));
            total += len;
        }

        if let Some(doc) = join_trimmed(&current) {
            docs.push(doc);
        }
        docs
    }

    fn hard_cut(&self, piece: &str) -> Vec<String> {
        let chars: Vec<char> = piece.chars().collect();
        if chars.len() <= self.chunk_size {
            return trimmed_non_empty(piece).into_iter().collect();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut out = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            if let Some(w) = trimmed_non_empty(&window) {
                out.push(w);
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
        out
    }
}

/// Split on `separator`, attaching each separator occurrence to the start
/// of the following piece. Empty pieces are dropped.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut out = Vec::new();
    let mut last = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            out.push(&text[last..idx]);
        }
        last = idx;
    }
    if last < text.len() {
        out.push(&text[last..]);
    }
    out
}

fn join_trimmed(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    trimmed_non_empty(&joined)
}

fn trimmed_non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let s = RecursiveSplitter::new(100, 10, &["\n\n", "\n"]);
        assert_eq!(s.split("Hello, world!"), vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        let s = RecursiveSplitter::new(100, 10, &["\n\n", "\n"]);
        assert!(s.split("  \n\n \n").is_empty());
    }

    #[test]
    fn test_separator_kept_on_following_piece() {
        assert_eq!(
            split_keep_separator("a\n\nb\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\nc"]
        );
        assert_eq!(split_keep_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} has a few words.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let s = RecursiveSplitter::new(120, 30, &["\n\n", "\n", " "]);
        let chunks = s.split(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 120, "chunk too long: {}", c.len());
        }
    }

    #[test]
    fn test_overlap_carries_trailing_piece() {
        // Each line is 10 chars with its leading newline; size 25 fits two.
        let text = "aaaaaaaaa\nbbbbbbbbb\nccccccccc\nddddddddd";
        let s = RecursiveSplitter::new(25, 10, &["\n"]);
        let chunks = s.split(text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "aaaaaaaaa\nbbbbbbbbb");
        assert!(chunks[1].starts_with("bbbbbbbbb"));
        assert!(chunks[2].ends_with("ddddddddd"));
    }

    #[test]
    fn test_falls_back_to_lower_priority_separator() {
        let para = "word ".repeat(60);
        let s = RecursiveSplitter::new(100, 0, &["\n\n", " "]);
        let chunks = s.split(&para);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(chunks.iter().all(|c| c.split_whitespace().all(|w| w == "word")));
    }

    #[test]
    fn test_hard_cut_when_no_separator_applies() {
        let blob = "x".repeat(250);
        let s = RecursiveSplitter::new(100, 20, &["\n"]);
        let chunks = s.split(&blob);
        // windows start at 0, 80, 160
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 90);
    }

    #[test]
    fn test_multibyte_safe() {
        let text = "é".repeat(300);
        let s = RecursiveSplitter::new(100, 10, &["\n"]);
        let chunks = s.split(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_covers_every_word() {
        let text = "# Intro\n\nAlpha beta gamma.\n\n## Usage\n\nDelta epsilon zeta eta.\n\
                    Theta iota kappa.\n\n## Notes\n\nLambda mu nu xi omicron pi.";
        let s = RecursiveSplitter::new(40, 10, &["\n## ", "\n\n", "\n", " "]);
        let chunks = s.split(text);
        let joined = chunks.join(" ");
        for word in text.split_whitespace() {
            assert!(joined.contains(word), "missing {}", word);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta".repeat(20);
        let s = RecursiveSplitter::new(50, 10, &["\n\n", "\n"]);
        assert_eq!(s.split(&text), s.split(&text));
    }
}
