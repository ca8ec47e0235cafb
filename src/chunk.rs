//! Overlapping sliding-window chunker.
//!
//! Splits the assembled document into [`Chunk`]s of at most `chunk_size`
//! characters, where each window starts exactly `chunk_overlap` characters
//! before the previous one ended.
//!
//! # Algorithm
//!
//! 1. Blank text yields no chunks; text that fits in one window yields itself.
//! 2. Otherwise, the window `[start, start + chunk_size)` is cut at the last
//!    natural boundary in its second half, trying in order: paragraph
//!    (`\n\n`), line (`\n`), sentence end (`. `, `? `, `! `), word (` `).
//! 3. With no boundary available the window is hard-cut at `chunk_size`.
//! 4. The next window starts at `end - chunk_overlap`.
//!
//! Lengths are counted in `char`s and cuts always land on UTF-8 boundaries.
//!
//! # Example
//!
//! ```rust
//! use docchat::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 1500, 300);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Boundary classes, most preferred first.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

/// Split text into overlapping chunks.
///
/// # Guarantees
///
/// - Blank text returns an empty vector.
/// - Every chunk has at most `chunk_size` chars.
/// - Consecutive chunks share exactly `chunk_overlap` chars (clamped to
///   `chunk_size - 1`).
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    if chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);

    // Byte offset of every char, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    if char_count <= chunk_size {
        return vec![make_chunk(0, text)];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let hard_end = (start + chunk_size).min(char_count);
        if hard_end == char_count {
            chunks.push(make_chunk(chunk_index, &text[bounds[start]..]));
            break;
        }

        // Cutting before `floor` would leave a chunk no longer than the overlap
        // and the window would stop advancing.
        let floor = start + (chunk_size / 2).max(overlap + 1);
        let end = find_break(text, &bounds, floor, hard_end).unwrap_or(hard_end);

        chunks.push(make_chunk(chunk_index, &text[bounds[start]..bounds[end]]));
        chunk_index += 1;
        start = end - overlap;
    }

    chunks
}

/// Find the char position just past the best boundary in `[floor, hard_end]`.
fn find_break(text: &str, bounds: &[usize], floor: usize, hard_end: usize) -> Option<usize> {
    let window_start = bounds[floor];
    let window = &text[window_start..bounds[hard_end]];

    for group in SEPARATORS {
        let best = group
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
            .max();
        if let Some(offset) = best {
            let cut = window_start + offset;
            // Separators are ASCII, so `cut` is always a char boundary.
            if let Ok(pos) = bounds.binary_search(&cut) {
                return Some(pos);
            }
        }
    }

    None
}

fn make_chunk(index: i64, text: &str) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash: hash_text(text),
    }
}

/// Hex-encoded SHA-256 of a chunk's text.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text(paragraphs: usize) -> String {
        (0..paragraphs)
            .map(|i| {
                format!(
                    "Paragraph {} talks about warranties, returns and shipping. \
                     It has a second sentence for good measure.",
                    i
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn tail(s: &str, n: usize) -> String {
        let chars: Vec<char> = s.chars().collect();
        chars[chars.len() - n..].iter().collect()
    }

    fn head(s: &str, n: usize) -> String {
        s.chars().take(n).collect()
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("", 1500, 300).is_empty());
        assert!(chunk_text("  \n\n ", 1500, 300).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1500, 300);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_chunks_respect_max_length() {
        let text = long_text(200);
        let chunks = chunk_text(&text, 1500, 300);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 1500, "chunk too long");
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = long_text(200);
        let chunks = chunk_text(&text, 1500, 300);
        for pair in chunks.windows(2) {
            assert_eq!(tail(&pair[0].text, 300), head(&pair[1].text, 300));
        }
    }

    #[test]
    fn test_chunks_reassemble_to_original() {
        let text = long_text(120);
        let chunks = chunk_text(&text, 400, 50);
        let mut rebuilt = chunks[0].text.clone();
        for c in &chunks[1..] {
            rebuilt.extend(c.text.chars().skip(50));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = long_text(60);
        let chunks = chunk_text(&text, 1500, 300);
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.text.ends_with("\n\n"), "chunk did not end on a paragraph");
        }
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "x".repeat(1000);
        let chunks = chunk_text(&text, 300, 100);
        assert_eq!(chunks[0].text.len(), 300);
        for pair in chunks.windows(2) {
            assert_eq!(tail(&pair[0].text, 100), head(&pair[1].text, 100));
        }
    }

    #[test]
    fn test_multibyte_text_never_splits_chars() {
        let text = "garantía válida por dos años — ".repeat(200);
        let chunks = chunk_text(&text, 250, 40);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 250);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = long_text(100);
        let chunks = chunk_text(&text, 200, 20);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = long_text(40);
        let c1 = chunk_text(&text, 300, 60);
        let c2 = chunk_text(&text, 300, 60);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.chunk_index, b.chunk_index);
        }
    }
}
