//! Overlapping window chunker.
//!
//! Concatenates the cleaned [`TextUnit`]s of one document (separated by a
//! paragraph break) and cuts the result into windows of at most `size`
//! chars, each starting `overlap` chars before the previous one ended.
//!
//! # Algorithm
//!
//! 1. Join units with `"\n\n"`; remember where each unit starts.
//! 2. Take the window `[start, start + size)`.
//! 3. If the window stops short of the end of the text, pull its end back
//!    to the latest natural boundary in the window's tail (the last fifth,
//!    and always strictly after `start + overlap`): paragraph break first,
//!    then sentence end (`.?!;` followed by whitespace), then any
//!    whitespace. Fall back to a hard cut.
//! 4. The next window starts at `end - overlap`.
//!
//! Because every window starts exactly `overlap` chars before the previous
//! window's end, the trailing `overlap` chars of chunk *i* always equal the
//! leading `overlap` chars of chunk *i + 1*, and the chunks cover the text
//! with no gaps.
//!
//! Each chunk gets a deterministic UUIDv5 derived from its source, index and
//! content hash, so re-chunking the same file yields the same ids.
//!
//! # Example
//!
//! ```rust
//! use lexctx_core::chunk::{chunk_units, ChunkOutcome, ChunkParams};
//! use lexctx_core::models::{SourceMeta, TextUnit};
//!
//! let units = vec![TextUnit { content: "x".repeat(1400), meta: SourceMeta::default() }];
//! let ChunkOutcome::Chunks(chunks) = chunk_units(&units, &ChunkParams::default()) else {
//!     panic!("expected chunks");
//! };
//! let bounds: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
//! assert_eq!(bounds, vec![(0, 500), (400, 900), (800, 1300), (1200, 1400)]);
//! ```

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, SourceMeta, TextUnit};

/// Separator inserted between consecutive units.
pub const PARAGRAPH_SEP: &str = "\n\n";

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Window size and overlap, both in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    size: usize,
    overlap: usize,
}

impl ChunkParams {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            bail!("chunk size must be > 0");
        }
        if overlap >= size {
            bail!("chunk overlap ({}) must be smaller than chunk size ({})", overlap, size);
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Result of chunking one document.
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    Chunks(Vec<Chunk>),
    /// Nothing but whitespace survived cleaning.
    NoChunks,
}

/// Split cleaned units into overlapping chunks.
pub fn chunk_units(units: &[TextUnit], params: &ChunkParams) -> ChunkOutcome {
    let mut text: Vec<char> = Vec::new();
    let mut unit_starts: Vec<(usize, &SourceMeta)> = Vec::new();

    for unit in units {
        let content = unit.content.trim();
        if content.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.extend(PARAGRAPH_SEP.chars());
        }
        unit_starts.push((text.len(), &unit.meta));
        text.extend(content.chars());
    }

    if text.is_empty() {
        return ChunkOutcome::NoChunks;
    }

    let chunks = split_windows(&text, params)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let body: String = text[start..end].iter().collect();
            make_chunk(index, body, meta_at(&unit_starts, start), start, end)
        })
        .collect();

    ChunkOutcome::Chunks(chunks)
}

/// Compute `(start, end)` char windows over `text`.
fn split_windows(text: &[char], params: &ChunkParams) -> Vec<(usize, usize)> {
    let len = text.len();
    let mut windows = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + params.size).min(len);
        let end = if hard_end == len {
            len
        } else {
            let lo = start + (params.overlap + 1).max(params.size - params.size / 5);
            find_boundary(text, lo, hard_end).unwrap_or(hard_end)
        };
        windows.push((start, end));
        if end == len {
            break;
        }
        start = end - params.overlap;
    }

    windows
}

/// Latest natural cut position in `[lo, hi]`, by boundary preference.
///
/// Requires `hi < text.len()`.
fn find_boundary(text: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi {
        return None;
    }

    // Paragraph: cut before the "\n\n".
    let paragraph = (lo..=hi)
        .rev()
        .find(|&i| text[i] == '\n' && text.get(i + 1) == Some(&'\n'));
    if paragraph.is_some() {
        return paragraph;
    }

    // Sentence: cut right after the terminator.
    let sentence = (lo..=hi).rev().find(|&end| {
        matches!(text[end - 1], '.' | '?' | '!' | ';') && text[end].is_whitespace()
    });
    if sentence.is_some() {
        return sentence;
    }

    // Word: cut before the whitespace.
    (lo..=hi).rev().find(|&i| text[i].is_whitespace())
}

fn meta_at(unit_starts: &[(usize, &SourceMeta)], offset: usize) -> SourceMeta {
    unit_starts
        .iter()
        .take_while(|(start, _)| *start <= offset)
        .last()
        .or_else(|| unit_starts.first())
        .map(|(_, meta)| (*meta).clone())
        .unwrap_or_default()
}

fn make_chunk(index: usize, text: String, meta: SourceMeta, start: usize, end: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let key = format!("{}:{}:{}", meta.source, index, hash);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string();

    Chunk {
        id,
        index,
        text,
        hash,
        meta,
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(content: &str, page: u32) -> TextUnit {
        TextUnit {
            content: content.to_string(),
            meta: SourceMeta {
                source: "contract.pdf".to_string(),
                page: Some(page),
                row: None,
            },
        }
    }

    fn chunks_of(units: &[TextUnit], params: &ChunkParams) -> Vec<Chunk> {
        match chunk_units(units, params) {
            ChunkOutcome::Chunks(c) => c,
            ChunkOutcome::NoChunks => panic!("expected chunks"),
        }
    }

    fn lorem(chars: usize) -> String {
        let words = [
            "the", "lessee", "shall", "indemnify", "lessor", "against", "all", "claims",
            "arising", "from", "use", "of", "premises", "including", "negligence",
        ];
        let mut out = String::new();
        let mut i = 0;
        while out.chars().count() < chars {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(words[i % words.len()]);
            i += 1;
        }
        out.chars().take(chars).collect()
    }

    #[test]
    fn params_reject_overlap_not_smaller_than_size() {
        assert!(ChunkParams::new(100, 100).is_err());
        assert!(ChunkParams::new(0, 0).is_err());
        assert!(ChunkParams::new(100, 99).is_ok());
    }

    #[test]
    fn empty_or_blank_units_produce_no_chunks() {
        let units = vec![unit("", 1), unit("   ", 2)];
        assert!(matches!(
            chunk_units(&units, &ChunkParams::default()),
            ChunkOutcome::NoChunks
        ));
        assert!(matches!(
            chunk_units(&[], &ChunkParams::default()),
            ChunkOutcome::NoChunks
        ));
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunks_of(&[unit("Force majeure applies.", 1)], &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Force majeure applies.");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 22));
    }

    #[test]
    fn hard_cut_windows_without_boundaries() {
        let chunks = chunks_of(&[unit(&"x".repeat(1400), 1)], &ChunkParams::default());
        let bounds: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(bounds, vec![(0, 500), (400, 900), (800, 1300), (1200, 1400)]);
    }

    #[test]
    fn three_pages_of_prose_give_four_chunks() {
        let units = vec![unit(&lorem(467), 1), unit(&lorem(467), 2), unit(&lorem(466), 3)];
        let chunks = chunks_of(&units, &ChunkParams::default());
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].meta.page, Some(1));
        assert_eq!(chunks.last().map(|c| c.meta.page), Some(Some(3)));
    }

    #[test]
    fn overlap_law_holds_for_adjacent_chunks() {
        let params = ChunkParams::new(120, 30).unwrap();
        let text = format!(
            "{}. {}? {}\n\n{}",
            lorem(150),
            lorem(90),
            lorem(200),
            lorem(310)
        );
        let chunks = chunks_of(&[unit(&text, 1)], &params);
        assert!(chunks.len() > 3);

        for pair in chunks.windows(2) {
            let a: Vec<char> = pair[0].text.chars().collect();
            let b: Vec<char> = pair[1].text.chars().collect();
            assert!(a.len() <= params.size());
            assert_eq!(pair[1].start, pair[0].end - params.overlap());
            assert_eq!(&a[a.len() - params.overlap()..], &b[..params.overlap()]);
        }
    }

    #[test]
    fn chunks_cover_text_without_gaps() {
        let params = ChunkParams::new(80, 20).unwrap();
        let text = lorem(1000);
        let chunks = chunks_of(&[unit(&text, 1)], &params);
        assert_eq!(chunks[0].start, 0);
        // units are trimmed before chunking; lorem(1000) ends in a space
        assert_eq!(chunks.last().unwrap().end, text.trim().chars().count());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.text.chars().count(), c.end - c.start);
        }
    }

    #[test]
    fn prefers_sentence_boundary_over_word_boundary() {
        let params = ChunkParams::new(60, 10).unwrap();
        let text = "The lessee shall pay rent monthly in advance in full. The lessee may renew once for a further term";
        let chunks = chunks_of(&[unit(text, 1)], &params);
        assert_eq!(chunks[0].text, "The lessee shall pay rent monthly in advance in full.");
    }

    #[test]
    fn prefers_page_break_over_sentence_boundary() {
        let params = ChunkParams::new(60, 5).unwrap();
        let units = vec![
            unit("The agreement is signed by both parties on this day. Done", 1),
            unit("Page two text continues on and on", 2),
        ];
        let chunks = chunks_of(&units, &params);
        assert_eq!(chunks[0].text, "The agreement is signed by both parties on this day. Done");
        assert_eq!(chunks[1].meta.page, Some(1));
    }

    #[test]
    fn ids_are_deterministic_and_distinct() {
        let units = vec![unit(&lorem(900), 1)];
        let a = chunks_of(&units, &ChunkParams::default());
        let b = chunks_of(&units, &ChunkParams::default());
        let ids_a: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);

        let mut dedup = ids_a.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), ids_a.len());
    }
}
