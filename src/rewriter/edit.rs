//! Byte-range edits over one source file.
//!
//! The rewriter never pretty-prints whole files; it collects replacements
//! and insertions against the original text and applies them in one pass.
//! Everything it does not touch keeps its exact original bytes, comments
//! included.

use anyhow::{bail, Result};

/// One replacement: `src[start..end]` becomes `text`. A zero-length span is
/// an insertion.
#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
    /// Insertion order, to keep same-position insertions stable.
    seq: usize,
}

/// An ordered set of non-overlapping edits for one file.
#[derive(Debug, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        EditSet::default()
    }

    /// Replace `start..end` with `text`.
    pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        let seq = self.edits.len();
        self.edits.push(Edit {
            start,
            end,
            text: text.into(),
            seq,
        });
    }

    /// Insert `text` at `offset`.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.replace(offset, offset, text);
    }

    /// Apply all edits to `src`. Overlapping replacements are a bug in the
    /// caller and are rejected.
    pub fn apply(mut self, src: &str) -> Result<String> {
        self.edits
            .sort_by(|a, b| (a.start, a.end, a.seq).cmp(&(b.start, b.end, b.seq)));

        let mut out = String::with_capacity(src.len());
        let mut pos = 0;
        for edit in &self.edits {
            if edit.start < pos {
                bail!(
                    "overlapping edits at byte {} (already consumed through {})",
                    edit.start,
                    pos
                );
            }
            if edit.end > src.len() {
                bail!("edit past end of file: {}..{}", edit.start, edit.end);
            }
            out.push_str(&src[pos..edit.start]);
            out.push_str(&edit.text);
            pos = edit.end;
        }
        out.push_str(&src[pos..]);
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
