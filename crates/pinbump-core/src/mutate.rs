//! Scoped text rewrites.
//!
//! Every edit replaces one byte span that a scan located. Nothing is ever
//! replaced by searching for the version string, so a second pin that happens
//! to share the same version is untouched.

use crate::error::{PinError, Result};
use serde::Serialize;
use std::ops::Range;

/// One span replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// What a single edit means to a human: which pin moved from where to where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinChange {
    /// `requests` or `actions/checkout`.
    pub name: String,
    pub from: String,
    pub to: String,
}

/// Apply non-overlapping edits to `text`. Edits may arrive in any order.
/// An edit whose replacement equals the text it covers leaves those bytes
/// exactly as they were.
pub fn apply_edits(text: &str, edits: &[Edit]) -> Result<String> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.span.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in sorted {
        if edit.span.start < cursor || edit.span.end > text.len() {
            return Err(PinError::OverlappingEdits(edit.span.start));
        }
        out.push_str(&text[cursor..edit.span.start]);
        out.push_str(&edit.replacement);
        cursor = edit.span.end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

// ---------------------------------------------------------------------------
// CandidateDocument
// ---------------------------------------------------------------------------

/// An in-memory proposed rewrite of one file. Edits accumulate against the
/// original text; `render` produces the candidate.
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    original: String,
    edits: Vec<Edit>,
    changes: Vec<PinChange>,
}

impl CandidateDocument {
    pub fn new(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            edits: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Stage replacing `span` with `replacement`. Returns false (and stages
    /// nothing) when the replacement equals what is already there.
    pub fn replace(&mut self, span: Range<usize>, replacement: &str, change: PinChange) -> bool {
        if self.original.get(span.clone()) == Some(replacement) {
            return false;
        }
        self.edits.push(Edit {
            span,
            replacement: replacement.to_string(),
        });
        self.changes.push(change);
        true
    }

    pub fn changes(&self) -> &[PinChange] {
        &self.changes
    }

    pub fn is_unchanged(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn render(&self) -> Result<String> {
        apply_edits(&self.original, &self.edits)
    }
}
