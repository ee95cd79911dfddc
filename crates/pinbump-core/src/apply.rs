//! Two-phase apply: a staged `CandidateDocument` is checked by a `Validator`
//! and then either written in one atomic step or dropped.
//!
//! Both surfaces go through here. The manifest is gated by the template
//! validator; workflow files use `AcceptAll`.

use crate::error::Result;
use crate::io;
use crate::mutate::{CandidateDocument, PinChange};
use crate::validate::Validator;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Nothing was staged.
    Unchanged,
    /// Staged changes were computed but, by request, neither validated nor
    /// written.
    DryRun { changes: Vec<PinChange> },
    /// The validator approved and the file now holds the candidate.
    Committed { changes: Vec<PinChange> },
    /// The validator refused; the file was not touched.
    Rejected {
        changes: Vec<PinChange>,
        diagnostics: String,
    },
}

impl ApplyOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ApplyOutcome::Committed { .. })
    }

    pub fn changes(&self) -> &[PinChange] {
        match self {
            ApplyOutcome::Unchanged => &[],
            ApplyOutcome::DryRun { changes }
            | ApplyOutcome::Committed { changes }
            | ApplyOutcome::Rejected { changes, .. } => changes,
        }
    }
}

/// Validate `document` as a whole and write it to `path` only on approval.
///
/// Errors come only from rendering the edits or from the final write; a
/// rejected candidate is an `Ok(Rejected)`.
pub fn commit_or_discard(
    path: &Path,
    document: &CandidateDocument,
    validator: &dyn Validator,
    dry_run: bool,
) -> Result<ApplyOutcome> {
    if document.is_unchanged() {
        return Ok(ApplyOutcome::Unchanged);
    }
    let changes = document.changes().to_vec();
    let candidate = document.render()?;

    if dry_run {
        return Ok(ApplyOutcome::DryRun { changes });
    }

    tracing::info!(
        file = %path.display(),
        validator = validator.name(),
        "validating {} change(s)",
        changes.len()
    );
    let verdict = validator.validate(&candidate);
    if !verdict.passed {
        return Ok(ApplyOutcome::Rejected {
            changes,
            diagnostics: verdict.diagnostics.unwrap_or_default(),
        });
    }

    io::atomic_write(path, candidate.as_bytes())?;
    tracing::info!(file = %path.display(), "wrote {} change(s)", changes.len());
    Ok(ApplyOutcome::Committed { changes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::scan_dependencies;
    use crate::validate::ValidationVerdict;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records every candidate it sees and answers with a fixed verdict.
    struct Recording {
        pass: bool,
        seen: RefCell<Vec<String>>,
    }

    impl Validator for Recording {
        fn validate(&self, candidate: &str) -> ValidationVerdict {
            self.seen.borrow_mut().push(candidate.to_string());
            if self.pass {
                ValidationVerdict::passed()
            } else {
                ValidationVerdict::failed("resolver said no")
            }
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn staged(text: &str) -> CandidateDocument {
        let pins = scan_dependencies(text);
        let mut doc = CandidateDocument::new(text);
        doc.replace(
            pins[0].version_span.clone(),
            "2.31.0",
            PinChange {
                name: "requests".into(),
                from: "2.28.0".into(),
                to: "2.31.0".into(),
            },
        );
        doc
    }

    #[test]
    fn approved_candidate_is_written_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pyproject.toml");
        let original = "deps = [\"requests==2.28.0\"]\n";
        std::fs::write(&path, original).unwrap();

        let gate = Recording {
            pass: true,
            seen: RefCell::new(vec![]),
        };
        let outcome = commit_or_discard(&path, &staged(original), &gate, false).unwrap();

        assert!(outcome.is_committed());
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "deps = [\"requests==2.31.0\"]\n");
        assert_eq!(gate.seen.borrow().as_slice(), &[on_disk]);
    }

    #[test]
    fn rejected_candidate_leaves_original_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pyproject.toml");
        let original = "deps = [\"requests==2.28.0\"]\n";
        std::fs::write(&path, original).unwrap();

        let gate = Recording {
            pass: false,
            seen: RefCell::new(vec![]),
        };
        let outcome = commit_or_discard(&path, &staged(original), &gate, false).unwrap();

        match &outcome {
            ApplyOutcome::Rejected { diagnostics, changes } => {
                assert_eq!(diagnostics, "resolver said no");
                assert_eq!(changes.len(), 1);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn unchanged_document_skips_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ci.yml");
        let gate = Recording {
            pass: true,
            seen: RefCell::new(vec![]),
        };
        let outcome =
            commit_or_discard(&path, &CandidateDocument::new("on: push\n"), &gate, false).unwrap();
        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert!(gate.seen.borrow().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn dry_run_neither_validates_nor_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pyproject.toml");
        let original = "deps = [\"requests==2.28.0\"]\n";
        std::fs::write(&path, original).unwrap();
        let gate = Recording {
            pass: true,
            seen: RefCell::new(vec![]),
        };
        let outcome = commit_or_discard(&path, &staged(original), &gate, true).unwrap();
        assert!(matches!(outcome, ApplyOutcome::DryRun { .. }));
        assert_eq!(outcome.changes().len(), 1);
        assert!(gate.seen.borrow().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = ApplyOutcome::Committed {
            changes: vec![PinChange {
                name: "actions/checkout".into(),
                from: "v3".into(),
                to: "v4".into(),
            }],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "committed");
        assert_eq!(json["changes"][0]["to"], "v4");
    }
}
