//! Pin extraction from manifest and workflow text.
//!
//! Pins are rebuilt from the text on every scan and carry the byte spans they
//! were found at, so a rewrite can target exactly one occurrence.

use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static DEPENDENCY_RE: OnceLock<Regex> = OnceLock::new();
static ACTION_RE: OnceLock<Regex> = OnceLock::new();

/// Quoted `"package==version"` / `'package >= version'` entries.
fn dependency_re() -> &'static Regex {
    DEPENDENCY_RE.get_or_init(|| {
        Regex::new(r#"["']([a-zA-Z0-9_\-]+)\s*(==|>=)\s*([a-zA-Z0-9.\-+]+)["']"#)
            .expect("dependency pattern is valid")
    })
}

/// `uses: owner/repo@ref` lines in workflow files.
fn action_re() -> &'static Regex {
    ACTION_RE.get_or_init(|| {
        Regex::new(r"uses:\s+([a-zA-Z0-9_\-]+)/([a-zA-Z0-9_\-]+)@([a-zA-Z0-9_\-.]+)")
            .expect("action pattern is valid")
    })
}

// ---------------------------------------------------------------------------
// DependencyPin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinOperator {
    /// `==`
    Exact,
    /// `>=`
    AtLeast,
}

impl PinOperator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(PinOperator::Exact),
            ">=" => Some(PinOperator::AtLeast),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PinOperator::Exact => "==",
            PinOperator::AtLeast => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPin {
    pub package: String,
    pub operator: PinOperator,
    pub version: String,
    /// Span of the whole quoted expression, quotes included.
    pub span: Range<usize>,
    /// Span of the version inside the text.
    pub version_span: Range<usize>,
}

impl DependencyPin {
    /// Only exact pins are eligible for automatic updates.
    pub fn is_updatable(&self) -> bool {
        self.operator == PinOperator::Exact
    }
}

pub fn scan_dependencies(text: &str) -> Vec<DependencyPin> {
    dependency_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let package = caps.get(1)?;
            let operator = PinOperator::parse(caps.get(2)?.as_str())?;
            let version = caps.get(3)?;
            Some(DependencyPin {
                package: package.as_str().to_string(),
                operator,
                version: version.as_str().to_string(),
                span: whole.range(),
                version_span: version.range(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ActionPin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPin {
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    pub span: Range<usize>,
    pub ref_span: Range<usize>,
}

impl ActionPin {
    /// `owner/repo`, as written in the workflow.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Branches and commit hashes are left alone; only refs that look like
    /// release tags (leading `v` or a dot) are checked.
    pub fn looks_like_version_tag(&self) -> bool {
        self.git_ref.starts_with('v') || self.git_ref.contains('.')
    }
}

pub fn scan_actions(text: &str) -> Vec<ActionPin> {
    action_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let git_ref = caps.get(3)?;
            Some(ActionPin {
                owner: caps.get(1)?.as_str().to_string(),
                repo: caps.get(2)?.as_str().to_string(),
                git_ref: git_ref.as_str().to_string(),
                span: whole.range(),
                ref_span: git_ref.range(),
            })
        })
        .collect()
}

/// Align a discovered tag with the style of the current ref: a `v`-prefixed
/// ref keeps its `v` even when the upstream tag omits it.
pub fn normalize_tag(current: &str, latest: &str) -> String {
    if current.starts_with('v') && !latest.starts_with('v') {
        format!("v{latest}")
    } else {
        latest.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
