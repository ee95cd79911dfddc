//! Best-effort ordering for version strings and tag names.
//!
//! Updates are triggered by plain string inequality. `Version` exists so the
//! orchestrator can notice when a "latest" value actually sorts below the
//! pinned one, and so the tag fallback can pick the highest tag instead of
//! trusting list order.
//!
//! Parsing accepts an optional `v` prefix, a dotted numeric release, and an
//! arbitrary suffix. Suffixes starting with `post` or `+` sort after the bare
//! release; every other suffix (`rc1`, `b2`, `.dev0`, `-beta`) sorts before
//! it. Suffixes of the same kind compare as strings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    release: Vec<u64>,
    suffix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SuffixKind {
    Pre,
    Final,
    Post,
}

impl Version {
    /// Parse a version or tag string. Returns `None` when there is no leading
    /// numeric release (branch names, commit hashes).
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let end = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (release_str, rest) = body.split_at(end);
        let release_str = release_str.trim_end_matches('.');
        if release_str.is_empty() {
            return None;
        }

        let release = release_str
            .split('.')
            .map(|seg| seg.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        // A hex commit hash like "3df4ab1" starts with digits; reject when the
        // suffix glues straight onto the number without a separator or known
        // pre/post marker.
        let suffix = rest
            .trim_start_matches(['.', '-', '_'])
            .to_ascii_lowercase();
        if !suffix.is_empty() && !looks_like_suffix(rest) {
            return None;
        }

        Some(Self {
            raw: trimmed.to_string(),
            release,
            suffix,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    fn suffix_kind(&self) -> SuffixKind {
        if self.suffix.is_empty() {
            SuffixKind::Final
        } else if self.suffix.starts_with("post") || self.suffix.starts_with('+') {
            SuffixKind::Post
        } else {
            SuffixKind::Pre
        }
    }
}

fn looks_like_suffix(rest: &str) -> bool {
    const MARKERS: [&str; 9] = ["a", "b", "c", "rc", "alpha", "beta", "pre", "dev", "post"];
    if rest.starts_with(['.', '-', '_', '+']) {
        return true;
    }
    let lower = rest.to_ascii_lowercase();
    MARKERS.iter().any(|m| {
        lower
            .strip_prefix(m)
            .is_some_and(|tail| tail.chars().all(|c| c.is_ascii_digit()))
    })
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.suffix_kind()
            .cmp(&other.suffix_kind())
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// True when both strings parse and `candidate` sorts strictly below
/// `current`.
pub fn is_downgrade(current: &str, candidate: &str) -> bool {
    match (Version::parse(current), Version::parse(candidate)) {
        (Some(cur), Some(cand)) => cand < cur,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tag selection
// ---------------------------------------------------------------------------

/// Picks the "latest" tag out of a tags listing.
pub trait TagSelector {
    fn select(&self, tags: &[String]) -> Option<String>;
}

/// Takes the first listed tag. The GitHub tags endpoint is not sorted by
/// version, so this is a heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstListed;

impl TagSelector for FirstListed {
    fn select(&self, tags: &[String]) -> Option<String> {
        tags.first().cloned()
    }
}

/// Takes the highest tag by `Version` ordering, ignoring tags that do not
/// parse. Falls back to the first listed tag when none parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestVersion;

impl TagSelector for HighestVersion {
    fn select(&self, tags: &[String]) -> Option<String> {
        tags.iter()
            .filter_map(|t| Version::parse(t).map(|v| (v, t)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, t)| t.clone())
            .or_else(|| FirstListed.select(tags))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStrategy {
    #[default]
    FirstListed,
    HighestVersion,
}

impl TagStrategy {
    pub fn selector(self) -> Box<dyn TagSelector + Send + Sync> {
        match self {
            TagStrategy::FirstListed => Box::new(FirstListed),
            TagStrategy::HighestVersion => Box::new(HighestVersion),
        }
    }
}
