//! Glob pattern lists (`templates`, `exclude`, `include`).
//!
//! Serialized form is a `|`-separated string. Each pattern is matched
//! against a content-relative, slash-separated path:
//!
//! | Pattern        | Matches                                   |
//! |----------------|-------------------------------------------|
//! | `drafts/`      | everything inside `drafts` (prefix match) |
//! | `*.txt`        | base name only (no `/` in the pattern)    |
//! | `/posts/*.md`  | full relative path (leading `/` ignored)  |

use globset::{GlobBuilder, GlobMatcher};
use std::fmt;

/// Hidden-file guard that always heads the `exclude` list.
pub const HIDDEN_GUARD: &str = ".*";

#[derive(Clone)]
enum Matcher {
    /// Trailing `/`: directory prefix.
    Prefix(String),
    /// Glob; `basename` when the pattern has no `/`.
    Glob { glob: GlobMatcher, basename: bool },
}

#[derive(Clone)]
struct Pattern {
    source: String,
    matcher: Matcher,
}

/// An ordered, compiled list of glob patterns.
#[derive(Clone, Default)]
pub struct Patterns {
    patterns: Vec<Pattern>,
}

impl Patterns {
    /// Parse a `|`-separated pattern string. Blank entries are ignored.
    pub fn parse(list: &str) -> Result<Self, String> {
        let mut patterns = Vec::new();
        for raw in list.replace('\\', "/").split('|') {
            let source = raw.trim();
            if source.is_empty() {
                continue;
            }
            patterns.push(Pattern::compile(source)?);
        }
        Ok(Self { patterns })
    }

    /// Same as [`Patterns::parse`] with `.*` prepended when absent.
    pub fn parse_with_hidden_guard(list: &str) -> Result<Self, String> {
        let mut parsed = Self::parse(list)?;
        if parsed.patterns.first().is_none_or(|p| p.source != HIDDEN_GUARD) {
            parsed.patterns.insert(0, Pattern::compile(HIDDEN_GUARD)?);
        }
        Ok(parsed)
    }

    /// True when any pattern matches the content-relative path `rel`.
    pub fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(rel))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.source.as_str())
    }
}

impl Pattern {
    fn compile(source: &str) -> Result<Self, String> {
        let matcher = if let Some(dir) = source.strip_suffix('/') {
            Matcher::Prefix(dir.trim_start_matches('/').to_owned())
        } else {
            let basename = !source.contains('/');
            let glob = GlobBuilder::new(source.trim_start_matches('/'))
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|e| format!("illegal pattern: \"{source}\": {e}"))?
                .compile_matcher();
            Matcher::Glob { glob, basename }
        };
        Ok(Self {
            source: source.to_owned(),
            matcher,
        })
    }

    fn matches(&self, rel: &str) -> bool {
        match &self.matcher {
            Matcher::Prefix(dir) => {
                rel == dir || rel.strip_prefix(dir.as_str()).is_some_and(|r| r.starts_with('/'))
            }
            Matcher::Glob { glob, basename } => {
                let target = if *basename {
                    rel.rsplit('/').next().unwrap_or(rel)
                } else {
                    rel
                };
                glob.is_match(target)
            }
        }
    }
}

impl PartialEq for Patterns {
    fn eq(&self, other: &Self) -> bool {
        self.sources().eq(other.sources())
    }
}

impl fmt::Debug for Patterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sources()).finish()
    }
}

impl fmt::Display for Patterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sources().collect::<Vec<_>>().join("|"))
    }
}
