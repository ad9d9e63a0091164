//! Decides whether a hostname is in scope for a provider instance.
//!
//! Patterns are compiled once at construction, either from glob syntax
//! (`*` crosses dots, `?` matches a single non-dot character, `[set]` is
//! passed through to the underlying regex engine) or from regex syntax used
//! verbatim. Matching itself never fails.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("invalid domain pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Which syntax a [`Matcher`]'s patterns are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    Glob,
    Regex,
}

/// Compiled include/exclude pattern set for one provider instance.
#[derive(Debug, Clone)]
pub struct Matcher {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl Matcher {
    /// Compiles `includes`/`excludes` under the given syntax. Fails on the
    /// first pattern that does not compile.
    pub fn new(
        includes: &[String],
        excludes: &[String],
        syntax: PatternSyntax,
    ) -> Result<Self, MatcherError> {
        let includes = includes
            .iter()
            .map(|p| compile_pattern(p, syntax))
            .collect::<Result<Vec<_>, _>>()?;
        let excludes = excludes
            .iter()
            .map(|p| compile_pattern(p, syntax))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Matcher { includes, excludes })
    }

    /// `true` iff `hostname` is accepted: not excluded, and matches at least
    /// one include pattern. Lowercases the input before testing.
    pub fn matches(&self, hostname: &str) -> bool {
        let lower = hostname.to_lowercase();
        if self.excludes.iter().any(|re| re.is_match(&lower)) {
            return false;
        }
        self.includes.iter().any(|re| re.is_match(&lower))
    }
}

fn compile_pattern(raw: &str, syntax: PatternSyntax) -> Result<Regex, MatcherError> {
    let pattern = match syntax {
        PatternSyntax::Glob => glob_to_regex(raw),
        PatternSyntax::Regex => raw.to_string(),
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| MatcherError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Translates a domain glob into an anchored regex:
/// - `*` → `.*` (crosses dots — subdomain-spanning)
/// - `?` → `[^.]`
/// - `[set]` preserved verbatim
/// - literal `.` escaped
/// - every other character passed through [`regex::escape`]
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push_str("[^.]"),
            '.' => out.push_str("\\."),
            '[' => {
                out.push('[');
                for nc in chars.by_ref() {
                    out.push(nc);
                    if nc == ']' {
                        break;
                    }
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
