//! Policy pattern matching.
//!
//! A pattern is literal text with a `*` wildcard. Only the first `*` expands to
//! `.*`; any later `*` is matched literally. Host patterns are prefix matches
//! with an optional `http://` or `https://` scheme in front.

use crate::error::{ComplianceError, Result};
use regex::Regex;
use tracing::warn;

/// What a compiled pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Whole cookie name or storage key
    Name,
    /// Prefix of a URL, scheme optional
    Host,
}

/// A compiled policy pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    regex: Regex,
}

impl Matcher {
    /// Whether `candidate` (an item id, or a rewritten URL for hosts) matches.
    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The pattern as written in the policy.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn expand_wildcard(pattern: &str) -> String {
    regex::escape(pattern).replacen(r"\*", ".*", 1)
}

/// Compile a policy pattern into a [`Matcher`].
pub fn compile(pattern: &str, kind: PatternKind) -> Result<Matcher> {
    let body = expand_wildcard(pattern);
    let source = match kind {
        PatternKind::Name => format!("^{body}$"),
        PatternKind::Host => format!("^(https?://)?{body}.*$"),
    };
    let regex = Regex::new(&source).map_err(|source| ComplianceError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(Matcher {
        pattern: pattern.to_string(),
        regex,
    })
}

fn matches(pattern: &str, kind: PatternKind, candidate: &str) -> bool {
    match compile(pattern, kind) {
        Ok(matcher) => matcher.is_match(candidate),
        Err(e) => {
            warn!(error = %e, "pattern treated as non-matching");
            false
        }
    }
}

/// Whether `candidate` is fully matched by the name pattern.
#[must_use]
pub fn matches_name(pattern: &str, candidate: &str) -> bool {
    matches(pattern, PatternKind::Name, candidate)
}

/// Whether `candidate` starts with the host pattern, scheme optional.
#[must_use]
pub fn matches_host(pattern: &str, candidate: &str) -> bool {
    matches(pattern, PatternKind::Host, candidate)
}

/// Replace the first occurrence of `main_url` in `url` by `substitution`.
///
/// Policy host patterns are written against the canonical domain, so URLs
/// scanned on another environment are mapped onto it before host matching.
#[must_use]
pub fn rewrite_url(url: &str, main_url: &str, substitution: &str) -> String {
    if url.contains(main_url) {
        url.replacen(main_url, substitution, 1)
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_wildcard_suffix() {
        assert!(matches_name("_ga*", "_ga_ABC123"));
        assert!(matches_name("_ga*", "_ga"));
        assert!(!matches_name("_ga*", "other_ga"));
    }

    #[test]
    fn test_name_is_fully_anchored() {
        assert!(matches_name("SSESS", "SSESS"));
        assert!(!matches_name("SSESS", "SSESS123"));
        assert!(!matches_name("SSESS", "xSSESS"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert!(matches_name("a.b", "a.b"));
        assert!(!matches_name("a.b", "axb"));
        assert!(matches_name("hds(1)", "hds(1)"));
        assert!(matches_name("cache/v1+", "cache/v1+"));
    }

    #[test]
    fn test_host_prefix_match() {
        assert!(matches_host("*.hel.fi", "https://www.hel.fi/fi/page"));
        assert!(!matches_host("*.hel.fi", "https://evil.com/hel.fi"));
        assert!(matches_host("www.hel.fi", "www.hel.fi/fi"));
        assert!(matches_host("www.hel.fi", "http://www.hel.fi"));
        assert!(!matches_host("www.hel.fi", "ftp://www.hel.fi"));
    }

    #[test]
    fn test_only_first_wildcard_expands() {
        // Later stars stay literal.
        assert!(matches_name("a*b*", "axxb*"));
        assert!(!matches_name("a*b*", "axxbyy"));
        assert!(matches_name("*_*", "x_*"));
        assert!(!matches_name("*_*", "x_y"));
    }

    #[test]
    fn test_compile_keeps_source_pattern() {
        let matcher = compile("_hj*", PatternKind::Name).unwrap();
        assert_eq!(matcher.pattern(), "_hj*");
        assert!(matcher.is_match("_hjSession"));
    }

    #[test]
    fn test_rewrite_url() {
        assert_eq!(
            rewrite_url(
                "https://avustukset.dev.hel.ninja/fi/avustukset/haku",
                "https://avustukset.dev.hel.ninja/fi/avustukset",
                "https://www.hel.fi/fi/avustukset",
            ),
            "https://www.hel.fi/fi/avustukset/haku"
        );
        assert_eq!(
            rewrite_url("https://other.fi/", "https://www.hel.fi", "https://x.fi"),
            "https://other.fi/"
        );
    }
}
