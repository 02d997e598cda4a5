//! Inclusion/exclusion glob patterns for bundle manifests
//!
//! A bundle's pattern list is an ordered sequence of globs. A leading `!`
//! marks an exclusion. The net membership of a literal path is decided by the
//! last pattern in declaration order that matches it.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use log::debug;

/// Prefix marking an exclusion pattern in a manifest.
pub const NEGATION: char = '!';

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// `*` never crosses a directory separator and does not match dotfiles.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Match a path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches_with(path, MATCH_OPTIONS))
}

/// Check whether `path` lies under the directory `dir`.
///
/// An empty `dir` (or `.`) contains every path.
pub fn is_within(path: &str, dir: &str) -> bool {
    let dir = dir.trim_start_matches("./").trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        return true;
    }
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}

/// Whether a pattern includes or excludes the paths it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Include,
    Exclude,
}

/// One entry of a bundle's pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePattern {
    glob: String,
    verdict: Verdict,
}

impl BundlePattern {
    /// Parse a raw manifest entry, stripping the negation sigil if present.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(NEGATION) {
            Some(glob) => Self {
                glob: glob.to_string(),
                verdict: Verdict::Exclude,
            },
            None => Self {
                glob: raw.to_string(),
                verdict: Verdict::Include,
            },
        }
    }

    /// The glob without its negation sigil.
    pub fn glob(&self) -> &str {
        &self.glob
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn is_exclusion(&self) -> bool {
        self.verdict == Verdict::Exclude
    }

    /// A pattern without wildcards names exactly one path.
    pub fn is_literal(&self) -> bool {
        !self.glob.contains(WILDCARDS)
    }

    /// Test a literal path against this pattern.
    ///
    /// A malformed glob matches nothing.
    pub fn matches(&self, path: &str) -> bool {
        match glob_match(&self.glob, path) {
            Ok(matched) => matched,
            Err(e) => {
                debug!("Ignoring malformed pattern {:?}: {}", self.glob, e);
                false
            }
        }
    }

    /// The fixed directory prefix in front of the first wildcard.
    ///
    /// `src/lib/*.js` is rooted at `src/lib`, `*.js` at the repository root
    /// (the empty string). Literal patterns are rooted at their parent.
    pub fn root_dir(&self) -> &str {
        let fixed = match self.glob.find(WILDCARDS) {
            Some(index) => &self.glob[..index],
            None => self.glob.as_str(),
        };
        match fixed.rfind('/') {
            Some(index) => &fixed[..index],
            None => "",
        }
    }
}

/// Ordered pattern list of one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternList {
    patterns: Vec<BundlePattern>,
}

impl PatternList {
    pub fn new(patterns: Vec<BundlePattern>) -> Self {
        Self { patterns }
    }

    /// Build a list from raw manifest entries, keeping declaration order.
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Self {
        Self::new(raw.iter().map(|p| BundlePattern::parse(p.as_ref())).collect())
    }

    pub fn patterns(&self) -> &[BundlePattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Verdict of the last pattern matching `path`, if any matches.
    pub fn verdict(&self, path: &str) -> Option<Verdict> {
        self.patterns
            .iter()
            .rev()
            .find(|pattern| pattern.matches(path))
            .map(BundlePattern::verdict)
    }

    /// Net membership of a literal path: the last match must be an inclusion.
    pub fn includes(&self, path: &str) -> bool {
        self.verdict(path) == Some(Verdict::Include)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.js", "app.js").unwrap());
        assert!(glob_match("src/*.js", "src/app.js").unwrap());
        assert!(!glob_match("*.js", "app.css").unwrap());
        assert!(glob_match("src/**/*.js", "src/lib/util.js").unwrap());
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        assert!(!glob_match("src/*.js", "src/lib/util.js").unwrap());
        assert!(!glob_match("*.js", "src/app.js").unwrap());
    }

    #[test]
    fn test_malformed_pattern_matches_nothing() {
        assert!(glob_match("src/**b.js", "src/b.js").is_err());
        let pattern = BundlePattern::parse("src/**b.js");
        assert!(!pattern.matches("src/b.js"));
        assert!(!pattern.matches("src/**b.js"));
    }

    #[test]
    fn test_parse_negation() {
        let include = BundlePattern::parse("src/*.js");
        assert_eq!(include.verdict(), Verdict::Include);
        assert_eq!(include.glob(), "src/*.js");

        let exclude = BundlePattern::parse("!src/skip.js");
        assert!(exclude.is_exclusion());
        assert_eq!(exclude.glob(), "src/skip.js");
    }

    #[test]
    fn test_is_literal() {
        assert!(BundlePattern::parse("src/app.js").is_literal());
        assert!(BundlePattern::parse("!src/app.js").is_literal());
        assert!(!BundlePattern::parse("src/*.js").is_literal());
        assert!(!BundlePattern::parse("src/?.js").is_literal());
        assert!(!BundlePattern::parse("src/[ab].js").is_literal());
    }

    #[test]
    fn test_root_dir() {
        assert_eq!(BundlePattern::parse("src/lib/*.js").root_dir(), "src/lib");
        assert_eq!(BundlePattern::parse("*.js").root_dir(), "");
        assert_eq!(BundlePattern::parse("src/a*/b.js").root_dir(), "src");
        assert_eq!(BundlePattern::parse("src/**/*.js").root_dir(), "src");
        assert_eq!(BundlePattern::parse("src/app.js").root_dir(), "src");
    }

    #[test]
    fn test_last_match_wins() {
        let list = PatternList::from_raw(&["src/*.js", "!src/skip.js"]);
        assert!(list.includes("src/a.js"));
        assert!(!list.includes("src/skip.js"));
        assert_eq!(list.verdict("src/skip.js"), Some(Verdict::Exclude));
        assert_eq!(list.verdict("lib/a.js"), None);

        // A later inclusion overrides an earlier exclusion
        let list = PatternList::from_raw(&["src/*.js", "!src/skip.js", "src/skip.js"]);
        assert!(list.includes("src/skip.js"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("static/app.js", "static"));
        assert!(is_within("static/js/app.js", "static/"));
        assert!(is_within("static/app.js", "./static"));
        assert!(!is_within("statics/app.js", "static"));
        assert!(!is_within("static", "static"));
        assert!(is_within("anything.js", ""));
    }
}
