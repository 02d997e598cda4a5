//! # Terminal Output
//!
//! Rendering helpers for the `bundle-publish` commands. Colors follow the
//! usual conventions:
//!
//! - `--color=never|always|auto` on the command line;
//! - `NO_COLOR` (any value) or `CLICOLOR=0` disable colors;
//! - `CLICOLOR_FORCE=1` forces colors even when stdout is not a terminal;
//! - `TERM=dumb` disables colors.

use crate::diff::{ChangeKind, DiffSet};
use console::style;
use std::env;

/// Whether styled output should be produced.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag against the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji` with colors enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// One-letter marker of a change, in the style of `git status --short`.
pub fn marker(kind: ChangeKind) -> char {
    match kind {
        ChangeKind::Added => 'A',
        ChangeKind::Modified => 'M',
        ChangeKind::Deleted => 'D',
        ChangeKind::Affected => '~',
    }
}

/// One line per entry: marker, then path.
pub fn render_diff(config: &OutputConfig, diff: &DiffSet) -> Vec<String> {
    diff.iter()
        .map(|(path, kind)| {
            let mark = marker(kind).to_string();
            if !config.use_color {
                return format!("{} {}", mark, path);
            }
            let mark = match kind {
                ChangeKind::Added => style(mark).green(),
                ChangeKind::Modified | ChangeKind::Affected => style(mark).yellow(),
                ChangeKind::Deleted => style(mark).red(),
            };
            format!("{} {}", mark.force_styling(true), path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_flags() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "📦", "[PKG]"), "📦");
        assert_eq!(emoji(&OutputConfig::without_color(), "📦", "[PKG]"), "[PKG]");
    }

    #[test]
    fn test_render_diff_plain() {
        let diff: DiffSet = [
            ("app.js", ChangeKind::Affected),
            ("old.js", ChangeKind::Deleted),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            render_diff(&OutputConfig::without_color(), &diff),
            vec!["~ app.js", "D old.js"]
        );
    }

    #[test]
    fn test_render_diff_colored_keeps_path() {
        let diff: DiffSet = [("app.js", ChangeKind::Added)].into_iter().collect();
        let lines = render_diff(&OutputConfig::with_color(), &diff);
        assert!(lines[0].contains("\u{1b}["));
        assert!(lines[0].ends_with(" app.js"));
    }
}
