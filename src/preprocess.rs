//! Content preprocessors applied to text leaves before concatenation
//!
//! A [`Pipeline`] maps a file extension (without the dot) to an ordered list
//! of preprocessor names. The map comes from the `preprocessors` key of a
//! repository's publish config, or [`default_map`] when absent. Unknown names
//! are skipped and a failing step leaves the content as it was.

use crate::error::Result;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A named transformation of one text leaf.
pub trait Preprocessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, filename: &str, content: String) -> Result<String>;
}

/// Removes a leading UTF-8 byte order mark.
pub struct StripBom;

impl Preprocessor for StripBom {
    fn name(&self) -> &str {
        "strip-bom"
    }

    fn process(&self, _filename: &str, content: String) -> Result<String> {
        Ok(match content.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => content,
        })
    }
}

/// Removes trailing spaces and tabs from every line.
pub struct TrimTrailingWhitespace;

impl Preprocessor for TrimTrailingWhitespace {
    fn name(&self) -> &str {
        "trim-trailing-whitespace"
    }

    fn process(&self, _filename: &str, content: String) -> Result<String> {
        let trimmed: Vec<&str> = content
            .split('\n')
            .map(|line| line.trim_end_matches([' ', '\t']))
            .collect();
        Ok(trimmed.join("\n"))
    }
}

/// Terminates the content with exactly one newline.
pub struct EnsureNewline;

impl Preprocessor for EnsureNewline {
    fn name(&self) -> &str {
        "ensure-newline"
    }

    fn process(&self, _filename: &str, content: String) -> Result<String> {
        let mut content = content.trim_end_matches('\n').to_string();
        content.push('\n');
        Ok(content)
    }
}

/// Look up a built-in preprocessor by name.
pub fn builtin(name: &str) -> Option<Arc<dyn Preprocessor>> {
    match name {
        "strip-bom" => Some(Arc::new(StripBom)),
        "trim-trailing-whitespace" => Some(Arc::new(TrimTrailingWhitespace)),
        "ensure-newline" => Some(Arc::new(EnsureNewline)),
        _ => None,
    }
}

/// Preprocessor names used when a repository configures none.
pub fn default_map() -> BTreeMap<String, Vec<String>> {
    ["js", "css"]
        .into_iter()
        .map(|ext| (ext.to_string(), vec!["strip-bom".to_string()]))
        .collect()
}

/// Extension-keyed chains of preprocessors.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: BTreeMap<String, Vec<Arc<dyn Preprocessor>>>,
}

impl Pipeline {
    /// A pipeline that leaves every leaf untouched.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a pipeline from a configured name map.
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut pipeline = Self::empty();
        for (ext, names) in map {
            for name in names {
                match builtin(name) {
                    Some(step) => pipeline.push(ext, step),
                    None => debug!("Skipping unknown preprocessor {} for .{} files", name, ext),
                }
            }
        }
        pipeline
    }

    /// Append a step to the chain of `ext`.
    pub fn push(&mut self, ext: &str, step: Arc<dyn Preprocessor>) {
        self.steps.entry(ext.to_string()).or_default().push(step);
    }

    /// Run every step registered for the extension of `filename`.
    pub fn run(&self, filename: &str, content: String) -> String {
        let Some(steps) = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.steps.get(ext))
        else {
            return content;
        };

        let mut content = content;
        for step in steps {
            match step.process(filename, content.clone()) {
                Ok(processed) => content = processed,
                Err(e) => warn!("Preprocessor {} failed on {}: {}", step.name(), filename, e),
            }
        }
        content
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: BTreeMap<&str, Vec<&str>> = self
            .steps
            .iter()
            .map(|(ext, steps)| (ext.as_str(), steps.iter().map(|s| s.name()).collect()))
            .collect();
        f.debug_struct("Pipeline").field("steps", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Failing;

    impl Preprocessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn process(&self, _filename: &str, _content: String) -> Result<String> {
            Err(Error::Config {
                message: "boom".to_string(),
            })
        }
    }

    fn map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(ext, names)| (ext.to_string(), names.iter().map(|n| n.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_builtins() {
        let bom = StripBom.process("a.js", "\u{feff}x".to_string()).unwrap();
        assert_eq!(bom, "x");

        let trimmed = TrimTrailingWhitespace
            .process("a.js", "a  \nb\t\n".to_string())
            .unwrap();
        assert_eq!(trimmed, "a\nb\n");

        assert_eq!(EnsureNewline.process("a.js", "a".to_string()).unwrap(), "a\n");
        assert_eq!(EnsureNewline.process("a.js", "a\n\n".to_string()).unwrap(), "a\n");
    }

    #[test]
    fn test_pipeline_applies_by_extension() {
        let pipeline = Pipeline::from_map(&map(&[("js", &["trim-trailing-whitespace", "ensure-newline"])]));
        assert_eq!(pipeline.run("src/a.js", "x  ".to_string()), "x\n");
        assert_eq!(pipeline.run("src/a.css", "x  ".to_string()), "x  ");
        assert_eq!(pipeline.run("Makefile", "x  ".to_string()), "x  ");
    }

    #[test]
    fn test_unknown_preprocessor_is_skipped() {
        let pipeline = Pipeline::from_map(&map(&[("js", &["coffee", "ensure-newline"])]));
        assert_eq!(pipeline.run("a.js", "x".to_string()), "x\n");
    }

    #[test]
    fn test_failing_step_is_not_fatal() {
        let mut pipeline = Pipeline::empty();
        pipeline.push("js", Arc::new(Failing));
        pipeline.push("js", Arc::new(EnsureNewline));
        assert_eq!(pipeline.run("a.js", "x".to_string()), "x\n");
    }

    #[test]
    fn test_default_map_strips_bom() {
        let pipeline = Pipeline::from_map(&default_map());
        assert_eq!(pipeline.run("a.js", "\u{feff}x".to_string()), "x");
        assert_eq!(pipeline.run("a.txt", "\u{feff}x".to_string()), "\u{feff}x");
    }
}
