//! User-pluggable behaviour: how participant paths are turned into
//! identifiers, and which files of a submission are sent.
//!
//! The core only ever sees the two traits. Turning the names from the
//! configuration into trait objects is done by [`resolve`], which knows the
//! built-in `default` entries and the declarative definitions of a
//! functions file.

use crate::config::{JobConfig, DEFAULT_FILTER, DEFAULT_FORMATTER};
use crate::error::Error;
use glob::Pattern;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub trait IdentifierFormatter {
    /// Identifier for a participant's submission directory.
    fn format(&self, submission: &Path) -> String;
}

pub trait SubmissionFilter {
    /// Whether `file` (somewhere under `submission`) should be sent.
    fn include(&self, submission: &Path, file: &Path) -> bool;
}

/// Replaces path separators with underscores.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnderscoreFormatter;

impl IdentifierFormatter for UnderscoreFormatter {
    fn format(&self, submission: &Path) -> String {
        replace_separators(&submission.to_string_lossy(), "_")
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl SubmissionFilter for AcceptAll {
    fn include(&self, _submission: &Path, _file: &Path) -> bool {
        true
    }
}

fn replace_separators(path: &str, separator: &str) -> String {
    path.trim_end_matches(['/', '\\'])
        .replace(['/', '\\'], separator)
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatterRule {
    #[serde(default)]
    pub strip_prefix: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub drop_suffix: bool,
}

fn default_separator() -> String {
    "_".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRule {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FunctionsFile {
    #[serde(default)]
    pub formatters: HashMap<String, FormatterRule>,
    #[serde(default)]
    pub filters: HashMap<String, FilterRule>,
}

impl FunctionsFile {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

pub struct RuleFormatter {
    rule: FormatterRule,
    delimiter: String,
}

impl RuleFormatter {
    pub fn new(rule: FormatterRule, delimiter: &str) -> Self {
        Self {
            rule,
            delimiter: delimiter.to_string(),
        }
    }
}

impl IdentifierFormatter for RuleFormatter {
    fn format(&self, submission: &Path) -> String {
        let full = submission.to_string_lossy();
        let mut text: &str = &full;
        if let Some(prefix) = &self.rule.strip_prefix {
            text = text.strip_prefix(prefix.as_str()).unwrap_or(text);
        }
        let mut text = replace_separators(text, &self.rule.separator);
        if self.rule.drop_suffix {
            // only the last component carries a submission number
            let last_start = text
                .rfind(self.rule.separator.as_str())
                .map(|i| i + self.rule.separator.len())
                .unwrap_or(0);
            if let Some(pos) = text[last_start..].find(self.delimiter.as_str()) {
                text.truncate(last_start + pos);
            }
        }
        text
    }
}

pub struct GlobFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl GlobFilter {
    pub fn new(rule: &FilterRule) -> Result<Self, Error> {
        let compile = |globs: &[String]| -> Result<Vec<Pattern>, Error> {
            globs
                .iter()
                .map(|g| Pattern::new(g).map_err(Error::from))
                .collect()
        };
        Ok(Self {
            include: compile(&rule.include)?,
            exclude: compile(&rule.exclude)?,
        })
    }

    fn matches(patterns: &[Pattern], relative: &Path) -> bool {
        let name = relative.file_name().map(Path::new);
        patterns.iter().any(|p| {
            p.matches_path(relative) || name.map_or(false, |n| p.matches_path(n))
        })
    }
}

impl SubmissionFilter for GlobFilter {
    fn include(&self, submission: &Path, file: &Path) -> bool {
        let relative = file.strip_prefix(submission).unwrap_or(file);
        if Self::matches(&self.exclude, relative) {
            return false;
        }
        self.include.is_empty() || Self::matches(&self.include, relative)
    }
}

pub struct Strategies {
    pub formatter: Box<dyn IdentifierFormatter>,
    pub filter: Box<dyn SubmissionFilter>,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            formatter: Box::new(UnderscoreFormatter),
            filter: Box::new(AcceptAll),
        }
    }
}

/// Look up the formatter and filter the configuration names.
pub fn resolve(config: &JobConfig) -> Result<Strategies, Error> {
    let functions = match &config.functions_file {
        Some(path) => FunctionsFile::load(path)?,
        None => FunctionsFile::default(),
    };

    let formatter: Box<dyn IdentifierFormatter> = if config.formatter == DEFAULT_FORMATTER
        && !functions.formatters.contains_key(DEFAULT_FORMATTER)
    {
        Box::new(UnderscoreFormatter)
    } else {
        let rule = functions.formatters.get(&config.formatter).ok_or_else(|| {
            Error::Invalid(format!("formatter '{}' is not defined", config.formatter))
        })?;
        Box::new(RuleFormatter::new(rule.clone(), &config.submission_delimiter))
    };

    let filter: Box<dyn SubmissionFilter> = if config.filter == DEFAULT_FILTER
        && !functions.filters.contains_key(DEFAULT_FILTER)
    {
        Box::new(AcceptAll)
    } else {
        let rule = functions
            .filters
            .get(&config.filter)
            .ok_or_else(|| Error::Invalid(format!("filter '{}' is not defined", config.filter)))?;
        Box::new(GlobFilter::new(rule)?)
    };

    Ok(Strategies { formatter, filter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_default_formatter() {
        let f = UnderscoreFormatter;
        assert_eq!(f.format(Path::new("hw1/alice.3/")), "hw1_alice.3");
        assert_eq!(f.format(Path::new("hw1\\bob")), "hw1_bob");
    }

    #[test]
    fn test_rule_formatter_strip_and_drop_suffix() {
        let rule = FormatterRule {
            strip_prefix: Some("/srv/course/".to_string()),
            separator: "-".to_string(),
            drop_suffix: true,
        };
        let f = RuleFormatter::new(rule, ".");
        assert_eq!(f.format(Path::new("/srv/course/hw1/alice.3")), "hw1-alice");
        assert_eq!(f.format(Path::new("/srv/course/hw1.old/bob")), "hw1.old-bob");
    }

    #[test]
    fn test_glob_filter() {
        let rule = FilterRule {
            include: vec!["*.c".to_string()],
            exclude: vec!["test_*".to_string()],
        };
        let filter = GlobFilter::new(&rule).unwrap();
        let sub = PathBuf::from("/b/alice.1");
        assert!(filter.include(&sub, &sub.join("main.c")));
        assert!(filter.include(&sub, &sub.join("src/util.c")));
        assert!(!filter.include(&sub, &sub.join("src/test_util.c")));
        assert!(!filter.include(&sub, &sub.join("notes.txt")));
    }

    #[test]
    fn test_resolve_defaults() {
        let tmp = tempdir().unwrap();
        let config = JobConfig::new(tmp.path());
        let strategies = resolve(&config).unwrap();
        assert_eq!(strategies.formatter.format(Path::new("a/b")), "a_b");
        assert!(strategies.filter.include(Path::new("a"), Path::new("a/x")));
    }

    #[test]
    fn test_resolve_from_functions_file() {
        let tmp = tempdir().unwrap();
        let functions = tmp.path().join("functions.toml");
        std::fs::write(
            &functions,
            "[formatters.short]\ndrop_suffix = true\n\n[filters.sources]\ninclude = [\"*.c\"]\n",
        )
        .unwrap();

        let mut config = JobConfig::new(tmp.path());
        config.functions_file = Some(functions);
        config.formatter = "short".to_string();
        config.filter = "sources".to_string();

        let strategies = resolve(&config).unwrap();
        assert_eq!(strategies.formatter.format(Path::new("hw/carol.7")), "hw_carol");
        assert!(!strategies
            .filter
            .include(Path::new("hw/carol.7"), Path::new("hw/carol.7/a.txt")));

        config.filter = "missing".to_string();
        assert!(matches!(resolve(&config), Err(Error::Invalid(_))));
    }
}
