use regex::Regex;
use std::collections::BTreeSet;

use crate::model::{ConfigError, ScoringConfig};

/// A list of compiled regexes matched as a union.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern.as_ref()).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    /// Every distinct matched substring, trimmed.
    pub fn find_all(&self, text: &str) -> BTreeSet<String> {
        self.patterns
            .iter()
            .flat_map(|re| re.find_iter(text))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum FileKind {
    Test,
    Docs,
    Config,
    Source,
    Other,
}

/// Buckets changed paths. Test patterns win over everything else, so
/// `tests/fixtures/data.json` is a test file, not config.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    test: PatternSet,
    docs: PatternSet,
    config: PatternSet,
    source: PatternSet,
}

impl FileClassifier {
    pub fn from_config(config: &ScoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            test: PatternSet::new(&config.test_path_patterns)?,
            docs: PatternSet::new(&config.docs_path_patterns)?,
            config: PatternSet::new(&config.config_path_patterns)?,
            source: PatternSet::new(&config.source_path_patterns)?,
        })
    }

    pub fn classify(&self, path: &str) -> FileKind {
        let path = path.replace('\\', "/");
        if self.test.is_match(&path) {
            FileKind::Test
        } else if self.docs.is_match(&path) {
            FileKind::Docs
        } else if self.config.is_match(&path) {
            FileKind::Config
        } else if self.source.is_match(&path) {
            FileKind::Source
        } else {
            FileKind::Other
        }
    }

    pub fn has_test_files<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        paths
            .iter()
            .any(|path| self.classify(path.as_ref()) == FileKind::Test)
    }

    /// Whether any non-test source file changed.
    pub fn touches_source<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        paths
            .iter()
            .any(|path| self.classify(path.as_ref()) == FileKind::Source)
    }
}

/// All text heuristics compiled from one [`ScoringConfig`].
#[derive(Debug, Clone)]
pub struct Heuristics {
    pub files: FileClassifier,
    pub testing_section: PatternSet,
    pub tickets: PatternSet,
}

impl Heuristics {
    pub fn from_config(config: &ScoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            files: FileClassifier::from_config(config)?,
            testing_section: PatternSet::new(&config.testing_section_patterns)?,
            tickets: PatternSet::new(&config.ticket_patterns)?,
        })
    }

    pub fn has_testing_section(&self, description: &str) -> bool {
        self.testing_section.is_match(description)
    }

    pub fn ticket_refs(&self, title: &str, description: &str) -> BTreeSet<String> {
        let mut refs = self.tickets.find_all(title);
        refs.extend(self.tickets.find_all(description));
        refs
    }
}
