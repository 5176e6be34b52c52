use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Size tiers, smallest first. A PR lands in the first tier whose line and
/// file limits it does not exceed; beyond the last tier it scores
/// [`DEFAULT_SIZE_FLOOR`].
pub const DEFAULT_SIZE_BREAKPOINTS: [SizeBreakpoint; 3] = [
    SizeBreakpoint::new(50, 3, 100),
    SizeBreakpoint::new(200, 10, 90),
    SizeBreakpoint::new(500, 20, 70),
];

pub const DEFAULT_SIZE_FLOOR: u32 = 40;

pub const DEFAULT_MIN_REVIEWERS: u32 = 1;

/// Trimmed descriptions shorter than this are reported as brief.
pub const DEFAULT_BRIEF_DESCRIPTION_CHARS: usize = 50;

/// Path-segment tokens, filename affixes and conventional directories that
/// mark a changed file as a test.
pub const DEFAULT_TEST_PATH_PATTERNS: &[&str] = &[
    r"(^|/)(tests?|__tests__|specs?|testing|integration_tests|e2e)/",
    r"(^|/)test_[^/]+$",
    r"_test\.[A-Za-z0-9]+$",
    r"_spec\.[A-Za-z0-9]+$",
    r"\.(test|spec)\.[A-Za-z0-9]+$",
    r"(^|/)[^/]*Tests?\.(java|kt|cs|swift|scala)$",
];

pub const DEFAULT_DOCS_PATH_PATTERNS: &[&str] = &[
    r"(?i)\.(md|markdown|rst|adoc|txt)$",
    r"(?i)(^|/)(docs?|documentation)/",
    r"(^|/)(README|CHANGELOG|CONTRIBUTING|AUTHORS|LICENSE|NOTICE)[^/]*$",
];

pub const DEFAULT_CONFIG_PATH_PATTERNS: &[&str] = &[
    r"(?i)\.(json|ya?ml|toml|ini|cfg|conf|properties|lock|env)$",
    r"(^|/)\.[^/]+$",
    r"(^|/)Dockerfile[^/]*$",
];

pub const DEFAULT_SOURCE_PATH_PATTERNS: &[&str] = &[
    r"(?i)\.(rs|py|js|jsx|mjs|ts|tsx|go|java|kt|kts|scala|rb|c|cc|cpp|h|hpp|cs|swift|php|sh|bash|sql|m|mm|dart|ex|exs|erl|hs|lua|vue|svelte)$",
];

pub const DEFAULT_TESTING_SECTION_PATTERNS: &[&str] = &[
    r"(?im)^\s{0,3}#{1,6}\s*(testing|tests?|test plan|verification)\b",
    r"(?i)\btest plan\b",
    r"(?i)\bhow (was|is) this tested\b",
    r"(?i)\btested (by|with|on|locally)\b",
    r"(?i)\bverified by\b",
];

pub const DEFAULT_TICKET_PATTERNS: &[&str] = &[
    r"\b[A-Z][A-Z0-9]{1,9}-[1-9][0-9]*\b",
    r"(?i)\b(close[sd]?|fix(es|ed)?|resolve[sd]?|refs?)\s+[\w.-]*#[0-9]+\b",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid repository `{0}`, expected OWNER/NAME")]
    InvalidRepository(String),

    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("failed to read config `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid size breakpoints: {0}")]
    InvalidBreakpoints(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct SizeBreakpoint {
    pub max_lines: u64,
    pub max_files: u64,
    pub score: u32,
}

impl SizeBreakpoint {
    pub const fn new(max_lines: u64, max_files: u64, score: u32) -> Self {
        Self {
            max_lines,
            max_files,
            score,
        }
    }
}

/// Scoring knobs. Every field has a default, so a config file only needs to
/// name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    pub min_reviewers: u32,
    pub brief_description_chars: usize,
    pub size_breakpoints: Vec<SizeBreakpoint>,
    pub size_floor: u32,
    pub test_path_patterns: Vec<String>,
    pub docs_path_patterns: Vec<String>,
    pub config_path_patterns: Vec<String>,
    pub source_path_patterns: Vec<String>,
    pub testing_section_patterns: Vec<String>,
    pub ticket_patterns: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        fn owned(patterns: &[&str]) -> Vec<String> {
            patterns.iter().map(|p| p.to_string()).collect()
        }

        Self {
            min_reviewers: DEFAULT_MIN_REVIEWERS,
            brief_description_chars: DEFAULT_BRIEF_DESCRIPTION_CHARS,
            size_breakpoints: DEFAULT_SIZE_BREAKPOINTS.to_vec(),
            size_floor: DEFAULT_SIZE_FLOOR,
            test_path_patterns: owned(DEFAULT_TEST_PATH_PATTERNS),
            docs_path_patterns: owned(DEFAULT_DOCS_PATH_PATTERNS),
            config_path_patterns: owned(DEFAULT_CONFIG_PATH_PATTERNS),
            source_path_patterns: owned(DEFAULT_SOURCE_PATH_PATTERNS),
            testing_section_patterns: owned(DEFAULT_TESTING_SECTION_PATTERNS),
            ticket_patterns: owned(DEFAULT_TICKET_PATTERNS),
        }
    }
}

// Create
impl ScoringConfig {
    pub fn from_config(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json_str).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size_floor > 100 {
            return Err(ConfigError::InvalidBreakpoints(format!(
                "floor {} exceeds 100",
                self.size_floor
            )));
        }
        if self.size_floor == 0 {
            return Err(ConfigError::InvalidBreakpoints("floor must be above 0".into()));
        }
        for pair in self.size_breakpoints.windows(2) {
            let (smaller, larger) = (pair[0], pair[1]);
            if larger.max_lines < smaller.max_lines || larger.max_files < smaller.max_files {
                return Err(ConfigError::InvalidBreakpoints(
                    "breakpoints must be listed smallest first".into(),
                ));
            }
        }
        if let Some(bp) = self.size_breakpoints.iter().find(|bp| bp.score > 100) {
            return Err(ConfigError::InvalidBreakpoints(format!(
                "score {} exceeds 100",
                bp.score
            )));
        }
        Ok(())
    }
}
