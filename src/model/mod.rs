mod config;
mod pull_request;
mod repository;
mod score;
mod window;

pub use config::{
    ConfigError, ScoringConfig, SizeBreakpoint, DEFAULT_BRIEF_DESCRIPTION_CHARS,
    DEFAULT_CONFIG_PATH_PATTERNS, DEFAULT_DOCS_PATH_PATTERNS, DEFAULT_MIN_REVIEWERS,
    DEFAULT_SIZE_BREAKPOINTS, DEFAULT_SIZE_FLOOR, DEFAULT_SOURCE_PATH_PATTERNS,
    DEFAULT_TESTING_SECTION_PATTERNS, DEFAULT_TEST_PATH_PATTERNS, DEFAULT_TICKET_PATTERNS,
};
pub use pull_request::{Caveat, CiStatus, PrKey, PullRequestRecord};
pub use repository::{RepoId, RepoScope};
pub use score::{composite_score, Category, CategoryScore, Grade, Issue, ScoredPR, Severity};
pub use window::{parse_date, DateWindow, DateWindowResolver, FISCAL_YEAR_START_MONTH};
