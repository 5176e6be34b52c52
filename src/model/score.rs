use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Caveat, PrKey, PullRequestRecord};

/// One of the five weighted quality dimensions.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Description,
    Testing,
    Size,
    Review,
    Traceability,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Description,
        Category::Testing,
        Category::Size,
        Category::Review,
        Category::Traceability,
    ];

    /// Percentage weight of the category in the composite score.
    pub const fn weight(self) -> u32 {
        match self {
            Category::Description => 25,
            Category::Testing => 25,
            Category::Size => 20,
            Category::Review => 20,
            Category::Traceability => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Description => "description",
            Category::Testing => "testing",
            Category::Size => "size",
            Category::Review => "review",
            Category::Traceability => "traceability",
        }
    }
}

const fn total_weight() -> u32 {
    let mut total = 0;
    let mut i = 0;
    while i < Category::ALL.len() {
        total += Category::ALL[i].weight();
        i += 1;
    }
    total
}

const _: () = assert!(total_weight() == 100, "category weights must sum to 100");

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    /// Always within `0..=100`.
    pub raw_score: u32,
    pub weight: u32,
}

impl CategoryScore {
    pub fn new(category: Category, raw_score: u32) -> Self {
        Self {
            category,
            raw_score: raw_score.min(100),
            weight: category.weight(),
        }
    }
}

/// Weighted sum of the category scores divided by 100. Integer arithmetic
/// keeps the result exact to two decimals.
pub fn composite_score(scores: &[CategoryScore]) -> f64 {
    let weighted: u32 = scores.iter().map(|s| s.raw_score * s.weight).sum();
    f64::from(weighted) / 100.0
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::F];

    /// Thresholds are inclusive lower bounds.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn range(self) -> &'static str {
        match self {
            Grade::A => "90-100",
            Grade::B => "80-89",
            Grade::C => "70-79",
            Grade::D => "60-69",
            Grade::F => "<60",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Moderate,
    Minor,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Critical => "CRITICAL",
            Severity::Moderate => "MODERATE",
            Severity::Minor => "MINOR",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: Category,
    /// Stable text; frequency counting keys on it.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, category: Category, description: impl ToString) -> Self {
        Self {
            severity,
            category,
            description: description.to_string(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.description)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Immutable scoring result for one pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPR {
    pub record: PullRequestRecord,
    pub category_scores: Vec<CategoryScore>,
    pub composite_score: f64,
    pub grade: Grade,
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<Caveat>,
}

impl ScoredPR {
    pub fn key(&self) -> PrKey {
        self.record.key()
    }

    pub fn raw_score(&self, category: Category) -> u32 {
        self.category_scores
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.raw_score)
            .unwrap_or(0)
    }

    pub fn has_critical_issue(&self) -> bool {
        self.issues.iter().any(Issue::is_critical)
    }
}
