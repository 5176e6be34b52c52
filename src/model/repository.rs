use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::model::ConfigError;

/// `owner/name` identifier of a hosted repository.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

// Create
impl RepoId {
    pub fn new(owner: impl ToString, name: impl ToString) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    /// Extracts `owner/name` from a clone URL such as
    /// `git@host:owner/name.git`, `ssh://git@host:2222/owner/name.git` or
    /// `https://host/owner/name`.
    pub fn from_remote_url(url: &str) -> Option<Self> {
        static REMOTE: OnceLock<Regex> = OnceLock::new();
        let re = REMOTE.get_or_init(|| {
            Regex::new(r"(?:[:/])([^/:]+)/([^/]+?)(?:\.git)?/?$").expect("valid remote regex")
        });
        let captures = re.captures(url.trim())?;
        Some(Self::new(&captures[1], &captures[2]))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

// Parser
impl FromStr for RepoId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((owner, name)) = s.trim().split_once('/') else {
            return Err(ConfigError::InvalidRepository(s.to_string()));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidRepository(s.to_string()));
        }
        Ok(Self::new(owner, name))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Which repositories a collection run covers.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "repository", rename_all = "snake_case")]
pub enum RepoScope {
    /// Every repository the credentials can see.
    #[default]
    All,
    Single(RepoId),
}

impl RepoScope {
    pub fn contains(&self, repo: &RepoId) -> bool {
        match self {
            RepoScope::All => true,
            RepoScope::Single(id) => id == repo,
        }
    }
}

impl fmt::Display for RepoScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoScope::All => write!(f, "All repositories"),
            RepoScope::Single(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_owner_and_name() {
        let repo: RepoId = "platform/billing".parse().unwrap();
        assert_eq!(repo, RepoId::new("platform", "billing"));
        assert_eq!(repo.to_string(), "platform/billing");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!("billing".parse::<RepoId>().is_err());
        assert!("/billing".parse::<RepoId>().is_err());
        assert!("platform/".parse::<RepoId>().is_err());
        assert!("a/b/c".parse::<RepoId>().is_err());
    }

    #[test]
    fn extracts_repo_from_remote_urls() {
        let expected = Some(RepoId::new("platform", "billing"));
        assert_eq!(RepoId::from_remote_url("git@git.example.com:platform/billing.git"), expected);
        assert_eq!(
            RepoId::from_remote_url("ssh://git@git.example.com:2222/platform/billing.git"),
            expected
        );
        assert_eq!(RepoId::from_remote_url("https://git.example.com/platform/billing"), expected);
        assert_eq!(RepoId::from_remote_url("https://git.example.com/platform/billing/"), expected);
        assert_eq!(RepoId::from_remote_url("billing"), None);
    }

    #[test]
    fn single_scope_only_contains_its_repo() {
        let billing = RepoId::new("platform", "billing");
        let scope = RepoScope::Single(billing.clone());
        assert!(scope.contains(&billing));
        assert!(!scope.contains(&RepoId::new("platform", "auth")));
        assert!(RepoScope::All.contains(&billing));
    }
}
