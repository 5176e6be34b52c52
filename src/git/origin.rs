use git2::Repository;
use std::path::Path;
use thiserror::Error;

use crate::model::RepoId;

#[derive(Error, Debug)]
pub enum OriginError {
    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("remote `{0}` has no URL")]
    NoUrl(String),

    #[error("cannot derive OWNER/NAME from remote URL `{0}`")]
    Unrecognized(String),
}

pub trait GitOrigin {
    /// `owner/name` of the `origin` remote of the clone containing `path`.
    fn repo_id(&self) -> Result<RepoId, OriginError>;
}

impl GitOrigin for Repository {
    fn repo_id(&self) -> Result<RepoId, OriginError> {
        let remote = self.find_remote("origin")?;
        let url = remote
            .url()
            .ok_or_else(|| OriginError::NoUrl("origin".to_string()))?;
        RepoId::from_remote_url(url).ok_or_else(|| OriginError::Unrecognized(url.to_string()))
    }
}

/// Finds the enclosing clone of `path` and reads its `origin` remote.
pub fn repo_from_git(path: impl AsRef<Path>) -> Result<RepoId, OriginError> {
    let repo = Repository::discover(path)?;
    repo.repo_id()
}
