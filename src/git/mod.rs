pub mod origin;

pub use origin::repo_from_git;
pub use origin::GitOrigin;
pub use origin::OriginError;
