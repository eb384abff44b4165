//! Source repositories
//!
//! A source repository is a versioned tree that source stages copy into the
//! image. The stage only needs a handful of facts from it plus the shell
//! commands that move the in-image copy from one commit to another.

pub mod git;

pub use git::GitRepository;

use crate::error::StrataResult;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// How a source stage brings the repository into the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMethod {
    /// Extract the full tree at the target commit
    Archive,
    /// Apply the diff between the previous layer's commit and the target
    Patch,
}

impl fmt::Display for ApplyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// What a source stage asks a repository to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaRequest<'a> {
    pub method: ApplyMethod,
    /// Commit already present in the image, if any source layer precedes
    pub from_commit: Option<&'a str>,
    /// Commit the new layer must contain
    pub to_commit: &'a str,
}

/// Contract between source stages and a versioned source tree
#[async_trait]
pub trait SourceRepository: Send + Sync + fmt::Debug {
    /// Resolve whatever `latest_commit` reports. Runs once per plan, before
    /// any signature is computed.
    async fn fetch_latest(&self) -> StrataResult<()> {
        Ok(())
    }

    /// Stable, file-path-safe identity
    fn identity(&self) -> &str;

    /// Directory on the host mounted into build containers
    fn host_working_directory(&self) -> &Path;

    /// Where `host_working_directory` is mounted inside build containers
    fn build_context_path(&self) -> &str;

    /// Most recent commit of the tracked ref, as of the last fetch
    fn latest_commit(&self) -> StrataResult<String>;

    /// Hash of the parameters that shape what gets applied
    fn params_hash(&self) -> StrataResult<String>;

    /// Shell commands moving the in-image copy to `request.to_commit`.
    /// Empty when there is nothing to apply.
    fn apply_delta_commands(&self, request: &DeltaRequest<'_>) -> StrataResult<Vec<String>>;
}
