//! Project discovery
//!
//! A project is the directory holding `strata.toml`. Commands look for it in
//! the given directory and then in each parent.

pub mod manifest;

pub use manifest::{ImageSection, Manifest, RepoSection, StageSection};

use crate::config::Config;
use crate::error::{StrataError, StrataResult};
use crate::names::project_slug;
use crate::signature::{hashsum, short};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project file name
pub const MANIFEST_FILE: &str = "strata.toml";

/// Default build directory, next to the manifest
pub const BUILD_DIR: &str = ".strata-build";

/// A loaded project
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory containing the manifest
    pub root: PathBuf,
    /// Path of the manifest itself
    pub file: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    /// Find the manifest in `start` or one of its parents
    pub fn find(start: &Path) -> StrataResult<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(MANIFEST_FILE))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| StrataError::ProjectNotFound(start.to_path_buf()))
    }

    /// Discover and load the project around `start`.
    ///
    /// `start` is canonicalized first, so the project root and every path
    /// derived from it are absolute.
    pub async fn discover(start: &Path) -> StrataResult<Self> {
        let start = tokio::fs::canonicalize(start)
            .await
            .map_err(|_| StrataError::ProjectNotFound(start.to_path_buf()))?;
        let file = Self::find(&start)?;
        debug!("Using project file {}", file.display());
        Self::load(&file).await
    }

    /// Load the project described by `file`
    pub async fn load(file: &Path) -> StrataResult<Self> {
        let manifest = Manifest::from_file(file).await?;
        let root = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            root,
            file: file.to_path_buf(),
            manifest,
        })
    }

    /// Project name from the manifest
    pub fn name(&self) -> &str {
        &self.manifest.image.name
    }

    /// Build state directory. A configured `build.dir` is shared between
    /// projects, so each project gets its own subdirectory there, keyed by
    /// name and root.
    pub fn build_dir(&self, config: &Config) -> PathBuf {
        match &config.build.dir {
            Some(dir) => {
                let root = hashsum([self.root.as_os_str().as_encoded_bytes()]);
                dir.join(format!("{}-{}", project_slug(self.name()), short(&root)))
            }
            None => self.root.join(BUILD_DIR),
        }
    }

    /// Commit ledger directory
    pub fn ledger_dir(&self, config: &Config) -> PathBuf {
        self.build_dir(config).join("ledger")
    }
}
