//! Project manifest parsing
//!
//! A project is described by `strata.toml`: the image to build, the
//! repositories copied into it and the instruction stages run on top.

use crate::error::{StrataError, StrataResult};
use crate::names::{is_file_safe, project_slug};
use crate::plan::{SOURCE_ARCHIVE, SOURCE_LATEST_PATCH};
use crate::repository::GitRepository;
use crate::stage::BaseStage;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Parsed project manifest from strata.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Image section
    pub image: ImageSection,

    /// Source repositories, in canonical order
    #[serde(default, rename = "repo")]
    pub repos: Vec<RepoSection>,

    /// Instruction stages, in build order
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageSection>,
}

/// `[image]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSection {
    /// Project name, used for image tags
    pub name: String,

    /// Base image reference
    pub from: String,
}

/// `[[repo]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSection {
    pub name: String,

    /// Worktree path, relative to the project root
    #[serde(default = "default_repo_path")]
    pub path: String,

    /// Absolute target directory inside the image
    pub to: String,

    /// Branch to track instead of HEAD
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub include_paths: Vec<String>,

    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

fn default_repo_path() -> String {
    ".".to_string()
}

impl RepoSection {
    /// Repository bound to a worktree under `root`.
    ///
    /// The worktree path is made absolute: it becomes a bind mount source,
    /// and runtimes read a relative source as a named volume.
    pub fn to_repository(&self, root: &Path) -> StrataResult<GitRepository> {
        let path = std::path::absolute(root.join(&self.path)).map_err(|e| {
            StrataError::io(format!("resolving path of repository {}", self.name), e)
        })?;
        Ok(GitRepository::new(&self.name, path, &self.to)
            .with_branch(self.branch.clone())
            .with_include_paths(self.include_paths.clone())
            .with_exclude_paths(self.exclude_paths.clone()))
    }
}

/// `[[stage]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageSection {
    pub name: String,

    #[serde(default)]
    pub commands: Vec<String>,
}

impl Manifest {
    /// Parse and validate a manifest from a TOML file on disk
    pub async fn from_file(path: &Path) -> StrataResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StrataError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content).map_err(|e| match e {
            StrataError::ProjectInvalid { reason, .. } => StrataError::ProjectInvalid {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a manifest from a TOML string
    pub fn parse(content: &str) -> StrataResult<Self> {
        let manifest: Self = toml::from_str(content).map_err(|e| invalid(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> StrataResult<()> {
        if self.image.name.trim().is_empty() {
            return Err(invalid("image.name must not be empty"));
        }
        if project_slug(&self.image.name) != self.image.name {
            return Err(invalid(format!(
                "invalid image.name '{}': use only lowercase letters, digits, hyphens, or underscores",
                self.image.name
            )));
        }
        if self.image.from.trim().is_empty() {
            return Err(invalid("image.from must not be empty"));
        }

        let mut repo_names = HashSet::new();
        for repo in &self.repos {
            check_name("repo", &repo.name)?;
            if !repo_names.insert(repo.name.as_str()) {
                return Err(invalid(format!("duplicate repo '{}'", repo.name)));
            }
            if !repo.to.starts_with('/') {
                return Err(invalid(format!(
                    "repo '{}': 'to' must be an absolute path, got '{}'",
                    repo.name, repo.to
                )));
            }
        }

        let mut stage_names = HashSet::new();
        for stage in &self.stages {
            check_name("stage", &stage.name)?;
            if is_reserved(&stage.name) {
                return Err(invalid(format!(
                    "stage name '{}' is reserved",
                    stage.name
                )));
            }
            if !stage_names.insert(stage.name.as_str()) {
                return Err(invalid(format!("duplicate stage '{}'", stage.name)));
            }
        }

        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> StrataError {
    StrataError::ProjectInvalid {
        path: "strata.toml".into(),
        reason: reason.into(),
    }
}

/// Names end up in ledger file names, so they must be file-safe
fn check_name(what: &str, name: &str) -> StrataResult<()> {
    if name.is_empty() {
        return Err(invalid(format!("{} name cannot be empty", what)));
    }
    if !is_file_safe(name) {
        return Err(invalid(format!(
            "invalid {} name '{}': use only alphanumeric characters, hyphens, or underscores",
            what, name
        )));
    }
    Ok(())
}

fn is_reserved(name: &str) -> bool {
    name == BaseStage::NAME
        || name == SOURCE_ARCHIVE
        || name == SOURCE_LATEST_PATCH
        || name.starts_with("source_")
}
