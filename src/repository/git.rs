//! Git-backed source repository
//!
//! Reads commits from a local worktree with the system git and emits the
//! commands that replay them inside a build container. The worktree is
//! mounted into the container, and git itself comes from the sidecar.

use crate::error::{StrataError, StrataResult};
use crate::names::file_safe;
use crate::repository::{ApplyMethod, DeltaRequest, SourceRepository};
use crate::signature::hashsum;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::debug;

/// Mount root for repositories inside build containers
const CONTEXT_ROOT: &str = "/.strata/repos";

/// A local git worktree copied to `to` inside the image
#[derive(Debug, Clone)]
pub struct GitRepository {
    identity: String,
    path: PathBuf,
    to: String,
    branch: Option<String>,
    include_paths: Vec<String>,
    exclude_paths: Vec<String>,
    context_path: String,
    latest: OnceLock<String>,
}

impl GitRepository {
    pub fn new(name: &str, path: impl Into<PathBuf>, to: impl Into<String>) -> Self {
        let identity = file_safe(name);
        Self {
            context_path: format!("{}/{}", CONTEXT_ROOT, identity),
            identity,
            path: path.into(),
            to: to.into(),
            branch: None,
            include_paths: vec![],
            exclude_paths: vec![],
            latest: OnceLock::new(),
        }
    }

    /// Track `branch` instead of HEAD
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_include_paths(mut self, paths: Vec<String>) -> Self {
        self.include_paths = paths;
        self
    }

    pub fn with_exclude_paths(mut self, paths: Vec<String>) -> Self {
        self.exclude_paths = paths;
        self
    }

    /// Target directory inside the image
    pub fn to(&self) -> &str {
        &self.to
    }

    fn tracked_ref(&self) -> &str {
        self.branch.as_deref().unwrap_or("HEAD")
    }

    fn git_dir(&self) -> String {
        format!("{}/.git", self.context_path)
    }

    fn git(&self) -> String {
        format!(
            "git --git-dir={} -c diff.renames=false -c core.quotePath=false",
            shell_quote(&self.git_dir())
        )
    }

    /// Trailing `-- <pathspec>...` or an empty string
    fn pathspec(&self) -> String {
        if self.include_paths.is_empty() && self.exclude_paths.is_empty() {
            return String::new();
        }

        let mut specs: Vec<String> = if self.include_paths.is_empty() {
            vec![shell_quote(".")]
        } else {
            self.include_paths.iter().map(|p| shell_quote(p)).collect()
        };
        specs.extend(
            self.exclude_paths
                .iter()
                .map(|p| shell_quote(&format!(":(exclude){}", p))),
        );
        format!(" -- {}", specs.join(" "))
    }

    /// Resolve the tracked ref with `git rev-parse`
    async fn rev_parse(&self) -> StrataResult<String> {
        let revision = format!("{}^{{commit}}", self.tracked_ref());
        debug!("Resolving {} in {}", revision, self.path.display());

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(["rev-parse", "--verify", "--quiet", &revision])
            .output()
            .await
            .map_err(|e| StrataError::RepositoryCommit {
                repo: self.identity.clone(),
                reason: format!("running git: {}", e),
            })?;

        let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || commit.is_empty() {
            return Err(StrataError::RepositoryCommit {
                repo: self.identity.clone(),
                reason: format!(
                    "cannot resolve {}: {}",
                    self.tracked_ref(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(commit)
    }

    fn archive_commands(&self, commit: &str) -> Vec<String> {
        vec![
            format!("mkdir -p {}", shell_quote(&self.to)),
            format!(
                "{} archive --format=tar {}{} | tar -x -C {}",
                self.git(),
                shell_quote(commit),
                self.pathspec(),
                shell_quote(&self.to)
            ),
        ]
    }

    fn patch_commands(&self, from: &str, to_commit: &str) -> Vec<String> {
        let range = format!("{} {}", shell_quote(from), shell_quote(to_commit));
        let pathspec = self.pathspec();
        vec![format!(
            "{git} diff --quiet {range}{pathspec} || {git} diff --full-index --binary {range}{pathspec} | git apply --whitespace=nowarn --directory={to} --unsafe-paths",
            git = self.git(),
            range = range,
            pathspec = pathspec,
            to = shell_quote(&self.to),
        )]
    }
}

#[async_trait]
impl SourceRepository for GitRepository {
    async fn fetch_latest(&self) -> StrataResult<()> {
        if self.latest.get().is_none() {
            let commit = self.rev_parse().await?;
            let _ = self.latest.set(commit);
        }
        Ok(())
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn host_working_directory(&self) -> &Path {
        &self.path
    }

    fn build_context_path(&self) -> &str {
        &self.context_path
    }

    fn latest_commit(&self) -> StrataResult<String> {
        self.latest
            .get()
            .cloned()
            .ok_or_else(|| StrataError::RepositoryCommit {
                repo: self.identity.clone(),
                reason: "latest commit was not fetched".to_string(),
            })
    }

    fn params_hash(&self) -> StrataResult<String> {
        if !self.to.starts_with('/') {
            return Err(StrataError::RepositoryParams {
                repo: self.identity.clone(),
                reason: format!("target path {} is not absolute", self.to),
            });
        }

        let mut parts = vec![
            self.to.clone(),
            self.tracked_ref().to_string(),
            self.include_paths.len().to_string(),
        ];
        parts.extend(self.include_paths.iter().cloned());
        parts.extend(self.exclude_paths.iter().cloned());
        Ok(hashsum(&parts))
    }

    fn apply_delta_commands(&self, request: &DeltaRequest<'_>) -> StrataResult<Vec<String>> {
        match (request.method, request.from_commit) {
            (ApplyMethod::Archive, _) | (ApplyMethod::Patch, None) => {
                Ok(self.archive_commands(request.to_commit))
            }
            (ApplyMethod::Patch, Some(from)) if from == request.to_commit => Ok(vec![]),
            (ApplyMethod::Patch, Some(from)) => Ok(self.patch_commands(from, request.to_commit)),
        }
    }
}

/// Quote a value for a POSIX shell.
/// Plain values pass through; anything else is single-quoted.
fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '^'));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}
