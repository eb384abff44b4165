//! Source stages
//!
//! A source stage copies the bound repositories into the image. Its
//! signature covers the previous stage's signature and, for every
//! repository, the commit baked into the layer. That commit comes from the
//! commit ledger when this stage was cached before with the same upstream,
//! so an unchanged upstream keeps hitting the cache even after new commits
//! land. The next build then diffs forward from the recorded commit.

use crate::cache::LedgerKey;
use crate::error::{StrataError, StrataResult};
use crate::orchestration::{ContainerRuntime, ImageSpec};
use crate::plan::BuildPlan;
use crate::repository::{ApplyMethod, DeltaRequest, SourceRepository};
use crate::sidecar::{self, SidecarHandle, SidecarSpec};
use crate::signature::hashsum;
use crate::stage::StageHandle;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Position of a source stage in the chain, deciding how repositories apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    /// First source layer: full tree at the layer commit
    Archive,
    /// Intermediate layer: diff from the previous source layer
    Patch,
    /// Final layer: diff up to the latest commit, never read from the ledger
    LatestPatch,
}

impl SourceRole {
    pub fn apply_method(&self) -> ApplyMethod {
        match self {
            Self::Archive => ApplyMethod::Archive,
            Self::Patch | Self::LatestPatch => ApplyMethod::Patch,
        }
    }

    /// Whether layer commits may come from the ledger
    pub fn reads_ledger(&self) -> bool {
        !matches!(self, Self::LatestPatch)
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Patch => write!(f, "patch"),
            Self::LatestPatch => write!(f, "latest patch"),
        }
    }
}

/// Per-stage memo of resolved commits, keyed by repository identity.
///
/// Each identity is resolved at most once; later calls return the first
/// value even if the repository has moved on.
#[derive(Debug, Default)]
pub struct CommitCache {
    commits: Mutex<HashMap<String, String>>,
}

impl CommitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached commit for `identity`, if resolved
    pub fn get(&self, identity: &str) -> StrataResult<Option<String>> {
        let commits = self.lock()?;
        Ok(commits.get(identity).cloned())
    }

    /// Return the cached commit or resolve and store it.
    ///
    /// `resolve` runs without the lock held. If two callers race, the first
    /// stored value wins and both observe it.
    pub fn get_or_resolve<F>(&self, identity: &str, resolve: F) -> StrataResult<String>
    where
        F: FnOnce() -> StrataResult<String>,
    {
        if let Some(commit) = self.get(identity)? {
            return Ok(commit);
        }

        let resolved = resolve()?;
        let mut commits = self.lock()?;
        Ok(commits
            .entry(identity.to_string())
            .or_insert(resolved)
            .clone())
    }

    fn lock(&self) -> StrataResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.commits
            .lock()
            .map_err(|_| StrataError::Internal("commit cache lock poisoned".to_string()))
    }
}

/// A stage incorporating every repository of the plan
#[derive(Debug)]
pub struct SourceStage {
    name: String,
    role: SourceRole,
    handle: StageHandle,
    commits: CommitCache,
    sidecar: OnceCell<SidecarHandle>,
}

impl SourceStage {
    pub fn new(name: impl Into<String>, role: SourceRole, handle: StageHandle) -> Self {
        Self {
            name: name.into(),
            role,
            handle,
            commits: CommitCache::new(),
            sidecar: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> SourceRole {
        self.role
    }

    pub fn handle(&self) -> StageHandle {
        self.handle
    }

    /// Sidecar attached by [`SourceStage::image`], if any
    pub fn sidecar(&self) -> Option<&SidecarHandle> {
        self.sidecar.get()
    }

    /// Digest of the previous stage's signature. Recomputed on every call.
    pub fn dependencies_checksum(&self, plan: &BuildPlan) -> StrataResult<String> {
        let prev = plan.chain().prev(self.handle).ok_or_else(|| {
            StrataError::Internal(format!("source stage {} has no previous stage", self.name))
        })?;
        Ok(hashsum([plan.signature(prev)?]))
    }

    /// Ledger key for `repo` under the current upstream
    fn ledger_key(
        &self,
        plan: &BuildPlan,
        repo: &dyn SourceRepository,
    ) -> StrataResult<LedgerKey> {
        Ok(LedgerKey::new(
            &self.name,
            repo.identity(),
            &repo.params_hash()?,
            &self.dependencies_checksum(plan)?,
        ))
    }

    /// Commit of `repo` baked into this layer, memoized for this stage
    pub fn layer_commit(&self, plan: &BuildPlan, repo: &dyn SourceRepository) -> StrataResult<String> {
        self.commits
            .get_or_resolve(repo.identity(), || self.resolve_commit(plan, repo))
    }

    fn resolve_commit(&self, plan: &BuildPlan, repo: &dyn SourceRepository) -> StrataResult<String> {
        if self.role.reads_ledger() {
            let key = self.ledger_key(plan, repo)?;
            if let Some(commit) = plan.ledger().read(&key) {
                debug!(
                    "Stage {} uses ledger commit {} for {}",
                    self.name,
                    commit,
                    repo.identity()
                );
                return Ok(commit);
            }
        }

        let commit = repo.latest_commit()?;
        debug!(
            "Stage {} uses latest commit {} for {}",
            self.name,
            commit,
            repo.identity()
        );
        Ok(commit)
    }

    /// Layer commits of every repository, in plan order
    fn commit_list(&self, plan: &BuildPlan) -> StrataResult<Vec<String>> {
        plan.repos()
            .iter()
            .map(|repo| self.layer_commit(plan, repo.as_ref()))
            .collect()
    }

    pub fn signature(&self, plan: &BuildPlan) -> StrataResult<String> {
        let mut parts = vec![self.dependencies_checksum(plan)?];
        parts.extend(self.commit_list(plan)?);
        Ok(hashsum(&parts))
    }

    /// Commit the image already holds for `repo`, from the nearest
    /// earlier source stage
    fn base_commit(&self, plan: &BuildPlan, repo: &dyn SourceRepository) -> StrataResult<Option<String>> {
        plan.chain()
            .prev_source(self.handle)
            .and_then(|h| plan.chain().source(h))
            .map(|prev| prev.layer_commit(plan, repo))
            .transpose()
    }

    /// Build description for this layer on top of `from`
    pub async fn image(
        &self,
        plan: &BuildPlan,
        runtime: &dyn ContainerRuntime,
        from: &str,
    ) -> StrataResult<ImageSpec> {
        let mut spec = ImageSpec::new(from);

        for repo in plan.repos() {
            let repo = repo.as_ref();
            spec.add_volume(format!(
                "{}:{}",
                repo.host_working_directory().display(),
                repo.build_context_path()
            ));

            let to_commit = self.layer_commit(plan, repo)?;
            let from_commit = match self.role {
                SourceRole::Archive => None,
                SourceRole::Patch | SourceRole::LatestPatch => self.base_commit(plan, repo)?,
            };
            let request = DeltaRequest {
                method: self.role.apply_method(),
                from_commit: from_commit.as_deref(),
                to_commit: &to_commit,
            };
            spec.add_commands(repo.apply_delta_commands(&request)?);
        }

        if Self::should_be_with_git(plan, &spec) {
            let handle = self.ensure_sidecar(runtime, plan.sidecar_spec()).await?;
            spec.add_volumes_from(handle.name.clone());
            spec.unshift_commands([plan.sidecar_spec().path_export()]);
        }

        Ok(spec)
    }

    /// Repository commands need the sidecar's git
    fn should_be_with_git(plan: &BuildPlan, spec: &ImageSpec) -> bool {
        !plan.repos().is_empty() && !spec.commands().is_empty()
    }

    async fn ensure_sidecar(
        &self,
        runtime: &dyn ContainerRuntime,
        spec: &SidecarSpec,
    ) -> StrataResult<&SidecarHandle> {
        self.sidecar
            .get_or_try_init(|| sidecar::acquire(runtime, spec))
            .await
    }

    /// Record layer commits once the image is in the cache.
    ///
    /// Returns the files written. Write failures are logged and skipped; the
    /// next build falls back to the latest commit for that repository.
    pub fn save_in_cache(&self, plan: &BuildPlan) -> StrataResult<Vec<PathBuf>> {
        let mut written = Vec::new();

        for repo in plan.repos() {
            let repo = repo.as_ref();
            let key = self.ledger_key(plan, repo)?;
            let commit = self.layer_commit(plan, repo)?;

            match plan.ledger().write(&key, &commit) {
                Ok(path) => {
                    debug!("Recorded {} for stage {}", path.display(), self.name);
                    written.push(path);
                }
                Err(e) if !e.is_fatal_for_build() => warn!(
                    "Could not record commit of {} for stage {}: {}",
                    repo.identity(),
                    self.name,
                    e
                ),
                Err(e) => return Err(e),
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CommitLedger;
    use crate::orchestration::fake::FakeRuntime;
    use crate::repository::testing::StubRepository;
    use crate::stage::Stage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sidecar_spec() -> SidecarSpec {
        SidecarSpec {
            image: "dappdeps/gitartifact:0.1.3".to_string(),
            volume: "/.dapp/deps/gitartifact".to_string(),
            bin_dir: "/.dapp/deps/gitartifact/bin".to_string(),
        }
    }

    fn plan_with(dir: &TempDir, repos: Vec<Arc<StubRepository>>) -> BuildPlan {
        let repos = repos
            .into_iter()
            .map(|r| r as Arc<dyn SourceRepository>)
            .collect();
        BuildPlan::new(
            "app",
            "alpine:3",
            repos,
            CommitLedger::new(dir.path()),
            sidecar_spec(),
        )
    }

    fn source<'a>(plan: &'a BuildPlan, handle: StageHandle) -> &'a SourceStage {
        plan.chain().source(handle).unwrap()
    }

    #[test]
    fn commit_cache_first_value_wins() {
        let cache = CommitCache::new();
        let first = cache.get_or_resolve("app", || Ok("a1".to_string())).unwrap();
        let second = cache.get_or_resolve("app", || Ok("b2".to_string())).unwrap();

        assert_eq!(first, "a1");
        assert_eq!(second, "a1");
        assert_eq!(cache.get("app").unwrap(), Some("a1".to_string()));
        assert_eq!(cache.get("other").unwrap(), None);
    }

    #[test]
    fn commit_cache_does_not_store_errors() {
        let cache = CommitCache::new();
        let failed = cache.get_or_resolve("app", || Err(StrataError::Internal("boom".into())));
        assert!(failed.is_err());

        let resolved = cache.get_or_resolve("app", || Ok("c3".to_string())).unwrap();
        assert_eq!(resolved, "c3");
    }

    #[test]
    fn scenario_signature_without_ledger() {
        let dir = TempDir::new().unwrap();
        let r1 = Arc::new(StubRepository::new("r1", "a1b2"));
        let r2 = Arc::new(StubRepository::new("r2", "c3d4"));
        let mut plan = plan_with(&dir, vec![r1, r2]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);

        let s0 = plan.signature(plan.chain().prev(handle).unwrap()).unwrap();
        let expected = hashsum([hashsum([&s0]), "a1b2".to_string(), "c3d4".to_string()]);
        assert_eq!(plan.signature(handle).unwrap(), expected);

        let written = source(&plan, handle).save_in_cache(&plan).unwrap();
        assert_eq!(written.len(), 2);

        let stage = source(&plan, handle);
        let checksum = stage.dependencies_checksum(&plan).unwrap();
        let k1 = LedgerKey::new("source_archive", "r1", "params-r1", &checksum);
        let k2 = LedgerKey::new("source_archive", "r2", "params-r2", &checksum);
        assert_eq!(plan.ledger().read(&k1), Some("a1b2".to_string()));
        assert_eq!(plan.ledger().read(&k2), Some("c3d4".to_string()));
    }

    #[test]
    fn signature_is_deterministic_and_order_sensitive() {
        let dir = TempDir::new().unwrap();
        let r1 = Arc::new(StubRepository::new("r1", "a1b2"));
        let r2 = Arc::new(StubRepository::new("r2", "c3d4"));

        let mut forward = plan_with(&dir, vec![r1.clone(), r2.clone()]);
        let h = forward.push_source("source_archive", SourceRole::Archive);
        let mut again = plan_with(&dir, vec![r1.clone(), r2.clone()]);
        again.push_source("source_archive", SourceRole::Archive);
        let mut reversed = plan_with(&dir, vec![r2, r1]);
        reversed.push_source("source_archive", SourceRole::Archive);

        let sig = forward.signature(h).unwrap();
        assert_eq!(sig, again.signature(h).unwrap());
        assert_ne!(sig, reversed.signature(h).unwrap());
    }

    #[test]
    fn ledger_fallback_and_override() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "latest"));
        let mut plan = plan_with(&dir, vec![repo.clone()]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let stage = source(&plan, handle);

        assert_eq!(stage.layer_commit(&plan, repo.as_ref()).unwrap(), "latest");

        // Fresh plan, same upstream, ledger now populated
        let key = stage.ledger_key(&plan, repo.as_ref()).unwrap();
        plan.ledger().write(&key, "recorded\n").unwrap();

        let mut fresh = plan_with(&dir, vec![repo.clone()]);
        let handle = fresh.push_source("source_archive", SourceRole::Archive);
        let stage = source(&fresh, handle);
        assert_eq!(stage.layer_commit(&fresh, repo.as_ref()).unwrap(), "recorded");
    }

    #[test]
    fn changed_upstream_misses_ledger() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "latest"));
        let mut plan = plan_with(&dir, vec![repo.clone()]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let key = source(&plan, handle).ledger_key(&plan, repo.as_ref()).unwrap();
        plan.ledger().write(&key, "recorded").unwrap();

        let mut other = BuildPlan::new(
            "app",
            "alpine:4",
            vec![repo.clone() as Arc<dyn SourceRepository>],
            CommitLedger::new(dir.path()),
            sidecar_spec(),
        );
        let handle = other.push_source("source_archive", SourceRole::Archive);
        let stage = source(&other, handle);
        assert_eq!(stage.layer_commit(&other, repo.as_ref()).unwrap(), "latest");
    }

    #[test]
    fn layer_commit_is_memoized() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "first"));
        let mut plan = plan_with(&dir, vec![repo.clone()]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let stage = source(&plan, handle);

        let before = stage.layer_commit(&plan, repo.as_ref()).unwrap();
        repo.set_commit("second");
        let after = stage.layer_commit(&plan, repo.as_ref()).unwrap();

        assert_eq!(before, "first");
        assert_eq!(after, "first");
    }

    #[test]
    fn latest_patch_ignores_ledger() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "latest"));
        let mut plan = plan_with(&dir, vec![repo.clone()]);
        let handle = plan.push_source("source_latest_patch", SourceRole::LatestPatch);
        let stage = source(&plan, handle);

        let key = LedgerKey::new(
            "source_latest_patch",
            "app",
            "params-app",
            &stage.dependencies_checksum(&plan).unwrap(),
        );
        plan.ledger().write(&key, "recorded").unwrap();

        assert_eq!(stage.layer_commit(&plan, repo.as_ref()).unwrap(), "latest");
    }

    #[test]
    fn missing_commit_fails_signature() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "a1"));
        repo.break_commit();
        let mut plan = plan_with(&dir, vec![repo]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);

        assert!(matches!(
            plan.signature(handle),
            Err(StrataError::RepositoryCommit { .. })
        ));
    }

    #[tokio::test]
    async fn empty_repository_set() {
        let dir = TempDir::new().unwrap();
        let mut plan = plan_with(&dir, vec![]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let stage = source(&plan, handle);
        let runtime = FakeRuntime::new();

        let checksum = stage.dependencies_checksum(&plan).unwrap();
        assert_eq!(stage.signature(&plan).unwrap(), hashsum([checksum]));

        let spec = stage.image(&plan, &runtime, "base").await.unwrap();
        assert!(spec.volumes().is_empty());
        assert!(spec.volumes_from().is_empty());
        assert!(spec.commands().is_empty());
        assert!(stage.sidecar().is_none());
        assert!(stage.save_in_cache(&plan).unwrap().is_empty());
        assert_eq!(runtime.create_calls(), 0);
    }

    #[tokio::test]
    async fn image_attaches_sidecar_when_commands_exist() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "a1b2"));
        let mut plan = plan_with(&dir, vec![repo]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let stage = source(&plan, handle);
        let runtime = FakeRuntime::new();

        let spec = stage.image(&plan, &runtime, "base").await.unwrap();

        assert_eq!(spec.from, "base");
        assert_eq!(spec.volumes(), &["/src/app:/ctx/app"]);
        assert_eq!(spec.volumes_from(), &["dappdeps_gitartifact_0.1.3"]);
        assert_eq!(
            spec.commands(),
            &[
                "export PATH=/.dapp/deps/gitartifact/bin:$PATH",
                "archive app -..a1b2",
            ]
        );
        assert!(stage.sidecar().is_some());

        // Second image reuses the handle without probing again
        stage.image(&plan, &runtime, "base").await.unwrap();
        assert_eq!(runtime.create_calls(), 1);
    }

    #[tokio::test]
    async fn image_without_commands_skips_sidecar() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "a1b2").silent());
        let mut plan = plan_with(&dir, vec![repo]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let stage = source(&plan, handle);
        let runtime = FakeRuntime::new();

        let spec = stage.image(&plan, &runtime, "base").await.unwrap();

        assert_eq!(spec.volumes().len(), 1);
        assert!(spec.volumes_from().is_empty());
        assert!(spec.commands().is_empty());
        assert!(stage.sidecar().is_none());
    }

    #[tokio::test]
    async fn patch_diffs_from_previous_source_layer() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "a1"));
        let mut plan = plan_with(&dir, vec![repo.clone()]);
        let archive = plan.push_source("source_archive", SourceRole::Archive);
        plan.push_instructions("install", vec!["make".to_string()]);
        let patch = plan.push_source("source_latest_patch", SourceRole::LatestPatch);

        // The archive layer resolves first, then the repository moves on
        plan.signature(archive).unwrap();
        repo.set_commit("b2");

        let runtime = FakeRuntime::new();
        let spec = source(&plan, patch).image(&plan, &runtime, "base").await.unwrap();
        assert_eq!(spec.commands()[1], "patch app a1..b2");
    }

    #[tokio::test]
    async fn sidecar_failure_fails_image() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(StubRepository::new("app", "a1"));
        let mut plan = plan_with(&dir, vec![repo]);
        let handle = plan.push_source("source_archive", SourceRole::Archive);
        let runtime = FakeRuntime {
            fail_create: true,
            ..FakeRuntime::default()
        };

        let err = source(&plan, handle)
            .image(&plan, &runtime, "base")
            .await
            .unwrap_err();
        assert!(matches!(err, StrataError::SidecarProvision { .. }));
    }

    #[test]
    fn save_in_cache_survives_unwritable_ledger() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("ledger");
        std::fs::write(&blocker, "not a directory").unwrap();

        let repo = Arc::new(StubRepository::new("app", "a1"));
        let mut plan = BuildPlan::new(
            "app",
            "alpine:3",
            vec![repo as Arc<dyn SourceRepository>],
            CommitLedger::new(&blocker),
            sidecar_spec(),
        );
        let handle = plan.push_source("source_archive", SourceRole::Archive);

        assert!(source(&plan, handle).save_in_cache(&plan).unwrap().is_empty());
    }

    #[test]
    fn role_mapping() {
        assert_eq!(SourceRole::Archive.apply_method(), ApplyMethod::Archive);
        assert_eq!(SourceRole::Patch.apply_method(), ApplyMethod::Patch);
        assert_eq!(SourceRole::LatestPatch.apply_method(), ApplyMethod::Patch);
        assert!(SourceRole::Patch.reads_ledger());
        assert!(!SourceRole::LatestPatch.reads_ledger());
        assert!(matches!(
            Stage::Source(SourceStage::new("s", SourceRole::Patch, StageHandle::new(1))).kind(),
            crate::stage::StageKind::Source
        ));
    }
}
