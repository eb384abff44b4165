//! Build plan
//!
//! Owns the repositories, the stage chain and the commit ledger of one
//! build, and dispatches per-stage operations by handle.

use crate::cache::CommitLedger;
use crate::error::{StrataError, StrataResult};
use crate::names::project_slug;
use crate::orchestration::{ContainerRuntime, ImageSpec};
use crate::project::Project;
use crate::repository::SourceRepository;
use crate::sidecar::SidecarSpec;
use crate::stage::{
    BaseStage, InstructionStage, SourceRole, SourceStage, Stage, StageChain, StageHandle,
    StageKind,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const SOURCE_ARCHIVE: &str = "source_archive";
pub const SOURCE_LATEST_PATCH: &str = "source_latest_patch";

/// Name of the patch stage placed before user stage `stage`
pub fn pre_patch_name(stage: &str) -> String {
    format!("source_pre_{}_patch", stage)
}

/// One stage as reported by `strata plan`
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
    pub name: String,
    pub kind: StageKind,
    pub signature: String,
    pub tag: String,
}

#[derive(Debug)]
pub struct BuildPlan {
    project: String,
    repos: Vec<Arc<dyn SourceRepository>>,
    chain: StageChain,
    ledger: CommitLedger,
    sidecar: SidecarSpec,
}

impl BuildPlan {
    /// Start a plan whose chain holds only the base stage
    pub fn new(
        project: &str,
        from_image: &str,
        repos: Vec<Arc<dyn SourceRepository>>,
        ledger: CommitLedger,
        sidecar: SidecarSpec,
    ) -> Self {
        let mut chain = StageChain::new();
        chain.push_with(|_| Stage::Base(BaseStage::new(from_image)));
        Self {
            project: project_slug(project),
            repos,
            chain,
            ledger,
            sidecar,
        }
    }

    /// Lay out the chain for a project:
    /// base, archive, then each user stage preceded by a patch stage from
    /// the second one on, then the latest patch. Without repositories no
    /// source stages are added.
    pub fn from_project(
        project: &Project,
        ledger_dir: impl Into<PathBuf>,
        sidecar: SidecarSpec,
    ) -> StrataResult<Self> {
        let manifest = &project.manifest;
        let repos = manifest
            .repos
            .iter()
            .map(|r| -> StrataResult<Arc<dyn SourceRepository>> {
                Ok(Arc::new(r.to_repository(&project.root)?))
            })
            .collect::<StrataResult<Vec<_>>>()?;
        let with_sources = !repos.is_empty();

        let mut plan = Self::new(
            &manifest.image.name,
            &manifest.image.from,
            repos,
            CommitLedger::new(ledger_dir),
            sidecar,
        );

        if with_sources {
            plan.push_source(SOURCE_ARCHIVE, SourceRole::Archive);
        }
        for (index, stage) in manifest.stages.iter().enumerate() {
            if with_sources && index > 0 {
                plan.push_source(pre_patch_name(&stage.name), SourceRole::Patch);
            }
            plan.push_instructions(&stage.name, stage.commands.clone());
        }
        if with_sources {
            plan.push_source(SOURCE_LATEST_PATCH, SourceRole::LatestPatch);
        }

        Ok(plan)
    }

    pub fn push_instructions(&mut self, name: &str, commands: Vec<String>) -> StageHandle {
        self.chain
            .push_with(|_| Stage::Instructions(InstructionStage::new(name, commands)))
    }

    pub fn push_source(&mut self, name: impl Into<String>, role: SourceRole) -> StageHandle {
        let name = name.into();
        self.chain
            .push_with(|handle| Stage::Source(SourceStage::new(name, role, handle)))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Repositories in canonical order
    pub fn repos(&self) -> &[Arc<dyn SourceRepository>] {
        &self.repos
    }

    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    pub fn ledger(&self) -> &CommitLedger {
        &self.ledger
    }

    pub fn sidecar_spec(&self) -> &SidecarSpec {
        &self.sidecar
    }

    /// Fetch the latest commit of every repository. Signatures read these
    /// values, so this runs before the first one is computed.
    pub async fn fetch_commits(&self) -> StrataResult<()> {
        for repo in &self.repos {
            repo.fetch_latest().await?;
        }
        Ok(())
    }

    fn stage(&self, handle: StageHandle) -> StrataResult<&Stage> {
        self.chain
            .get(handle)
            .ok_or_else(|| StrataError::StageNotFound(format!("#{}", handle.index())))
    }

    pub fn signature(&self, handle: StageHandle) -> StrataResult<String> {
        match self.stage(handle)? {
            Stage::Base(stage) => Ok(stage.signature()),
            Stage::Instructions(stage) => {
                let prev = self.chain.prev(handle).ok_or_else(|| {
                    StrataError::Internal(format!("stage {} has no previous stage", stage.name()))
                })?;
                Ok(stage.signature(&self.signature(prev)?))
            }
            Stage::Source(stage) => stage.signature(self),
        }
    }

    /// Build description for `handle`. `from` is the previous stage's tag;
    /// the base stage ignores it.
    pub async fn image(
        &self,
        handle: StageHandle,
        runtime: &dyn ContainerRuntime,
        from: Option<&str>,
    ) -> StrataResult<ImageSpec> {
        let stage = self.stage(handle)?;
        let parent = || {
            from.ok_or_else(|| {
                StrataError::Internal(format!("stage {} needs a parent image", stage.name()))
            })
        };

        match stage {
            Stage::Base(base) => Ok(base.image()),
            Stage::Instructions(instructions) => Ok(instructions.image(parent()?)),
            Stage::Source(source) => source.image(self, runtime, parent()?).await,
        }
    }

    /// Post-cache bookkeeping for `handle`; returns ledger files written
    pub fn save_in_cache(&self, handle: StageHandle) -> StrataResult<Vec<PathBuf>> {
        match self.chain.source(handle) {
            Some(stage) => stage.save_in_cache(self),
            None => Ok(Vec::new()),
        }
    }

    /// Image repository all stage tags live under
    pub fn image_repository(&self) -> String {
        format!("strata-{}", self.project)
    }

    pub fn image_tag(&self, signature: &str) -> String {
        format!("{}:{}", self.image_repository(), signature)
    }

    /// Moving tag pointing at the last stage of the latest build
    pub fn latest_tag(&self) -> String {
        format!("{}:latest", self.image_repository())
    }

    /// Signatures and tags of every stage, in order
    pub fn describe(&self) -> StrataResult<Vec<PlannedStage>> {
        self.chain
            .handles()
            .map(|handle| {
                let stage = self.stage(handle)?;
                let signature = self.signature(handle)?;
                Ok(PlannedStage {
                    name: stage.name().to_string(),
                    kind: stage.kind(),
                    tag: self.image_tag(&signature),
                    signature,
                })
            })
            .collect()
    }
}
