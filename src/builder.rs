//! Cache evaluation loop
//!
//! Walks the plan in chain order. A stage whose tag already exists is
//! reused; any other stage is built on top of the previous stage's tag.
//! Ledger entries are recorded only once a stage's image exists.

use crate::audit::{self, AuditLog};
use crate::error::StrataResult;
use crate::orchestration::ContainerRuntime;
use crate::plan::BuildPlan;
use crate::signature::short;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What happened to one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Image with this signature already existed
    Cached,
    /// Image was built or tagged by this run
    Built,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub name: String,
    pub signature: String,
    pub tag: String,
    pub status: StageStatus,
}

/// Drives a plan against a container runtime
pub struct Builder<'a> {
    plan: &'a BuildPlan,
    runtime: &'a dyn ContainerRuntime,
    audit: &'a AuditLog,
}

impl<'a> Builder<'a> {
    pub fn new(plan: &'a BuildPlan, runtime: &'a dyn ContainerRuntime, audit: &'a AuditLog) -> Self {
        Self {
            plan,
            runtime,
            audit,
        }
    }

    /// Build every stage. Stops at the first failing stage.
    ///
    /// `on_stage` is told the name of each stage before it is evaluated and
    /// `on_output` receives build output line by line.
    pub async fn run(
        &self,
        on_stage: &(dyn Fn(&str) + Send + Sync),
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> StrataResult<Vec<StageOutcome>> {
        let chain = self.plan.chain();
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(chain.len());

        for handle in chain.handles() {
            let name = chain
                .get(handle)
                .map(|s| s.name().to_string())
                .unwrap_or_default();
            on_stage(&name);

            let signature = self.plan.signature(handle)?;
            let tag = self.plan.image_tag(&signature);
            let from = outcomes.last().map(|o| o.tag.as_str());

            if self.runtime.image_exists(&tag).await? {
                debug!("Stage {} cached as {}", name, tag);
                self.audit
                    .log(
                        audit::STAGE_CACHED,
                        &serde_json::json!({ "stage": name, "tag": tag }),
                    )
                    .await;
                outcomes.push(StageOutcome {
                    name,
                    signature,
                    tag,
                    status: StageStatus::Cached,
                });
                continue;
            }

            info!("Building stage {} ({})", name, short(&signature));
            let spec = self.plan.image(handle, self.runtime, from).await?;

            if let Some(sidecar) = chain.source(handle).and_then(|s| s.sidecar()) {
                self.audit
                    .log(
                        audit::SIDECAR_ACQUIRED,
                        &serde_json::json!({
                            "stage": name,
                            "name": sidecar.name,
                            "outcome": sidecar.outcome.to_string(),
                        }),
                    )
                    .await;
            }

            let result = if spec.is_passthrough() {
                self.runtime.tag_image(&spec.from, &tag).await
            } else {
                self.runtime.build_image(&spec, &tag, on_output).await
            };

            if let Err(e) = result {
                warn!("Stage {} failed: {}", name, e);
                self.audit
                    .log(
                        audit::STAGE_FAILED,
                        &serde_json::json!({ "stage": name, "tag": tag, "error": e.to_string() }),
                    )
                    .await;
                return Err(e);
            }

            self.audit
                .log(
                    audit::STAGE_BUILT,
                    &serde_json::json!({ "stage": name, "tag": tag }),
                )
                .await;

            let written = self.plan.save_in_cache(handle)?;
            if !written.is_empty() {
                self.audit
                    .log(
                        audit::LEDGER_WRITTEN,
                        &serde_json::json!({ "stage": name, "entries": written }),
                    )
                    .await;
            }

            outcomes.push(StageOutcome {
                name,
                signature,
                tag,
                status: StageStatus::Built,
            });
        }

        Ok(outcomes)
    }
}
