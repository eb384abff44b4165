//! CLI command implementations

pub mod build;
pub mod config;
pub mod ledger;
pub mod plan;
pub mod sidecar;

pub use build::execute as build;
pub use config::execute as config;
pub use ledger::execute as ledger;
pub use plan::execute as plan;
pub use sidecar::execute as sidecar;

use crate::cli::args::ProjectArgs;
use crate::config::Config;
use crate::error::{StrataError, StrataResult};
use crate::plan::BuildPlan;
use crate::project::Project;
use crate::sidecar::SidecarSpec;
use std::env;

/// Load the project selected by `--project` or around the working directory
pub(crate) async fn load_project(args: &ProjectArgs) -> StrataResult<Project> {
    let start = match &args.project {
        Some(dir) => dir.clone(),
        None => env::current_dir()
            .map_err(|e| StrataError::io("resolving current directory", e))?,
    };
    Project::discover(&start).await
}

/// Plan for `project` using the configured ledger location and sidecar,
/// with the latest commit of every repository fetched
pub(crate) async fn plan_for(project: &Project, config: &Config) -> StrataResult<BuildPlan> {
    let plan = BuildPlan::from_project(
        project,
        project.ledger_dir(config),
        SidecarSpec::from_config(&config.sidecar),
    )?;
    plan.fetch_commits().await?;
    Ok(plan)
}
