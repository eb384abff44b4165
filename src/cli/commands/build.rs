//! Build command - evaluate every stage and build the misses

use crate::audit::AuditLog;
use crate::builder::{Builder, StageStatus};
use crate::cli::args::BuildArgs;
use crate::cli::commands::{load_project, plan_for};
use crate::config::Config;
use crate::error::StrataResult;
use crate::orchestration::create_runtime;
use crate::signature::short;
use crate::ui::{self, StageProgress, UiContext};
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> StrataResult<()> {
    let ctx = UiContext::detect();
    let project = load_project(&args.project).await?;
    let plan = plan_for(&project, config).await?;

    let runtime = create_runtime(config)?;
    runtime.ensure_ready().await?;
    debug!("Using {} runtime", runtime.runtime_name());

    ui::intro(&ctx, &format!("Building {}", project.name()));

    let audit = AuditLog::new(config);
    let progress = StageProgress::new(&ctx, plan.chain().len());
    let result = Builder::new(&plan, runtime.as_ref(), &audit)
        .run(&|name| progress.on_stage(name), &|line| progress.on_line(line))
        .await;
    progress.finish();
    let outcomes = result?;

    for outcome in &outcomes {
        ui::stage_result(
            &ctx,
            &outcome.name,
            outcome.status == StageStatus::Built,
            short(&outcome.signature),
        );
    }

    let built = outcomes
        .iter()
        .filter(|o| o.status == StageStatus::Built)
        .count();
    let cached = outcomes.len() - built;

    let Some(last) = outcomes.last() else {
        ui::outro_warn(&ctx, "Nothing to build");
        return Ok(());
    };

    let latest = plan.latest_tag();
    runtime.tag_image(&last.tag, &latest).await?;

    ui::outro_success(
        &ctx,
        &format!("{} ({})", latest, ui::stage_summary(built, cached)),
    );
    Ok(())
}
