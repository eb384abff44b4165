//! Plan command - show stage signatures without touching the runtime

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::cli::commands::{load_project, plan_for};
use crate::config::Config;
use crate::error::StrataResult;
use crate::plan::PlannedStage;
use crate::signature::short;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config) -> StrataResult<()> {
    let project = load_project(&args.project).await?;
    let plan = plan_for(&project, config).await?;
    let stages = plan.describe()?;

    match args.format {
        OutputFormat::Table => print_table(project.name(), &stages),
        OutputFormat::Json => print_json(&stages)?,
        OutputFormat::Plain => print_plain(&stages),
    }

    Ok(())
}

fn print_table(name: &str, stages: &[PlannedStage]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Plan for {}", name));

    println!(
        "{:<32} {:<14} {:<14}",
        style("STAGE").bold(),
        style("KIND").bold(),
        style("SIGNATURE").bold()
    );
    println!("{}", "-".repeat(60));

    for stage in stages {
        println!(
            "{:<32} {:<14} {:<14}",
            stage.name,
            stage.kind.to_string(),
            short(&stage.signature)
        );
    }

    println!();
    println!("{} stage(s)", stages.len());
}

fn print_json(stages: &[PlannedStage]) -> StrataResult<()> {
    let json = serde_json::to_string_pretty(stages)?;
    println!("{}", json);
    Ok(())
}

fn print_plain(stages: &[PlannedStage]) {
    for stage in stages {
        println!("{} {}", stage.name, stage.tag);
    }
}
