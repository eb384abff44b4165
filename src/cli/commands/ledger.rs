//! Ledger command - inspect or clear recorded layer commits

use crate::audit::{self, AuditLog};
use crate::cache::{CommitLedger, LedgerEntry};
use crate::cli::args::{LedgerAction, LedgerArgs, OutputFormat, ProjectArgs};
use crate::cli::commands::load_project;
use crate::config::Config;
use crate::error::StrataResult;
use crate::signature::short;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// Execute the ledger command
pub async fn execute(args: LedgerArgs, config: &Config) -> StrataResult<()> {
    match args.action {
        LedgerAction::List { project, format } => list(&project, format, config).await,
        LedgerAction::Clear { project, yes } => clear(&project, yes, config).await,
    }
}

async fn open(args: &ProjectArgs, config: &Config) -> StrataResult<CommitLedger> {
    let project = load_project(args).await?;
    Ok(CommitLedger::new(project.ledger_dir(config)))
}

async fn list(args: &ProjectArgs, format: OutputFormat, config: &Config) -> StrataResult<()> {
    let ledger = open(args, config).await?;
    let entries = ledger.list()?;

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No recorded commits");
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }
    Ok(())
}

fn print_table(entries: &[LedgerEntry]) {
    println!(
        "{:<20} {:<32} {:<14} {:<42} {:<16}",
        style("REPO").bold(),
        style("STAGE").bold(),
        style("UPSTREAM").bold(),
        style("COMMIT").bold(),
        style("RECORDED").bold()
    );
    println!("{}", "-".repeat(124));

    for entry in entries {
        let recorded = entry
            .modified_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<32} {:<14} {:<42} {:<16}",
            entry.key.repository,
            entry.key.stage,
            short(&entry.key.dependencies_checksum),
            entry.commit,
            recorded
        );
    }

    println!();
    println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}

#[derive(Serialize)]
struct EntryJson<'a> {
    repository: &'a str,
    stage: &'a str,
    params_hash: &'a str,
    dependencies_checksum: &'a str,
    commit: &'a str,
    recorded_at: Option<String>,
}

fn print_json(entries: &[LedgerEntry]) -> StrataResult<()> {
    let rows: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|e| EntryJson {
            repository: &e.key.repository,
            stage: &e.key.stage,
            params_hash: &e.key.params_hash,
            dependencies_checksum: &e.key.dependencies_checksum,
            commit: &e.commit,
            recorded_at: e.modified_at.map(|t| t.to_rfc3339()),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn print_plain(entries: &[LedgerEntry]) {
    for entry in entries {
        println!("{} {} {}", entry.key.repository, entry.key.stage, entry.commit);
    }
}

async fn clear(args: &ProjectArgs, yes: bool, config: &Config) -> StrataResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let ledger = open(args, config).await?;
    let count = ledger.list()?.len();

    if count == 0 {
        ui::step_info(&ctx, "No recorded commits");
        return Ok(());
    }

    let prompt = format!(
        "Remove {} recorded commit(s)? The next build starts from the latest commits.",
        count
    );
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::remark(&ctx, "Cancelled");
        return Ok(());
    }

    let removed = ledger.clear()?;
    AuditLog::new(config)
        .log(
            audit::LEDGER_CLEARED,
            &serde_json::json!({ "dir": ledger.dir(), "removed": removed }),
        )
        .await;

    ui::step_ok(&ctx, &format!("Removed {} recorded commit(s)", removed));
    Ok(())
}
