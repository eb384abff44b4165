//! Sidecar command - inspect or create the tooling container

use crate::audit::{self, AuditLog};
use crate::cli::args::{SidecarAction, SidecarArgs};
use crate::config::Config;
use crate::error::StrataResult;
use crate::orchestration::create_runtime;
use crate::sidecar::{self, SidecarSpec};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the sidecar command
pub async fn execute(args: SidecarArgs, config: &Config) -> StrataResult<()> {
    let ctx = UiContext::detect();
    let spec = SidecarSpec::from_config(&config.sidecar);
    let runtime = create_runtime(config)?;

    match args.action {
        SidecarAction::Status => {
            ui::section(&ctx, "Sidecar");
            if !runtime.is_available().await? {
                ui::key_value_status(&ctx, "Runtime", runtime.runtime_name(), false);
                ui::remark(&ctx, "Container runtime is not running");
                return Ok(());
            }

            let exists = sidecar::status(runtime.as_ref(), &spec).await?;
            ui::key_value_status(&ctx, "Runtime", runtime.runtime_name(), true);
            ui::key_value(&ctx, "Name", &spec.container_name());
            ui::key_value(&ctx, "Image", &spec.image);
            ui::key_value(&ctx, "Tools", &spec.bin_dir);
            ui::key_value_status(
                &ctx,
                "State",
                if exists { "present" } else { "missing" },
                exists,
            );
            if !exists {
                ui::remark(&ctx, "Run `strata sidecar ensure` or any build to create it");
            }
        }
        SidecarAction::Ensure => {
            runtime.ensure_ready().await?;
            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start(&format!("Ensuring sidecar {}...", spec.container_name()));

            match sidecar::acquire(runtime.as_ref(), &spec).await {
                Ok(handle) => {
                    AuditLog::new(config)
                        .log(
                            audit::SIDECAR_ACQUIRED,
                            &serde_json::json!({
                                "name": handle.name,
                                "outcome": handle.outcome.to_string(),
                            }),
                        )
                        .await;
                    spinner.stop(&format!("Sidecar {} {}", handle.name, handle.outcome));
                }
                Err(e) => {
                    spinner.stop_error("Sidecar could not be provisioned");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
