//! Container runtime backed by the docker or podman CLI
//!
//! Implements the ContainerRuntime trait by shelling out. Only exit codes
//! decide success; stderr is kept for error messages.

use crate::error::{StrataError, StrataResult};
use crate::orchestration::container::{ImageSpec, SidecarCreate};
use crate::orchestration::factory::RuntimeKind;
use crate::orchestration::runtime::ContainerRuntime;
use crate::orchestration::{build_error_output, stream_child_output};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Container runtime driving a container CLI
pub struct CliRuntime {
    kind: RuntimeKind,
}

impl CliRuntime {
    /// Create a runtime for the given CLI
    pub fn new(kind: RuntimeKind) -> Self {
        Self { kind }
    }

    fn binary(&self) -> &'static str {
        self.kind.binary()
    }

    /// Check if the CLI is installed
    async fn installed(&self) -> bool {
        Command::new(self.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute a runtime command and return the output
    async fn exec(&self, args: &[&str]) -> StrataResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.binary(), args);

        Command::new(self.binary())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| StrataError::command_failed(format!("{} {:?}", self.binary(), args), e))
    }

    /// Pull an image
    async fn pull(&self, image: &str) -> StrataResult<()> {
        info!("Pulling image: {}", image);

        let output = self.exec(&["pull", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StrataError::ImagePull {
                image: image.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    /// Arguments for the throwaway build container
    fn build_run_args(spec: &ImageSpec, container_name: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--name".to_string(),
            container_name.to_string(),
        ];

        for v in spec.volumes() {
            args.push("--volume".to_string());
            args.push(v.clone());
        }

        for c in spec.volumes_from() {
            args.push("--volumes-from".to_string());
            args.push(c.clone());
        }

        args.push("--entrypoint".to_string());
        args.push("/bin/sh".to_string());
        args.push(spec.from.clone());
        args.push("-ec".to_string());
        args.push(spec.script());
        args
    }

    /// `commit` arguments restoring the parent's entrypoint and command,
    /// which the build run overrides
    fn commit_args(container_name: &str, tag: &str, entrypoint: &str, cmd: &str) -> Vec<String> {
        vec![
            "commit".to_string(),
            "--change".to_string(),
            format!("ENTRYPOINT {}", json_array_or_empty(entrypoint)),
            "--change".to_string(),
            format!("CMD {}", json_array_or_empty(cmd)),
            container_name.to_string(),
            tag.to_string(),
        ]
    }

    /// One `.Config` field of `image` as JSON
    async fn inspect_config(&self, image: &str, field: &str) -> StrataResult<String> {
        let format = format!("{{{{json .Config.{}}}}}", field);
        let output = self.exec(&["image", "inspect", "--format", &format, image]).await?;
        if !output.status.success() {
            return Err(StrataError::command_exec(
                format!("{} image inspect {}", self.binary(), image),
                String::from_utf8_lossy(&output.stderr),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Exec-form instruction value; anything but a JSON array clears it
fn json_array_or_empty(value: &str) -> &str {
    let value = value.trim();
    if value.starts_with('[') {
        value
    } else {
        "[]"
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn is_available(&self) -> StrataResult<bool> {
        if !self.installed().await {
            return Ok(false);
        }
        Ok(self.exec(&["info"]).await?.status.success())
    }

    async fn ensure_ready(&self) -> StrataResult<()> {
        if !self.installed().await {
            return Err(StrataError::RuntimeNotFound {
                binary: self.binary().to_string(),
            });
        }

        let output = self.exec(&["info"]).await?;
        if !output.status.success() {
            return Err(StrataError::RuntimeUnavailable {
                binary: self.binary().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    async fn container_exists(&self, name: &str) -> StrataResult<bool> {
        let output = self.exec(&["inspect", name]).await?;
        Ok(output.status.success())
    }

    async fn create_sidecar(&self, request: &SidecarCreate) -> StrataResult<()> {
        let output = self
            .exec(&[
                "run",
                "--restart=no",
                "--name",
                &request.name,
                "--volume",
                &request.volume,
                &request.image,
            ])
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(StrataError::SidecarProvision {
                name: request.name.clone(),
                reason: format!(
                    "{} run exited with {}",
                    self.binary(),
                    output.status.code().unwrap_or(-1)
                ),
            })
        }
    }

    async fn remove_container(&self, name: &str) -> StrataResult<()> {
        debug!("Removing container: {}", name);

        let output = self.exec(&["rm", "-f", name]).await?;

        if output.status.success() {
            Ok(())
        } else {
            // Ignore error if container doesn't exist
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(StrataError::command_exec(
                    format!("{} rm", self.binary()),
                    stderr,
                ))
            }
        }
    }

    async fn image_exists(&self, image: &str) -> StrataResult<bool> {
        let output = self.exec(&["image", "inspect", image]).await?;
        Ok(output.status.success())
    }

    async fn tag_image(&self, source: &str, tag: &str) -> StrataResult<()> {
        if !self.image_exists(source).await? {
            self.pull(source).await?;
        }

        let output = self.exec(&["tag", source, tag]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(StrataError::ImageTag {
                source_image: source.to_string(),
                tag: tag.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn build_image(
        &self,
        spec: &ImageSpec,
        tag: &str,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> StrataResult<()> {
        let entrypoint = self.inspect_config(&spec.from, "Entrypoint").await?;
        let cmd = self.inspect_config(&spec.from, "Cmd").await?;

        let container_name = format!("strata-build-{}", uuid::Uuid::new_v4());
        let args = Self::build_run_args(spec, &container_name);
        debug!("Building {}: {} {:?}", tag, self.binary(), args);

        let mut child = Command::new(self.binary())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StrataError::command_failed(format!("{} run", self.binary()), e))?;

        let lines = stream_child_output(&mut child, on_output).await?;
        let status = child
            .wait()
            .await
            .map_err(|e| StrataError::command_failed(format!("{} run", self.binary()), e))?;

        if !status.success() {
            let _ = self.remove_container(&container_name).await;
            return Err(StrataError::ImageBuild {
                tag: tag.to_string(),
                output: build_error_output(&lines.join("\n"), ""),
            });
        }

        let commit_args = Self::commit_args(&container_name, tag, &entrypoint, &cmd);
        let commit_args: Vec<&str> = commit_args.iter().map(String::as_str).collect();
        let commit = self.exec(&commit_args).await;
        let _ = self.remove_container(&container_name).await;
        let commit = commit?;

        if commit.status.success() {
            info!("Committed {}", tag);
            Ok(())
        } else {
            Err(StrataError::ImageBuild {
                tag: tag.to_string(),
                output: build_error_output(
                    &String::from_utf8_lossy(&commit.stdout),
                    &String::from_utf8_lossy(&commit.stderr),
                ),
            })
        }
    }

    fn runtime_name(&self) -> &'static str {
        self.kind.name()
    }
}
