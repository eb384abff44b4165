//! Runtime factory for creating the configured container runtime

use crate::config::Config;
use crate::error::{StrataError, StrataResult};
use crate::orchestration::cli_runtime::CliRuntime;
use crate::orchestration::runtime::ContainerRuntime;
use std::str::FromStr;

/// Supported container runtime CLIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// docker CLI
    Docker,
    /// podman CLI
    Podman,
}

impl RuntimeKind {
    /// Executable to invoke
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }

    /// Get a human-readable runtime name
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeKind::Docker => "Docker",
            RuntimeKind::Podman => "Podman",
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "podman" => Ok(RuntimeKind::Podman),
            other => Err(StrataError::UnsupportedRuntime(other.to_string())),
        }
    }
}

/// Create the container runtime selected by `runtime.binary`
pub fn create_runtime(config: &Config) -> StrataResult<Box<dyn ContainerRuntime>> {
    let kind: RuntimeKind = config.runtime.binary.parse()?;
    Ok(Box::new(CliRuntime::new(kind)))
}
