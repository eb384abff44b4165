//! Sidecar tooling container
//!
//! Source stages apply repository deltas with git, which the base image may
//! not ship. A data-only container built from a fixed tool image carries the
//! binaries in a volume; build containers attach it with `--volumes-from`.
//!
//! The sidecar is created at most once per host and reused by every later
//! build. Inspect and create are not locked across processes, so two builds
//! may both try to create it. Losing that race is a success.

use crate::config::schema::SidecarConfig;
use crate::error::{StrataError, StrataResult};
use crate::names::container_safe;
use crate::orchestration::{ContainerRuntime, SidecarCreate};
use std::fmt;
use tracing::{debug, info};

/// Tool image and the paths it provides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarSpec {
    /// Tool image reference
    pub image: String,
    /// Volume inside the sidecar holding the tools
    pub volume: String,
    /// Directory inside the volume prepended to PATH
    pub bin_dir: String,
}

impl SidecarSpec {
    pub fn from_config(config: &SidecarConfig) -> Self {
        Self {
            image: config.image.clone(),
            volume: config.volume.clone(),
            bin_dir: config.bin_dir.clone(),
        }
    }

    /// Deterministic container name for the tool image
    pub fn container_name(&self) -> String {
        container_safe(&self.image)
    }

    /// Command that exposes the tools to every later build command
    pub fn path_export(&self) -> String {
        format!("export PATH={}:$PATH", self.bin_dir)
    }

    fn create_request(&self) -> SidecarCreate {
        SidecarCreate {
            name: self.container_name(),
            image: self.image.clone(),
            volume: self.volume.clone(),
        }
    }
}

/// How an acquire call obtained the sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// It already existed when inspected
    Reused,
    /// This call created it
    Created,
    /// Creation failed because a concurrent build created it first
    AlreadyExists,
}

impl fmt::Display for AcquireOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused => write!(f, "reused"),
            Self::Created => write!(f, "created"),
            Self::AlreadyExists => write!(f, "already exists"),
        }
    }
}

/// A running sidecar that build containers can attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarHandle {
    pub name: String,
    pub outcome: AcquireOutcome,
}

/// Make sure the sidecar exists, creating it if needed
pub async fn acquire(
    runtime: &dyn ContainerRuntime,
    spec: &SidecarSpec,
) -> StrataResult<SidecarHandle> {
    let name = spec.container_name();

    if runtime.container_exists(&name).await? {
        debug!("Reusing sidecar {}", name);
        return Ok(SidecarHandle {
            name,
            outcome: AcquireOutcome::Reused,
        });
    }

    info!("Creating sidecar {} from {}", name, spec.image);
    let outcome = match runtime.create_sidecar(&spec.create_request()).await {
        Ok(()) => AcquireOutcome::Created,
        Err(create_err) => {
            // A name collision means another build won the race
            if runtime.container_exists(&name).await? {
                debug!("Sidecar {} was created concurrently", name);
                AcquireOutcome::AlreadyExists
            } else {
                return Err(match create_err {
                    e @ StrataError::SidecarProvision { .. } => e,
                    other => StrataError::SidecarProvision {
                        name,
                        reason: other.to_string(),
                    },
                });
            }
        }
    };

    Ok(SidecarHandle { name, outcome })
}

/// Inspect without creating
pub async fn status(runtime: &dyn ContainerRuntime, spec: &SidecarSpec) -> StrataResult<bool> {
    runtime.container_exists(&spec.container_name()).await
}
