//! Configuration schema for strata
//!
//! Configuration is stored at `~/.config/strata/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container runtime settings
    pub runtime: RuntimeConfig,

    /// Sidecar tooling settings
    pub sidecar: SidecarConfig,

    /// Build settings
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Container runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime CLI: "docker" or "podman"
    pub binary: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

/// Sidecar tooling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Tool image providing git inside build containers
    pub image: String,

    /// Volume inside the tool image holding the tools
    pub volume: String,

    /// Directory prepended to PATH in build containers
    pub bin_dir: String,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            image: "dappdeps/gitartifact:0.1.3".to_string(),
            volume: "/.dapp/deps/gitartifact".to_string(),
            bin_dir: "/.dapp/deps/gitartifact/bin".to_string(),
        }
    }
}

/// Build settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory for build state such as the commit ledger.
    /// Defaults to `.strata-build` next to strata.toml.
    pub dir: Option<PathBuf>,
}
