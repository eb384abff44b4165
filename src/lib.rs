//! Strata - incremental container image builds
//!
//! Builds images from git source trees in cached stages. Each stage is
//! addressed by a signature over its inputs; source stages record the
//! commit baked into their layer so later builds only apply the delta.

pub mod audit;
pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod names;
pub mod orchestration;
pub mod plan;
pub mod project;
pub mod repository;
pub mod sidecar;
pub mod signature;
pub mod stage;
pub mod ui;

pub use error::{StrataError, StrataResult};
