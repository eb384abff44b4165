//! Build stages
//!
//! A build is an ordered chain of stages, each producing one cached image
//! layer. Stages refer to each other only through [`StageHandle`] indices
//! into the owning [`StageChain`].

pub mod chain;
pub mod plain;
pub mod source;

pub use chain::StageChain;
pub use plain::{BaseStage, InstructionStage};
pub use source::{CommitCache, SourceRole, SourceStage};

use serde::Serialize;
use std::fmt;

/// Position of a stage in its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageHandle(usize);

impl StageHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Kind of a stage, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Base,
    Instructions,
    Source,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Instructions => write!(f, "instructions"),
            Self::Source => write!(f, "source"),
        }
    }
}

/// One node of the build plan
#[derive(Debug)]
pub enum Stage {
    Base(BaseStage),
    Instructions(InstructionStage),
    Source(SourceStage),
}

impl Stage {
    pub fn name(&self) -> &str {
        match self {
            Stage::Base(_) => BaseStage::NAME,
            Stage::Instructions(stage) => stage.name(),
            Stage::Source(stage) => stage.name(),
        }
    }

    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Base(_) => StageKind::Base,
            Stage::Instructions(_) => StageKind::Instructions,
            Stage::Source(_) => StageKind::Source,
        }
    }

    pub fn as_source(&self) -> Option<&SourceStage> {
        match self {
            Stage::Source(stage) => Some(stage),
            _ => None,
        }
    }
}
