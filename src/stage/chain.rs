//! Ordered stage chain with neighbour lookups

use crate::stage::{SourceStage, Stage, StageHandle, StageKind};

/// Owned, ordered sequence of stages
#[derive(Debug, Default)]
pub struct StageChain {
    stages: Vec<Stage>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage built from its own handle
    pub fn push_with(&mut self, make: impl FnOnce(StageHandle) -> Stage) -> StageHandle {
        let handle = StageHandle::new(self.stages.len());
        self.stages.push(make(handle));
        handle
    }

    pub fn get(&self, handle: StageHandle) -> Option<&Stage> {
        self.stages.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// All handles in chain order
    pub fn handles(&self) -> impl Iterator<Item = StageHandle> + '_ {
        (0..self.stages.len()).map(StageHandle::new)
    }

    /// Handle of the stage called `name`
    pub fn find(&self, name: &str) -> Option<StageHandle> {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .map(StageHandle::new)
    }

    pub fn prev(&self, handle: StageHandle) -> Option<StageHandle> {
        handle.index().checked_sub(1).map(StageHandle::new)
    }

    pub fn next(&self, handle: StageHandle) -> Option<StageHandle> {
        let index = handle.index() + 1;
        (index < self.stages.len()).then(|| StageHandle::new(index))
    }

    /// Nearest source stage before `handle`
    pub fn prev_source(&self, handle: StageHandle) -> Option<StageHandle> {
        self.stages[..handle.index().min(self.stages.len())]
            .iter()
            .rposition(|s| s.kind() == StageKind::Source)
            .map(StageHandle::new)
    }

    /// Nearest source stage after `handle`
    pub fn next_source(&self, handle: StageHandle) -> Option<StageHandle> {
        let start = handle.index() + 1;
        self.stages
            .get(start..)?
            .iter()
            .position(|s| s.kind() == StageKind::Source)
            .map(|offset| StageHandle::new(start + offset))
    }

    /// The source stage at `handle`, if it is one
    pub fn source(&self, handle: StageHandle) -> Option<&SourceStage> {
        self.get(handle).and_then(Stage::as_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{BaseStage, InstructionStage, SourceRole, SourceStage};

    fn chain() -> StageChain {
        let mut chain = StageChain::new();
        chain.push_with(|_| Stage::Base(BaseStage::new("alpine:3")));
        chain.push_with(|h| Stage::Source(SourceStage::new("source_archive", SourceRole::Archive, h)));
        chain.push_with(|_| Stage::Instructions(InstructionStage::new("install", vec![])));
        chain.push_with(|_| Stage::Instructions(InstructionStage::new("setup", vec![])));
        chain.push_with(|h| {
            Stage::Source(SourceStage::new("source_latest_patch", SourceRole::LatestPatch, h))
        });
        chain
    }

    #[test]
    fn prev_and_next() {
        let chain = chain();
        let first = StageHandle::new(0);
        let last = StageHandle::new(4);

        assert_eq!(chain.prev(first), None);
        assert_eq!(chain.next(first), Some(StageHandle::new(1)));
        assert_eq!(chain.prev(last), Some(StageHandle::new(3)));
        assert_eq!(chain.next(last), None);
    }

    #[test]
    fn nearest_source_lookups() {
        let chain = chain();

        assert_eq!(chain.prev_source(StageHandle::new(3)), Some(StageHandle::new(1)));
        assert_eq!(chain.prev_source(StageHandle::new(1)), None);
        assert_eq!(chain.next_source(StageHandle::new(1)), Some(StageHandle::new(4)));
        assert_eq!(chain.next_source(StageHandle::new(4)), None);
        assert_eq!(chain.next_source(StageHandle::new(0)), Some(StageHandle::new(1)));
    }

    #[test]
    fn find_and_source() {
        let chain = chain();
        let handle = chain.find("source_archive").unwrap();

        assert_eq!(handle, StageHandle::new(1));
        assert_eq!(chain.source(handle).unwrap().handle(), handle);
        assert!(chain.source(StageHandle::new(2)).is_none());
        assert!(chain.find("missing").is_none());
    }

    #[test]
    fn handles_in_order() {
        let chain = chain();
        let names: Vec<&str> = chain
            .handles()
            .map(|h| chain.get(h).unwrap().name())
            .collect();
        assert_eq!(
            names,
            vec!["from", "source_archive", "install", "setup", "source_latest_patch"]
        );
        assert_eq!(chain.len(), 5);
    }
}
