// src/transform.rs
//! Archive transforms
//!
//! Relocation and isolation both take an archive and produce a new one. They
//! implement [`ArchiveTransform`] so an input group can run its stages as a
//! [`TransformChain`] in a fixed order.

use crate::archive::{Archive, ArchiveRole, Entry};
use crate::error::Result;
use tracing::debug;

/// What a transform decided for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Keep the entry unchanged
    Keep,
    /// Replace the entry (new path, new content, or both)
    Replace(Entry),
    /// Leave the entry out of the output
    Drop,
}

impl EntryAction {
    /// Resolve the action against the entry it was computed for
    pub fn resolve(self, original: &Entry) -> Option<Entry> {
        match self {
            Self::Keep => Some(original.clone()),
            Self::Replace(entry) => Some(entry),
            Self::Drop => None,
        }
    }
}

/// A stage that maps an archive to a new archive
pub trait ArchiveTransform: Send + Sync {
    /// Stage name for logging
    fn name(&self) -> &str;

    /// Produce the transformed archive; the input is never modified
    fn transform(&self, archive: &Archive) -> Result<Archive>;
}

/// Transforms applied in sequence
#[derive(Default)]
pub struct TransformChain {
    stages: Vec<Box<dyn ArchiveTransform>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage to the chain
    pub fn add(&mut self, stage: Box<dyn ArchiveTransform>) {
        self.stages.push(stage);
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in application order
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage; the result keeps the input's id and role
    pub fn apply(&self, archive: &Archive) -> Result<Archive> {
        let mut current = archive.clone();
        for stage in &self.stages {
            let before = current.len();
            current = stage.transform(&current)?;
            debug!(
                "{}: {} -> {} entries in {}",
                stage.name(),
                before,
                current.len(),
                current.id()
            );
        }
        Ok(current)
    }
}

/// Build a new archive by applying a per-entry action to every entry, in order
pub(crate) fn map_entries<F>(archive: &Archive, role: ArchiveRole, mut f: F) -> Result<Archive>
where
    F: FnMut(&Entry) -> Result<EntryAction>,
{
    let mut out = Archive::new(archive.id(), role);
    for entry in archive {
        if let Some(mapped) = f(entry)?.resolve(entry) {
            out.insert(mapped)?;
        }
    }
    Ok(out)
}
