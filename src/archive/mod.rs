// src/archive/mod.rs

//! In-memory archive model
//!
//! An [`Archive`] is an ordered set of [`Entry`] values keyed by path. Stages
//! never mutate an archive in place: relocation, isolation and merging all
//! build new archives, which keeps each stage testable on its own.

pub mod filter;
pub mod jar;
pub mod kind;

pub use filter::EntryFilter;
pub use jar::{EntryTimestamp, read_archive, read_archive_bytes, write_archive};
pub use kind::{EntryClassifier, EntryKind};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role an input archive plays in the assembled output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveRole {
    /// The base package, copied without relocation
    Upstream,
    /// Libraries relocated and placed at their relocated paths
    Bootstrap,
    /// Libraries relocated and then isolated under a private prefix
    Extension,
    /// Output of a merge
    Assembled,
}

impl ArchiveRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Bootstrap => "bootstrap",
            Self::Extension => "extension",
            Self::Assembled => "assembled",
        }
    }

    /// Whether archives of this role go through the relocation engine
    pub fn relocates(&self) -> bool {
        matches!(self, Self::Bootstrap | Self::Extension)
    }

    /// Whether archives of this role are isolated after relocation
    pub fn isolates(&self) -> bool {
        matches!(self, Self::Extension)
    }
}

impl std::fmt::Display for ArchiveRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named piece of content inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    path: String,
    kind: EntryKind,
    content: Vec<u8>,
    /// Id of the archive the entry was read from
    source: String,
}

impl Entry {
    /// Create an entry; the kind is derived from the path
    pub fn new(path: impl Into<String>, content: Vec<u8>, source: impl Into<String>) -> Self {
        let path = path.into();
        let kind = EntryClassifier::classify(&path);
        Self {
            path,
            kind,
            content,
            source: source.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Copy of this entry at a different path (reclassified)
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self::new(path, self.content.clone(), self.source.clone())
    }

    /// Copy of this entry with different content
    pub fn with_content(&self, content: Vec<u8>) -> Self {
        Self {
            path: self.path.clone(),
            kind: self.kind,
            content,
            source: self.source.clone(),
        }
    }

    /// Copy of this entry with both a new path and new content
    pub fn rewritten(&self, path: impl Into<String>, content: Vec<u8>) -> Self {
        Self::new(path, content, self.source.clone())
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// An ordered collection of entries with unique paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    id: String,
    role: ArchiveRole,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Archive {
    /// Create an empty archive
    pub fn new(id: impl Into<String>, role: ArchiveRole) -> Self {
        Self {
            id: id.into(),
            role,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build an archive from entries, failing on the first repeated path
    pub fn from_entries(
        id: impl Into<String>,
        role: ArchiveRole,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self> {
        let mut archive = Self::new(id, role);
        for entry in entries {
            archive.insert(entry)?;
        }
        Ok(archive)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> ArchiveRole {
        self.role
    }

    /// Add an entry; a path already present is a [`Error::DuplicateEntry`]
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        if let Some(&existing) = self.index.get(entry.path()) {
            return Err(Error::DuplicateEntry {
                path: entry.path.clone(),
                first: self.entries[existing].source.clone(),
                second: entry.source.clone(),
            });
        }
        self.index.insert(entry.path.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry paths in archive order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path())
    }

    /// Number of entries of a given kind
    pub fn count_kind(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind() == kind).count()
    }

    /// New archive without the entries the filter matches
    pub fn without(&self, filter: &EntryFilter) -> Self {
        if filter.is_empty() {
            return self.clone();
        }
        let mut out = Self::new(self.id.clone(), self.role);
        for entry in self.entries.iter().filter(|e| !filter.matches(e.path())) {
            out.index.insert(entry.path.clone(), out.entries.len());
            out.entries.push(entry.clone());
        }
        out
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
