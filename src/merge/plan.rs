// src/merge/plan.rs

//! Merge plans and duplicate policies

use crate::archive::{Archive, Entry, EntryFilter};
use crate::inject::FieldInjectionSpec;
use crate::manifest::OutputManifest;
use serde::{Deserialize, Serialize};

/// What to do when a path is already present in the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Abort the build, naming both archives
    #[default]
    #[serde(rename = "fail")]
    FailOnDuplicate,
    /// Keep the earlier entry, warning when the contents differ
    #[serde(rename = "first-wins")]
    FirstWins,
    /// Keep the earlier entry without a warning
    #[serde(rename = "exclude")]
    Exclude,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailOnDuplicate => "fail",
            Self::FirstWins => "first-wins",
            Self::Exclude => "exclude",
        }
    }
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One archive contributed to a merge
#[derive(Debug, Clone)]
pub struct MergeStep {
    pub archive: Archive,
    /// Applied when an entry of this archive hits an existing path
    pub policy: DuplicatePolicy,
}

/// Everything the merger needs to assemble an output archive
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// Id of the assembled archive
    pub id: String,
    pub steps: Vec<MergeStep>,
    pub injection: Option<FieldInjectionSpec>,
    pub manifest: Option<OutputManifest>,
    /// Entries dropped from every step before placement
    pub exclude: EntryFilter,
    /// Entries already collapsed by an earlier merge; never placed, but
    /// counted when locating the injection target
    pub shadowed: Vec<Entry>,
}

impl MergePlan {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            injection: None,
            manifest: None,
            exclude: EntryFilter::default(),
            shadowed: Vec::new(),
        }
    }

    /// Append a step; steps are merged in the order they are added
    pub fn add(&mut self, archive: Archive, policy: DuplicatePolicy) -> &mut Self {
        self.steps.push(MergeStep { archive, policy });
        self
    }

    pub fn with_injection(mut self, spec: FieldInjectionSpec) -> Self {
        self.injection = Some(spec);
        self
    }

    pub fn with_manifest(mut self, manifest: OutputManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn with_exclude(mut self, exclude: EntryFilter) -> Self {
        self.exclude = exclude;
        self
    }

    /// Record entries hidden by an earlier merge
    pub fn add_shadowed(&mut self, entries: impl IntoIterator<Item = Entry>) -> &mut Self {
        self.shadowed.extend(entries);
        self
    }

    /// Total number of entries over all steps
    pub fn entry_count(&self) -> usize {
        self.steps.iter().map(|s| s.archive.len()).sum()
    }
}
