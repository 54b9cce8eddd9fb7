// src/pipeline.rs
//! Build pipeline
//!
//! Drives a build from a validated [`BuildConfig`]:
//!
//! 1. every input group is loaded, filtered and merged into one archive
//! 2. bootstrap and extension groups are relocated, extension groups isolated
//!    and their files renamed where they clash with a directory of any group
//! 3. the groups are merged in configuration order, services unioned and the
//!    field injected
//! 4. the composed manifest is added and the jar written atomically
//!
//! All configuration is checked before the first archive is opened.

use crate::archive::{Archive, Entry, EntryKind, EntryTimestamp, read_archive, write_archive};
use crate::config::{BuildConfig, CheckedConfig};
use crate::error::Result;
use crate::isolate::{Isolator, directories};
use crate::merge::{MergeOutcome, MergePlan, MergeReport, Merger};
use crate::relocate::Relocator;
use crate::transform::TransformChain;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, info};

/// Summary of one input group after its transforms
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub label: String,
    pub role: String,
    pub archives: Vec<String>,
    /// Entries after filtering and transforms
    pub entries: usize,
    pub stages: Vec<String>,
}

/// Summary of a finished build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub output: PathBuf,
    pub entries: usize,
    pub classes: usize,
    pub bytes: usize,
    pub sha256: String,
    pub timestamp: String,
    pub groups: Vec<GroupReport>,
    pub merge: MergeReport,
}

/// One input group after loading and transforms
#[derive(Debug, Clone)]
pub struct LoadedGroup {
    pub archive: Archive,
    pub report: GroupReport,
    /// Copies of the injection target collapsed by the group's duplicate
    /// policy, mapped through the group's transforms
    pub shadowed: Vec<Entry>,
}

/// A configured build
pub struct Pipeline {
    config: BuildConfig,
    checked: CheckedConfig,
}

impl Pipeline {
    /// Validate the configuration; no archive is read yet
    pub fn new(config: BuildConfig) -> Result<Self> {
        let checked = config.check()?;
        Ok(Self { config, checked })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn chain_for(&self, group: usize) -> Result<TransformChain> {
        let role = self.config.inputs[group].role;
        let mut chain = TransformChain::new();
        if role.relocates() && !self.checked.rules.is_empty() {
            chain.add(Box::new(Relocator::new(self.checked.rules.clone())));
        }
        if role.isolates() {
            chain.add(Box::new(Isolator::new(self.config.isolation.clone())?));
        }
        Ok(chain)
    }

    /// Load and transform one input group
    pub fn load_group(&self, index: usize) -> Result<LoadedGroup> {
        let group = &self.config.inputs[index];
        let label = group.label(index);
        let exclude = &self.checked.group_excludes[index];

        let mut archives = Vec::with_capacity(group.paths.len());
        for path in &group.paths {
            archives.push(read_archive(&self.config.resolve(path), group.role)?);
        }
        let names = archives.iter().map(|a| a.id().to_string()).collect();

        let merged = Merger::merge_group(&label, group.role, archives, group.group_policy(), exclude)?;
        debug!(
            "Group {}: {} entries after merge ({} excluded)",
            label,
            merged.archive.len(),
            merged.report.excluded
        );

        let chain = self.chain_for(index)?;
        let archive = chain.apply(&merged.archive)?;

        let mut shadowed = Vec::new();
        if let Some(spec) = &self.checked.injection {
            for entry in merged.skipped.into_iter().filter(|e| e.kind() == EntryKind::Class) {
                let single = Archive::from_entries(&label, group.role, vec![entry])?;
                shadowed.extend(
                    chain
                        .apply(&single)?
                        .into_entries()
                        .into_iter()
                        .filter(|e| e.path() == spec.target),
                );
            }
        }

        let report = GroupReport {
            label,
            role: group.role.to_string(),
            archives: names,
            entries: archive.len(),
            stages: chain.names().into_iter().map(str::to_string).collect(),
        };
        Ok(LoadedGroup {
            archive,
            report,
            shadowed,
        })
    }

    /// Load every group and merge them into the output archive, without writing
    pub fn assemble(&self) -> Result<(MergeOutcome, Vec<GroupReport>)> {
        let output_id = self
            .config
            .output
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output.jar".to_string());

        let mut plan = MergePlan::new(output_id)
            .with_manifest(self.checked.manifest.clone())
            .with_exclude(self.checked.output_exclude.clone());
        if let Some(spec) = &self.checked.injection {
            plan = plan.with_injection(spec.clone());
        }

        let mut loaded = (0..self.config.inputs.len())
            .map(|index| self.load_group(index))
            .collect::<Result<Vec<_>>>()?;

        // Isolated files may clash with directories of any other group
        if self.config.inputs.iter().any(|g| g.role.isolates()) {
            let isolator = Isolator::new(self.config.isolation.clone())?;
            let dirs = directories(loaded.iter().flat_map(|g| g.archive.paths()));
            for (group, load) in self.config.inputs.iter().zip(loaded.iter_mut()) {
                if group.role.isolates() {
                    load.archive = isolator.rename_clashes(&load.archive, &dirs)?;
                }
            }
        }

        let mut groups = Vec::with_capacity(loaded.len());
        for (group, load) in self.config.inputs.iter().zip(loaded) {
            plan.add(load.archive, group.duplicates);
            plan.add_shadowed(load.shadowed);
            groups.push(load.report);
        }

        let outcome = Merger::new().merge(plan)?;
        Ok((outcome, groups))
    }

    /// Run the build and write the output
    pub fn run(&self) -> Result<BuildReport> {
        let timestamp = EntryTimestamp::resolve(self.config.output.timestamp.as_deref())?;
        let (outcome, groups) = self.assemble()?;

        let output = self.config.output_path();
        let bytes = write_archive(&outcome.archive, &output, timestamp)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));

        info!("Built {} (sha256 {})", output.display(), sha256);
        Ok(BuildReport {
            output,
            entries: outcome.archive.len(),
            classes: outcome.archive.count_kind(EntryKind::Class),
            bytes: bytes.len(),
            sha256,
            timestamp: timestamp.to_string(),
            groups,
            merge: outcome.report,
        })
    }
}
