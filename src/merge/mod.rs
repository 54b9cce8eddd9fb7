// src/merge/mod.rs

//! Merge and assembly
//!
//! Combines archives into one. Steps are walked in plan order and each entry
//! is placed at its path unless the path is taken, in which case the step's
//! [`DuplicatePolicy`] decides. Two kinds of entries bypass the policy:
//!
//! - jar manifests are dropped, the plan's composed manifest replaces them
//! - service descriptors are unioned per path
//!
//! The output lists the manifest first and everything else sorted by path,
//! so the same plan always yields the same archive.

pub mod plan;

pub use plan::{DuplicatePolicy, MergePlan, MergeStep};

use crate::archive::{Archive, ArchiveRole, Entry, EntryFilter, EntryKind};
use crate::error::{Error, Result};
use crate::inject::FieldInjector;
use crate::services::ServiceDescriptorSet;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A path contributed more than once and resolved by policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRecord {
    pub path: String,
    /// Archive whose entry was kept
    pub kept: String,
    /// Archive whose entry was skipped
    pub skipped: String,
    pub policy: DuplicatePolicy,
    /// Whether both entries had the same content
    pub identical: bool,
}

/// What a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Entries placed in the output, excluding the manifest
    pub placed: usize,
    pub duplicates: Vec<DuplicateRecord>,
    /// Distinct service descriptor paths written
    pub services: usize,
    /// Entries removed by the plan's exclude filter
    pub excluded: usize,
    /// Input manifests replaced by the composed one
    pub manifests_dropped: usize,
    /// Path and provenance of the injected entry
    pub injected: Option<(String, String)>,
}

/// State carried across merges run by one [`Merger`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeContext {
    /// The field injection has been applied
    pub already_injected: bool,
}

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub archive: Archive,
    pub report: MergeReport,
    /// Entries left out by a duplicate policy, in merge order
    pub skipped: Vec<Entry>,
}

/// Accumulates placed entries and service descriptors
struct Assembly {
    entries: BTreeMap<String, Entry>,
    services: BTreeMap<String, ServiceDescriptorSet>,
    skipped: Vec<Entry>,
    report: MergeReport,
}

impl Assembly {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            services: BTreeMap::new(),
            skipped: Vec::new(),
            report: MergeReport::default(),
        }
    }

    fn place(&mut self, entry: &Entry, policy: DuplicatePolicy) -> Result<()> {
        match entry.kind() {
            EntryKind::Manifest => {
                debug!("Dropping manifest of {}", entry.source());
                self.report.manifests_dropped += 1;
                return Ok(());
            }
            EntryKind::ServiceDescriptor => {
                self.services
                    .entry(entry.path().to_string())
                    .or_insert_with(|| ServiceDescriptorSet::new(entry.path()))
                    .add(entry)?;
                return Ok(());
            }
            _ => {}
        }

        let Some(existing) = self.entries.get(entry.path()) else {
            self.entries.insert(entry.path().to_string(), entry.clone());
            return Ok(());
        };

        let identical = existing.content() == entry.content();
        match policy {
            DuplicatePolicy::FailOnDuplicate => {
                return Err(Error::DuplicateEntry {
                    path: entry.path().to_string(),
                    first: existing.source().to_string(),
                    second: entry.source().to_string(),
                });
            }
            DuplicatePolicy::FirstWins if !identical => {
                warn!(
                    "Duplicate {} differs: keeping {}, skipping {}",
                    entry.path(),
                    existing.source(),
                    entry.source()
                );
            }
            _ => {
                debug!(
                    "Duplicate {}: keeping {}, skipping {}",
                    entry.path(),
                    existing.source(),
                    entry.source()
                );
            }
        }
        self.report.duplicates.push(DuplicateRecord {
            path: entry.path().to_string(),
            kept: existing.source().to_string(),
            skipped: entry.source().to_string(),
            policy,
            identical,
        });
        self.skipped.push(entry.clone());
        Ok(())
    }

    /// Fold service descriptors into the entry map
    fn finish_services(&mut self) -> Result<()> {
        self.report.services = self.services.len();
        for (path, set) in std::mem::take(&mut self.services) {
            if let Some(existing) = self.entries.get(&path) {
                return Err(Error::DuplicateEntry {
                    path,
                    first: existing.source().to_string(),
                    second: set.contributors().join("+"),
                });
            }
            self.entries.insert(path, set.to_entry());
        }
        Ok(())
    }
}

/// Runs merge plans
#[derive(Debug, Default)]
pub struct Merger {
    context: MergeContext,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &MergeContext {
        &self.context
    }

    /// Assemble the plan into one archive
    pub fn merge(&mut self, plan: MergePlan) -> Result<MergeOutcome> {
        let injector = match &plan.injection {
            Some(spec) => Some(FieldInjector::new(spec.clone())?),
            None => None,
        };

        // Cardinality is checked over every input, before duplicates collapse,
        // including copies already collapsed by earlier group merges
        if let Some(injector) = &injector {
            let provenances: Vec<String> = plan
                .steps
                .iter()
                .flat_map(|s| s.archive.iter())
                .chain(plan.shadowed.iter())
                .filter(|e| injector.is_target(e) && !plan.exclude.matches(e.path()))
                .map(|e| e.source().to_string())
                .collect();
            match provenances.len() {
                0 => {
                    return Err(Error::InjectionTargetNotFound {
                        target: injector.target().to_string(),
                    });
                }
                1 => {}
                count => {
                    return Err(Error::AmbiguousInjectionTarget {
                        target: injector.target().to_string(),
                        count,
                        provenances,
                    });
                }
            }
        }

        let mut assembly = Assembly::new();
        for step in &plan.steps {
            debug!(
                "Merging {} ({} entries, duplicates: {})",
                step.archive.id(),
                step.archive.len(),
                step.policy
            );
            for entry in &step.archive {
                if plan.exclude.matches(entry.path()) {
                    assembly.report.excluded += 1;
                    continue;
                }
                assembly.place(entry, step.policy)?;
            }
        }
        assembly.finish_services()?;

        if let Some(injector) = &injector {
            if self.context.already_injected {
                warn!(
                    "Field {} was already injected by this merger; skipping",
                    injector.spec().name
                );
            } else {
                let target = assembly
                    .entries
                    .get(injector.target())
                    .ok_or_else(|| Error::InjectionTargetNotFound {
                        target: injector.target().to_string(),
                    })?;
                let injected = injector.inject(target)?;
                assembly.report.injected =
                    Some((injected.path().to_string(), injected.source().to_string()));
                assembly
                    .entries
                    .insert(injected.path().to_string(), injected);
                self.context.already_injected = true;
            }
        }

        let Assembly {
            entries,
            skipped,
            mut report,
            ..
        } = assembly;
        report.placed = entries.len();

        let mut archive = Archive::new(plan.id.clone(), ArchiveRole::Assembled);
        if let Some(manifest) = &plan.manifest {
            archive.insert(manifest.to_entry(&plan.id))?;
        }
        for entry in entries.into_values() {
            archive.insert(entry)?;
        }

        info!(
            "Merged {} archives into {}: {} entries, {} duplicates skipped, {} service descriptors",
            plan.steps.len(),
            plan.id,
            report.placed,
            report.duplicates.len(),
            report.services
        );
        Ok(MergeOutcome {
            archive,
            report,
            skipped,
        })
    }

    /// Merge the archives of one input group
    ///
    /// Same placement rules as [`Merger::merge`], without a manifest or
    /// injection. The result keeps the group's role.
    pub fn merge_group(
        id: &str,
        role: ArchiveRole,
        archives: Vec<Archive>,
        policy: DuplicatePolicy,
        exclude: &EntryFilter,
    ) -> Result<MergeOutcome> {
        let mut plan = MergePlan::new(id).with_exclude(exclude.clone());
        for archive in archives {
            plan.add(archive, policy);
        }
        let outcome = Merger::new().merge(plan)?;
        let archive = Archive::from_entries(id, role, outcome.archive.into_entries())?;
        Ok(MergeOutcome {
            archive,
            report: outcome.report,
            skipped: outcome.skipped,
        })
    }
}
