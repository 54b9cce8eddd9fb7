// src/lib.rs

//! shadepack: fat jar assembly
//!
//! Builds one self-contained agent jar from an upstream jar, bootstrap
//! libraries and extension libraries.
//!
//! # Architecture
//!
//! - Archives are immutable values: every stage returns a new [`Archive`]
//! - Relocation rewrites class constant pools, resource paths and service
//!   files so bundled libraries cannot clash with application copies
//! - Isolation hides extension libraries under a private prefix
//! - Merging is deterministic: fixed order, fixed timestamps, explicit
//!   duplicate policies
//! - One structural class edit: adding a field declaration

pub mod archive;
pub mod classfile;
pub mod config;
mod error;
pub mod inject;
pub mod isolate;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod relocate;
pub mod services;
pub mod transform;

pub use archive::{Archive, ArchiveRole, Entry, EntryClassifier, EntryFilter, EntryKind, EntryTimestamp};
pub use classfile::{ClassFile, ClassFormatError, FieldAccess};
pub use config::{BuildConfig, ConfigError};
pub use error::{Error, ErrorCategory, Result};
pub use inject::{FieldInjectionSpec, FieldInjector};
pub use isolate::{IsolationConfig, Isolator};
pub use manifest::{ManifestComposer, ManifestSpec, OutputManifest};
pub use merge::{DuplicatePolicy, MergeContext, MergeOutcome, MergePlan, MergeReport, MergeStep, Merger};
pub use pipeline::{BuildReport, GroupReport, LoadedGroup, Pipeline};
pub use relocate::{RelocationRule, Relocator, RuleSet};
pub use services::ServiceDescriptorSet;
pub use transform::{ArchiveTransform, EntryAction, TransformChain};
