// src/relocate/mod.rs

//! Relocation engine
//!
//! Moves classes and resources to new package prefixes and rewrites every
//! reference to them:
//!
//! - classes: Utf8 constants are rewritten token-wise, nothing else in the
//!   classfile changes; the entry is renamed to its new internal name
//! - text resources: path and content are rewritten
//! - binary resources: only the path is rewritten
//! - service descriptors: the file name and each provider line are rewritten
//! - `module-info.class` is dropped, since module descriptors no longer
//!   match the relocated packages
//!
//! Entries are processed in parallel; output order matches input order.

pub mod rules;
pub mod text;

pub use rules::{RelocationRule, RuleSet, Separator};
pub use text::{ScanMode, relocate_bytes, relocate_str};

use crate::archive::{Archive, Entry, EntryKind};
use crate::classfile::ClassFile;
use crate::error::{Error, Result};
use crate::transform::{ArchiveTransform, EntryAction};
use rayon::prelude::*;
use std::borrow::Cow;
use tracing::{debug, info};

/// Extensions of resources whose content is rewritten
const TEXT_EXTENSIONS: &[&str] = &[
    "properties",
    "xml",
    "txt",
    "json",
    "yaml",
    "yml",
    "conf",
    "cfg",
    "ini",
    "html",
    "htm",
    "factories",
    "handlers",
    "schemas",
    "imports",
    "list",
];

const VERSIONS_DIR: &str = "META-INF/versions/";

/// Split `META-INF/versions/<n>/rest` into its version prefix and `rest`
pub fn split_versioned(path: &str) -> (&str, &str) {
    if let Some(rest) = path.strip_prefix(VERSIONS_DIR) {
        if let Some(slash) = rest.find('/') {
            if rest[..slash].bytes().all(|b| b.is_ascii_digit()) && slash > 0 {
                let cut = VERSIONS_DIR.len() + slash + 1;
                return (&path[..cut], &path[cut..]);
            }
        }
    }
    ("", path)
}

/// Whether the entry is a module descriptor, at the root or versioned
pub fn is_module_info(path: &str) -> bool {
    split_versioned(path).1 == "module-info.class"
}

fn is_text_resource(entry: &Entry) -> bool {
    let Some((_, ext)) = entry.file_name().rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    TEXT_EXTENSIONS.contains(&ext.as_str())
        && !entry.content().contains(&0)
        && std::str::from_utf8(entry.content()).is_ok()
}

/// The relocation stage
pub struct Relocator {
    rules: RuleSet,
}

impl Relocator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Compile rules and build the stage
    pub fn from_rules(rules: &[RelocationRule]) -> Result<Self> {
        Ok(Self::new(RuleSet::compile(rules)?))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Relocate every entry of an archive
    pub fn relocate(&self, archive: &Archive) -> Result<Archive> {
        if self.rules.is_empty() {
            return Ok(archive.clone());
        }

        let actions = archive
            .entries()
            .par_iter()
            .map(|entry| self.relocate_entry(entry))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Archive::new(archive.id(), archive.role());
        let mut renamed = 0usize;
        let mut dropped = 0usize;
        for (entry, action) in archive.iter().zip(actions) {
            match action.resolve(entry) {
                Some(mapped) => {
                    if mapped.path() != entry.path() {
                        renamed += 1;
                    }
                    out.insert(mapped)?;
                }
                None => dropped += 1,
            }
        }

        info!(
            "Relocated {}: {} entries, {} renamed, {} dropped",
            archive.id(),
            out.len(),
            renamed,
            dropped
        );
        Ok(out)
    }

    /// Decide what happens to one entry
    pub fn relocate_entry(&self, entry: &Entry) -> Result<EntryAction> {
        match entry.kind() {
            EntryKind::Class => self.relocate_class(entry),
            EntryKind::Resource => Ok(self.relocate_resource(entry)),
            EntryKind::ServiceDescriptor => self.relocate_service(entry),
            EntryKind::Manifest | EntryKind::Other => Ok(EntryAction::Keep),
        }
    }

    /// Relocate a class entry path, keeping its suffix and version prefix
    pub fn relocate_class_path(&self, path: &str) -> Option<String> {
        let (version, rest) = split_versioned(path);
        let (name, suffix) = match rest.rfind('.') {
            Some(dot) => (&rest[..dot], &rest[dot..]),
            None => (rest, ""),
        };
        let relocated = self.rules.relocate_symbol(name)?;
        Some(format!("{}{}{}", version, relocated, suffix))
    }

    /// Relocate a resource path, keeping any version prefix
    pub fn relocate_resource_path(&self, path: &str) -> Option<String> {
        let (version, rest) = split_versioned(path);
        if !rest.contains('/') {
            return None;
        }
        let relocated = self.rules.relocate_symbol(rest)?;
        Some(format!("{}{}", version, relocated))
    }

    fn relocate_class(&self, entry: &Entry) -> Result<EntryAction> {
        if is_module_info(entry.path()) {
            debug!("Dropping module descriptor {}", entry.path());
            return Ok(EntryAction::Drop);
        }

        let content = self
            .relocate_class_bytes(entry.content())
            .map_err(|source| Error::ClassFormat {
                entry: entry.path().to_string(),
                archive: entry.source().to_string(),
                source,
            })?;
        let path = self.relocate_class_path(entry.path());

        Ok(match (path, content) {
            (None, Cow::Borrowed(_)) => EntryAction::Keep,
            (None, Cow::Owned(bytes)) => EntryAction::Replace(entry.with_content(bytes)),
            (Some(path), content) => {
                EntryAction::Replace(entry.rewritten(path, content.into_owned()))
            }
        })
    }

    /// Rewrite the Utf8 constants of a classfile
    ///
    /// Returns the input unchanged when no constant needed rewriting.
    pub fn relocate_class_bytes<'a>(
        &self,
        bytes: &'a [u8],
    ) -> std::result::Result<Cow<'a, [u8]>, crate::classfile::ClassFormatError> {
        let mut class = ClassFile::parse(bytes)?;
        let mut changed = false;

        for index in class.constant_pool.utf8_indices() {
            let relocated = match class.constant_pool.utf8(index) {
                Some(value) => match relocate_bytes(&self.rules, value, ScanMode::Descriptor) {
                    Cow::Owned(bytes) => bytes,
                    Cow::Borrowed(_) => continue,
                },
                None => continue,
            };
            class.constant_pool.set_utf8(index, relocated)?;
            changed = true;
        }

        if changed {
            Ok(Cow::Owned(class.to_bytes()))
        } else {
            Ok(Cow::Borrowed(bytes))
        }
    }

    fn relocate_resource(&self, entry: &Entry) -> EntryAction {
        let path = self.relocate_resource_path(entry.path());
        let content = if is_text_resource(entry) {
            relocate_bytes(&self.rules, entry.content(), ScanMode::Text)
        } else {
            Cow::Borrowed(entry.content())
        };

        match (path, content) {
            (None, Cow::Borrowed(_)) => EntryAction::Keep,
            (None, Cow::Owned(bytes)) => EntryAction::Replace(entry.with_content(bytes)),
            (Some(path), content) => EntryAction::Replace(entry.rewritten(path, content.into_owned())),
        }
    }

    fn relocate_service(&self, entry: &Entry) -> Result<EntryAction> {
        let path = entry.path();
        let split = path.len() - entry.file_name().len();
        let dir = &path[..split];
        let service = entry.file_name();

        let new_path = self
            .rules
            .relocate_symbol(service)
            .map(|s| format!("{}{}", dir, s));
        let content = self.relocate_provider_lines(entry)?;

        Ok(match (new_path, content) {
            (None, None) => EntryAction::Keep,
            (None, Some(bytes)) => EntryAction::Replace(entry.with_content(bytes)),
            (Some(p), bytes) => EntryAction::Replace(
                entry.rewritten(p, bytes.unwrap_or_else(|| entry.content().to_vec())),
            ),
        })
    }

    /// Relocate the provider name on each line, keeping comments and layout
    ///
    /// `None` when no line changed. A descriptor that is not UTF-8 is an
    /// input error.
    fn relocate_provider_lines(&self, entry: &Entry) -> Result<Option<Vec<u8>>> {
        let text =
            std::str::from_utf8(entry.content()).map_err(|e| Error::service_encoding(entry, e))?;
        let mut out = String::with_capacity(text.len() + 32);
        let mut changed = false;

        for line in text.split_inclusive('\n') {
            let (body, comment) = match line.find('#') {
                Some(i) => line.split_at(i),
                None => (line, ""),
            };
            let name = body.trim();
            match (!name.is_empty())
                .then(|| self.rules.relocate_symbol(name))
                .flatten()
            {
                Some(relocated) => {
                    let lead = body.len() - body.trim_start().len();
                    let tail = &body[lead + name.len()..];
                    out.push_str(&body[..lead]);
                    out.push_str(&relocated);
                    out.push_str(tail);
                    out.push_str(comment);
                    changed = true;
                }
                None => out.push_str(line),
            }
        }

        Ok(changed.then(|| out.into_bytes()))
    }

    /// Symbols under a relocated prefix still referenced by a class or
    /// service descriptor
    ///
    /// Excluded symbols are not reported. An empty result after relocation
    /// means every reference was rewritten.
    pub fn residual_references(&self, archive: &Archive) -> Result<Vec<(String, String)>> {
        let mut found = Vec::new();
        for entry in archive {
            match entry.kind() {
                EntryKind::Class => {
                    let class = ClassFile::parse(entry.content()).map_err(|source| {
                        Error::ClassFormat {
                            entry: entry.path().to_string(),
                            archive: entry.source().to_string(),
                            source,
                        }
                    })?;
                    for index in class.constant_pool.utf8_indices() {
                        let Some(value) = class.constant_pool.utf8(index) else {
                            continue;
                        };
                        if let Cow::Owned(_) = relocate_bytes(&self.rules, value, ScanMode::Descriptor)
                        {
                            found.push((
                                entry.path().to_string(),
                                String::from_utf8_lossy(value).into_owned(),
                            ));
                        }
                    }
                }
                EntryKind::ServiceDescriptor => {
                    if self.rules.matches(entry.file_name())
                        || self.relocate_provider_lines(entry)?.is_some()
                    {
                        found.push((entry.path().to_string(), "provider".to_string()));
                    }
                }
                _ => {}
            }
        }
        Ok(found)
    }
}

impl ArchiveTransform for Relocator {
    fn name(&self) -> &str {
        "relocate"
    }

    fn transform(&self, archive: &Archive) -> Result<Archive> {
        self.relocate(archive)
    }
}
