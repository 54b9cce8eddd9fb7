// src/isolate.rs
//! Isolation stage
//!
//! Moves an extension library under a private prefix so its classes are
//! invisible to the normal class loader. Class files are renamed to a
//! non-loadable suffix; a dedicated loader resolves them from the prefix.

use crate::archive::kind::CLASS_SUFFIX;
use crate::archive::{Archive, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::transform::{ArchiveTransform, EntryAction, map_entries};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Suffix appended to files that would otherwise clash
pub const RENAMED_SUFFIX: &str = ".renamed";

/// Isolation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Directory the library is moved under
    pub prefix: String,
    /// Suffix (without dot) given to class files
    pub class_suffix: String,
    /// Root-level files renamed with a `.renamed` suffix
    pub rename: Vec<String>,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            prefix: "inst".to_string(),
            class_suffix: "classdata".to_string(),
            rename: vec!["LICENSE".to_string()],
        }
    }
}

impl IsolationConfig {
    pub fn validate(&self) -> Result<()> {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(Error::config("isolation prefix must not be empty"));
        }
        if prefix.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(Error::config(format!(
                "isolation prefix '{}' must be a plain relative directory",
                self.prefix
            )));
        }
        let suffix = self.class_suffix.trim_start_matches('.');
        if suffix.is_empty() || suffix == "class" || suffix.contains('/') {
            return Err(Error::config(format!(
                "invalid isolated class suffix '{}'",
                self.class_suffix
            )));
        }
        Ok(())
    }
}

/// The isolation stage
pub struct Isolator {
    /// Prefix including the trailing slash
    root: String,
    class_suffix: String,
    rename: Vec<String>,
}

impl Isolator {
    pub fn new(config: IsolationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: format!("{}/", config.prefix.trim_matches('/')),
            class_suffix: format!(".{}", config.class_suffix.trim_start_matches('.')),
            rename: config.rename,
        })
    }

    /// Isolated path of an entry, before clash renaming
    pub fn isolated_path(&self, entry: &Entry) -> String {
        let path = entry.path();
        if entry.kind() == EntryKind::Class {
            if let Some(stem) = path.strip_suffix(CLASS_SUFFIX) {
                return format!("{}{}{}", self.root, stem, self.class_suffix);
            }
        }
        if !path.contains('/') && self.rename.iter().any(|r| r == path) {
            return format!("{}{}{}", self.root, path, RENAMED_SUFFIX);
        }
        format!("{}{}", self.root, path)
    }

    /// Isolate one archive
    ///
    /// Files clashing with a directory of the same archive are renamed here.
    /// Clashes with directories contributed by other archives are only
    /// known once every group is loaded, see [`Isolator::rename_clashes`].
    pub fn isolate(&self, archive: &Archive) -> Result<Archive> {
        let isolated: Vec<String> = archive
            .iter()
            .map(|entry| {
                if entry.path().starts_with(&self.root) {
                    entry.path().to_string()
                } else {
                    self.isolated_path(entry)
                }
            })
            .collect();
        let dirs = directories(isolated.iter().map(String::as_str));

        let mut dropped = 0usize;
        let out = map_entries(archive, archive.role(), |entry| {
            if entry.path().starts_with(&self.root) {
                return Ok(EntryAction::Keep);
            }
            if entry.kind() == EntryKind::Other {
                debug!("Dropping {} from {}", entry.path(), archive.id());
                dropped += 1;
                return Ok(EntryAction::Drop);
            }
            let mut path = self.isolated_path(entry);
            if dirs.contains(&path.to_ascii_lowercase()) {
                path.push_str(RENAMED_SUFFIX);
            }
            Ok(EntryAction::Replace(entry.with_path(path)))
        })?;

        info!(
            "Isolated {} under {}: {} entries, {} dropped",
            archive.id(),
            self.root,
            out.len(),
            dropped
        );
        Ok(out)
    }

    /// Rename isolated files whose path is a directory in `dirs`
    pub fn rename_clashes(&self, archive: &Archive, dirs: &HashSet<String>) -> Result<Archive> {
        let mut renamed = 0usize;
        let out = map_entries(archive, archive.role(), |entry| {
            let path = entry.path();
            if path.starts_with(&self.root) && dirs.contains(&path.to_ascii_lowercase()) {
                renamed += 1;
                return Ok(EntryAction::Replace(
                    entry.with_path(format!("{}{}", path, RENAMED_SUFFIX)),
                ));
            }
            Ok(EntryAction::Keep)
        })?;
        if renamed > 0 {
            info!(
                "Renamed {} entries of {} clashing with directories",
                renamed,
                archive.id()
            );
        }
        Ok(out)
    }
}

/// Directory paths of every given path, lowercased
///
/// Files and directories must not clash on case-insensitive file systems.
pub fn directories<'a>(paths: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    let mut dirs = HashSet::new();
    for path in paths {
        for (i, _) in path.match_indices('/') {
            dirs.insert(path[..i].to_ascii_lowercase());
        }
    }
    dirs
}

impl ArchiveTransform for Isolator {
    fn name(&self) -> &str {
        "isolate"
    }

    fn transform(&self, archive: &Archive) -> Result<Archive> {
        self.isolate(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveRole;

    fn isolate(paths: &[&str]) -> Archive {
        let archive = Archive::from_entries(
            "ext.jar",
            ArchiveRole::Extension,
            paths.iter().map(|p| Entry::new(*p, b"x".to_vec(), "ext.jar")),
        )
        .unwrap();
        Isolator::new(IsolationConfig::default())
            .unwrap()
            .isolate(&archive)
            .unwrap()
    }

    #[test]
    fn test_classes_get_private_suffix() {
        let out = isolate(&["io/opentelemetry/sdk/trace/SdkSpan.class", "a/b.properties"]);
        let paths: Vec<_> = out.paths().collect();
        assert_eq!(
            paths,
            vec![
                "inst/io/opentelemetry/sdk/trace/SdkSpan.classdata",
                "inst/a/b.properties"
            ]
        );
        assert_eq!(out.entries()[0].kind(), EntryKind::Class);
    }

    #[test]
    fn test_signatures_and_index_dropped() {
        let out = isolate(&["META-INF/INDEX.LIST", "META-INF/SIGNER.SF", "META-INF/SIGNER.DSA", "a.txt"]);
        assert_eq!(out.paths().collect::<Vec<_>>(), vec!["inst/a.txt"]);
    }

    #[test]
    fn test_license_renamed() {
        let out = isolate(&["LICENSE", "docs/LICENSE"]);
        assert_eq!(
            out.paths().collect::<Vec<_>>(),
            vec!["inst/LICENSE.renamed", "inst/docs/LICENSE"]
        );
    }

    #[test]
    fn test_file_clashing_with_directory() {
        let out = isolate(&["NOTICE", "notice/extra.txt"]);
        assert!(out.contains("inst/NOTICE.renamed"));
        assert!(out.contains("inst/notice/extra.txt"));
    }

    #[test]
    fn test_clash_with_directory_of_another_archive() {
        let out = isolate(&["EXT", "a/b.txt"]);
        let other = ["inst/ext/Plugin.classdata", "inst/a/b.txt"];
        let dirs = directories(other.iter().copied().chain(out.paths()));
        assert!(dirs.contains("inst/ext"));

        let isolator = Isolator::new(IsolationConfig::default()).unwrap();
        let renamed = isolator.rename_clashes(&out, &dirs).unwrap();
        assert_eq!(
            renamed.paths().collect::<Vec<_>>(),
            vec!["inst/EXT.renamed", "inst/a/b.txt"]
        );
        // Nothing left to rename
        assert_eq!(isolator.rename_clashes(&renamed, &dirs).unwrap(), renamed);
    }

    #[test]
    fn test_services_stay_descriptors() {
        let out = isolate(&["META-INF/services/io.Spi"]);
        let entry = out.get("inst/META-INF/services/io.Spi").unwrap();
        assert_eq!(entry.kind(), EntryKind::ServiceDescriptor);
    }

    #[test]
    fn test_isolation_is_idempotent() {
        let once = isolate(&["pkg/A.class", "LICENSE", "META-INF/services/io.Spi"]);
        let twice = Isolator::new(IsolationConfig::default())
            .unwrap()
            .isolate(&once)
            .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_config_validation() {
        let bad = |prefix: &str, suffix: &str| {
            Isolator::new(IsolationConfig {
                prefix: prefix.to_string(),
                class_suffix: suffix.to_string(),
                rename: Vec::new(),
            })
            .is_err()
        };
        assert!(bad("", "classdata"));
        assert!(bad("a/../b", "classdata"));
        assert!(bad("inst", "class"));
        assert!(bad("inst", ""));
        assert!(!bad("inst/private", "classdata"));
    }
}
