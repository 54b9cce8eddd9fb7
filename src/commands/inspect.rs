// src/commands/inspect.rs

//! Jar inspection

use anyhow::{Context, Result};
use serde::Serialize;
use shadepack::manifest::MANIFEST_PATH;
use shadepack::{ArchiveRole, EntryKind, OutputManifest};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
struct EntryInfo<'a> {
    path: &'a str,
    kind: EntryKind,
    size: usize,
}

/// List the entries of a jar
pub fn cmd_inspect(archive: &str, json: bool, kind: Option<String>) -> Result<()> {
    let filter = match kind.as_deref() {
        Some(k) => Some(
            EntryKind::parse(k)
                .with_context(|| format!("Unknown entry kind '{}'", k))?,
        ),
        None => None,
    };

    let archive = shadepack::archive::read_archive(Path::new(archive), ArchiveRole::Assembled)?;
    let entries: Vec<EntryInfo> = archive
        .iter()
        .filter(|e| filter.is_none_or(|k| e.kind() == k))
        .map(|e| EntryInfo {
            path: e.path(),
            kind: e.kind(),
            size: e.content().len(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!("{:>10}  {:<18}  {}", entry.size, entry.kind.as_str(), entry.path);
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &archive {
        *counts.entry(entry.kind().as_str()).or_default() += 1;
    }
    println!();
    println!("{}: {} entries", archive.id(), archive.len());
    for (kind, count) in counts {
        println!("  {:<18} {}", kind, count);
    }

    if let Some(manifest) = archive.get(MANIFEST_PATH) {
        let manifest = OutputManifest::parse(manifest.content())?;
        println!();
        println!("Manifest:");
        for (name, value) in manifest.attributes() {
            println!("  {}: {}", name, value);
        }
    }
    Ok(())
}
