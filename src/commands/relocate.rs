// src/commands/relocate.rs

//! Ad-hoc relocation of a single jar

use anyhow::{Context, Result};
use shadepack::archive::{EntryTimestamp, read_archive, write_archive};
use shadepack::{ArchiveRole, RelocationRule, Relocator};
use std::path::Path;

/// Relocate one jar with rules given on the command line
pub fn cmd_relocate(archive: &str, rules: &[String], output: &str) -> Result<()> {
    let rules = rules
        .iter()
        .map(|r| RelocationRule::parse_pair(r))
        .collect::<shadepack::Result<Vec<_>>>()?;
    let relocator = Relocator::from_rules(&rules).context("Invalid relocation rules")?;

    let input = read_archive(Path::new(archive), ArchiveRole::Bootstrap)?;
    let relocated = relocator.relocate(&input)?;

    let timestamp = EntryTimestamp::resolve(None)?;
    write_archive(&relocated, Path::new(output), timestamp)
        .with_context(|| format!("Failed to write {}", output))?;

    let moved = relocated
        .iter()
        .filter(|e| !input.contains(e.path()))
        .count();
    println!(
        "Relocated {} -> {} ({} entries, {} moved)",
        archive,
        output,
        relocated.len(),
        moved
    );
    Ok(())
}
