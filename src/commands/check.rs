// src/commands/check.rs

//! Build file validation

use super::load_config;
use anyhow::{Context, Result};

/// Validate a build file without reading any archive
pub fn cmd_check(config: &str) -> Result<()> {
    let build_config = load_config(config)?;
    let checked = build_config
        .check()
        .context("Build file is not valid")?;

    println!("Build file {} is valid", config);
    println!("  Output: {}", build_config.output_path().display());
    println!("  Relocation rules: {}", checked.rules.len());
    for rule in &build_config.relocations {
        if rule.exclude.is_empty() {
            println!("    {} -> {}", rule.from, rule.to);
        } else {
            println!(
                "    {} -> {} (except {})",
                rule.from,
                rule.to,
                rule.exclude.join(", ")
            );
        }
    }

    println!("  Input groups:");
    let mut missing = 0;
    for (i, group) in build_config.inputs.iter().enumerate() {
        println!(
            "    {} ({}, duplicates: {}, within group: {})",
            group.label(i),
            group.role,
            group.duplicates,
            group.group_policy()
        );
        for path in &group.paths {
            let resolved = build_config.resolve(path);
            if resolved.is_file() {
                println!("      {}", resolved.display());
            } else {
                println!("      {} (missing)", resolved.display());
                missing += 1;
            }
        }
    }

    if let Some(spec) = &checked.injection {
        println!(
            "  Injection: {} {} into {}",
            spec.name, spec.descriptor, spec.target
        );
    }
    println!("  Manifest:");
    for (name, value) in checked.manifest.attributes() {
        println!("    {}: {}", name, value);
    }

    if missing > 0 {
        println!();
        println!("Warning: {} input archive(s) not found", missing);
    }
    Ok(())
}
