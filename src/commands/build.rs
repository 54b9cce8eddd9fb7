// src/commands/build.rs

//! Jar assembly from a build file

use super::load_config;
use anyhow::{Context, Result};
use shadepack::{BuildReport, Pipeline};
use std::path::PathBuf;

/// Build the output jar described by a build file
pub fn cmd_build(config: &str, output: Option<String>, json: bool) -> Result<()> {
    let mut build_config = load_config(config)?;

    if let Some(output) = output {
        // Overrides are relative to the working directory, not the build file
        let path = PathBuf::from(output);
        build_config.output.path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .context("Failed to determine working directory")?
                .join(path)
        };
    }

    let pipeline = Pipeline::new(build_config).context("Invalid build configuration")?;
    let report = pipeline.run().context("Build failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    println!("Built {}", report.output.display());
    for group in &report.groups {
        let stages = if group.stages.is_empty() {
            "copy".to_string()
        } else {
            group.stages.join(" + ")
        };
        println!(
            "  {:<16} {:<10} {:>6} entries  [{}]  {}",
            group.label,
            group.role,
            group.entries,
            stages,
            group.archives.join(", ")
        );
    }
    println!();
    println!("  Entries:             {}", report.entries);
    println!("  Classes:             {}", report.classes);
    println!("  Service descriptors: {}", report.merge.services);
    println!("  Duplicates skipped:  {}", report.merge.duplicates.len());
    if report.merge.excluded > 0 {
        println!("  Excluded:            {}", report.merge.excluded);
    }
    if let Some((path, source)) = &report.merge.injected {
        println!("  Injected field into: {} (from {})", path, source);
    }
    println!("  Timestamp:           {}", report.timestamp);
    println!("  Size:                {} bytes", report.bytes);
    println!("  SHA-256:             {}", report.sha256);

    let differing: Vec<_> = report
        .merge
        .duplicates
        .iter()
        .filter(|d| !d.identical)
        .collect();
    if !differing.is_empty() {
        println!();
        println!("Duplicates with different content (first kept):");
        for dup in differing {
            println!("  {} ({} over {}, {})", dup.path, dup.kept, dup.skipped, dup.policy);
        }
    }
}
