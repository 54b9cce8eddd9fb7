// src/commands/init.rs

//! Starter build file

use anyhow::{Context, Result};
use shadepack::BuildConfig;
use shadepack::config::CONFIG_FILE;
use std::path::Path;

/// Write a starter shadepack.toml into `dir`
pub fn cmd_init(dir: &str, main_class: &str, force: bool) -> Result<()> {
    let dir = Path::new(dir);
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = BuildConfig::new_minimal(main_class, "0.1.0");
    let content = config.to_toml().context("Failed to serialize build file")?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!("Edit the [[input]] paths and [manifest] values, then run 'shadepack build'.");
    Ok(())
}
