// src/commands/mod.rs
//! Command handlers for the shadepack CLI

mod build;
mod check;
mod init;
mod inspect;
mod relocate;

pub use build::cmd_build;
pub use check::cmd_check;
pub use init::cmd_init;
pub use inspect::cmd_inspect;
pub use relocate::cmd_relocate;

use anyhow::{Context, Result};
use shadepack::BuildConfig;
use std::path::Path;

/// Load a build file, keeping the library error so the exit code reflects it
fn load_config(path: &str) -> Result<BuildConfig> {
    let path = Path::new(path);
    BuildConfig::from_file(path)
        .map_err(shadepack::Error::from)
        .with_context(|| format!("Failed to load build file {}", path.display()))
}
