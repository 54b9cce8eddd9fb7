// src/cli/mod.rs
//! CLI definitions for shadepack
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `build` - Assemble the output jar described by a build file
//! - `check` - Validate a build file without reading any archive
//! - `inspect` - List the entries of a jar
//! - `relocate` - Relocate a single jar with ad-hoc rules
//! - `init` - Write a starter build file

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shadepack")]
#[command(version)]
#[command(about = "Assemble relocated, self-contained agent jars", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the output jar from a build file
    Build {
        /// Path to the build file
        #[arg(short, long, default_value = "shadepack.toml")]
        config: String,

        /// Override the output path from the build file
        #[arg(short, long)]
        output: Option<String>,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a build file (rules, manifest, injection) without building
    Check {
        /// Path to the build file
        #[arg(short, long, default_value = "shadepack.toml")]
        config: String,
    },

    /// List the entries of a jar
    Inspect {
        /// Jar to inspect
        archive: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only show entries of this kind (class, resource, service, manifest, other)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Relocate the packages of a single jar
    Relocate {
        /// Jar to relocate
        archive: String,

        /// Relocation rule, FROM=TO (repeatable, applied in order)
        #[arg(short, long = "rule", required = true)]
        rules: Vec<String>,

        /// Output jar
        #[arg(short, long)]
        output: String,
    },

    /// Create a starter shadepack.toml
    Init {
        /// Directory to create the build file in
        #[arg(default_value = ".")]
        dir: String,

        /// Main class of the agent
        #[arg(long, default_value = "com.example.agent.Agent")]
        main_class: String,

        /// Overwrite an existing build file
        #[arg(long)]
        force: bool,
    },
}
