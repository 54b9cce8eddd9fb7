// src/config.rs
//! Build file (shadepack.toml) parsing and data structures
//!
//! The build file names the output, the relocation rules, the input groups
//! and the values of the composed manifest. Relative paths are resolved
//! against the directory containing the build file.

use crate::archive::{ArchiveRole, EntryFilter};
use crate::error::Result;
use crate::inject::FieldInjectionSpec;
use crate::isolate::IsolationConfig;
use crate::manifest::{ManifestComposer, ManifestSpec, OutputManifest};
use crate::merge::DuplicatePolicy;
use crate::relocate::{RelocationRule, RuleSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default build file name
pub const CONFIG_FILE: &str = "shadepack.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read build file")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse build file")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid build file: {0}")]
    Invalid(String),
}

/// Root structure of shadepack.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub output: OutputConfig,

    #[serde(default, rename = "relocation", skip_serializing_if = "Vec::is_empty")]
    pub relocations: Vec<RelocationRule>,

    #[serde(default)]
    pub isolation: IsolationConfig,

    #[serde(default, rename = "input")]
    pub inputs: Vec<InputGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection: Option<InjectionConfig>,

    pub manifest: ManifestSpec,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

/// `[output]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,

    /// Entry timestamp; `SOURCE_DATE_EPOCH` takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Entries dropped from the final archive (matched after isolation)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// `[[input]]`: archives sharing a role and duplicate policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputGroup {
    /// Label used in logs; defaults to the role and position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub role: ArchiveRole,

    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Policy for this group's entries in the final merge
    #[serde(default)]
    pub duplicates: DuplicatePolicy,

    /// Policy between archives of this group; defaults to `duplicates`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_duplicates: Option<DuplicatePolicy>,

    /// Entries dropped when the archives are loaded, before relocation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl InputGroup {
    /// Label for logs and reports
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}#{}", self.role, index))
    }

    pub fn group_policy(&self) -> DuplicatePolicy {
        self.group_duplicates.unwrap_or(self.duplicates)
    }
}

/// `[injection]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Entry path in the assembled archive
    pub target: String,
    pub field: String,
    pub descriptor: String,
    /// Access modifiers as keywords (`private`, `volatile`, ...)
    #[serde(default)]
    pub access: Vec<String>,
}

impl InjectionConfig {
    pub fn to_spec(&self) -> Result<FieldInjectionSpec> {
        let spec = FieldInjectionSpec::with_keywords(
            self.target.clone(),
            self.field.clone(),
            self.descriptor.clone(),
            &self.access,
        )?;
        spec.validate()?;
        Ok(spec)
    }
}

impl BuildConfig {
    /// Load a build file; relative paths resolve against its directory
    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parse a build file from a TOML string
    pub fn parse(content: &str) -> std::result::Result<Self, ConfigError> {
        let config: BuildConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks on the parsed file
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("output.path".to_string()));
        }
        if self.inputs.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[input]] group is required".to_string(),
            ));
        }
        for (i, group) in self.inputs.iter().enumerate() {
            if group.paths.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "input group {} has no paths",
                    group.label(i)
                )));
            }
            if group.role == ArchiveRole::Assembled {
                return Err(ConfigError::Invalid(format!(
                    "input group {} cannot have role 'assembled'",
                    group.label(i)
                )));
            }
        }
        let upstream = self
            .inputs
            .iter()
            .filter(|g| g.role == ArchiveRole::Upstream)
            .count();
        if upstream > 1 {
            return Err(ConfigError::Invalid(format!(
                "{} upstream groups given, at most one is allowed",
                upstream
            )));
        }
        if self.manifest.main_class.trim().is_empty() {
            return Err(ConfigError::MissingField("manifest.main_class".to_string()));
        }
        Ok(())
    }

    /// Semantic checks that need no archive I/O
    ///
    /// Compiles relocation rules and filters, validates isolation and
    /// injection settings and composes the manifest.
    pub fn check(&self) -> Result<CheckedConfig> {
        let rules = RuleSet::compile(&self.relocations)?;
        self.isolation.validate()?;
        let manifest = ManifestComposer::new(self.manifest.clone()).compose()?;
        let injection = self
            .injection
            .as_ref()
            .map(InjectionConfig::to_spec)
            .transpose()?;
        let output_exclude = EntryFilter::new(&self.output.exclude)?;
        let group_excludes = self
            .inputs
            .iter()
            .map(|g| EntryFilter::new(&g.exclude))
            .collect::<Result<Vec<_>>>()?;

        Ok(CheckedConfig {
            rules,
            manifest,
            injection,
            output_exclude,
            group_excludes,
        })
    }

    /// Resolve a configured path against the build file directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output.path)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = dir.into();
    }

    /// A starter build file
    pub fn new_minimal(main_class: &str, version: &str) -> Self {
        BuildConfig {
            output: OutputConfig {
                path: PathBuf::from("build/agent.jar"),
                timestamp: None,
                exclude: Vec::new(),
            },
            relocations: Vec::new(),
            isolation: IsolationConfig::default(),
            inputs: vec![InputGroup {
                name: None,
                role: ArchiveRole::Upstream,
                paths: vec![PathBuf::from("libs/upstream.jar")],
                duplicates: DuplicatePolicy::FailOnDuplicate,
                group_duplicates: None,
                exclude: Vec::new(),
            }],
            injection: None,
            manifest: ManifestSpec {
                main_class: main_class.to_string(),
                agent_class: None,
                premain_class: None,
                can_redefine_classes: true,
                can_retransform_classes: true,
                implementation_title: main_class.to_string(),
                implementation_version: version.to_string(),
                implementation_vendor: "unknown".to_string(),
                extra: Default::default(),
            },
            base_dir: PathBuf::new(),
        }
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Compiled parts of a validated build file
#[derive(Debug, Clone)]
pub struct CheckedConfig {
    pub rules: RuleSet,
    pub manifest: OutputManifest,
    pub injection: Option<FieldInjectionSpec>,
    pub output_exclude: EntryFilter,
    /// One filter per input group, in configuration order
    pub group_excludes: Vec<EntryFilter>,
}
