// src/manifest.rs
//! Output jar manifest
//!
//! Composes the `META-INF/MANIFEST.MF` of the assembled archive from
//! configuration. Attribute order is fixed so identical inputs produce
//! identical bytes.

use crate::archive::Entry;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path of the jar manifest
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Maximum line length in bytes, excluding the line break
const LINE_LIMIT: usize = 72;

const REQUIRED: &[&str] = &[
    "Main-Class",
    "Agent-Class",
    "Premain-Class",
    "Can-Redefine-Classes",
    "Can-Retransform-Classes",
    "Implementation-Title",
    "Implementation-Version",
    "Implementation-Vendor",
];

/// Manifest values as configured
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSpec {
    pub main_class: String,
    /// Defaults to `main_class`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_class: Option<String>,
    /// Defaults to `main_class`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premain_class: Option<String>,
    #[serde(default = "default_true")]
    pub can_redefine_classes: bool,
    #[serde(default = "default_true")]
    pub can_retransform_classes: bool,
    pub implementation_title: String,
    pub implementation_version: String,
    pub implementation_vendor: String,
    /// Additional attributes, written in sorted order
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

/// Whether `name` is a legal attribute name
pub fn is_attribute_name(name: &str) -> bool {
    (1..=70).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Builds an [`OutputManifest`] from a [`ManifestSpec`]
pub struct ManifestComposer {
    spec: ManifestSpec,
}

impl ManifestComposer {
    pub fn new(spec: ManifestSpec) -> Self {
        Self { spec }
    }

    /// Validate the values and produce the ordered attribute list
    pub fn compose(&self) -> Result<OutputManifest> {
        let spec = &self.spec;
        let main = spec.main_class.trim();
        let agent = spec.agent_class.as_deref().map(str::trim).unwrap_or(main);
        let premain = spec.premain_class.as_deref().map(str::trim).unwrap_or(main);

        let required = [
            ("Main-Class", main.to_string()),
            ("Agent-Class", agent.to_string()),
            ("Premain-Class", premain.to_string()),
            ("Can-Redefine-Classes", spec.can_redefine_classes.to_string()),
            (
                "Can-Retransform-Classes",
                spec.can_retransform_classes.to_string(),
            ),
            ("Implementation-Title", spec.implementation_title.trim().to_string()),
            (
                "Implementation-Version",
                spec.implementation_version.trim().to_string(),
            ),
            (
                "Implementation-Vendor",
                spec.implementation_vendor.trim().to_string(),
            ),
        ];

        let mut manifest = OutputManifest::new();
        for (name, value) in required {
            if value.is_empty() {
                return Err(Error::MissingManifestAttribute(name.to_string()));
            }
            manifest.push(name, value)?;
        }

        for (name, value) in &spec.extra {
            if REQUIRED.iter().any(|r| r.eq_ignore_ascii_case(name))
                || name.eq_ignore_ascii_case("Manifest-Version")
            {
                return Err(Error::config(format!(
                    "extra manifest attribute '{}' would override a required attribute",
                    name
                )));
            }
            manifest.push(name, value.clone())?;
        }

        Ok(manifest)
    }
}

/// An ordered manifest main section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputManifest {
    attributes: Vec<(String, String)>,
}

impl Default for OutputManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputManifest {
    /// A manifest holding only `Manifest-Version: 1.0`
    pub fn new() -> Self {
        Self {
            attributes: vec![("Manifest-Version".to_string(), "1.0".to_string())],
        }
    }

    /// Append an attribute
    pub fn push(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if !is_attribute_name(name) {
            return Err(Error::config(format!(
                "invalid manifest attribute name '{}'",
                name
            )));
        }
        if value.contains(['\r', '\n', '\0']) {
            return Err(Error::config(format!(
                "manifest attribute '{}' contains a line break",
                name
            )));
        }
        if self.get(name).is_some() {
            return Err(Error::config(format!(
                "manifest attribute '{}' given twice",
                name
            )));
        }
        self.attributes.push((name.to_string(), value));
        Ok(())
    }

    /// Look up an attribute; names are case-insensitive
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Serialize with CRLF line endings and 72-byte line wrapping
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.attributes {
            write_wrapped(&mut out, &format!("{}: {}", name, value));
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// The manifest as an archive entry
    pub fn to_entry(&self, source: &str) -> Entry {
        Entry::new(MANIFEST_PATH, self.to_bytes(), source)
    }

    /// Read the main section of a manifest
    pub fn parse(content: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(content);
        let mut attributes: Vec<(String, String)> = Vec::new();

        for line in text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
            if line.is_empty() {
                // End of the main section
                if !attributes.is_empty() {
                    break;
                }
                continue;
            }
            if let Some(cont) = line.strip_prefix(' ') {
                match attributes.last_mut() {
                    Some((_, value)) => value.push_str(cont),
                    None => {
                        return Err(Error::config("manifest starts with a continuation line"));
                    }
                }
                continue;
            }
            let (name, value) = line.split_once(": ").ok_or_else(|| {
                Error::config(format!("malformed manifest line '{}'", line))
            })?;
            attributes.push((name.to_string(), value.to_string()));
        }

        Ok(Self { attributes })
    }
}

/// Write one logical line, continuing with a leading space past the limit
fn write_wrapped(out: &mut Vec<u8>, line: &str) {
    let mut rest = line;
    let mut limit = LINE_LIMIT;
    loop {
        if rest.len() <= limit {
            out.extend_from_slice(rest.as_bytes());
            out.extend_from_slice(b"\r\n");
            return;
        }
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.extend_from_slice(rest[..cut].as_bytes());
        out.extend_from_slice(b"\r\n ");
        rest = &rest[cut..];
        // Continuation lines start with a space
        limit = LINE_LIMIT - 1;
    }
}
