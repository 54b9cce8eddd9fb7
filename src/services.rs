// src/services.rs
//! Service descriptor merging
//!
//! Every archive may register providers for the same service interface.
//! The merged descriptor lists each provider once, in the order the
//! contributing archives were merged.

use crate::archive::Entry;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::str::Utf8Error;

/// Provider class names listed in a descriptor, without comments or blanks
pub fn parse_providers(content: &[u8]) -> std::result::Result<Vec<String>, Utf8Error> {
    Ok(std::str::from_utf8(content)?
        .lines()
        .map(|line| match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        })
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect())
}

/// The union of all descriptors registered at one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptorSet {
    path: String,
    providers: Vec<String>,
    seen: HashSet<String>,
    contributors: Vec<String>,
}

impl ServiceDescriptorSet {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            providers: Vec::new(),
            seen: HashSet::new(),
            contributors: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Add the providers of one descriptor entry
    pub fn add(&mut self, entry: &Entry) -> Result<()> {
        let providers =
            parse_providers(entry.content()).map_err(|e| Error::service_encoding(entry, e))?;
        if !self.contributors.iter().any(|c| c == entry.source()) {
            self.contributors.push(entry.source().to_string());
        }
        for provider in providers {
            if self.seen.insert(provider.clone()) {
                self.providers.push(provider);
            }
        }
        Ok(())
    }

    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Archives that contributed, in merge order
    pub fn contributors(&self) -> &[String] {
        &self.contributors
    }

    /// Descriptor contents: one provider per line
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for provider in &self.providers {
            out.push_str(provider);
            out.push('\n');
        }
        out.into_bytes()
    }

    /// The merged entry; its source names every contributor
    pub fn to_entry(&self) -> Entry {
        Entry::new(self.path.clone(), self.to_bytes(), self.contributors.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "META-INF/services/io.Spi";

    #[test]
    fn test_parse_providers() {
        let providers = parse_providers(b"# header\n\na.X  # note\r\n  b.Y\n#c.Z\n").unwrap();
        assert_eq!(providers, vec!["a.X", "b.Y"]);
    }

    #[test]
    fn test_union_keeps_order_and_dedupes() {
        let mut set = ServiceDescriptorSet::new(PATH);
        set.add(&Entry::new(PATH, b"X\nY\n".to_vec(), "first.jar")).unwrap();
        set.add(&Entry::new(PATH, b"Y\nZ\n".to_vec(), "second.jar")).unwrap();

        assert_eq!(set.providers(), &["X", "Y", "Z"]);
        assert_eq!(set.to_bytes(), b"X\nY\nZ\n");

        let entry = set.to_entry();
        assert_eq!(entry.source(), "first.jar+second.jar");
        assert_eq!(entry.path(), PATH);
    }

    #[test]
    fn test_same_contributor_listed_once() {
        let mut set = ServiceDescriptorSet::new(PATH);
        set.add(&Entry::new(PATH, b"X\n".to_vec(), "a.jar")).unwrap();
        set.add(&Entry::new(PATH, b"X\n".to_vec(), "a.jar")).unwrap();
        assert_eq!(set.contributors(), &["a.jar"]);
        assert_eq!(set.providers().len(), 1);
    }

    #[test]
    fn test_invalid_utf8_descriptor_is_input_error() {
        let mut set = ServiceDescriptorSet::new(PATH);
        let err = set
            .add(&Entry::new(PATH, b"a.X\n\xFFb.Y\n".to_vec(), "broken.jar"))
            .unwrap_err();
        match &err {
            Error::ServiceDescriptorEncoding { entry, archive, .. } => {
                assert_eq!(entry, PATH);
                assert_eq!(archive, "broken.jar");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.category(), crate::error::ErrorCategory::Input);
        assert!(set.providers().is_empty());
    }
}
