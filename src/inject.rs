// src/inject.rs
//! Field injection
//!
//! Adds one field declaration to one class. The rest of the classfile is
//! preserved: existing constants keep their indices, and the method table and
//! class attributes are copied byte for byte.

use crate::archive::Entry;
use crate::classfile::descriptor::{is_field_descriptor, is_unqualified_name};
use crate::classfile::{ClassFile, FieldAccess};
use crate::error::{Error, Result};
use tracing::info;

/// Which field to add to which entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInjectionSpec {
    /// Entry path of the target class, as it appears in the merged archive
    pub target: String,
    /// Field name, e.g. `$elasticSpanValues`
    pub name: String,
    /// Field descriptor, e.g. `Ljava/lang/Object;`
    pub descriptor: String,
    pub access: FieldAccess,
}

impl FieldInjectionSpec {
    pub fn new(
        target: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        access: FieldAccess,
    ) -> Self {
        Self {
            target: target.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            access,
        }
    }

    /// Build a spec from access keywords (`["private", "volatile"]`)
    pub fn with_keywords(
        target: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        keywords: &[String],
    ) -> Result<Self> {
        let mut access = FieldAccess::empty();
        for keyword in keywords {
            let flag = FieldAccess::from_keyword(keyword).ok_or_else(|| {
                Error::InvalidInjection(format!("unknown access modifier '{}'", keyword))
            })?;
            access |= flag;
        }
        Ok(Self::new(target, name, descriptor, access))
    }

    /// Check the request before any archive is read
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::InvalidInjection("target path is empty".to_string()));
        }
        if !is_unqualified_name(&self.name) {
            return Err(Error::InvalidInjection(format!(
                "'{}' is not a valid field name",
                self.name
            )));
        }
        if !is_field_descriptor(&self.descriptor) {
            return Err(Error::InvalidInjection(format!(
                "'{}' is not a valid field descriptor",
                self.descriptor
            )));
        }
        self.access.check().map_err(Error::InvalidInjection)
    }
}

/// Applies a [`FieldInjectionSpec`]
#[derive(Debug, Clone)]
pub struct FieldInjector {
    spec: FieldInjectionSpec,
}

impl FieldInjector {
    pub fn new(spec: FieldInjectionSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &FieldInjectionSpec {
        &self.spec
    }

    pub fn target(&self) -> &str {
        &self.spec.target
    }

    /// Whether an entry is the injection target
    pub fn is_target(&self, entry: &Entry) -> bool {
        entry.path() == self.spec.target
    }

    /// Return a copy of `entry` with the field added
    pub fn inject(&self, entry: &Entry) -> Result<Entry> {
        let class_error = |source| Error::ClassFormat {
            entry: entry.path().to_string(),
            archive: entry.source().to_string(),
            source,
        };

        let mut class = ClassFile::parse(entry.content()).map_err(class_error)?;
        if class.field_named(self.spec.name.as_bytes()).is_some() {
            return Err(Error::FieldAlreadyDeclared {
                target: entry.path().to_string(),
                field: self.spec.name.clone(),
            });
        }

        class
            .add_field(&self.spec.name, &self.spec.descriptor, self.spec.access)
            .map_err(class_error)?;

        info!(
            "Injected field {} {} into {} (from {})",
            self.spec.name,
            self.spec.descriptor,
            entry.path(),
            entry.source()
        );
        Ok(entry.with_content(class.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::testutil::class_bytes;

    fn spec() -> FieldInjectionSpec {
        FieldInjectionSpec::new(
            "pkg/Service.class",
            "$aux",
            "Ljava/lang/Object;",
            FieldAccess::VOLATILE,
        )
    }

    #[test]
    fn test_inject_adds_one_field() {
        let bytes = class_bytes("pkg/Service", "java/lang/Object", &[], &[]);
        let entry = Entry::new("pkg/Service.class", bytes.clone(), "agent.jar");
        let injector = FieldInjector::new(spec()).unwrap();
        assert!(injector.is_target(&entry));

        let out = injector.inject(&entry).unwrap();
        let before = ClassFile::parse(&bytes).unwrap();
        let after = ClassFile::parse(out.content()).unwrap();

        assert_eq!(after.fields.len(), before.fields.len() + 1);
        assert_eq!(after.method_table(), before.method_table());
        let field = after.field_named(b"$aux").unwrap();
        assert_eq!(field.access_flags, 0x0040);
        assert_eq!(
            after.constant_pool.utf8(field.descriptor_index),
            Some(&b"Ljava/lang/Object;"[..])
        );
        // Existing constants are untouched
        for (index, constant) in before.constant_pool.iter() {
            assert_eq!(after.constant_pool.get(index), Some(constant));
        }
        assert_eq!(out.path(), entry.path());
        assert_eq!(out.source(), "agent.jar");
    }

    #[test]
    fn test_existing_field_rejected() {
        let bytes = class_bytes("pkg/Service", "java/lang/Object", &[], &[]);
        let entry = Entry::new("pkg/Service.class", bytes, "agent.jar");
        let mut s = spec();
        s.name = "value".to_string();
        let err = FieldInjector::new(s).unwrap().inject(&entry).unwrap_err();
        assert!(matches!(err, Error::FieldAlreadyDeclared { .. }));
    }

    #[test]
    fn test_corrupt_target_is_input_error() {
        let entry = Entry::new("pkg/Service.class", vec![0xCA, 0xFE], "agent.jar");
        let err = FieldInjector::new(spec()).unwrap().inject(&entry).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Input);
    }

    #[test]
    fn test_spec_validation() {
        let mut s = spec();
        s.name = "a.b".to_string();
        assert!(matches!(FieldInjector::new(s).unwrap_err(), Error::InvalidInjection(_)));

        let mut s = spec();
        s.descriptor = "Object".to_string();
        assert!(FieldInjector::new(s).is_err());

        let mut s = spec();
        s.access = FieldAccess::FINAL | FieldAccess::VOLATILE;
        assert!(FieldInjector::new(s).is_err());
    }

    #[test]
    fn test_keywords() {
        let s = FieldInjectionSpec::with_keywords(
            "X.class",
            "f",
            "I",
            &["private".to_string(), "volatile".to_string()],
        )
        .unwrap();
        assert_eq!(s.access, FieldAccess::PRIVATE | FieldAccess::VOLATILE);
        assert!(FieldInjectionSpec::with_keywords("X.class", "f", "I", &["sealed".to_string()]).is_err());
    }
}
