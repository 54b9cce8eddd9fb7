// src/archive/kind.rs

//! Entry classification based on path
//!
//! The kind of an entry is a pure function of its path, so a renamed entry is
//! simply classified again. Order of checks matters: more specific rules come
//! first.

/// Native loadable class suffix
pub const CLASS_SUFFIX: &str = ".class";

/// Directory holding service provider registrations
pub const SERVICES_DIR: &str = "META-INF/services/";

/// Kinds of archive entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// Class bytecode (`.class`, or an isolated `.classdata`)
    Class,
    /// Any other file, text or binary
    Resource,
    /// Provider list under a `META-INF/services/` directory
    ServiceDescriptor,
    /// The jar manifest
    Manifest,
    /// Signature material and jar indexes
    Other,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Resource => "resource",
            Self::ServiceDescriptor => "service-descriptor",
            Self::Manifest => "manifest",
            Self::Other => "other",
        }
    }

    /// Parse a kind from its string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "class" => Some(Self::Class),
            "resource" => Some(Self::Resource),
            "service-descriptor" | "service" => Some(Self::ServiceDescriptor),
            "manifest" => Some(Self::Manifest),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies entries by path
pub struct EntryClassifier;

impl EntryClassifier {
    pub fn classify(path: &str) -> EntryKind {
        // 1. MANIFEST (only the jar-level one)
        if path.eq_ignore_ascii_case("META-INF/MANIFEST.MF") {
            return EntryKind::Manifest;
        }

        // 2. OTHER (signatures and indexes become invalid once contents change)
        if Self::is_signature_or_index(path) {
            return EntryKind::Other;
        }

        // 3. SERVICE DESCRIPTORS, at any depth so isolated copies still count
        if Self::is_service_descriptor(path) {
            return EntryKind::ServiceDescriptor;
        }

        // 4. CLASSES
        if path.ends_with(CLASS_SUFFIX) || path.ends_with(".classdata") {
            return EntryKind::Class;
        }

        EntryKind::Resource
    }

    /// `META-INF/INDEX.LIST`, `META-INF/*.SF`, `*.DSA`, `*.RSA`, `*.EC`
    pub fn is_signature_or_index(path: &str) -> bool {
        let Some(name) = path.strip_prefix("META-INF/") else {
            return false;
        };
        if name.contains('/') {
            return false;
        }
        if name.eq_ignore_ascii_case("INDEX.LIST") {
            return true;
        }
        let upper = name.to_ascii_uppercase();
        [".SF", ".DSA", ".RSA", ".EC"]
            .iter()
            .any(|ext| upper.ends_with(ext))
    }

    /// A file directly inside a `META-INF/services/` directory
    pub fn is_service_descriptor(path: &str) -> bool {
        let Some(pos) = path.rfind(SERVICES_DIR) else {
            return false;
        };
        if pos != 0 && !path[..pos].ends_with('/') {
            return false;
        }
        let name = &path[pos + SERVICES_DIR.len()..];
        !name.is_empty() && !name.contains('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_classes() {
        assert_eq!(EntryClassifier::classify("pkg/Service.class"), EntryKind::Class);
        assert_eq!(
            EntryClassifier::classify("inst/pkg/Service.classdata"),
            EntryKind::Class
        );
        assert_eq!(EntryClassifier::classify("module-info.class"), EntryKind::Class);
    }

    #[test]
    fn test_classify_manifest() {
        assert_eq!(
            EntryClassifier::classify("META-INF/MANIFEST.MF"),
            EntryKind::Manifest
        );
        assert_eq!(
            EntryClassifier::classify("meta-inf/manifest.mf"),
            EntryKind::Manifest
        );
        // Isolated manifests are plain resources
        assert_eq!(
            EntryClassifier::classify("inst/META-INF/MANIFEST.MF"),
            EntryKind::Resource
        );
    }

    #[test]
    fn test_classify_services() {
        assert_eq!(
            EntryClassifier::classify("META-INF/services/io.Foo"),
            EntryKind::ServiceDescriptor
        );
        assert_eq!(
            EntryClassifier::classify("inst/META-INF/services/io.Foo"),
            EntryKind::ServiceDescriptor
        );
        assert_eq!(
            EntryClassifier::classify("META-INF/services/"),
            EntryKind::Resource
        );
        assert_eq!(
            EntryClassifier::classify("META-INF/services/nested/io.Foo"),
            EntryKind::Resource
        );
        assert_eq!(
            EntryClassifier::classify("xMETA-INF/services/io.Foo"),
            EntryKind::Resource
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(EntryClassifier::classify("META-INF/INDEX.LIST"), EntryKind::Other);
        assert_eq!(EntryClassifier::classify("META-INF/SIGNER.SF"), EntryKind::Other);
        assert_eq!(EntryClassifier::classify("META-INF/SIGNER.RSA"), EntryKind::Other);
        assert_eq!(
            EntryClassifier::classify("META-INF/maven/x/pom.properties"),
            EntryKind::Resource
        );
        assert_eq!(EntryClassifier::classify("LICENSE"), EntryKind::Resource);
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in [
            EntryKind::Class,
            EntryKind::Resource,
            EntryKind::ServiceDescriptor,
            EntryKind::Manifest,
            EntryKind::Other,
        ] {
            assert_eq!(EntryKind::parse(kind.as_str()), Some(kind));
        }
    }
}
