// src/error.rs

//! Error types for archive assembly
//!
//! Every failure is terminal for the build invocation. Errors fall into three
//! categories, see [`ErrorCategory`]:
//!
//! | Category | Raised when | Examples |
//! |----------|-------------|----------|
//! | Configuration | before any archive I/O | overlapping relocation rules, missing manifest keys |
//! | Input | reading or parsing an input | unreadable jar, malformed classfile |
//! | Invariant | while assembling | undeclared duplicates, injection target count != 1 |

use crate::archive::Entry;
use crate::classfile::ClassFormatError;
use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad rules, patterns, manifest values or build file contents
    Configuration,
    /// Unreadable or corrupt input
    Input,
    /// A structural invariant of the assembled archive was violated
    Invariant,
}

impl ErrorCategory {
    /// Process exit code used by the CLI for this category
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::Input => 3,
            Self::Invariant => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Input => "input",
            Self::Invariant => "invariant",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------
    /// Two relocation rules cannot coexist
    #[error("relocation rule #{index} ('{prefix}') conflicts with rule #{other}: {reason}")]
    RuleConflict {
        index: usize,
        other: usize,
        prefix: String,
        reason: String,
    },

    /// A glob pattern failed to compile
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A required manifest attribute is absent or empty
    #[error("missing required manifest attribute: {0}")]
    MissingManifestAttribute(String),

    /// The field injection request is malformed
    #[error("invalid field injection: {0}")]
    InvalidInjection(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The build file could not be read, parsed or validated
    #[error(transparent)]
    BuildFile(#[from] ConfigError),

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------
    #[error("cannot read archive {}: {source}", .path.display())]
    UnreadableArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed class '{entry}' in {archive}: {source}")]
    ClassFormat {
        entry: String,
        archive: String,
        #[source]
        source: ClassFormatError,
    },

    #[error("service descriptor '{entry}' in {archive} is not valid UTF-8: {source}")]
    ServiceDescriptorEncoding {
        entry: String,
        archive: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ---------------------------------------------------------------------
    // Invariant violations
    // ---------------------------------------------------------------------
    /// Same path contributed twice without a policy allowing it
    #[error("duplicate entry '{path}': provided by both {first} and {second}")]
    DuplicateEntry {
        path: String,
        first: String,
        second: String,
    },

    #[error(
        "target class not found: {target} (check whether the dependency moved or was renamed)"
    )]
    InjectionTargetNotFound { target: String },

    #[error(
        "ambiguous injection target '{target}': expected exactly 1 match, found {count} ({})",
        .provenances.join(", ")
    )]
    AmbiguousInjectionTarget {
        target: String,
        count: usize,
        provenances: Vec<String>,
    },

    #[error("field '{field}' is already declared in {target}")]
    FieldAlreadyDeclared { target: String, field: String },
}

impl Error {
    /// Which part of the error taxonomy this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RuleConflict { .. }
            | Self::InvalidPattern { .. }
            | Self::MissingManifestAttribute(_)
            | Self::InvalidInjection(_)
            | Self::Config(_)
            | Self::BuildFile(_) => ErrorCategory::Configuration,
            Self::UnreadableArchive { .. }
            | Self::ClassFormat { .. }
            | Self::ServiceDescriptorEncoding { .. }
            | Self::Io(_) => ErrorCategory::Input,
            Self::DuplicateEntry { .. }
            | Self::InjectionTargetNotFound { .. }
            | Self::AmbiguousInjectionTarget { .. }
            | Self::FieldAlreadyDeclared { .. } => ErrorCategory::Invariant,
        }
    }

    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn service_encoding(entry: &Entry, source: std::str::Utf8Error) -> Self {
        Self::ServiceDescriptorEncoding {
            entry: entry.path().to_string(),
            archive: entry.source().to_string(),
            source,
        }
    }

    pub(crate) fn invalid_pattern(pattern: &str, err: glob::PatternError) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = Error::MissingManifestAttribute("Main-Class".to_string());
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.category().exit_code(), 2);

        let err = Error::DuplicateEntry {
            path: "a/B.class".to_string(),
            first: "one.jar".to_string(),
            second: "two.jar".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Invariant);

        let err = Error::Io(std::io::Error::other("boom"));
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn test_duplicate_message_names_both_sources() {
        let err = Error::DuplicateEntry {
            path: "pkg/A.class".to_string(),
            first: "left.jar".to_string(),
            second: "right.jar".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("left.jar"));
        assert!(msg.contains("right.jar"));
        assert!(msg.contains("pkg/A.class"));
    }

    #[test]
    fn test_ambiguous_message_lists_provenances() {
        let err = Error::AmbiguousInjectionTarget {
            target: "pkg/S.class".to_string(),
            count: 2,
            provenances: vec!["a.jar".to_string(), "b.jar".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("ambiguous"));
        assert!(msg.contains("a.jar, b.jar"));
    }
}
