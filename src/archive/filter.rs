// src/archive/filter.rs

//! Glob-based entry filters
//!
//! `*` stays within one path segment, `**` spans directories, so
//! `**/module-info.class` matches the root descriptor as well as nested ones.

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};

/// Match options shared by every path glob in the crate
pub(crate) const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A set of path patterns
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    patterns: Vec<Pattern>,
}

impl EntryFilter {
    /// Compile glob patterns; an invalid pattern is a configuration error
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| Error::invalid_pattern(p, e)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, PATH_MATCH))
    }

    /// The source text of each pattern
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> EntryFilter {
        EntryFilter::new(&patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let f = filter(&["META-INF/*.SF"]);
        assert!(f.matches("META-INF/A.SF"));
        assert!(!f.matches("META-INF/sub/A.SF"));
    }

    #[test]
    fn test_double_star_spans_directories() {
        let f = filter(&["inst/io/opentelemetry/javaagent/slf4j/simple/**"]);
        assert!(f.matches("inst/io/opentelemetry/javaagent/slf4j/simple/SimpleLogger.classdata"));
        assert!(!f.matches("inst/io/opentelemetry/javaagent/slf4j/Other.classdata"));

        let f = filter(&["**/module-info.class"]);
        assert!(f.matches("module-info.class"));
        assert!(f.matches("META-INF/versions/9/module-info.class"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = EntryFilter::new(&["a/***/b".to_string()]).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let f = EntryFilter::default();
        assert!(f.is_empty());
        assert!(!f.matches("anything"));
    }
}
