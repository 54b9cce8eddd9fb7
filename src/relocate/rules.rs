// src/relocate/rules.rs

//! Relocation rules and rule matching
//!
//! A rule moves every symbol under a package (or a single class) prefix to a
//! new prefix. Symbols come in two spellings: dotted (`io.foo.Bar`, as used in
//! source-level strings and service files) and slashed (`io/foo/Bar`, as used
//! in classfiles and entry paths). Rules are compiled once into both
//! spellings.

use crate::archive::filter::PATH_MATCH;
use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};

/// A relocation rule as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRule {
    /// Prefix to move, dotted or slashed (`io.opentelemetry.api`)
    pub from: String,
    /// Replacement prefix
    pub to: String,
    /// Symbols the rule must leave alone (globs over the slashed form)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl RelocationRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            exclude: Vec::new(),
        }
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Parse the `FROM=TO` form used on the command line
    pub fn parse_pair(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                Ok(Self::new(from.trim(), to.trim()))
            }
            _ => Err(Error::config(format!(
                "relocation must be written FROM=TO, got '{}'",
                s
            ))),
        }
    }
}

/// Spelling of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Dot,
    Slash,
}

impl Separator {
    pub fn char(self) -> char {
        match self {
            Self::Dot => '.',
            Self::Slash => '/',
        }
    }

    /// Spelling of a symbol; anything containing `/` is slashed
    pub fn of(symbol: &str) -> Self {
        if symbol.contains('/') {
            Self::Slash
        } else {
            Self::Dot
        }
    }
}

/// A prefix in both spellings
#[derive(Debug, Clone, PartialEq, Eq)]
struct Prefix {
    dotted: String,
    slashed: String,
}

impl Prefix {
    fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches(['.', '/']);
        Self {
            dotted: trimmed.replace('/', "."),
            slashed: trimmed.replace('.', "/"),
        }
    }

    fn get(&self, sep: Separator) -> &str {
        match sep {
            Separator::Dot => &self.dotted,
            Separator::Slash => &self.slashed,
        }
    }

    fn is_empty(&self) -> bool {
        self.dotted.is_empty()
    }

    /// A prefix with more than one segment can also name a class exactly
    fn names_class(&self) -> bool {
        self.dotted.contains('.')
    }

    /// Length of the part of `symbol` covered by this prefix, if any
    fn covers(&self, symbol: &str, sep: Separator) -> Option<usize> {
        let prefix = self.get(sep);
        let rest = symbol.strip_prefix(prefix)?;
        match rest.chars().next() {
            Some(c) if c == sep.char() => Some(prefix.len()),
            Some('$') if self.names_class() => Some(prefix.len()),
            None if self.names_class() => Some(prefix.len()),
            _ => None,
        }
    }

    /// Whether `other` lies strictly below this prefix
    fn contains(&self, other: &Prefix) -> bool {
        other
            .dotted
            .strip_prefix(&self.dotted)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('$'))
    }

    /// Whether some symbol could sit under both prefixes
    fn overlaps(&self, other: &Prefix) -> bool {
        self == other || self.contains(other) || other.contains(self)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    from: Prefix,
    to: Prefix,
    exclude: Vec<Pattern>,
}

impl CompiledRule {
    fn excludes(&self, slashed: &str) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches_with(slashed, PATH_MATCH))
    }
}

/// Compiled, validated relocation rules in declaration order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

fn is_symbol_text(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'.' | b'/'))
}

impl RuleSet {
    /// Validate and compile rules
    ///
    /// Fails on an empty prefix, on two rules with the same source prefix, on
    /// a rule nested inside an earlier rule (the earlier one would always
    /// win), on a target prefix that overlaps another rule's source prefix or
    /// contains its own, and on invalid exclude globs.
    ///
    /// Symbols under a target prefix count as already relocated, so a source
    /// package overlapping a target would never be moved.
    pub fn compile(rules: &[RelocationRule]) -> Result<Self> {
        let mut compiled: Vec<CompiledRule> = Vec::with_capacity(rules.len());

        for (index, rule) in rules.iter().enumerate() {
            let from = Prefix::new(&rule.from);
            let to = Prefix::new(&rule.to);
            if from.is_empty() || to.is_empty() {
                return Err(Error::config(format!(
                    "relocation rule #{} has an empty prefix ('{}' -> '{}')",
                    index, rule.from, rule.to
                )));
            }
            for (side, raw) in [("from", &rule.from), ("to", &rule.to)] {
                if !is_symbol_text(raw.trim()) {
                    return Err(Error::config(format!(
                        "relocation rule #{} has an invalid '{}' prefix '{}'",
                        index, side, raw
                    )));
                }
            }

            for (other, earlier) in compiled.iter().enumerate() {
                if earlier.from == from {
                    return Err(Error::RuleConflict {
                        index,
                        other,
                        prefix: from.dotted.clone(),
                        reason: "both rules relocate the same prefix".to_string(),
                    });
                }
                if earlier.exclude.is_empty() && earlier.from.contains(&from) {
                    return Err(Error::RuleConflict {
                        index,
                        other,
                        prefix: from.dotted.clone(),
                        reason: format!(
                            "unreachable, every symbol it matches is taken by '{}' first",
                            earlier.from.dotted
                        ),
                    });
                }
            }

            let exclude = rule
                .exclude
                .iter()
                .map(|p| {
                    // Excludes may be written dotted; match them against slashed symbols
                    let slashed = p.trim().replace('.', "/");
                    Pattern::new(&slashed).map_err(|e| Error::invalid_pattern(p, e))
                })
                .collect::<Result<Vec<_>>>()?;

            compiled.push(CompiledRule { from, to, exclude });
        }

        for (index, rule) in compiled.iter().enumerate() {
            if rule.to == rule.from || rule.to.contains(&rule.from) {
                return Err(Error::RuleConflict {
                    index,
                    other: index,
                    prefix: rule.to.dotted.clone(),
                    reason: "the target prefix covers the rule's own source prefix".to_string(),
                });
            }
            for (other, source) in compiled.iter().enumerate() {
                if other != index && rule.to.overlaps(&source.from) {
                    return Err(Error::RuleConflict {
                        index,
                        other,
                        prefix: rule.to.dotted.clone(),
                        reason: format!(
                            "the target prefix overlaps '{}', whose classes would never be relocated",
                            source.from.dotted
                        ),
                    });
                }
            }
        }

        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Source prefixes in dotted form
    pub fn from_prefixes(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.from.dotted.as_str())
    }

    /// Whether a symbol already sits under some rule's target prefix
    fn is_relocated(&self, symbol: &str, sep: Separator) -> bool {
        self.rules.iter().any(|r| r.to.covers(symbol, sep).is_some())
    }

    /// Relocate one symbol; `None` when no rule applies
    ///
    /// The spelling is taken from the symbol itself. The first rule whose
    /// prefix covers the symbol and which does not exclude it wins.
    pub fn relocate_symbol(&self, symbol: &str) -> Option<String> {
        let sep = Separator::of(symbol);
        if self.is_relocated(symbol, sep) {
            return None;
        }
        let slashed = match sep {
            Separator::Slash => std::borrow::Cow::Borrowed(symbol),
            Separator::Dot => std::borrow::Cow::Owned(symbol.replace('.', "/")),
        };

        self.rules.iter().find_map(|rule| {
            let len = rule.from.covers(symbol, sep)?;
            if rule.excludes(&slashed) {
                return None;
            }
            let mut out = String::with_capacity(symbol.len() + rule.to.get(sep).len());
            out.push_str(rule.to.get(sep));
            out.push_str(&symbol[len..]);
            Some(out)
        })
    }

    /// Whether any rule would still rewrite this symbol
    pub fn matches(&self, symbol: &str) -> bool {
        self.relocate_symbol(symbol).is_some()
    }
}
