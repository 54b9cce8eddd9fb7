// src/relocate/text.rs

//! Token-wise symbol rewriting
//!
//! Text is split into maximal runs of symbol bytes (`[A-Za-z0-9_$./]`); each
//! run is a candidate symbol. Everything between runs, including any
//! non-ASCII byte, is copied unchanged, so the scanner works on raw bytes and
//! preserves modified UTF-8 in constant pools.

use super::rules::RuleSet;
use std::borrow::Cow;

/// How tokens are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Plain text: every token is a dotted or slashed name
    Text,
    /// Classfile strings: additionally recognize descriptor references
    /// such as `(IJLpkg/Foo;)V` or `Ljava/util/List<Lpkg/Foo;>;`
    Descriptor,
}

fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'.' | b'/')
}

fn is_primitive(b: u8) -> bool {
    matches!(b, b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V')
}

/// Rewrite every relocatable token; borrowed when nothing changed
pub fn relocate_bytes<'a>(rules: &RuleSet, input: &'a [u8], mode: ScanMode) -> Cow<'a, [u8]> {
    let mut out: Option<Vec<u8>> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < input.len() {
        if !is_symbol_byte(input[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < input.len() && is_symbol_byte(input[i]) {
            i += 1;
        }
        // Symbol bytes are ASCII, so the token is valid UTF-8
        let Ok(token) = std::str::from_utf8(&input[start..i]) else {
            continue;
        };

        let next = input.get(i).copied();
        if let Some(replacement) = relocate_token(rules, token, next, mode) {
            let buf = out.get_or_insert_with(|| Vec::with_capacity(input.len() + 64));
            buf.extend_from_slice(&input[copied..start]);
            buf.extend_from_slice(replacement.as_bytes());
            copied = i;
        }
    }

    match out {
        Some(mut buf) => {
            buf.extend_from_slice(&input[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(input),
    }
}

/// Rewrite a UTF-8 string token-wise
pub fn relocate_str<'a>(rules: &RuleSet, input: &'a str) -> Cow<'a, str> {
    match relocate_bytes(rules, input.as_bytes(), ScanMode::Text) {
        Cow::Borrowed(_) => Cow::Borrowed(input),
        // Only ASCII tokens were replaced with ASCII, so UTF-8 is preserved
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn relocate_token(rules: &RuleSet, token: &str, next: Option<u8>, mode: ScanMode) -> Option<String> {
    if mode == ScanMode::Descriptor && matches!(next, Some(b';') | Some(b'<')) {
        if let Some(relocated) = relocate_descriptor_tail(rules, token) {
            return Some(relocated);
        }
    }
    // Absolute resource names, as passed to `Class.getResource`
    if let Some(rest) = token.strip_prefix('/') {
        return rules.relocate_symbol(rest).map(|r| format!("/{}", r));
    }
    rules.relocate_symbol(token)
}

/// Handle `[primitives]L<internal name>` at the end of a descriptor token
fn relocate_descriptor_tail(rules: &RuleSet, token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    let l = bytes.iter().position(|&b| b == b'L')?;
    if !bytes[..l].iter().all(|&b| is_primitive(b)) {
        return None;
    }
    let name = &token[l + 1..];
    if name.is_empty() || name.contains('.') {
        return None;
    }
    let relocated = rules.relocate_symbol(name)?;
    Some(format!("{}{}", &token[..=l], relocated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relocate::rules::RelocationRule;

    fn rules() -> RuleSet {
        RuleSet::compile(&[
            RelocationRule::new("pkg", "shaded.pkg"),
            RelocationRule::new("java.util.logging.Logger", "agent.PatchLogger"),
        ])
        .unwrap()
    }

    fn text(input: &str) -> String {
        relocate_str(&rules(), input).into_owned()
    }

    fn desc(input: &str) -> String {
        String::from_utf8(relocate_bytes(&rules(), input.as_bytes(), ScanMode::Descriptor).into_owned())
            .unwrap()
    }

    #[test]
    fn test_text_tokens() {
        assert_eq!(text("impl=pkg.Helper"), "impl=shaded.pkg.Helper");
        assert_eq!(text("pkg/helper.properties"), "shaded/pkg/helper.properties");
        assert_eq!(text("com.pkg.Helper pkg"), "com.pkg.Helper pkg");
        assert_eq!(
            text("<class>pkg.A</class><class>pkg.B</class>"),
            "<class>shaded.pkg.A</class><class>shaded.pkg.B</class>"
        );
    }

    #[test]
    fn test_absolute_resource_names() {
        assert_eq!(
            text("getResource(\"/pkg/x.properties\")"),
            "getResource(\"/shaded/pkg/x.properties\")"
        );
        assert_eq!(desc("/pkg/x.properties"), "/shaded/pkg/x.properties");
        assert_eq!(text("/other/x.properties"), "/other/x.properties");
        // Only one slash is taken as the root
        assert_eq!(text("//pkg/x"), "//pkg/x");
    }

    #[test]
    fn test_unchanged_is_borrowed() {
        let input = "nothing to see here";
        assert!(matches!(relocate_str(&rules(), input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(desc("Lpkg/Foo;"), "Lshaded/pkg/Foo;");
        assert_eq!(desc("(IJLpkg/Foo;[Lpkg/Bar;)V"), "(IJLshaded/pkg/Foo;[Lshaded/pkg/Bar;)V");
        assert_eq!(
            desc("Ljava/util/List<Lpkg/Foo;>;"),
            "Ljava/util/List<Lshaded/pkg/Foo;>;"
        );
        assert_eq!(
            desc("(Ljava/util/logging/Logger;)V"),
            "(Lagent/PatchLogger;)V"
        );
        // Plain internal names still relocate in descriptor mode
        assert_eq!(desc("pkg/Foo"), "shaded/pkg/Foo");
        // Type variables are not class references
        assert_eq!(desc("TT;"), "TT;");
    }

    #[test]
    fn test_non_ascii_preserved() {
        let input = "caf\u{e9} pkg.Foo \u{2603}";
        assert_eq!(text(input), "caf\u{e9} shaded.pkg.Foo \u{2603}");

        // Modified UTF-8 encoding of NUL
        let raw = [0xC0, 0x80, b'p', b'k', b'g', b'/', b'A'];
        let out = relocate_bytes(&rules(), &raw, ScanMode::Descriptor);
        assert_eq!(&out[..2], &[0xC0, 0x80]);
        assert_eq!(&out[2..], b"shaded/pkg/A");
    }
}
