// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;

/// Assemble a minimal valid classfile.
///
/// The class declares one private field `value` of type `String`. Every name
/// in `refs` gets a Class constant; every value in `strings` becomes a String
/// constant.
pub fn class_bytes(this: &str, refs: &[&str], strings: &[&str]) -> Vec<u8> {
    let mut pool: Vec<u8> = Vec::new();
    let mut next: u16 = 1;

    let mut utf8 = |pool: &mut Vec<u8>, s: &str| -> u16 {
        pool.push(TAG_UTF8);
        pool.extend_from_slice(&(s.len() as u16).to_be_bytes());
        pool.extend_from_slice(s.as_bytes());
        next += 1;
        next - 1
    };

    let this_name = utf8(&mut pool, this);
    let super_name = utf8(&mut pool, "java/lang/Object");
    let field_name = utf8(&mut pool, "value");
    let field_desc = utf8(&mut pool, "Ljava/lang/String;");
    let ref_names: Vec<u16> = refs.iter().map(|r| utf8(&mut pool, r)).collect();
    let string_values: Vec<u16> = strings.iter().map(|s| utf8(&mut pool, s)).collect();

    let mut indexed = |pool: &mut Vec<u8>, tag: u8, target: u16| -> u16 {
        pool.push(tag);
        pool.extend_from_slice(&target.to_be_bytes());
        next += 1;
        next - 1
    };

    let this_class = indexed(&mut pool, TAG_CLASS, this_name);
    let super_class = indexed(&mut pool, TAG_CLASS, super_name);
    for name in ref_names {
        indexed(&mut pool, TAG_CLASS, name);
    }
    for value in string_values {
        indexed(&mut pool, TAG_STRING, value);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&52u16.to_be_bytes());
    out.extend_from_slice(&next.to_be_bytes());
    out.extend_from_slice(&pool);
    for v in [0x0021, this_class, super_class, 0] {
        out.extend_from_slice(&u16::to_be_bytes(v));
    }
    // one field, no methods, no attributes
    for v in [1, 0x0002, field_name, field_desc, 0, 0, 0] {
        out.extend_from_slice(&u16::to_be_bytes(v));
    }
    out
}

/// Write a jar with the given entries, in order.
///
/// Directory entries are added for every parent, as real jar tools do.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut dirs: Vec<String> = Vec::new();
    for (name, content) in entries {
        for (i, _) in name.match_indices('/') {
            let dir = format!("{}/", &name[..i]);
            if !dirs.contains(&dir) {
                zip.add_directory(dir.as_str(), options).unwrap();
                dirs.push(dir);
            }
        }
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

/// Names of all file entries in a jar, in archive order
pub fn jar_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .filter(|n| !n.ends_with('/'))
        .collect()
}

/// Read one entry of a jar
pub fn jar_entry(path: &Path, name: &str) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).ok()?;
    let mut buf = Vec::new();
    std::io::copy(&mut entry, &mut buf).unwrap();
    Some(buf)
}

/// A build workspace with an upstream, a bootstrap and an extension jar.
///
/// - `libs/upstream.jar`: `pkg/Service.class` referencing `pkg/Helper`,
///   and a service descriptor for `io.Spi`
/// - `libs/bootstrap.jar`: `pkg/Helper.class`, a resource and a descriptor
///   for `io.Spi` naming `pkg.HelperSpi`
/// - `libs/ext.jar`: `ext/Plugin.class`, a `LICENSE`, a resource and a
///   signature file
///
/// Returns (TempDir, build file path) - keep the TempDir alive to prevent
/// cleanup.
pub fn setup_build_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let libs = temp_dir.path().join("libs");
    std::fs::create_dir_all(&libs).unwrap();

    let service = class_bytes("pkg/Service", &["pkg/Helper"], &["pkg.Helper"]);
    write_jar(
        &libs.join("upstream.jar"),
        &[
            ("META-INF/MANIFEST.MF", &b"Manifest-Version: 1.0\r\nMain-Class: pkg.Main\r\n\r\n"[..]),
            ("pkg/Service.class", &service[..]),
            ("META-INF/services/io.Spi", &b"pkg.ServiceSpi\n"[..]),
        ],
    );

    let helper = class_bytes("pkg/Helper", &["pkg/internal/Util"], &[]);
    write_jar(
        &libs.join("bootstrap.jar"),
        &[
            ("META-INF/MANIFEST.MF", &b"Manifest-Version: 1.0\r\n\r\n"[..]),
            ("pkg/Helper.class", &helper[..]),
            ("pkg/helper.properties", &b"impl=pkg.Helper\n"[..]),
            ("META-INF/services/io.Spi", &b"# bootstrap providers\npkg.HelperSpi\n"[..]),
        ],
    );

    let plugin = class_bytes("ext/Plugin", &["ext/Support"], &[]);
    write_jar(
        &libs.join("ext.jar"),
        &[
            ("ext/Plugin.class", &plugin[..]),
            ("LICENSE", &b"Apache-2.0\n"[..]),
            ("ext/plugin.txt", &b"ext.Plugin\n"[..]),
            ("META-INF/EXT.SF", &b"Signature-Version: 1.0\r\n"[..]),
        ],
    );

    let config_path = temp_dir.path().join("shadepack.toml");
    std::fs::write(&config_path, BUILD_FILE).unwrap();
    (temp_dir, config_path)
}

/// Build file matching [`setup_build_dir`]
pub const BUILD_FILE: &str = r#"
[output]
path = "build/agent.jar"

[[relocation]]
from = "pkg."
to = "shaded.pkg."

[[input]]
name = "upstream"
role = "upstream"
paths = ["libs/upstream.jar"]

[[input]]
name = "bootstrap"
role = "bootstrap"
paths = ["libs/bootstrap.jar"]
duplicates = "first-wins"

[[input]]
name = "ext"
role = "extension"
paths = ["libs/ext.jar"]

[injection]
target = "pkg/Service.class"
field = "$aux"
descriptor = "Ljava/lang/Object;"
access = ["private", "volatile"]

[manifest]
main_class = "pkg.Agent"
implementation_title = "test-agent"
implementation_version = "1.2.3"
implementation_vendor = "Example"
"#;
