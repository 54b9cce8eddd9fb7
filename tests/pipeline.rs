// tests/pipeline.rs

//! End-to-end build tests: load, relocate, isolate, merge, inject, write.

mod common;

use common::{BUILD_FILE, jar_entry, jar_names, setup_build_dir};
use shadepack::{BuildConfig, ClassFile, ErrorCategory, FieldAccess, Pipeline};
use std::path::Path;

fn build(config_path: &Path) -> shadepack::Result<shadepack::BuildReport> {
    let config = BuildConfig::from_file(config_path)?;
    Pipeline::new(config)?.run()
}

/// Rewrite the build file of a test directory
fn edit_build_file(config_path: &Path, edit: impl FnOnce(&str) -> String) {
    std::fs::write(config_path, edit(BUILD_FILE)).unwrap();
}

#[test]
fn test_full_build_layout() {
    let (temp_dir, config_path) = setup_build_dir();
    let report = build(&config_path).unwrap();

    let output = temp_dir.path().join("build/agent.jar");
    assert_eq!(report.output, output);
    assert!(output.exists());

    let names = jar_names(&output);
    assert_eq!(names[0], "META-INF/MANIFEST.MF");

    // upstream stays where it is, bootstrap moves under the shaded package
    assert!(names.contains(&"pkg/Service.class".to_string()));
    assert!(names.contains(&"shaded/pkg/Helper.class".to_string()));
    assert!(!names.contains(&"pkg/Helper.class".to_string()));
    assert!(names.contains(&"shaded/pkg/helper.properties".to_string()));

    // the extension is hidden under the isolation prefix
    assert!(names.contains(&"inst/ext/Plugin.classdata".to_string()));
    assert!(names.contains(&"inst/ext/plugin.txt".to_string()));
    assert!(names.contains(&"inst/LICENSE.renamed".to_string()));
    assert!(!names.iter().any(|n| n.ends_with("EXT.SF")));
    assert!(!names.contains(&"ext/Plugin.class".to_string()));

    // entries after the manifest are sorted
    let rest = &names[1..];
    let mut sorted = rest.to_vec();
    sorted.sort();
    assert_eq!(rest, sorted.as_slice());

    assert_eq!(report.entries, names.len());
    assert_eq!(report.groups.len(), 3);
    assert_eq!(report.groups[0].stages, Vec::<String>::new());
    assert_eq!(report.groups[1].stages, vec!["relocate".to_string()]);
    assert_eq!(
        report.groups[2].stages,
        vec!["relocate".to_string(), "isolate".to_string()]
    );
}

#[test]
fn test_bootstrap_references_relocated() {
    let (temp_dir, config_path) = setup_build_dir();
    build(&config_path).unwrap();
    let output = temp_dir.path().join("build/agent.jar");

    let helper = jar_entry(&output, "shaded/pkg/Helper.class").unwrap();
    let class = ClassFile::parse(&helper).unwrap();
    assert_eq!(class.this_class_name(), Some(&b"shaded/pkg/Helper"[..]));
    let names: Vec<&[u8]> = class
        .constant_pool
        .utf8_indices()
        .into_iter()
        .filter_map(|i| class.constant_pool.utf8(i))
        .collect();
    assert!(names.contains(&&b"shaded/pkg/internal/Util"[..]));
    assert!(!names.contains(&&b"pkg/internal/Util"[..]));

    let properties = jar_entry(&output, "shaded/pkg/helper.properties").unwrap();
    assert_eq!(properties, b"impl=shaded.pkg.Helper\n");
}

#[test]
fn test_field_injected_into_upstream_class() {
    let (temp_dir, config_path) = setup_build_dir();
    let report = build(&config_path).unwrap();
    let output = temp_dir.path().join("build/agent.jar");

    let service = jar_entry(&output, "pkg/Service.class").unwrap();
    let class = ClassFile::parse(&service).unwrap();
    assert_eq!(class.this_class_name(), Some(&b"pkg/Service"[..]));
    assert_eq!(class.fields.len(), 2);

    let field = class.field_named(b"$aux").unwrap();
    assert_eq!(
        FieldAccess::from_bits_truncate(field.access_flags),
        FieldAccess::PRIVATE | FieldAccess::VOLATILE
    );
    assert_eq!(
        class.constant_pool.utf8(field.descriptor_index),
        Some(&b"Ljava/lang/Object;"[..])
    );

    // upstream references are not relocated
    assert!(class.constant_pool.find_utf8(b"pkg/Helper").is_some());

    let (path, source) = report.merge.injected.unwrap();
    assert_eq!(path, "pkg/Service.class");
    assert_eq!(source, "upstream.jar");
}

#[test]
fn test_services_unioned_in_merge_order() {
    let (temp_dir, config_path) = setup_build_dir();
    build(&config_path).unwrap();
    let output = temp_dir.path().join("build/agent.jar");

    let services = jar_entry(&output, "META-INF/services/io.Spi").unwrap();
    assert_eq!(services, b"pkg.ServiceSpi\nshaded.pkg.HelperSpi\n");
}

#[test]
fn test_manifest_composed() {
    let (temp_dir, config_path) = setup_build_dir();
    build(&config_path).unwrap();
    let output = temp_dir.path().join("build/agent.jar");

    let manifest = jar_entry(&output, "META-INF/MANIFEST.MF").unwrap();
    let text = String::from_utf8(manifest).unwrap();
    assert!(text.starts_with("Manifest-Version: 1.0\r\n"));
    assert!(text.contains("Main-Class: pkg.Agent\r\n"));
    assert!(text.contains("Agent-Class: pkg.Agent\r\n"));
    assert!(text.contains("Premain-Class: pkg.Agent\r\n"));
    assert!(text.contains("Can-Retransform-Classes: true\r\n"));
    assert!(text.contains("Implementation-Version: 1.2.3\r\n"));
    // the upstream manifest was dropped
    assert!(!text.contains("pkg.Main"));
}

#[test]
fn test_build_is_reproducible() {
    let (temp_dir, config_path) = setup_build_dir();
    let output = temp_dir.path().join("build/agent.jar");

    let first = build(&config_path).unwrap();
    let first_bytes = std::fs::read(&output).unwrap();
    std::fs::remove_file(&output).unwrap();

    let second = build(&config_path).unwrap();
    let second_bytes = std::fs::read(&output).unwrap();

    assert_eq!(first.sha256, second.sha256);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_output_exclude() {
    let (temp_dir, config_path) = setup_build_dir();
    edit_build_file(&config_path, |s| {
        s.replace(
            "path = \"build/agent.jar\"",
            "path = \"build/agent.jar\"\nexclude = [\"inst/**/*.txt\"]",
        )
    });
    let report = build(&config_path).unwrap();
    let names = jar_names(&temp_dir.path().join("build/agent.jar"));

    assert!(!names.contains(&"inst/ext/plugin.txt".to_string()));
    assert!(names.contains(&"inst/ext/Plugin.classdata".to_string()));
    assert_eq!(report.merge.excluded, 1);
}

#[test]
fn test_group_exclude_applies_before_relocation() {
    let (temp_dir, config_path) = setup_build_dir();
    edit_build_file(&config_path, |s| {
        s.replace(
            "duplicates = \"first-wins\"",
            "duplicates = \"first-wins\"\nexclude = [\"pkg/*.properties\"]",
        )
    });
    build(&config_path).unwrap();
    let names = jar_names(&temp_dir.path().join("build/agent.jar"));

    assert!(!names.iter().any(|n| n.ends_with("helper.properties")));
    assert!(names.contains(&"shaded/pkg/Helper.class".to_string()));
}

#[test]
fn test_isolated_file_clashing_with_directory_of_other_group() {
    let (temp_dir, config_path) = setup_build_dir();
    common::write_jar(
        &temp_dir.path().join("libs/notes.jar"),
        &[("EXT", &b"release notes\n"[..])],
    );
    edit_build_file(&config_path, |s| {
        s.replace(
            "[injection]",
            "[[input]]\nname = \"notes\"\nrole = \"extension\"\npaths = [\"libs/notes.jar\"]\n\n[injection]",
        )
    });
    build(&config_path).unwrap();
    let names = jar_names(&temp_dir.path().join("build/agent.jar"));

    // `inst/ext/` is a directory contributed by the ext group
    assert!(names.contains(&"inst/EXT.renamed".to_string()));
    assert!(!names.contains(&"inst/EXT".to_string()));
    assert!(names.contains(&"inst/ext/plugin.txt".to_string()));
}

#[test]
fn test_missing_injection_target_is_invariant_error() {
    let (temp_dir, config_path) = setup_build_dir();
    edit_build_file(&config_path, |s| {
        s.replace("target = \"pkg/Service.class\"", "target = \"pkg/Missing.class\"")
    });
    let err = build(&config_path).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Invariant);
    assert!(err.to_string().contains("pkg/Missing.class"));
    assert!(!temp_dir.path().join("build/agent.jar").exists());
}

#[test]
fn test_injection_target_twice_in_one_group_is_ambiguous() {
    let (temp_dir, config_path) = setup_build_dir();
    let copy = temp_dir.path().join("libs/upstream-copy.jar");
    std::fs::copy(temp_dir.path().join("libs/upstream.jar"), &copy).unwrap();
    edit_build_file(&config_path, |s| {
        s.replace(
            "paths = [\"libs/upstream.jar\"]",
            "paths = [\"libs/upstream.jar\", \"libs/upstream-copy.jar\"]\ngroup_duplicates = \"exclude\"",
        )
    });
    let err = build(&config_path).unwrap_err();
    match err {
        shadepack::Error::AmbiguousInjectionTarget { count, provenances, .. } => {
            assert_eq!(count, 2);
            assert_eq!(provenances, vec!["upstream.jar", "upstream-copy.jar"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp_dir.path().join("build/agent.jar").exists());
}

#[test]
fn test_duplicate_within_group_fails() {
    let (temp_dir, config_path) = setup_build_dir();
    edit_build_file(&config_path, |s| {
        s.replace(
            "paths = [\"libs/bootstrap.jar\"]",
            "paths = [\"libs/bootstrap.jar\", \"libs/bootstrap.jar\"]\ngroup_duplicates = \"fail\"",
        )
    });
    let err = build(&config_path).unwrap_err();
    assert!(matches!(err, shadepack::Error::DuplicateEntry { .. }));
    assert_eq!(err.category().exit_code(), 4);
    assert!(!temp_dir.path().join("build/agent.jar").exists());
}

#[test]
fn test_conflicting_rules_rejected_before_io() {
    let (_temp_dir, config_path) = setup_build_dir();
    edit_build_file(&config_path, |s| {
        s.replace(
            "to = \"shaded.pkg.\"",
            "to = \"shaded.pkg.\"\n\n[[relocation]]\nfrom = \"pkg.\"\nto = \"other.pkg.\"",
        )
        .replace("libs/upstream.jar", "libs/does-not-exist.jar")
    });
    let config = BuildConfig::from_file(&config_path).unwrap();
    let err = Pipeline::new(config).err().unwrap();
    assert!(matches!(err, shadepack::Error::RuleConflict { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_unreadable_input_is_input_error() {
    let (_temp_dir, config_path) = setup_build_dir();
    edit_build_file(&config_path, |s| {
        s.replace("libs/ext.jar", "libs/missing.jar")
    });
    let err = build(&config_path).unwrap_err();
    assert!(matches!(err, shadepack::Error::UnreadableArchive { .. }));
    assert_eq!(err.category().exit_code(), 3);
}

#[test]
fn test_corrupt_class_in_relocated_group() {
    let (temp_dir, config_path) = setup_build_dir();
    common::write_jar(
        &temp_dir.path().join("libs/bootstrap.jar"),
        &[("pkg/Broken.class", &b"\xCA\xFE\xBA\xBE\x00"[..])],
    );
    let err = build(&config_path).unwrap_err();
    match err {
        shadepack::Error::ClassFormat { entry, archive, .. } => {
            assert_eq!(entry, "pkg/Broken.class");
            assert_eq!(archive, "bootstrap.jar");
        }
        other => panic!("unexpected error: {other}"),
    }
}
