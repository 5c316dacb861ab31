//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries hold:
//! `domain` is pure, `application` talks to the world only through ports.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Scan `src/<layer>` and list every line containing one of `forbidden`.
fn violations_in(layer: &str, forbidden: &[&str]) -> Vec<String> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer);
    let mut violations = Vec::new();
    for file in collect_rs_files(&dir) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            for needle in forbidden {
                if line.contains(needle) {
                    violations.push(format!("{rel}:{}: `{needle}`: {line}", i + 1));
                }
            }
        }
    }
    violations
}

#[test]
fn domain_has_no_io_or_runtime_imports() {
    let violations = violations_in(
        "domain",
        &[
            "tokio::",
            "reqwest",
            "std::fs",
            "std::net",
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay pure:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_does_not_import_outer_layers() {
    let violations = violations_in(
        "application",
        &["crate::infra", "crate::commands", "crate::output", "reqwest"],
    );
    assert!(
        violations.is_empty(),
        "application/ must go through ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = violations_in("infra", &["crate::commands", "crate::output", "println!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/, nor print:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_inline_json_branching_in_commands() {
    let violations = violations_in("commands", &["json: bool", "if json", "if !json"]);
    assert!(
        violations.is_empty(),
        "Found inline JSON branching in commands/; use app.renderer() instead:\n{}",
        violations.join("\n")
    );
}
