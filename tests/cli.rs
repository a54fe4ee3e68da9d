//! Integration tests for the hoot CLI.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn hoot(index_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hoot"))
        .arg("--index-dir")
        .arg(index_dir)
        .arg("--config")
        .arg(index_dir.join("missing-config.json"))
        .arg("--no-color")
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run hoot")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "hoot failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn fixture() -> (tempfile::TempDir, tempfile::TempDir) {
    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("car.txt"), "the red car is fast").unwrap();
    fs::write(src.path().join("bus.txt"), "the red bus is slow").unwrap();
    fs::write(src.path().join("sky.txt"), "a blue sky").unwrap();
    let idx = tempfile::tempdir().unwrap();
    (src, idx)
}

#[test]
fn test_index_then_search() {
    let (src, idx) = fixture();
    let src_arg = src.path().to_string_lossy().into_owned();

    let out = stdout(&hoot(idx.path(), &["index", &src_arg, "--quiet"]));
    assert!(out.contains("Indexed 3"));

    let out = stdout(&hoot(idx.path(), &["search", "red", "-bus"]));
    assert!(out.contains("car.txt"));
    assert!(!out.contains("bus.txt"));
    assert!(out.contains("1 document"));

    let out = stdout(&hoot(idx.path(), &["search", "+sky", "+fast"]));
    assert!(out.contains("sky.txt"));
    assert!(out.contains("car.txt"));
}

#[test]
fn test_remove_and_words() {
    let (src, idx) = fixture();
    let src_arg = src.path().to_string_lossy().into_owned();
    stdout(&hoot(idx.path(), &["index", &src_arg, "-q"]));

    let car = src.path().canonicalize().unwrap().join("car.txt");
    let out = stdout(&hoot(idx.path(), &["remove", &car.to_string_lossy()]));
    assert!(out.starts_with("Removed"));

    let out = stdout(&hoot(idx.path(), &["search", "red"]));
    assert!(!out.contains("car.txt"));

    let out = stdout(&hoot(idx.path(), &["words", "s*"]));
    assert!(out.contains("sky"));
    assert!(out.contains("slow"));
    assert!(!out.contains("red"));
}

#[test]
fn test_stats_and_optimize() {
    let (src, idx) = fixture();
    let src_arg = src.path().to_string_lossy().into_owned();
    stdout(&hoot(idx.path(), &["index", &src_arg, "-q"]));

    stdout(&hoot(idx.path(), &["optimize"]));
    let out = stdout(&hoot(idx.path(), &["stats"]));
    assert!(out.contains("Documents:        3"));
}
