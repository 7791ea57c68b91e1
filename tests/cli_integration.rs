//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

const ORIGINAL: &str = "The cat sat on the mat.\n\nIt was raining.\n\nThe end.\n";
const REVISED: &str = "The cat sat quietly on the mat.\n\nThe end.\n\nAn epilogue appears.\n";

/// Get the binary to test, isolated from any user configuration.
fn redline(dir: &assert_fs::TempDir) -> Command {
    let config = dir.child("config.toml");
    if !config.exists() {
        config.write_str("").unwrap();
    }
    let mut cmd = Command::cargo_bin("redline").unwrap();
    cmd.current_dir(dir.path()).env("REDLINE_CONFIG", config.path()).env_remove("RUST_LOG");
    cmd
}

fn chapter_pair() -> assert_fs::TempDir {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("ch1.md").write_str(ORIGINAL).unwrap();
    dir.child("ch1-rev01.md").write_str(REVISED).unwrap();
    dir
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let dir = assert_fs::TempDir::new().unwrap();
    redline(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("AI-assisted manuscript revision"));
}

#[test]
fn test_version_flag() {
    let dir = assert_fs::TempDir::new().unwrap();
    redline(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Diff Command Tests
// ============================================================================

#[test]
fn test_diff_text() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["diff", "ch1.md", "ch1-rev01.md", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("   0 ~ The cat sat on the mat."))
        .stdout(predicate::str::contains("The cat sat [+quietly +]on the mat."))
        .stdout(predicate::str::contains("   1 - It was raining."))
        .stdout(predicate::str::contains("   3 + An epilogue appears."))
        .stdout(predicate::str::contains("3 changes"));
}

#[test]
fn test_diff_json() {
    let dir = chapter_pair();
    let output = redline(&dir)
        .args(["diff", "ch1.md", "ch1-rev01.md", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["kind"], "changed");
    assert_eq!(rows[1]["kind"], "removed");
    assert!(rows[1].get("right_text").is_none());
    assert_eq!(rows[2]["kind"], "equal");
    assert_eq!(rows[3]["kind"], "added");
    assert_eq!(json["stats"]["change_count"], 3);
}

#[test]
fn test_diff_identical_files() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["diff", "ch1.md", "ch1.md", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 changes, +0 -0 chars"));
}

#[test]
fn test_diff_unknown_format() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["diff", "ch1.md", "ch1-rev01.md", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format"));
}

#[test]
fn test_diff_missing_file() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["diff", "ch1.md", "nope.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.md"));
}

// ============================================================================
// Merge Command Tests
// ============================================================================

#[test]
fn test_merge_preview_leaves_files() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-right", "0", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("   0 = The cat sat quietly on the mat."));

    dir.child("ch1.md").assert(ORIGINAL);
}

#[test]
fn test_merge_accept_all_write() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-all", "--write"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote ch1.md"))
        .stderr(predicate::str::contains("0 changes"));

    dir.child("ch1.md")
        .assert("The cat sat quietly on the mat.\n\nThe end.\n\nAn epilogue appears.");
    dir.child("ch1-rev01.md").assert(REVISED);
}

#[test]
fn test_merge_selected_rows_write() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-right", "0,3", "--write"])
        .assert()
        .success();

    dir.child("ch1.md").assert(
        "The cat sat quietly on the mat.\n\nIt was raining.\n\nThe end.\n\nAn epilogue appears.",
    );
}

#[test]
fn test_merge_rows_both_directions_write() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-right", "1", "--accept-left", "3", "--write"])
        .assert()
        .success();

    dir.child("ch1.md").assert("The cat sat on the mat.\n\nThe end.");
    dir.child("ch1-rev01.md").assert("The cat sat quietly on the mat.\n\nThe end.");
}

#[test]
fn test_merge_same_row_both_directions_fails() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-right", "0", "--accept-left", "0", "--write"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Row 0 cannot be accepted from both sides"));

    dir.child("ch1.md").assert(ORIGINAL);
    dir.child("ch1-rev01.md").assert(REVISED);
}

#[test]
fn test_merge_accept_all_with_rows_conflict() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-all", "--accept-right", "1"])
        .assert()
        .failure();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--reject-all", "--accept-left", "3"])
        .assert()
        .failure();
}

#[test]
fn test_merge_row_out_of_range() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-left", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn test_merge_accept_and_reject_conflict() {
    let dir = chapter_pair();
    redline(&dir)
        .args(["merge", "ch1.md", "ch1-rev01.md", "--accept-all", "--reject-all"])
        .assert()
        .failure();
}

// ============================================================================
// Revise Command Tests
// ============================================================================

#[test]
fn test_revise_missing_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    redline(&dir)
        .args(["revise", "missing.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.md"));
}

#[test]
fn test_revise_empty_directory() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("book").create_dir_all().unwrap();
    redline(&dir)
        .args(["revise", "book"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No .md or .txt documents found"));
}

#[test]
fn test_revise_unreachable_provider_names_document() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("config.toml")
        .write_str(
            "[ai]\nprovider = \"ollama\"\n\n[ai.ollama]\nbase_url = \"http://127.0.0.1:9\"\n\n\
             [pipeline.retry]\nmax_attempts = 0\n",
        )
        .unwrap();
    dir.child("chapter.md").write_str("Once upon a time.").unwrap();

    redline(&dir)
        .args(["revise", "chapter.md", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to revise chapter.md"));

    // The placeholder revision exists but stays empty
    dir.child("chapter-rev01.md").assert("");
}

#[test]
fn test_revise_directory_in_name_order() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("config.toml")
        .write_str(
            "[ai]\nprovider = \"ollama\"\n\n[ai.ollama]\nbase_url = \"http://127.0.0.1:9\"\n\n\
             [pipeline.retry]\nmax_attempts = 0\n",
        )
        .unwrap();
    dir.child("book/b.md").write_str("Second.").unwrap();
    dir.child("book/a.md").write_str("First.").unwrap();

    redline(&dir)
        .args(["revise", "book", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to revise a.md"));

    dir.child("book/a-rev01.md").assert("");
    dir.child("book/b-rev01.md").assert(predicate::path::missing());
}

#[test]
fn test_revise_unknown_provider() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("chapter.md").write_str("Once upon a time.").unwrap();
    redline(&dir)
        .args(["revise", "chapter.md", "--provider", "markov"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown AI provider"));
}

// ============================================================================
// Config & Completions Tests
// ============================================================================

#[test]
fn test_config_show_defaults() {
    let dir = assert_fs::TempDir::new().unwrap();
    redline(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[diff]"))
        .stdout(predicate::str::contains("threshold = 0.4"));
}

#[test]
fn test_config_show_reads_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    dir.child("config.toml").write_str("[diff]\nthreshold = 0.6\n").unwrap();
    redline(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold = 0.6"));
}

#[test]
fn test_completions_bash() {
    let dir = assert_fs::TempDir::new().unwrap();
    redline(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("redline"));
}
