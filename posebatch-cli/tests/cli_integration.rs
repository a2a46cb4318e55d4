//! CLI integration tests for posebatch-cli.
//!
//! These tests run the actual binary against temporary dataset trees, with
//! `sh -c` standing in for the aligner. The script sees the named arguments
//! as positional parameters, so `$5` is the output video path.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Aligner script that produces the output file.
const TOUCH_OUTPUT: &str = r#"touch "$5""#;

/// Aligner script that fails for subject 091 and succeeds otherwise.
const FAIL_091: &str = r#"case "$5" in *091-*) echo "no pose found" >&2; exit 1;; esac; touch "$5""#;

/// Get a Command for the posebatch binary.
fn posebatch() -> Command {
    let mut cmd = Command::cargo_bin("posebatch").unwrap();
    for var in ["POSEBATCH_LOG", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

struct Dataset {
    temp: TempDir,
}

impl Dataset {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        for dir in ["videos", "png", "targets", "out"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        Self { temp }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    fn touch(&self, rel: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn manifest(&self) -> PathBuf {
        self.path("myconfig/test.yaml")
    }

    /// Command with the shared directory arguments for `mode`.
    fn command(&self, mode: &str) -> Command {
        let mut cmd = posebatch();
        cmd.current_dir(self.temp.path())
            .arg(mode)
            .arg("--videos-dir")
            .arg(self.path("videos"))
            .arg("--original-videos-png-dir")
            .arg(self.path("png"))
            .arg("--result-dir")
            .arg(self.path("out"))
            .arg("--yaml-file")
            .arg(self.manifest());
        cmd
    }

    /// Dispatching command using `script` as the aligner.
    fn dispatching(&self, mode: &str, script: &str) -> Command {
        let mut cmd = self.command(mode);
        cmd.arg("--target-videos-dir")
            .arg(self.path("targets"))
            .args(["--aligner-program", "sh", "--aligner-arg=-c", "--aligner-arg"])
            .arg(script);
        cmd
    }

    fn load_manifest(&self) -> serde_yaml::Mapping {
        let yaml = fs::read_to_string(self.manifest()).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        value["test_cases"].as_mapping().unwrap().clone()
    }
}

fn key(path: &Path) -> serde_yaml::Value {
    serde_yaml::Value::String(path.display().to_string())
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    posebatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Batch pose-alignment preparation",
        ))
        .stdout(predicate::str::contains("sample"))
        .stdout(predicate::str::contains("map"))
        .stdout(predicate::str::contains("collect"));
}

#[test]
fn test_version_displays_version() {
    posebatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("posebatch"));
}

#[test]
fn test_help_shows_exit_codes() {
    posebatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_sample_help_shows_options() {
    posebatch()
        .args(["sample", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--videos-dir"))
        .stdout(predicate::str::contains("--target-videos-dir"))
        .stdout(predicate::str::contains("--random-seed"))
        .stdout(predicate::str::contains("--aligner-program"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_map_help_shows_map_file() {
    posebatch()
        .args(["map", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--video-map-file"));
}

#[test]
fn test_collect_has_no_dispatch_options() {
    posebatch()
        .args(["collect", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--flush-each"))
        .stdout(predicate::str::contains("--aligner-program").not());
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_unknown_flag_is_usage_error() {
    posebatch()
        .args(["sample", "--no-such-flag"])
        .assert()
        .code(64);
}

#[test]
fn test_missing_videos_dir_exit_code() {
    let ds = Dataset::new();
    fs::remove_dir(ds.path("videos")).unwrap();

    ds.dispatching("sample", TOUCH_OUTPUT)
        .assert()
        .code(66)
        .stderr(predicate::str::contains("source directory does not exist"));
}

#[test]
fn test_missing_map_file_exit_code() {
    let ds = Dataset::new();
    ds.dispatching("map", TOUCH_OUTPUT)
        .arg("--video-map-file")
        .arg(ds.path("missing.json"))
        .assert()
        .code(66);
}

#[test]
fn test_inverted_subject_range_is_usage_error() {
    let ds = Dataset::new();
    ds.command("collect")
        .args(["--min-gait-id", "100", "--max-gait-id", "90"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("subject id range is empty"));
}

// ============================================================================
// Sample Workflow Tests
// ============================================================================

#[test]
fn test_sample_aligns_and_writes_manifest() {
    let ds = Dataset::new();
    ds.touch("videos/090/nm-05/090-nm-05-054.avi");
    ds.touch("videos/090/nm-05/090-aa-99-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", TOUCH_OUTPUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch complete"));

    let output = ds.path("out/090/nm-05/090-nm-05-054.mp4");
    assert!(output.exists());
    assert!(!ds.path("out/090/nm-05/090-aa-99-054.mp4").exists());

    let manifest = ds.load_manifest();
    assert_eq!(manifest.len(), 1);
    let outputs = manifest[&key(&ds.path("png/090/nm-05/090-nm-05-054.png"))]
        .as_sequence()
        .unwrap();
    assert_eq!(outputs, &vec![key(&output)]);
}

#[test]
fn test_failed_job_is_not_recorded() {
    let ds = Dataset::new();
    ds.touch("videos/090-nm-05-054.avi");
    ds.touch("videos/091-nm-05-054.avi");
    ds.touch("videos/092-nm-05-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", FAIL_091)
        .assert()
        .success()
        .stderr(predicate::str::contains("Aligner failed"))
        .stderr(predicate::str::contains("no pose found"));

    let manifest = ds.load_manifest();
    assert_eq!(manifest.len(), 2);
    assert!(!manifest.contains_key(key(&ds.path("png/091-nm-05-054.png"))));
    assert!(ds.path("out/092-nm-05-054.mp4").exists());
}

#[test]
fn test_fail_on_error_exit_code() {
    let ds = Dataset::new();
    ds.touch("videos/090-nm-05-054.avi");
    ds.touch("videos/091-nm-05-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", FAIL_091)
        .arg("--fail-on-error")
        .assert()
        .code(65);

    // The manifest is still written for the jobs that succeeded
    assert_eq!(ds.load_manifest().len(), 1);
}

#[test]
fn test_aligner_stdout_is_logged() {
    let ds = Dataset::new();
    ds.touch("videos/090-nm-05-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", r#"echo "pose tracks written"; touch "$5""#)
        .assert()
        .success()
        .stderr(predicate::str::contains("Aligned"))
        .stderr(predicate::str::contains("pose tracks written"));
}

#[test]
fn test_dry_run_from_environment() {
    let ds = Dataset::new();
    ds.touch("videos/090-nm-05-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", TOUCH_OUTPUT)
        .env("POSEBATCH_DRY_RUN", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run complete"));

    assert!(!ds.manifest().exists());
    assert!(!ds.path("out/090-nm-05-054.mp4").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let ds = Dataset::new();
    ds.touch("videos/s/090-nm-05-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", TOUCH_OUTPUT)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run complete"))
        .stderr(predicate::str::contains("[DRY RUN] Would align"));

    assert!(!ds.manifest().exists());
    assert!(!ds.path("out/s").exists());
}

#[test]
fn test_quiet_suppresses_summary() {
    let ds = Dataset::new();
    ds.touch("videos/090-nm-05-054.avi");
    ds.touch("targets/054/a.mp4");

    ds.dispatching("sample", TOUCH_OUTPUT)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(ds.manifest().exists());
}

// ============================================================================
// Map and Collect Workflow Tests
// ============================================================================

#[test]
fn test_map_uses_named_target() {
    let ds = Dataset::new();
    ds.touch("videos/080-nm-05-054.avi");
    ds.touch("videos/081-nm-05-054.avi");
    ds.touch("targets/054/far.mp4");
    fs::write(
        ds.path("map.json"),
        r#"{"080-nm-05-054": {"max_distance": "far", "distance": 3.5}}"#,
    )
    .unwrap();

    // Record the target each job received next to its output
    ds.dispatching("map", r#"echo "$3" > "$5""#)
        .arg("--video-map-file")
        .arg(ds.path("map.json"))
        .assert()
        .success();

    let written = fs::read_to_string(ds.path("out/080-nm-05-054.mp4")).unwrap();
    assert_eq!(written.trim(), ds.path("targets/054/far.mp4").display().to_string());
    assert!(!ds.path("out/081-nm-05-054.mp4").exists());
    assert_eq!(ds.load_manifest().len(), 1);
}

#[test]
fn test_map_default_range_excludes_high_subjects() {
    let ds = Dataset::new();
    ds.touch("videos/100-nm-05-054.avi");
    ds.touch("targets/054/far.mp4");
    fs::write(
        ds.path("map.json"),
        r#"{"100-nm-05-054": {"max_distance": "far"}}"#,
    )
    .unwrap();

    ds.dispatching("map", TOUCH_OUTPUT)
        .arg("--video-map-file")
        .arg(ds.path("map.json"))
        .assert()
        .success();

    assert!(!ds.path("out/100-nm-05-054.mp4").exists());
    assert!(ds.load_manifest().is_empty());
}

#[test]
fn test_collect_records_existing_outputs() {
    let ds = Dataset::new();
    ds.touch("videos/g/100-bg-01-018.avi");
    ds.touch("videos/g/101-bg-01-018.avi");
    ds.touch("out/g/100-bg-01-018.mp4");

    ds.command("collect")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already present:"));

    let manifest = ds.load_manifest();
    assert_eq!(manifest.len(), 1);
    assert!(manifest.contains_key(key(&ds.path("png/g/100-bg-01-018.png"))));
    // The result directory exists for every accepted item
    assert!(ds.path("out/g").is_dir());
}

#[test]
fn test_collect_honours_env_configuration() {
    let ds = Dataset::new();
    ds.touch("videos/010-nm-05-000.avi");
    ds.touch("out/010-nm-05-000.mp4");

    posebatch()
        .current_dir(ds.temp.path())
        .env("POSEBATCH_VIDEOS_DIR", ds.path("videos"))
        .env("POSEBATCH_PNG_DIR", ds.path("png"))
        .env("POSEBATCH_RESULT_DIR", ds.path("out"))
        .env("POSEBATCH_MIN_GAIT_ID", "1")
        .arg("collect")
        .assert()
        .success();

    // Default manifest location is relative to the working directory
    let manifest = ds.path("myconfig/test.yaml");
    let yaml = fs::read_to_string(manifest).unwrap();
    assert!(yaml.contains("010-nm-05-000.mp4"));
}
