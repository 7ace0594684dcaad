use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn atlas_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("atlas");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/atlas.sqlite"

[server]
bind = "127.0.0.1:7341"

[directory]
default_tags = ["Rentals", "Condos", "Relocation"]

[enrichment]
timeout_secs = 2
"#,
        root.display()
    );

    let config_path = config_dir.join("atlas.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_atlas(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = atlas_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run atlas binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_atlas(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/atlas.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_atlas(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_atlas(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_tags_prints_seeded_vocabulary() {
    let (_tmp, config_path) = setup_test_env();

    run_atlas(&config_path, &["init"]);
    let (stdout, stderr, success) = run_atlas(&config_path, &["tags"]);
    assert!(success, "tags failed: stdout={}, stderr={}", stdout, stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["Rentals", "Condos", "Relocation"]);
}

#[test]
fn test_enrich_on_empty_directory() {
    let (_tmp, config_path) = setup_test_env();

    run_atlas(&config_path, &["init"]);
    let (stdout, stderr, success) = run_atlas(&config_path, &["enrich"]);
    assert!(success, "enrich failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("nothing to do"));
}

#[test]
fn test_single_lookup_without_website_reports_not_found() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_atlas(&config_path, &["probe", "Jane Smith", "--locality", "Brooklyn"]);
    assert!(success, "lookup failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Start -> TrySearch -> NotFound"), "got: {}", stdout);
    assert!(stdout.contains("image: not found"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_atlas(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "got: {}", stderr);
}
