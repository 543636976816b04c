mod common;

use satoshi_rag::models::{Category, ScrapedItem};
use satoshi_rag::store;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn satoshi_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("satoshi");
    path
}

/// Temp workspace with a config whose scraper points at `base_url`.
fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    std::fs::create_dir_all(root.join("config")).unwrap();
    let config_path = root.join("config/satoshi.toml");
    std::fs::write(&config_path, common::config_toml(root, base_url)).unwrap();

    (tmp, config_path)
}

fn seed_items(root: &Path) {
    let dir = root.join("items");
    let items = [
        ScrapedItem {
            id: "emails--cryptography--1".to_string(),
            source_url: "https://satoshi.nakamotoinstitute.org/emails/cryptography/1/".to_string(),
            title: "Bitcoin P2P e-cash paper".to_string(),
            date: Some("2008-10-31".to_string()),
            source: None,
            category: Category::Email,
            body_text: "x".repeat(450),
        },
        ScrapedItem {
            id: "quotes--bitcoin-design".to_string(),
            source_url: "https://satoshi.nakamotoinstitute.org/quotes/bitcoin-design/".to_string(),
            title: "Bitcoin Design".to_string(),
            date: None,
            source: None,
            category: Category::Quote,
            body_text: common::QUOTE_BODY.to_string(),
        },
    ];
    for item in &items {
        store::write_item(&dir, item).unwrap();
    }
}

fn run_satoshi(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(satoshi_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run satoshi binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(satoshi_binary())
        .arg("--help")
        .output()
        .expect("failed to run satoshi binary");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["scrape", "ingest", "ask", "chat", "serve", "search", "get", "stats", "export"] {
        assert!(stdout.contains(command), "missing {} in help: {}", command, stdout);
    }
}

#[test]
fn test_scrape_against_fixture_site() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let base = rt.block_on(common::serve(common::fixture_site()));
    let (tmp, config_path) = setup_test_env(&base);

    let (stdout, stderr, success) = run_satoshi(&config_path, &["scrape"]);
    assert!(success, "scrape failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("fetched: 4 items"), "stdout={}", stdout);
    assert!(stdout.contains("skipped: 1"), "stdout={}", stdout);
    assert!(stdout.contains("/emails/cryptography/3/"), "stdout={}", stdout);
    assert!(stdout.contains("ok"));

    let root = tmp.path();
    assert!(root.join("items/emails/emails--cryptography--1.json").exists());
    assert!(root.join("items/quotes/quotes--bitcoin-design.json").exists());
    assert!(!root.join("items/emails/emails--cryptography--3.json").exists());
}

#[test]
fn test_ingest_raw_only() {
    let (tmp, config_path) = setup_test_env("https://satoshi.nakamotoinstitute.org");
    seed_items(tmp.path());

    let (stdout, stderr, success) = run_satoshi(&config_path, &["ingest", "--raw-only"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("items: 2"), "stdout={}", stdout);
    assert!(stdout.contains("written: 2 files"), "stdout={}", stdout);

    let raw = std::fs::read_to_string(tmp.path().join("data/raw/quotes--bitcoin-design.txt")).unwrap();
    assert_eq!(raw, common::QUOTE_BODY);
    assert!(!tmp.path().join("data/satoshi.index").exists());
}

#[test]
fn test_ingest_dry_run_counts_chunks() {
    let (tmp, config_path) = setup_test_env("https://satoshi.nakamotoinstitute.org");
    seed_items(tmp.path());

    let (stdout, stderr, success) =
        run_satoshi(&config_path, &["ingest", "--dry-run", "--progress", "off"]);
    assert!(success, "dry-run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("items: 2"), "stdout={}", stdout);
    assert!(stdout.contains("chunks: 4"), "stdout={}", stdout);
    assert!(stdout.contains("email: 1 items, 3 chunks"), "stdout={}", stdout);
    assert!(!tmp.path().join("data/satoshi.index").exists());
}

#[test]
fn test_ingest_requires_embedding_provider() {
    let (tmp, config_path) = setup_test_env("https://satoshi.nakamotoinstitute.org");
    seed_items(tmp.path());

    let (_, stderr, success) = run_satoshi(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"), "stderr={}", stderr);
}

#[test]
fn test_ingest_without_items_fails() {
    let (_tmp, config_path) = setup_test_env("https://satoshi.nakamotoinstitute.org");

    let (_, stderr, success) = run_satoshi(&config_path, &["ingest", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("no scraped items found"), "stderr={}", stderr);
}

#[test]
fn test_commands_without_index_report_missing_index() {
    let (_tmp, config_path) = setup_test_env("https://satoshi.nakamotoinstitute.org");

    for args in [&["ask", "What is Bitcoin?"][..], &["stats"][..], &["export"][..]] {
        let (stdout, stderr, success) = run_satoshi(&config_path, args);
        assert!(!success, "{:?} should fail: stdout={}", args, stdout);
        assert!(
            stderr.contains("index not found"),
            "{:?}: stderr={}",
            args,
            stderr
        );
    }
}

#[test]
fn test_get_item() {
    let (tmp, config_path) = setup_test_env("https://satoshi.nakamotoinstitute.org");
    seed_items(tmp.path());

    let (stdout, stderr, success) = run_satoshi(&config_path, &["get", "quotes--bitcoin-design"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Bitcoin Design"));
    assert!(stdout.contains("category:   quote"));
    assert!(stdout.contains("set in stone"));
    assert!(stdout.contains("--- Chunks (1) ---"));

    let (_, stderr, success) = run_satoshi(&config_path, &["get", "nope"]);
    assert!(!success);
    assert!(stderr.contains("item not found: nope"), "stderr={}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    std::fs::write(
        &config_path,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .unwrap();

    let (_, stderr, success) = run_satoshi(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr={}", stderr);
}
