//! End-to-end runs of the `toxscan` binary against a JSON-lines store

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::process::Command;

fn write_collection(path: &Path, documents: &[Value]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let lines: Vec<String> = documents.iter().map(Value::to_string).collect();
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn read_collection(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn write_config(dir: &Path, store_root: &Path) -> std::path::PathBuf {
    let config = format!(
        r#"
store:
  kind: jsonl
  path: {}
classifier:
  backend: lexicon
jobs:
  flat:
    - database: redditDB
      collection: comments
  threads:
    - database: fourchanDB
      collection: threads
"#,
        store_root.display()
    );
    let path = dir.join("toxscan.yaml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_once_scores_flat_and_thread_collections() {
    let dir = tempfile::tempdir().unwrap();
    let store_root = dir.path().join("data");

    let comments = store_root.join("redditDB").join("comments.jsonl");
    write_collection(
        &comments,
        &[
            json!({ "_id": 1, "text": "great post", "created_utc": 1_600_000_000 }),
            json!({ "_id": 2, "text": "" }),
            json!({ "_id": 3, "text": "you idiot, you moron" }),
        ],
    );

    let threads = store_root.join("fourchanDB").join("threads.jsonl");
    write_collection(
        &threads,
        &[json!({ "_id": 10, "posts": [{ "no": 1, "com": "hello" }, { "no": 2, "com": "" }] })],
    );

    let config = write_config(dir.path(), &store_root);
    let output = Command::new(env!("CARGO_BIN_EXE_toxscan"))
        .arg("--config")
        .arg(&config)
        .arg("--once")
        .env_remove("TOXSCAN_API_KEY")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "toxscan failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let comments = read_collection(&comments);
    assert_eq!(comments[0]["toxicity"]["class"], json!("normal"));
    assert_eq!(comments[0]["toxicity_status"], json!("scored"));
    assert!(comments[1].get("toxicity").is_none());
    assert_eq!(comments[1]["toxicity_status"], json!("skipped_empty"));
    assert_eq!(comments[2]["toxicity"]["class"], json!("flag"));

    let threads = read_collection(&threads);
    assert_eq!(threads[0]["toxicity_processed"], json!(true));
    assert_eq!(threads[0]["toxicity_summary"]["scored_reply_count"], json!(1));
    assert_eq!(threads[0]["toxicity_summary"]["total_reply_count"], json!(2));
    assert!(threads[0]["posts"][0].get("toxicity").is_some());
}

#[test]
fn test_remote_backend_without_key_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("toxscan.yaml");
    fs::write(&config, "scheduler:\n  max_workers: 1\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_toxscan"))
        .arg("--config")
        .arg(&config)
        .arg("--once")
        .env_remove("TOXSCAN_API_KEY")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("api_key"));
}
