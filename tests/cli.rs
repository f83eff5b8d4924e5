//! Binary-level CLI tests.

#![allow(clippy::panic)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PASSAGES: &str = concat!(
    r#"{"content":"Change the engine oil every 500 operating hours.","source":"m.pdf","page":12,"chunk_index":1}"#,
    "\n",
    r#"{"content":"Torque the cylinder head bolts to 45 Nm.","source":"m.pdf","page":30,"chunk_index":4}"#,
    "\n",
    r#"{"content":"Fill the hydraulic tank with ISO VG 46.","source":"h.pdf","page":2}"#,
    "\n",
);

fn hoprag() -> Command {
    let mut cmd = Command::cargo_bin("hoprag").unwrap_or_else(|e| panic!("binary: {e}"));
    cmd.env_remove("HOPRAG_DB_PATH")
        .env_remove("HOPRAG_PROMPT_DIR")
        .env_remove("HOPRAG_LOG");
    cmd
}

fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let db = dir.path().join("index.db");
    (dir, db)
}

fn import(dir: &Path, db: &Path) {
    let file = dir.join("passages.jsonl");
    std::fs::write(&file, PASSAGES).unwrap_or_else(|e| panic!("write: {e}"));
    hoprag()
        .arg("--db-path")
        .arg(db)
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 3 passages"));
}

#[test]
fn help_lists_commands() {
    hoprag()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ask")
                .and(predicate::str::contains("search"))
                .and(predicate::str::contains("import"))
                .and(predicate::str::contains("init-prompts")),
        );
}

#[test]
fn import_stats_and_search() {
    let (dir, db) = workspace();
    import(dir.path(), &db);

    hoprag()
        .arg("--db-path")
        .arg(&db)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Passages: 3").and(predicate::str::contains("Sources: 2")));

    hoprag()
        .arg("--db-path")
        .arg(&db)
        .args(["search", "oil change hours"])
        .assert()
        .success()
        .stdout(predicate::str::contains("m.pdf").and(predicate::str::contains("engine oil")));
}

#[test]
fn import_reads_stdin() {
    let (_dir, db) = workspace();
    hoprag()
        .arg("--db-path")
        .arg(&db)
        .args(["import", "-"])
        .write_stdin(PASSAGES)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 3 passages"));
}

#[test]
fn json_output_is_machine_readable() {
    let (dir, db) = workspace();
    import(dir.path(), &db);

    let output = hoprag()
        .args(["--format", "json", "--db-path"])
        .arg(&db)
        .args(["search", "hydraulic tank", "-k", "1"])
        .output()
        .unwrap_or_else(|e| panic!("run: {e}"));
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| panic!("json: {e}"));
    assert_eq!(value["count"], 1);
    assert_eq!(value["results"][0]["source"], "h.pdf");
}

#[test]
fn unmatched_search_reports_no_results() {
    let (dir, db) = workspace();
    import(dir.path(), &db);
    hoprag()
        .arg("--db-path")
        .arg(&db)
        .args(["search", "?!"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No results found"));
}

#[test]
fn missing_index_fails() {
    let (_dir, db) = workspace();
    hoprag()
        .arg("--db-path")
        .arg(&db)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("hoprag import"));
}

#[test]
fn ask_without_api_key_fails() {
    let (dir, db) = workspace();
    import(dir.path(), &db);
    hoprag()
        .env_remove("OPENAI_API_KEY")
        .env_remove("HOPRAG_API_KEY")
        .arg("--db-path")
        .arg(&db)
        .args(["ask", "What is the oil change interval?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key missing"));
}

#[test]
fn init_prompts_writes_templates() {
    let (dir, _db) = workspace();
    let prompts = dir.path().join("prompts");
    hoprag()
        .args(["init-prompts", "--dir"])
        .arg(&prompts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 prompt template(s)"));
    for name in ["agent.md", "answer.md", "expansion.md"] {
        assert!(prompts.join(name).is_file(), "{name} missing");
    }

    hoprag()
        .args(["init-prompts", "--dir"])
        .arg(&prompts)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}
