use assert_cmd::prelude::*;
use async_storage::thread_pool::SharedQueueThreadPool;
use async_storage::KvStore;
use predicates::ord::eq;
use predicates::str::{contains, is_empty, PredicateStrExt};
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn kvs(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kvs").unwrap();
    cmd.current_dir(temp_dir).args(&["--path", "store"]);
    cmd
}

// `kvs` with no args should exit with a non-zero code.
#[test]
fn cli_no_args() {
    Command::cargo_bin("kvs").unwrap().assert().failure();
}

// `kvs -V` should print the version
#[test]
fn cli_version() {
    Command::cargo_bin("kvs")
        .unwrap()
        .args(&["-V"])
        .assert()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_get_non_existent_key() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["get", "key1"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());
}

#[test]
fn cli_set_then_get_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["set", "key1", "value1", "key2", "value2"])
        .assert()
        .success()
        .stdout(is_empty());

    kvs(&temp_dir)
        .args(&["get", "key1", "missing", "key2"])
        .assert()
        .success()
        .stdout(eq("value1\nKey not found\nvalue2").trim());
}

#[test]
fn cli_set_needs_pairs() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["set", "key1", "value1", "key2"])
        .assert()
        .failure()
        .stderr(contains("key2 has no value"));

    // nothing from the rejected batch was written
    kvs(&temp_dir)
        .args(&["keys"])
        .assert()
        .success()
        .stdout(is_empty());
}

#[test]
fn cli_rm_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["set", "a", "1", "b", "2", "c", "3"])
        .assert()
        .success();

    kvs(&temp_dir)
        .args(&["rm", "a", "missing"])
        .assert()
        .success()
        .stdout(is_empty());
    kvs(&temp_dir)
        .args(&["keys"])
        .assert()
        .success()
        .stdout(eq("b\nc").trim());

    kvs(&temp_dir).args(&["clear"]).assert().success();
    kvs(&temp_dir)
        .args(&["keys"])
        .assert()
        .success()
        .stdout(is_empty());
}

#[test]
fn cli_key_queries() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["set", "a", "", "ab", "", "b", "", "c", "", "d", "", "e", ""])
        .assert()
        .success();

    kvs(&temp_dir)
        .args(&["keys", "--prefix", "a"])
        .assert()
        .success()
        .stdout(eq("a\nab").trim());

    kvs(&temp_dir)
        .args(&["keys", "--from", "b", "--to", "d"])
        .assert()
        .success()
        .stdout(eq("b\nc").trim());

    kvs(&temp_dir)
        .args(&["keys", "--from", "b", "--to", "d"])
        .args(&["--exclusive-lower", "--inclusive-upper"])
        .assert()
        .success()
        .stdout(eq("c\nd").trim());

    kvs(&temp_dir)
        .args(&["keys", "--from", "d", "--to", "b"])
        .assert()
        .success()
        .stdout(is_empty());

    kvs(&temp_dir)
        .args(&["keys", "--from", "b"])
        .assert()
        .failure();
}

#[test]
fn cli_empty_key_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["set", "", "value"])
        .assert()
        .failure()
        .stderr(contains("Invalid key"));
}

#[test]
fn cli_call_bridge_requests() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["call", r#"{"method":"multiSet","args":[["k1","v1"]]}"#])
        .assert()
        .success()
        .stdout(eq(r#"{"status":"success","result":null}"#).trim());

    kvs(&temp_dir)
        .args(&["call", r#"{"method":"multiGet","args":["k1","k2"]}"#])
        .assert()
        .success()
        .stdout(eq(r#"{"status":"success","result":[["k1","v1"],["k2",null]]}"#).trim());

    kvs(&temp_dir)
        .args(&["call", r#"{"method":"multiGet","args":"k1"}"#])
        .assert()
        .failure()
        .stdout(contains(r#""code":"invalid_argument""#));

    kvs(&temp_dir)
        .args(&["call", r#"{"method":"mergeItem","args":[]}"#])
        .assert()
        .failure()
        .stdout(contains(r#""status":"failure""#))
        .stdout(contains(r#""code":"invalid_request""#));
}

#[test]
fn cli_store_held_by_another_process() {
    let temp_dir = TempDir::new().unwrap();
    let store = KvStore::<SharedQueueThreadPool>::open(temp_dir.path().join("store"), 1).unwrap();

    kvs(&temp_dir)
        .args(&["get", "k"])
        .assert()
        .failure()
        .stderr(contains("Store is locked"));

    drop(store);
    kvs(&temp_dir)
        .args(&["get", "k"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());
}

#[test]
fn cli_config_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("config.json"),
        r#"{ "path": "from-config", "pool": "rayon", "threads": 2 }"#,
    )
    .unwrap();

    Command::cargo_bin("kvs")
        .unwrap()
        .current_dir(&temp_dir)
        .args(&["--config", "config.json", "set", "k", "v"])
        .assert()
        .success();
    assert!(temp_dir.path().join("from-config").is_dir());

    // flags override the file
    Command::cargo_bin("kvs")
        .unwrap()
        .current_dir(&temp_dir)
        .args(&["--config", "config.json", "--pool", "naive", "get", "k"])
        .assert()
        .success()
        .stdout(eq("v").trim());

    Command::cargo_bin("kvs")
        .unwrap()
        .current_dir(&temp_dir)
        .args(&["--config", "config.json", "--threads", "0", "keys"])
        .assert()
        .failure()
        .stderr(contains("threads must be at least 1"));
}

#[test]
fn cli_bad_config_file() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("config.json"), r#"{ "engine": "kvs" }"#).unwrap();

    Command::cargo_bin("kvs")
        .unwrap()
        .current_dir(&temp_dir)
        .args(&["--config", "config.json", "keys"])
        .assert()
        .failure()
        .stderr(contains("Invalid configuration"));
}

#[test]
fn cli_memory_backend_is_volatile() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["--backend", "memory", "set", "k", "v"])
        .assert()
        .success();
    kvs(&temp_dir)
        .args(&["--backend", "memory", "get", "k"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());
}

#[test]
fn cli_invalid_flags() {
    let temp_dir = TempDir::new().unwrap();
    kvs(&temp_dir)
        .args(&["--backend", "rocks", "keys"])
        .assert()
        .failure();
    kvs(&temp_dir)
        .args(&["--pool", "fifo", "keys"])
        .assert()
        .failure();
}
