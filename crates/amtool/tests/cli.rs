//! End-to-end tests for the `amt` binary against a throwaway database.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::{contains, starts_with};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn amt(&self) -> Command {
        let mut command = cargo_bin_cmd!("amt");
        command
            .env("AMT_STORAGE", self.path("store/documents.db"))
            .env_remove("RUST_LOG");
        command
    }

    fn mk(&self) -> String {
        let output = self.amt().arg("mk").output().unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap().trim_end().to_string()
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn version_flag() {
    cargo_bin_cmd!("amt")
        .arg("--version")
        .assert()
        .success()
        .stdout(starts_with("amt "));
}

#[test]
fn mk_prints_document_url() {
    let ws = Workspace::new();
    ws.amt()
        .arg("mk")
        .assert()
        .success()
        .stdout(starts_with("automerge:").and(predicate::str::ends_with("\n")));
    assert!(ws.path("store/documents.db").exists());
}

#[test]
fn rm_of_unknown_document_still_confirms() {
    let ws = Workspace::new();
    let url = ws.mk();
    ws.amt().args(["rm", &url]).assert().success();
    ws.amt()
        .args(["rm", &url])
        .assert()
        .success()
        .stderr(contains(format!("deleted {url}")));
}

#[test]
fn file_to_document_to_file() {
    let ws = Workspace::new();
    let url = ws.mk();
    let src = ws.path("in.json");
    let out = ws.path("out.txt");
    std::fs::write(&src, r#"{"content": "hello", "n": 1}"#).unwrap();

    ws.amt()
        .args(["cp", &arg(&src), &url])
        .assert()
        .success()
        .stderr(contains(format!("wrote {} to {url}", arg(&src))));

    ws.amt()
        .args(["cp", &format!("{url}/content"), &arg(&out)])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "\"hello\"\n");

    ws.amt()
        .args(["cp", &format!("{url}/content"), &arg(&out), "--raw"])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello");
}

#[test]
fn stdin_to_document_root_keeps_other_keys() {
    let ws = Workspace::new();
    let url = ws.mk();

    ws.amt()
        .args(["cp", "-", &format!("{url}/c")])
        .write_stdin("3")
        .assert()
        .success();
    ws.amt()
        .args(["cp", "-", &url])
        .write_stdin(r#"{"a":1,"b":2}"#)
        .assert()
        .success()
        .stderr(contains(format!("wrote stdin to {url}")));

    ws.amt()
        .args(["cp", &url, "-"])
        .assert()
        .success()
        .stdout("{\"a\":1,\"b\":2,\"c\":3}\n")
        .stderr("");
}

#[test]
fn raw_non_text_fails_with_error_line() {
    let ws = Workspace::new();
    let url = ws.mk();

    ws.amt()
        .args(["cp", &url, "-", "--raw"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(contains("error: value must be a string or bytes to copy in raw mode"));
}

#[test]
fn raw_document_to_document_fails() {
    let ws = Workspace::new();
    let a = ws.mk();
    let b = ws.mk();

    ws.amt()
        .args(["cp", &a, &b, "-r"])
        .assert()
        .code(1)
        .stderr(contains(
            "error: raw copy from automerge to automerge doesn't really make sense",
        ));
}

#[test]
fn missing_document_fails() {
    let ws = Workspace::new();
    let url = ws.mk();
    ws.amt().args(["rm", &url]).assert().success();

    ws.amt()
        .args(["cp", &url, "-"])
        .assert()
        .code(1)
        .stderr(contains(format!("error: document {url} not found")));
}

#[test]
fn stdin_watch_copies_each_line() {
    let ws = Workspace::new();
    let out = ws.path("last.json");

    ws.amt()
        .args(["cp", "-", &arg(&out), "--watch"])
        .write_stdin("1\n{\"x\":2}\n")
        .assert()
        .success()
        .stderr(contains("wrote line of stdin to").count(2));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "{\n  \"x\": 2\n}\n");
}

#[test]
fn malformed_json_is_a_crash_not_a_domain_error() {
    let ws = Workspace::new();
    ws.amt()
        .args(["cp", "-", "-"])
        .write_stdin("{oops")
        .assert()
        .failure()
        .stderr(contains("error: value must").not());
}
