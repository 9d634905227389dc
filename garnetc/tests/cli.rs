//! Integration tests for the `garnetc` binary.
//!
//! Programs are serialized to JSON in a temporary directory and the binary
//! is run on them the way a driver would.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use garnetc::ast::{ClassDef, Def, Expr, Program};
use tempfile::TempDir;

fn write_program(dir: &Path, exprs: Vec<Expr>) -> PathBuf {
    let path = dir.join("program.json");
    let json = serde_json::to_string_pretty(&Program::new(exprs)).expect("serialize program");
    fs::write(&path, json).expect("write program");
    path
}

fn garnetc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_garnetc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run garnetc")
}

fn foo_with_coco() -> Expr {
    Expr::class(ClassDef::new(
        "Foo",
        None,
        vec![Expr::def(Def::new("coco", vec![], Some(Expr::int(1))))],
    ))
}

#[test]
fn check_prints_variable_types() {
    let dir = TempDir::new().unwrap();
    let file = write_program(
        dir.path(),
        vec![
            foo_with_coco(),
            Expr::assign("f", Expr::call(Expr::path("Foo"), "new", vec![])),
            Expr::assign("x", Expr::call(Expr::var("f"), "coco", vec![])),
        ],
    );

    let output = garnetc(&["check", file.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("f : Foo"), "stdout was:\n{}", stdout);
    assert!(stdout.contains("x : Int32"), "stdout was:\n{}", stdout);
}

#[test]
fn calls_lists_targets() {
    let dir = TempDir::new().unwrap();
    let file = write_program(
        dir.path(),
        vec![
            foo_with_coco(),
            Expr::call(Expr::call(Expr::path("Foo"), "new", vec![]), "coco", vec![]),
        ],
    );

    let output = garnetc(&["calls", file.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-> Foo#coco()"), "stdout was:\n{}", stdout);
}

#[test]
fn errors_exit_nonzero() {
    let dir = TempDir::new().unwrap();
    let file = write_program(
        dir.path(),
        vec![
            foo_with_coco(),
            Expr::call(Expr::call(Expr::path("Foo"), "new", vec![]), "cocoa", vec![]),
        ],
    );

    let output = garnetc(&["check", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("undefined method 'cocoa' for Foo"), "stderr was:\n{}", stderr);
    assert!(stderr.contains("did you mean 'coco'?"), "stderr was:\n{}", stderr);
}

#[test]
fn config_file_disables_suggestions() {
    let dir = TempDir::new().unwrap();
    let file = write_program(
        dir.path(),
        vec![
            foo_with_coco(),
            Expr::call(Expr::call(Expr::path("Foo"), "new", vec![]), "cocoa", vec![]),
        ],
    );
    let config = dir.path().join("garnet.toml");
    fs::write(&config, "[inference]\nsuggestions = false\n").unwrap();

    let output = garnetc(&["check", "--config", config.to_str().unwrap(), file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("did you mean"), "stderr was:\n{}", stderr);
}

#[test]
fn malformed_program_is_reported() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.json");
    fs::write(&file, "{ not json").unwrap();

    let output = garnetc(&["check", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error parsing program"), "stderr was:\n{}", stderr);
}
