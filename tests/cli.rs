mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::{fixture, read_archive};

fn zipup(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zipup"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn no_arguments_prints_help_and_fails() {
    let dir = fixture();
    let output = zipup(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--archive"));
}

#[test]
fn help_succeeds() {
    let dir = fixture();
    let output = zipup(dir.path(), &["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("--src"));
}

#[test]
fn examples_succeed() {
    let dir = fixture();
    let output = zipup(dir.path(), &["--examples"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("Examples:"));
}

#[test]
fn validation_errors_point_at_help() {
    let dir = fixture();
    let output = zipup(dir.path(), &["--archive", "out.zip", "--level", "x", "--src", "dist"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains(r#"The value for the "--level" argument must be a number between 0 and 9 inclusive"#));
    assert!(err.contains(r#"Run "zipup --help" for usage"#));
    assert!(!dir.path().join("out.zip").exists());

    let output = zipup(dir.path(), &["--src", "dist"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains(r#"The "--archive" argument must be provided"#));
}

#[test]
fn builds_the_documented_example() {
    let dir = fixture();
    let output = zipup(dir.path(), &["--archive", "out.zip", "--src", "dist"]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));

    let archive = read_archive(&dir.path().join("out.zip"));
    assert_eq!(archive.names(), ["dist/a.txt", "dist/sub/b.txt", "dist/sub/c.js"]);

    let output = zipup(dir.path(), &["-a", "out.zip", "-r", "dist", "-s", "dist"]);
    assert_eq!(output.status.code(), Some(0));
    let archive = read_archive(&dir.path().join("out.zip"));
    assert_eq!(archive.names(), ["a.txt", "sub/b.txt", "sub/c.js"]);
}

#[cfg(unix)]
#[test]
fn runtime_errors_fail_without_help_hint() {
    let dir = fixture();
    let looped = dir.path().join("dist/broken");
    std::os::unix::fs::symlink(&looped, &looped).unwrap();

    let output = zipup(dir.path(), &["-a", "out.zip", "-s", "dist"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("broken"));
    assert!(!err.contains("--help"));
    assert!(!dir.path().join("out.zip").exists());
}
