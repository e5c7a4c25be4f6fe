//! End-to-end checks of exit codes and artifact handling.
//! None of these reach a real server.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

const SESSION_FILE: &str = "session.json";

fn semfca(dir: &Path, home: &TempDir, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_semfca"));
    cmd.args(args)
        .current_dir(dir)
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("NO_COLOR", "1")
        .env_remove("FB_EMAIL")
        .env_remove("FB_PASSWORD")
        .env_remove("SEMFCA_CREDENTIALS")
        .env_remove("SEMFCA_SESSION_PASSPHRASE")
        .env_remove("SEMFCA_LOG_DIR")
        .env_remove("RUST_LOG");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to run semfca")
}

#[test]
fn test_unconfigured_credentials_exit_1_without_artifact() {
    let work = tempdir().unwrap();
    let home = tempdir().unwrap();

    let output = semfca(work.path(), &home, &[], &[("SEMFCA_API_URL", "http://127.0.0.1:9")]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[error] Error"));
    assert!(stderr.contains("FB_EMAIL"));
    assert!(!work.path().join(SESSION_FILE).exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[setup] First Login"));
}

#[test]
fn test_failure_is_written_to_log_file() {
    let work = tempdir().unwrap();
    let home = tempdir().unwrap();
    let logs = tempdir().unwrap();
    let log_dir = logs.path().to_str().unwrap();

    let output = semfca(
        work.path(),
        &home,
        &[],
        &[("SEMFCA_API_URL", "http://127.0.0.1:9"), ("SEMFCA_LOG_DIR", log_dir)],
    );
    assert_eq!(output.status.code(), Some(1));

    let mut log = String::new();
    for entry in fs::read_dir(logs.path()).unwrap() {
        log.push_str(&fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    let line = log
        .lines()
        .find(|l| l.contains("ERROR"))
        .expect("no error event in the log file");
    assert!(line.contains("semfca::status"));
    assert!(line.contains("FB_EMAIL"));

    // The terminal shows the box, not a second copy as a log line
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[error] Error"));
    assert!(!stderr.contains("semfca::status"));
}

#[test]
fn test_unreachable_server_leaves_artifact_untouched() {
    let work = tempdir().unwrap();
    let home = tempdir().unwrap();
    let artifact = work.path().join(SESSION_FILE);
    let contents = r#"{
  "format": "plain",
  "session": {
    "user_id": "100004",
    "cookies": { "c_user": "100004" },
    "created_at": "2026-01-01T00:00:00Z"
  }
}"#;
    fs::write(&artifact, contents).unwrap();

    let output = semfca(
        work.path(),
        &home,
        &[],
        &[
            ("SEMFCA_API_URL", "http://127.0.0.1:9"),
            ("SEMFCA_TIMEOUT_SECS", "2"),
            ("FB_EMAIL", "me@example.org"),
            ("FB_PASSWORD", "pw"),
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[loaded] Session Found"));
    assert!(!stdout.contains("First Login"));
    assert_eq!(fs::read_to_string(&artifact).unwrap(), contents);
}

#[test]
fn test_status_and_logout() {
    let work = tempdir().unwrap();
    let home = tempdir().unwrap();
    let artifact = work.path().join(SESSION_FILE);
    fs::write(
        &artifact,
        r#"{"format":"plain","session":{"user_id":"100004","created_at":"2026-01-01T00:00:00Z"}}"#,
    )
    .unwrap();

    let output = semfca(work.path(), &home, &["--status"], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("User 100004"));

    let output = semfca(work.path(), &home, &["--logout"], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(!artifact.exists());
}

#[test]
fn test_unknown_argument_exit_1() {
    let work = tempdir().unwrap();
    let home = tempdir().unwrap();

    let output = semfca(work.path(), &home, &["--frobnicate"], &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown argument"));
}
