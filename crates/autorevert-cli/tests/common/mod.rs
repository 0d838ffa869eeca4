//! Common utilities for CLI E2E tests.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Invoke the CLI with `HOME` pointed at `home` and return (stdout, stderr, code).
pub fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_autorevert"))
        .args(args)
        .env("HOME", home)
        .env_remove("AUTOREVERT_ENV")
        .env("AUTOREVERT_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Invoke a CLI command and expect success.
pub fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "CLI command {args:?} failed with code {code}: {stderr}");
    stdout
}

/// Invoke a CLI command and expect failure.
pub fn run_cli_failure(home: &Path, args: &[&str]) -> (String, String, i32) {
    let (stdout, stderr, code) = run_cli(home, args);
    assert!(code != 0, "CLI command unexpectedly succeeded: {args:?}");
    (stdout, stderr, code)
}

/// Parse JSON-lines output into values.
pub fn parse_json_lines(output: &str) -> Vec<serde_json::Value> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Failed to parse JSON output"))
        .collect()
}

/// The `type` tag of every event, in order.
pub fn event_types(output: &str) -> Vec<String> {
    parse_json_lines(output)
        .iter()
        .map(|event| event["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Check if string contains substring
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "Expected '{}' to contain '{}'",
        haystack, needle
    );
}

/// Start a long-running CLI command with info logging. Stderr lines are
/// forwarded to the returned channel until the process exits.
pub fn spawn_cli(home: &Path, args: &[&str]) -> (Child, Receiver<String>) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_autorevert"))
        .args(args)
        .env("HOME", home)
        .env_remove("AUTOREVERT_ENV")
        .env("AUTOREVERT_LOG", "info")
        .env("NO_COLOR", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI command");

    let stderr = child.stderr.take().expect("stderr is piped");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            let _ = tx.send(line);
        }
    });
    (child, rx)
}

/// Block until a line containing `needle` arrives, or `timeout` passes.
pub fn wait_for_line(lines: &Receiver<String>, needle: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match lines.recv_timeout(left) {
            Ok(line) if line.contains(needle) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

/// Run git in `dir` and assert it succeeded.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("git runs");
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A repository with one commit and a local identity.
pub fn init_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "--quiet"]);
    git(dir.path(), &["config", "user.name", "Auto Revert"]);
    git(dir.path(), &["config", "user.email", "autorevert@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    std::fs::write(dir.path().join("README"), "base\n").unwrap();
    git(dir.path(), &["add", "README"]);
    git(dir.path(), &["commit", "--quiet", "-m", "base"]);
    dir
}

pub fn commit_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
    git(dir, &["add", name]);
    git(dir, &["commit", "--quiet", "-m", name]);
}
