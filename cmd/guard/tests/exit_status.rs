//! Runs the `guard` binary and checks the real exit path.

use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_guard"))
        .args(args)
        .env("GEX_BACKTRACE", "0")
        .env("GEX_LOG_LEVEL", "info")
        .env("GUARD_JOURNAL", "/tmp/guard-test-journal")
        .output()
        .expect("failed to spawn guard")
}

#[test]
fn escaping_exception_exits_66() {
    let out = run(&[]);
    assert_eq!(out.status.code(), Some(66));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("[FATAL] Will exit with code 66 due to: ShutdownException: flush on shutdown failed"),
        "stderr was:\n{}",
        stderr
    );
    assert!(stderr.contains(
        "--> Caused by: StorageException: disk full writing /tmp/guard-test-journal"
    ));
}

#[test]
fn handled_exception_exits_0() {
    let out = run(&["--handled"]);
    assert_eq!(out.status.code(), Some(0));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(!stderr.contains("[FATAL]"), "stderr was:\n{}", stderr);
    assert!(stderr.contains("handled ShutdownException"));
}
