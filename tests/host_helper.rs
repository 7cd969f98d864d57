// tests/host_helper.rs

use std::io::Write;

use perfrun::fs::RealFileSystem;
use perfrun::liveness::is_pid_running;
use tempfile::NamedTempFile;

#[test]
fn own_process_is_running() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", std::process::id()).unwrap();

    assert!(is_pid_running(&RealFileSystem, file.path()));
}

#[test]
fn missing_pid_file_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!is_pid_running(&RealFileSystem, &dir.path().join("task.pid")));
}

#[test]
fn garbage_pid_file_is_not_running() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not-a-pid").unwrap();

    assert!(!is_pid_running(&RealFileSystem, file.path()));
}

#[test]
fn unused_pid_is_not_running() {
    let mut file = NamedTempFile::new().unwrap();
    // Above the default pid_max on Linux.
    writeln!(file, "4194304").unwrap();

    assert!(!is_pid_running(&RealFileSystem, file.path()));
}
