//! End-to-end tests driving the psh binary.

use std::fs;
use std::io;
use std::path::PathBuf;

use assert_cli::Assert;
use tempdir::TempDir;

fn generate_temp_directory() -> io::Result<TempDir> {
    // Because of limitation in `assert_cli`, temporary directory must be
    // subdirectory of directory containing Cargo.toml
    let temp_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests");
    TempDir::new_in(temp_root, "temp")
}

#[test]
fn foreground_command_runs_and_succeeds() {
    Assert::cargo_binary("psh")
        .with_args(&["-c", "echo hello"])
        .stdout()
        .is("hello\n")
        .unwrap();
}

#[test]
fn redirection_round_trip() {
    let temp_dir = generate_temp_directory().expect("unable to generate temp dir");
    let script_path = temp_dir.path().join("roundtrip.psh");
    fs::write(&script_path, "echo hello > out.txt\ncat < out.txt\n").unwrap();

    Assert::cargo_binary("psh")
        .current_dir(temp_dir.path())
        .with_args(&[script_path.to_str().unwrap()])
        .stdout()
        .is("hello\n")
        .unwrap();
}

#[test]
fn single_pipe_stage_filters_left_output() {
    let temp_dir = generate_temp_directory().expect("unable to generate temp dir");
    fs::write(temp_dir.path().join("input.txt"), "a\nb\nc\n").unwrap();
    let script_path = temp_dir.path().join("pipe.psh");
    fs::write(&script_path, "cat < input.txt | grep b\n").unwrap();

    Assert::cargo_binary("psh")
        .current_dir(temp_dir.path())
        .with_args(&[script_path.to_str().unwrap()])
        .stdout()
        .is("b\n")
        .unwrap();
}

#[test]
fn missing_command_exits_with_127() {
    Assert::cargo_binary("psh")
        .with_args(&["-c", "definitely-not-a-command"])
        .fails_with(127)
        .stderr()
        .contains("command not found")
        .unwrap();
}

#[test]
fn exit_builtin_sets_exit_status() {
    Assert::cargo_binary("psh")
        .with_args(&["-c", "exit 3"])
        .fails_with(3)
        .unwrap();
}

#[test]
fn last_command_status_is_the_shell_status() {
    let temp_dir = generate_temp_directory().expect("unable to generate temp dir");
    let script_path = temp_dir.path().join("status.psh");
    fs::write(&script_path, "false\n").unwrap();

    Assert::cargo_binary("psh")
        .with_args(&[script_path.to_str().unwrap()])
        .fails_with(1)
        .unwrap();
}

#[test]
fn ampersand_still_completes_without_job_control() {
    // noninteractive shells wait on `&` commands instead of backgrounding
    Assert::cargo_binary("psh")
        .with_args(&["-c", "echo hi &"])
        .stdout()
        .is("hi\n")
        .unwrap();
}

#[test]
fn overlong_line_is_rejected() {
    let long_line = format!("echo {}", "x".repeat(2048));
    Assert::cargo_binary("psh")
        .with_args(&["-c", &long_line])
        .fails_with(2)
        .stderr()
        .contains("too long")
        .unwrap();
}

#[test]
fn malformed_pipe_is_rejected() {
    Assert::cargo_binary("psh")
        .with_args(&["-c", "echo a | | wc"])
        .fails_with(2)
        .stderr()
        .contains("malformed command")
        .unwrap();
}
