use std::process::{Command, Output, Stdio};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crowd_density"))
        .args(args)
        .env("CROWD_CONFIG", "/nonexistent/crowd.toml")
        .env("CROWD_CONFIDENCE", "abc")
        .env_remove("CROWD_MODEL")
        .stdin(Stdio::null())
        .output()
        .expect("run crowd_density")
}

#[test]
fn invalid_mode_exits_cleanly_before_loading_config() {
    let output = run_cli(&["9"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("invalid mode '9'"), "stderr: {stderr}");
    assert!(!stderr.contains("configuration"), "stderr: {stderr}");
}

#[test]
fn missing_path_exits_cleanly_before_loading_config() {
    let output = run_cli(&["video"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("video mode requires a file path"), "stderr: {stderr}");
}

#[test]
fn broken_config_fails_a_valid_selection() {
    let output = run_cli(&["webcam"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("invalid configuration"), "stderr: {stderr}");
}
