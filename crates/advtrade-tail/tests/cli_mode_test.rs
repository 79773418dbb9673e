use std::process::Command;

fn example_config() -> String {
    format!("{}/config/tail.example.yaml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn cli_mode_with_config_and_dry_run_works() {
    let binary_path = env!("CARGO_BIN_EXE_advtrade-tail");

    let output = Command::new(binary_path)
        .arg("--config")
        .arg(example_config())
        .arg("--dry-run")
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start advtrade-tail binary");

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_mode_rejects_missing_config() {
    let binary_path = env!("CARGO_BIN_EXE_advtrade-tail");

    let output = Command::new(binary_path)
        .arg("--config")
        .arg(format!("{}/config/missing.yaml", env!("CARGO_MANIFEST_DIR")))
        .arg("--dry-run")
        .output()
        .expect("Failed to start advtrade-tail binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("load config"), "stderr: {stderr}");
}

#[test]
fn cli_mode_writes_log_file() {
    let binary_path = env!("CARGO_BIN_EXE_advtrade-tail");
    let log_path = std::env::temp_dir().join(format!("advtrade-tail-{}.log", std::process::id()));
    let _ = std::fs::remove_file(&log_path);

    let output = Command::new(binary_path)
        .arg("--config")
        .arg(example_config())
        .arg("--dry-run")
        .arg("--log-file")
        .arg(&log_path)
        .output()
        .expect("Failed to start advtrade-tail binary");

    assert!(output.status.success());
    let logs = std::fs::read_to_string(&log_path).expect("log file written");
    assert!(logs.contains("configuration validated"), "logs: {logs}");
    let _ = std::fs::remove_file(&log_path);
}
