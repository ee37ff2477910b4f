use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "cyberwise-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_cyberwise-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(&output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("migration"));
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_runs_all_scenarios_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_cyberwise-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--scenarios",
            "all",
            "--iterations",
            "1",
            "--seeds",
            "1,0x2a",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cyberwise Automated Tester"));

    let report = std::fs::read_to_string(&output_path).expect("read report");
    let results: serde_json::Value = serde_json::from_str(&report).expect("json report");
    let results = results.as_array().expect("array of results");
    assert_eq!(results.len(), 16);
    assert!(results.iter().all(|r| r["passed"] == true));
    let _ = std::fs::remove_file(output_path);
}

#[test]
fn cli_keeps_file_saves_under_save_dir() {
    let exe = env!("CARGO_BIN_EXE_cyberwise-tester");
    let save_dir = temp_path("saves");
    let output = Command::new(exe)
        .args(["--scenarios", "career", "--iterations", "1", "--seeds", "5"])
        .arg("--save-dir")
        .arg(&save_dir)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    assert!(save_dir.join("career").join("seed-5.json").exists());
    let _ = std::fs::remove_dir_all(save_dir);
}

#[test]
fn cli_rejects_bad_seed() {
    let exe = env!("CARGO_BIN_EXE_cyberwise-tester");
    let output = Command::new(exe)
        .args(["--seeds", "not-a-seed"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unrecognized seed token"));
}
