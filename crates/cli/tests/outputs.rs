use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!("lights-tests-{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn write_script(dir: &PathBuf, contents: &str) -> PathBuf {
    let path = dir.join("script.yaml");
    std::fs::write(&path, contents).expect("Failed to write script");
    path
}

fn run_test(script: &PathBuf, extra: &[&str]) -> std::process::Output {
    let mut args = vec![
        "test",
        "--script",
        script.to_str().unwrap(),
        "--no-console-stdout",
    ];
    args.extend_from_slice(extra);
    Command::new(env!("CARGO_BIN_EXE_lights"))
        .args(&args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_cli_test_mode_outputs() {
    let dir = temp_dir("outputs");
    let script = write_script(
        &dir,
        r#"
schema_version: "1.0"
limits:
  max_iterations: 4
stimulus:
  - switches: 0x00
  - switches: 0xFF
  - switches: 0x2A
  - switches: 0x01
assertions:
  - console_contains: "Starting lights program"
  - final_leds: 0x01
  - mirror_holds: true
  - expected_stop_reason: max_iterations
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_test(&script, &["--output-dir", output_dir.to_str().unwrap()]);
    assert!(output.status.success());

    let result_path = output_dir.join("result.json");
    assert!(result_path.exists());
    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&result_path).unwrap()).unwrap();

    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "max_iterations");
    assert_eq!(result["iterations"], 4);
    assert_eq!(result["mirror_holds"], true);
    assert_eq!(result["final_leds"], 1);
    assert_eq!(result["console"], "Starting lights program...\n");
    assert_eq!(result["config"]["board"], "de10-lite");
    assert_eq!(result["assertions"].as_array().unwrap().len(), 4);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_board_relative_to_script() {
    let dir = temp_dir("board");
    std::fs::write(
        dir.join("board.yaml"),
        r#"
name: "wide-switches"
switches: "sw"
leds: "led"
peripherals:
  - id: "sw"
    type: "pio"
    base_address: 0x1000
    config:
      width: 10
      direction: "input"
  - id: "led"
    type: "pio"
    base_address: 0x2000
    config:
      width: 8
      direction: "output"
"#,
    )
    .unwrap();
    let script = write_script(
        &dir,
        r#"
schema_version: "1.0"
inputs:
  board: "board.yaml"
limits:
  max_iterations: 1
stimulus:
  - switches: 0x3FF
assertions:
  - final_leds: 0xFF
  - mirror_holds: true
"#,
    );

    let output = run_test(&script, &[]);
    assert!(output.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_wall_time() {
    let dir = temp_dir("walltime");
    let script = write_script(
        &dir,
        r#"
schema_version: "1.0"
limits:
  max_iterations: 1000000
  wall_time_ms: 1
stimulus:
  - switches: 0x55
assertions:
  - expected_stop_reason: wall_time
"#,
    );

    let output = run_test(&script, &[]);
    // Should pass because we expect wall_time stop reason
    assert!(output.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_assertion_fail() {
    let dir = temp_dir("fail");
    let script = write_script(
        &dir,
        r#"
schema_version: "1.0"
limits:
  max_iterations: 2
stimulus:
  - switches: 0xFF
  - switches: 0x01
assertions:
  - final_leds: 0xFF
"#,
    );
    let output_dir = dir.join("artifacts");

    let output = run_test(&script, &["--output-dir", output_dir.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1)); // EXIT_ASSERT_FAIL

    let result: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output_dir.join("result.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(result["status"], "fail");
    assert_eq!(result["final_leds"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_max_iterations_guard() {
    let dir = temp_dir("huge");
    let script = write_script(
        &dir,
        r#"
schema_version: "1.0"
limits:
  max_iterations: 60000000
"#,
    );

    let output = run_test(&script, &[]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_invalid_schema() {
    let dir = temp_dir("schema");
    let script = write_script(
        &dir,
        r#"
schema_version: "9.9"
limits:
  max_iterations: 1
"#,
    );

    let output = run_test(&script, &[]);
    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR

    let _ = std::fs::remove_dir_all(&dir);
}

fn write_board(dir: &PathBuf, switches_base: &str, switches_direction: &str) {
    std::fs::write(
        dir.join("board.yaml"),
        format!(
            r#"
name: "miswired"
switches: "sw"
leds: "led"
peripherals:
  - id: "sw"
    type: "pio"
    base_address: {}
    config:
      width: 8
      direction: "{}"
  - id: "led"
    type: "pio"
    base_address: 0x2000
    config:
      width: 8
      direction: "output"
"#,
            switches_base, switches_direction
        ),
    )
    .unwrap();
}

const MIRROR_SCRIPT: &str = r#"
schema_version: "1.0"
inputs:
  board: "board.yaml"
limits:
  max_iterations: 1
stimulus:
  - switches: 0xFF
assertions:
  - mirror_holds: true
"#;

#[test]
fn test_cli_test_mode_rejects_output_switches() {
    let dir = temp_dir("output-switches");
    write_board(&dir, "0x1000", "output");
    let script = write_script(&dir, MIRROR_SCRIPT);

    let output = run_test(&script, &[]);
    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_test_mode_rejects_window_past_address_space() {
    let dir = temp_dir("top-of-map");
    write_board(&dir, "0xFFFFFFFFFFFFFFF8", "input");
    let script = write_script(&dir, MIRROR_SCRIPT);

    let output = run_test(&script, &[]);
    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR

    let _ = std::fs::remove_dir_all(&dir);
}
