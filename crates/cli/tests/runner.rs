use std::process::Command;

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_lights"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Lights Simulator"));
}

#[test]
fn test_cli_missing_board_file() {
    let output = Command::new(env!("CARGO_BIN_EXE_lights"))
        .args(["run", "--board", "non_existent_board.yaml"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(2)); // EXIT_CONFIG_ERROR
}

#[test]
fn test_cli_run_mirrors_switches() {
    let output = Command::new(env!("CARGO_BIN_EXE_lights"))
        .args(["run", "--switches", "0x00", "0xFF", "0x2A"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Starting lights program..."));
    assert!(stdout.contains("switches=0xff -> leds=0xff"));
    assert!(stdout.contains("switches=0x2a -> leds=0x2a"));
}

#[test]
fn test_cli_run_live() {
    let output = Command::new(env!("CARGO_BIN_EXE_lights"))
        .args(["run", "--live", "--switches", "0xFF", "0x01"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("switches=0x01 -> leds=0x01"));
}

#[test]
fn test_cli_rejects_bad_switch_value() {
    let output = Command::new(env!("CARGO_BIN_EXE_lights"))
        .args(["run", "--switches", "0xZZ"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}

#[test]
fn test_cli_live_conflicts_with_max_iterations() {
    let output = Command::new(env!("CARGO_BIN_EXE_lights"))
        .args(["run", "--live", "--max-iterations", "5", "--switches", "0x01"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("cannot be used with"));
}
