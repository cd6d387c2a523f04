#![cfg(feature = "cli")]

use std::process::Command;

fn tncbridge() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tncbridge"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn params_json_without_device() {
    let output = tncbridge()
        .args(["--format", "json", "params", "--rate", "1200", "--packet-length", "64"])
        .output()
        .expect("params should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
    assert_eq!(value["packet_length"], 64);
    assert_eq!(value["modulation"], "Fsk2");
    let rate = value["data_rate_baud"].as_f64().expect("rate");
    assert!((rate - 1200.0).abs() < 5.0, "{rate}");
    assert!(value["block_time_us"].as_u64().expect("block time") > 10_000);
}

#[test]
fn params_raw_prints_wire_bytes() {
    let output = tncbridge()
        .args(["--format", "raw", "params"])
        .output()
        .expect("params should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim().split(' ').count(), 19);
}

#[test]
fn unsupported_rate_is_a_usage_error() {
    let output = tncbridge()
        .args(["params", "--rate", "9601"])
        .output()
        .expect("params should run");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported data rate"));
}

#[test]
fn missing_device_returns_transport_error() {
    let output = tncbridge()
        .args(["status", "--usb-device", "/dev/tncbridge-missing-device"])
        .output()
        .expect("status should run");

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("open USB device"));
}

#[test]
fn version_prints_package_version() {
    let output = tncbridge()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("tncbridge {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_is_json_when_piped() {
    let output = tncbridge()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("piped output defaults to JSON");
    assert_eq!(value["name"], "tncbridge");
}
