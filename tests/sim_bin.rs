use std::process::Command;

#[test]
fn test_sim_binary_runs() {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--bin", "sim", "--", "2", "7"])
        .output()
        .expect("failed to run sim binary");
    assert!(
        output.status.success(),
        "sim failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).expect("invalid JSON");
    assert_eq!(v["players"], 2);
    assert_eq!(v["consistent"], true);
    assert!(v["result"].is_object(), "no result: {v}");
    assert!(v["result"]["type"].is_string());
    assert!(v["turns"].as_u64().unwrap_or(0) >= 2);
    assert!(v["winners"].is_array());
}

#[test]
fn test_sim_binary_rejects_bad_player_count() {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--bin", "sim", "--", "9", "1"])
        .output()
        .expect("failed to run sim binary");
    assert!(!output.status.success());
}
