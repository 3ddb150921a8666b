//! End-to-end runs of the `algo-trade` binary against the paper broker.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let config = format!(
        r#"
[storage]
data_dir = "{}"

[broker]
mode = "paper"
paper_equity = 10000

[scaler]
initial_equity = 10000
"#,
        data_dir.display().to_string().replace('\\', "/")
    );
    std::fs::write(dir.path().join("Config.toml"), config).unwrap();
    dir
}

fn algo_trade(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_algo-trade"))
        .arg("--config")
        .arg(dir.join("Config.toml"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ==================== Capital Scaler Tests ====================

#[test]
fn test_progress_on_fresh_state() {
    let dir = workspace();

    let output = algo_trade(dir.path(), &["progress", "--json"]);
    assert!(output.status.success(), "{output:?}");

    let progress: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(progress["current_level"], 0);
    assert_eq!(progress["next_level"], 1);
    assert!(dir.path().join("data").join("scaling_state.json").exists());
}

#[test]
fn test_close_day_scales_up_and_persists() {
    let dir = workspace();

    let output = algo_trade(dir.path(), &["close-day", "--pnl", "70", "--equity", "10070"]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("0 -> 1"), "{}", stdout(&output));

    let output = algo_trade(dir.path(), &["progress", "--json"]);
    let progress: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(progress["current_level"], 1);
}

#[test]
fn test_gate_exit_code_follows_daily_loss() {
    let dir = workspace();

    let within = algo_trade(dir.path(), &["gate", "--daily-pnl", "50"]);
    assert!(within.status.success(), "{within:?}");
    assert!(stdout(&within).contains("TRADE"));

    let paused = algo_trade(dir.path(), &["gate", "--daily-pnl", "-300"]);
    assert_eq!(paused.status.code(), Some(2));
    assert!(stdout(&paused).contains("pause_today"));
}

// ==================== Health Monitor Tests ====================

#[test]
fn test_health_reports_paper_broker() {
    let dir = workspace();

    let output = algo_trade(dir.path(), &["health", "--json"]);
    assert!(output.status.success(), "{output:?}");

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["health"]["status"], "healthy");
    assert_eq!(report["trading_allowed"]["allowed"], true);
}

#[test]
fn test_submit_fills_on_paper_broker() {
    let dir = workspace();

    let output = algo_trade(
        dir.path(),
        &["submit", "--symbol", "spy", "--notional", "25", "--side", "buy"],
    );
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("accepted"));

    let queue = algo_trade(dir.path(), &["queue", "list"]);
    assert!(stdout(&queue).contains("Order queue is empty"));
}

#[test]
fn test_reset_breaker_is_recorded_in_alerts() {
    let dir = workspace();

    let reset = algo_trade(dir.path(), &["reset-breaker"]);
    assert!(reset.status.success(), "{reset:?}");

    let alerts = algo_trade(dir.path(), &["alerts", "--limit", "5"]);
    assert!(
        stdout(&alerts).contains("Circuit breaker manually reset"),
        "{}",
        stdout(&alerts)
    );
}
