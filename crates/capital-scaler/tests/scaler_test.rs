//! Capital Scaler behaviour through its public API and on-disk state.

use std::sync::Arc;

use algo_trade_capital_scaler::{
    CapitalScaler, RiskAction, ScaleDecision, ScaleDirection, ScalerError,
};
use algo_trade_core::{Clock, ManualClock, ScalerConfig, StorageConfig, StoreError};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

fn storage(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        data_dir: dir.path().to_path_buf(),
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap(),
    ))
}

fn open(dir: &TempDir, clock: Arc<ManualClock>) -> CapitalScaler {
    let clock: Arc<dyn Clock> = clock;
    CapitalScaler::open(ScalerConfig::default(), &storage(dir), clock).unwrap()
}

fn with_equity(initial: Decimal) -> ScalerConfig {
    ScalerConfig {
        initial_equity: initial,
        ..Default::default()
    }
}

// ==================== Risk Gate Tests ====================

#[test]
fn test_sixteen_percent_drawdown_halts() {
    let dir = TempDir::new().unwrap();
    let scaler = CapitalScaler::open(with_equity(dec!(100000)), &storage(&dir), clock()).unwrap();

    scaler.update_equity(dec!(84000)).unwrap();
    let status = scaler.check_circuit_breakers(dec!(500), None);

    assert_eq!(status.action, RiskAction::Halt);
    assert_eq!(status.current_drawdown_pct, dec!(16));
    assert_eq!(status.suggested_position_size_multiplier, Decimal::ZERO);
}

#[test]
fn test_halt_holds_for_any_daily_pnl() {
    let dir = TempDir::new().unwrap();
    let scaler = CapitalScaler::open(with_equity(dec!(100000)), &storage(&dir), clock()).unwrap();

    for equity in [dec!(85000), dec!(70000), dec!(1)] {
        scaler.update_equity(equity).unwrap();
        for pnl in [dec!(-10000), dec!(-1), Decimal::ZERO, dec!(2500)] {
            let status = scaler.check_circuit_breakers(pnl, None);
            assert_eq!(status.action, RiskAction::Halt);
            assert_eq!(status.suggested_position_size_multiplier, Decimal::ZERO);
        }
    }
}

#[test]
fn test_daily_loss_pauses_below_max_drawdown() {
    let dir = TempDir::new().unwrap();
    let scaler = CapitalScaler::open(with_equity(dec!(100000)), &storage(&dir), clock()).unwrap();

    for equity in [dec!(100000), dec!(95000), dec!(88000), dec!(85001)] {
        scaler.update_equity(equity).unwrap();
        let loss = equity * dec!(-0.02);
        let status = scaler.check_circuit_breakers(loss, None);
        assert_eq!(status.action, RiskAction::PauseToday, "equity {equity}");
        assert_eq!(status.suggested_position_size_multiplier, Decimal::ZERO);
    }
}

#[test]
fn test_twelve_percent_drawdown_scales_positions() {
    let dir = TempDir::new().unwrap();
    let scaler = CapitalScaler::open(with_equity(dec!(100000)), &storage(&dir), clock()).unwrap();
    scaler.update_equity(dec!(88000)).unwrap();

    let first = scaler.check_circuit_breakers(dec!(-100), None);
    let second = scaler.check_circuit_breakers(dec!(-100), None);

    assert_eq!(first.action, RiskAction::ScaleDown);
    assert_eq!(first.suggested_position_size_multiplier, dec!(0.72));
    assert_eq!(first, second);
}

// ==================== Daily Close Tests ====================

#[test]
fn test_close_trading_day_scales_up_when_funded() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let scaler = open(&dir, clock.clone());

    // Level 1 needs 2 * 30 = 60 banked.
    let first = scaler.close_trading_day(dec!(35), Some(dec!(10035))).unwrap();
    assert!(matches!(first, ScaleDecision::NotEligible { .. }));

    clock.advance(chrono::Duration::days(1));
    let second = scaler.close_trading_day(dec!(30), Some(dec!(10065))).unwrap();
    assert!(second.is_scaled());

    let state = scaler.state();
    assert_eq!(state.current_level, 1);
    assert_eq!(state.daily_investment, dec!(2));
    assert_eq!(state.cumulative_profit, dec!(65));
    assert_eq!(state.peak_equity, dec!(10065));
    assert_eq!(state.last_scale_date, Some(clock.now().date_naive()));
}

#[test]
fn test_losing_days_walk_level_back() {
    let dir = TempDir::new().unwrap();
    let scaler = open(&dir, clock());

    scaler.record_daily_pnl(dec!(100)).unwrap();
    assert!(scaler.scale_up().unwrap().is_scaled());
    assert!(scaler.scale_up().unwrap().is_scaled());
    assert_eq!(scaler.state().current_level, 2);

    // Level 2 retreats below 3 * 30 * 0.5 = 45.
    let decision = scaler.close_trading_day(dec!(-60), None).unwrap();
    let ScaleDecision::Scaled(event) = decision else {
        panic!("expected retreat, got {decision:?}");
    };
    assert_eq!(event.direction, ScaleDirection::Down);
    assert_eq!(scaler.state().current_level, 1);
}

// ==================== Persistence Tests ====================

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    {
        let scaler = open(&dir, clock.clone());
        scaler.record_daily_pnl(dec!(250)).unwrap();
        for _ in 0..3 {
            scaler.scale_up().unwrap();
        }
        scaler.update_equity(dec!(10250)).unwrap();
        scaler.flush().unwrap();
    }

    let reopened = open(&dir, clock);
    let state = reopened.state();
    assert_eq!(state.current_level, 3);
    assert_eq!(reopened.get_daily_investment(), dec!(5));
    assert_eq!(state.cumulative_profit, dec!(250));
    assert_eq!(state.scale_history.len(), 3);

    assert!(reopened.scale_up().unwrap().is_scaled());
    assert_eq!(reopened.get_daily_investment(), dec!(8));
}

#[test]
fn test_legacy_state_file_is_migrated() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("scaling_state.json"),
        r#"{
            "current_level": 3,
            "daily_investment": 999,
            "cumulative_profit": 250.0,
            "peak_equity": 10400.0,
            "current_equity": 10250.0,
            "start_date": "2025-11-03",
            "last_scale_date": null,
            "scale_history": []
        }"#,
    )
    .unwrap();

    let scaler = open(&dir, clock());

    // The stored investment is re-derived from the sequence.
    assert_eq!(scaler.get_daily_investment(), dec!(5));
    assert!(scaler.should_scale_up());

    scaler.flush().unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("scaling_state.json")).unwrap())
            .unwrap();
    assert_eq!(raw["schema_version"], 1);
    assert_eq!(raw["data"]["current_level"], 3);
}

#[test]
fn test_corrupt_state_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("scaling_state.json"), "{ truncated").unwrap();

    let clock: Arc<dyn Clock> = clock();
    let result = CapitalScaler::open(ScalerConfig::default(), &storage(&dir), clock);

    assert!(matches!(
        result,
        Err(ScalerError::Store(StoreError::Json(_)))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = ScalerConfig {
        sequence: vec![dec!(1), dec!(3), dec!(2)],
        ..Default::default()
    };

    let clock: Arc<dyn Clock> = clock();
    let result = CapitalScaler::open(config, &storage(&dir), clock);
    assert!(matches!(result, Err(ScalerError::InvalidSequence(_))));
}
