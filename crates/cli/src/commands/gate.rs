//! Pre-trade gate combining broker health with the capital risk breakers.

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use crate::runtime::Runtime;

#[derive(Args, Debug)]
pub struct GateArgs {
    /// Today's realized plus unrealized P/L in dollars.
    #[arg(long, allow_hyphen_values = true)]
    pub daily_pnl: Decimal,

    /// Basis for the daily P/L percentage; defaults to current equity.
    #[arg(long)]
    pub account_value: Option<Decimal>,

    /// Print the decision as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Returns true when new positions may be opened.
pub async fn run_gate(rt: &Runtime, args: GateArgs) -> Result<bool> {
    let permission = rt.monitor.is_trading_allowed();
    let risk = rt
        .scaler
        .check_circuit_breakers(args.daily_pnl, args.account_value);

    let allowed = permission.allowed && !risk.action.blocks_trading();
    let multiplier = if allowed {
        risk.suggested_position_size_multiplier
    } else {
        Decimal::ZERO
    };
    let budget = (rt.scaler.get_daily_investment() * multiplier).round_dp(2);

    if args.json {
        let report = serde_json::json!({
            "allowed": allowed,
            "broker": permission,
            "risk": risk,
            "position_size_multiplier": multiplier,
            "daily_budget": budget,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(allowed);
    }

    println!("Broker:               {}", permission.reason);
    println!("Risk action:          {} ({})", risk.action, risk.reason);
    println!("Drawdown:             {}%", risk.current_drawdown_pct.round_dp(2));
    println!("Daily P/L:            {}%", risk.daily_pnl_pct.round_dp(2));
    println!("Position multiplier:  {multiplier}");
    println!("Daily budget:         ${budget}");
    println!("Decision:             {}", if allowed { "TRADE" } else { "STAND DOWN" });

    Ok(allowed)
}
