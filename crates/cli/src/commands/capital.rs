//! Capital Scaler operations: equity sync, end-of-day close, progress and operator resets.

use algo_trade_capital_scaler::{LevelProgress, ScaleDecision};
use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;
use tracing::warn;

use crate::runtime::Runtime;

// =============================================================================
// sync-equity
// =============================================================================

#[derive(Args, Debug)]
pub struct SyncEquityArgs {}

pub async fn run_sync_equity(rt: &Runtime, _args: SyncEquityArgs) -> Result<()> {
    let account = rt.sync_equity().await?;
    let state = rt.scaler.state();

    println!("Equity:               ${}", account.equity);
    println!("Buying power:         ${}", account.buying_power);
    println!("Peak equity:          ${}", state.peak_equity);
    println!("Drawdown:             {}%", state.drawdown_pct().round_dp(2));
    if let Some(halt) = &state.halted {
        println!(
            "HALTED since {} at {}% drawdown; run `algo-trade resume` after review",
            halt.at.format("%Y-%m-%d %H:%M UTC"),
            halt.drawdown_pct.round_dp(2)
        );
    }
    Ok(())
}

// =============================================================================
// close-day
// =============================================================================

#[derive(Args, Debug)]
pub struct CloseDayArgs {
    /// Realized P/L for the day in dollars.
    #[arg(long, allow_hyphen_values = true)]
    pub pnl: Decimal,

    /// Closing equity; read from the broker when omitted.
    #[arg(long)]
    pub equity: Option<Decimal>,
}

/// Books the day's P/L and applies the scaling policy.
pub async fn run_close_day(rt: &Runtime, args: CloseDayArgs) -> Result<()> {
    let equity = match args.equity {
        Some(equity) => Some(equity),
        None => match rt.sync_equity().await {
            Ok(account) => Some(account.equity),
            Err(e) => {
                warn!(error = %e, "Could not read closing equity, booking P/L only");
                None
            }
        },
    };

    let decision = rt.scaler.close_trading_day(args.pnl, equity)?;
    let state = rt.scaler.state();

    println!("Cumulative profit:    ${}", state.cumulative_profit);
    match &decision {
        ScaleDecision::Scaled(event) => println!(
            "Level:                {} -> {} ({}), daily investment ${}",
            event.from_level, event.to_level, event.direction, event.daily_investment
        ),
        ScaleDecision::NotEligible {
            threshold,
            cumulative_profit,
        } => println!(
            "Level:                {} held (profit ${} vs threshold ${})",
            state.current_level, cumulative_profit, threshold
        ),
        ScaleDecision::AtMaximum => {
            println!("Level:                {} held (top of sequence)", state.current_level);
        }
        ScaleDecision::AtMinimum => {
            println!("Level:                {} held (bottom of sequence)", state.current_level);
        }
    }
    println!("Daily investment:     ${}", state.daily_investment);
    Ok(())
}

// =============================================================================
// progress
// =============================================================================

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Print the progress report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub async fn run_progress(rt: &Runtime, args: ProgressArgs) -> Result<()> {
    let progress = rt.scaler.get_progress_to_next_level();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }
    print_progress(&progress);
    Ok(())
}

fn print_progress(progress: &LevelProgress) {
    println!(
        "Level:                {} (${}/day)",
        progress.current_level, progress.daily_investment
    );
    let (Some(next), Some(next_amount)) = (progress.next_level, progress.next_daily_investment)
    else {
        println!("Next level:           none, top of sequence");
        return;
    };
    println!("Next level:           {next} (${next_amount}/day)");
    println!("Required profit:      ${}", progress.required_profit);
    println!("Current profit:       ${}", progress.current_profit);
    println!("Remaining:            ${}", progress.remaining);
    println!("Progress:             {}%", progress.progress_pct.round_dp(1));
}

// =============================================================================
// Operator resets
// =============================================================================

#[derive(Args, Debug)]
pub struct ResetScalerArgs {
    /// Starting equity for the fresh run.
    #[arg(long)]
    pub equity: Decimal,
}

pub async fn run_reset_scaler(rt: &Runtime, args: ResetScalerArgs) -> Result<()> {
    rt.scaler.reset(args.equity)?;
    println!(
        "Capital scaler reset to level 0 (${}/day) with starting equity ${}",
        rt.scaler.get_daily_investment(),
        args.equity
    );
    Ok(())
}

#[derive(Args, Debug)]
pub struct ResumeArgs {}

/// Clears a latched drawdown halt.
pub async fn run_resume(rt: &Runtime, _args: ResumeArgs) -> Result<()> {
    if rt.scaler.resume()? {
        println!("Trading halt cleared");
    } else {
        println!("No halt was active");
    }
    Ok(())
}
