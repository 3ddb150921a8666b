//! Broker health probe and manual circuit-breaker reset.

use anyhow::Result;
use clap::Args;

use crate::runtime::Runtime;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Print the raw health check result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Probes the broker once and reports status, breaker position and trading permission.
pub async fn run_health(rt: &Runtime, args: HealthArgs) -> Result<()> {
    let result = rt.monitor.check_health().await;
    let permission = rt.monitor.is_trading_allowed();

    if args.json {
        let report = serde_json::json!({
            "health": result,
            "trading_allowed": permission,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let breaker = rt.monitor.breaker_snapshot();

    println!("Broker:               {}", rt.broker.label());
    println!("Status:               {}", result.status);
    match result.latency_ms {
        Some(ms) => println!("Latency:              {ms} ms"),
        None => println!("Latency:              -"),
    }
    if let Some(equity) = result.details.equity {
        println!("Equity:               ${equity}");
    }
    if let Some(buying_power) = result.details.buying_power {
        println!("Buying power:         ${buying_power}");
    }
    if let Some(error) = &result.error {
        println!("Error:                {error}");
    }
    println!(
        "Circuit breaker:      {} ({} consecutive failures, {} trips)",
        if breaker.is_open() { "OPEN" } else { "closed" },
        breaker.consecutive_failures,
        breaker.total_trips
    );
    println!(
        "Trading allowed:      {} ({})",
        if permission.allowed { "yes" } else { "NO" },
        permission.reason
    );

    Ok(())
}

#[derive(Args, Debug)]
pub struct ResetBreakerArgs {}

/// Closes the circuit breaker after operator review.
pub async fn run_reset_breaker(rt: &Runtime, _args: ResetBreakerArgs) -> Result<()> {
    let before = rt.monitor.breaker_snapshot();
    rt.monitor.force_reset().await;

    println!(
        "Circuit breaker reset (was {}, {} consecutive failures)",
        if before.is_open() { "open" } else { "closed" },
        before.consecutive_failures
    );
    Ok(())
}
