//! Order submission through the retry wrapper and the failed-order queue.

use algo_trade_core::{OrderSide, OrderSubmitter, OrderTicket};
use algo_trade_health_monitor::RetryError;
use anyhow::Result;
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use crate::runtime::Runtime;

// =============================================================================
// submit
// =============================================================================

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long)]
    pub symbol: String,

    /// Dollar amount to trade.
    #[arg(long)]
    pub notional: Decimal,

    /// buy or sell.
    #[arg(long, default_value = "buy")]
    pub side: OrderSide,

    /// Strategy tier the order belongs to.
    #[arg(long, default_value = "manual")]
    pub tier: String,
}

/// Places one order. Orders that could not reach the broker are queued for replay.
pub async fn run_submit(rt: &Runtime, args: SubmitArgs) -> Result<()> {
    let ticket = OrderTicket::new(args.symbol, args.notional, args.side, args.tier);
    let broker = rt.broker.clone();

    let outcome = rt
        .monitor
        .execute_with_retry("submit_order", || {
            let broker = broker.clone();
            let ticket = ticket.clone();
            async move { broker.submit_order(&ticket).await }
        })
        .await;

    match outcome {
        Ok(ack) => {
            println!(
                "Order {} accepted: {} ${} {}",
                ack.order_id, ticket.side, ticket.notional, ticket.symbol
            );
            Ok(())
        }
        Err(err) if should_queue(&err) => {
            let queued = rt.monitor.queue_failed_order(ticket, err.to_string()).await?;
            println!("Order failed ({err}); queued as {} for replay", queued.id);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// The broker never saw the order, or failed for reasons a replay can outlive.
fn should_queue(err: &RetryError) -> bool {
    if err.is_circuit_open() {
        return true;
    }
    err.broker_error().is_some_and(|e| e.is_retryable())
}

// =============================================================================
// queue
// =============================================================================

#[derive(Args, Debug)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Show orders waiting for replay.
    List,
    /// Replay queued orders if the broker is fit.
    Drain,
}

pub async fn run_queue(rt: &Runtime, args: QueueArgs) -> Result<()> {
    match args.command {
        QueueCommand::List => {
            let orders = rt.monitor.queued_orders().await;
            if orders.is_empty() {
                println!("Order queue is empty");
                return Ok(());
            }
            println!(
                "{:<36}  {:<8}  {:>10}  {:<4}  {:>7}  {:<20}  LAST ERROR",
                "ID", "SYMBOL", "NOTIONAL", "SIDE", "RETRIES", "QUEUED AT"
            );
            for order in orders {
                println!(
                    "{:<36}  {:<8}  {:>10}  {:<4}  {:>3}/{:<3}  {:<20}  {}",
                    order.id.to_string(),
                    order.symbol,
                    order.notional,
                    order.side.to_string(),
                    order.retry_count,
                    order.max_retries,
                    order.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    order.last_error.as_deref().unwrap_or("-")
                );
            }
        }
        QueueCommand::Drain => {
            let broker = rt.broker.clone();
            let report = rt
                .monitor
                .process_order_queue(|ticket| {
                    let broker = broker.clone();
                    async move { broker.submit_order(&ticket).await }
                })
                .await?;

            if let Some(status) = report.skipped_status {
                println!(
                    "Replay skipped: broker {status}, {} orders still queued",
                    report.remaining
                );
                return Ok(());
            }
            println!(
                "Replayed {}, failed {}, discarded {}, remaining {}",
                report.replayed, report.failed, report.discarded, report.remaining
            );
        }
    }
    Ok(())
}
