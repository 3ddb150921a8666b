use anyhow::Result;
use clap::Args;

use crate::runtime::Runtime;

#[derive(Args, Debug)]
pub struct AlertsArgs {
    /// Number of most recent alerts to show.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// Prints the persisted alert log, oldest first.
pub async fn run_alerts(rt: &Runtime, args: AlertsArgs) -> Result<()> {
    let alerts = rt.monitor.recent_alerts(args.limit);
    if alerts.is_empty() {
        println!("No alerts recorded");
        return Ok(());
    }

    for alert in alerts {
        println!(
            "{}  {:<8}  {}  {}",
            alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
            alert.severity.to_string(),
            alert.message,
            alert.details
        );
    }
    Ok(())
}
