//! Background task scheduler for invoice auto-close
//!
//! Every `scheduler.auto_close_interval_minutes` (or
//! `RUNWAY_AUTO_CLOSE_MINUTES`) the scheduler makes sure each card has an
//! invoice for the current month and closes every open invoice whose closing
//! date has passed. A value of 0 disables it.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::interval;
use tracing::{info, warn};

use runway_core::{AutoCloseReport, Engine, RunwayConfig};

use crate::AppState;

/// Configuration for the invoice sweep
#[derive(Debug, Clone)]
pub struct InvoiceScheduleConfig {
    /// Interval between sweeps in minutes
    pub interval_minutes: u64,
    /// Owners visited on each sweep
    pub owners: Vec<String>,
}

impl InvoiceScheduleConfig {
    /// Read the schedule from the resolved config
    ///
    /// Returns None if the sweep is disabled (interval of 0)
    pub fn from_config(config: &RunwayConfig) -> Option<Self> {
        let interval_minutes = config.scheduler.auto_close_interval_minutes;
        if interval_minutes == 0 {
            warn!("Invoice auto-close interval is 0, automatic closing disabled");
            return None;
        }

        let owners = if config.scheduler.owners.is_empty() {
            vec![config.owner.clone()]
        } else {
            config.scheduler.owners.clone()
        };

        Some(Self {
            interval_minutes,
            owners,
        })
    }
}

/// Start the invoice scheduler as a background task
pub fn start_invoice_scheduler(state: Arc<AppState>, config: InvoiceScheduleConfig) {
    info!(
        "Starting invoice scheduler: every {} minutes for {} owner(s)",
        config.interval_minutes,
        config.owners.len()
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_minutes * 60));

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let today = chrono::Local::now().date_naive();
            for owner in &config.owners {
                let report = run_invoice_sweep(&state.engine, owner, today).await;
                if !report.closed.is_empty() || !report.failures.is_empty() {
                    info!(
                        owner = %owner,
                        closed = report.closed.len(),
                        failed = report.failures.len(),
                        "Scheduled invoice sweep finished"
                    );
                }
            }
        }
    });
}

/// One sweep for `owner`: open this month's invoices, then close the due ones
pub async fn run_invoice_sweep(engine: &Engine, owner: &str, as_of: NaiveDate) -> AutoCloseReport {
    if let Err(e) = engine.open_current_invoices(owner, as_of).await {
        warn!(owner, error = %e, "Failed to open current invoices");
    }
    engine.auto_close_due(owner, as_of).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_disabled_at_zero() {
        let mut config = RunwayConfig::default();
        config.scheduler.auto_close_interval_minutes = 0;
        assert!(InvoiceScheduleConfig::from_config(&config).is_none());
    }

    #[test]
    fn test_config_defaults_to_configured_owner() {
        let mut config = RunwayConfig::default();
        config.owner = "alice".to_string();
        let schedule = InvoiceScheduleConfig::from_config(&config).unwrap();
        assert_eq!(schedule.interval_minutes, 60);
        assert_eq!(schedule.owners, vec!["alice".to_string()]);

        config.scheduler.owners = vec!["bob".to_string(), "carol".to_string()];
        let schedule = InvoiceScheduleConfig::from_config(&config).unwrap();
        assert_eq!(schedule.owners.len(), 2);
    }
}
