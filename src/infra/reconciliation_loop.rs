use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::use_cases::billing::BillingUseCases;

pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Periodically converge tenants holding more than one open subscription.
///
/// An interval of 0 disables the loop. Each pass is independent; a failure
/// is logged and the next tick tries again.
pub async fn run_reconciliation_loop(billing_use_cases: Arc<BillingUseCases>, interval_secs: u64) {
    if interval_secs == 0 {
        info!("Scheduled reconciliation disabled (RECONCILE_INTERVAL_SECS=0)");
        return;
    }

    let mut ticker = interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Subscription reconciliation service started (every {}s)",
        interval_secs
    );

    loop {
        ticker.tick().await;

        match billing_use_cases.reconcile_all().await {
            Ok(report) if report.changed() => {
                info!(
                    canceled = report.canceled,
                    already_gone = report.already_gone,
                    failed = report.failed,
                    kept = report.kept,
                    "Scheduled reconciliation pass finished"
                );
            }
            Ok(_) => {
                // Nothing to converge
            }
            Err(e) => {
                error!(error = %e, "Scheduled reconciliation pass failed");
            }
        }
    }
}
