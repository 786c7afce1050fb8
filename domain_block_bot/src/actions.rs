use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    alerts::Scanner,
    domains::{BlockChecker, StorageBackend},
    notifier::Notifier,
};

/// Scan the domain list every `period`, forever.
///
/// Each scan is awaited before waiting for the next tick, so two scans never
/// run at the same time. If a scan takes longer than `period`, the next one
/// starts right after it, and the rest of the ticks it missed are dropped.
pub async fn scan_spinloop<S, C, N>(scanner: Arc<Scanner<S, C, N>>, period: Duration)
where
    S: StorageBackend,
    C: BlockChecker,
    N: Notifier,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        log::debug!("Scan started...");
        let started = Instant::now();
        let report = scanner.scan().await;
        let took = started.elapsed();

        log::info!(
            "Scanned {} domains in {:.1?}: {} newly blocked, {} unblocked, {} failed checks.",
            report.checked,
            took,
            report.alerted.len(),
            report.cleared.len(),
            report.failed_checks,
        );
        if report.failed_deliveries > 0 {
            log::warn!(
                "{} alerts could not be delivered and won't be resent.",
                report.failed_deliveries
            );
        }
        if took > period {
            log::warn!("Scan took {took:.1?}, longer than the {period:?} between scans. Skipping missed scans.");
        }
    }
}
