use std::sync::Arc;

use html_escape::encode_text;

use crate::{
    domains::{BlockChecker, CheckErrorPolicy, Domain, DomainStore, StorageBackend, Verdict},
    notifier::Notifier,
};

/// What a fresh verdict means for a domain's alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Newly blocked. Tell the operator and remember that we did.
    Alert,
    /// Not blocked anymore. Forget the alert, quietly.
    Clear,
    Unchanged,
}

/// At most one alert per stretch of scans that see the domain blocked.
pub fn transition(was_alerted: bool, verdict: Verdict) -> Transition {
    match (was_alerted, verdict.is_blocked()) {
        (false, true) => Transition::Alert,
        (true, false) => Transition::Clear,
        _ => Transition::Unchanged,
    }
}

/// Text of the alert sent when a domain gets blocked.
pub fn alert_text(domain: &Domain) -> String {
    let domain = encode_text(domain.as_str());
    format!(
        concat!(
            "🚨 <b>Domain blocked:</b> <code>{domain}</code>\n\n",
            "Replace it with a new domain via:\n",
            "<code>/replace {domain} new-domain.com</code>"
        ),
        domain = domain
    )
}

/// What happened during one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Domains looked at, including ones whose check failed.
    pub checked: usize,
    pub failed_checks: usize,
    pub alerted: Vec<Domain>,
    pub cleared: Vec<Domain>,
    /// Alerts that were recorded as sent but Telegram refused.
    pub failed_deliveries: usize,
}

/// Runs the domain list through the checker and alerts on newly blocked domains.
pub struct Scanner<S, C, N> {
    store: Arc<DomainStore<S>>,
    checker: C,
    notifier: Arc<N>,
    policy: CheckErrorPolicy,
}

impl<S, C, N> Scanner<S, C, N>
where
    S: StorageBackend,
    C: BlockChecker,
    N: Notifier,
{
    pub fn new(
        store: Arc<DomainStore<S>>,
        checker: C,
        notifier: Arc<N>,
        policy: CheckErrorPolicy,
    ) -> Self {
        Self {
            store,
            checker,
            notifier,
            policy,
        }
    }

    /// Check every domain once, alert on the ones that just got blocked,
    /// and save the new alert state.
    ///
    /// The store isn't locked while checking, so commands keep working
    /// during a long scan. Results are committed in one go at the end.
    pub async fn scan(&self) -> ScanReport {
        self.store.refresh().await;
        let snapshot = self.store.snapshot().await;

        let mut report = ScanReport::default();
        // Updated as we go, so a domain listed twice is only alerted once.
        let mut alerted = snapshot.alerted.clone();

        for domain in &snapshot.domains {
            report.checked += 1;

            let result = self.checker.check(domain).await;
            if result.is_err() {
                report.failed_checks += 1;
            }
            let Some(verdict) = self.policy.resolve(domain, result) else {
                continue;
            };

            match transition(alerted.contains(&domain.key()), verdict) {
                Transition::Alert => {
                    log::info!("{domain} got blocked, alerting.");
                    // The alert counts as sent even if delivery fails. There's no retry.
                    if let Err(e) = self.notifier.send(&alert_text(domain), None).await {
                        log::error!("Failed to alert about {domain}: {e}");
                        report.failed_deliveries += 1;
                    }
                    alerted.insert(domain.key());
                    report.alerted.push(domain.clone());
                }
                Transition::Clear => {
                    log::info!("{domain} is not blocked anymore.");
                    alerted.remove(&domain.key());
                    report.cleared.push(domain.clone());
                }
                Transition::Unchanged => (),
            }
        }

        self.store
            .modify(|state| {
                let mut changed = false;
                for domain in &report.alerted {
                    changed |= state.alerted.insert(domain.key());
                }
                for domain in &report.cleared {
                    changed |= state.alerted.remove(&domain.key());
                }
                // Someone may have replaced a domain while we were checking it.
                changed |= state.prune_alerted();
                changed
            })
            .await;

        report
    }
}
