//! Background rotation announcer.
//!
//! The monitor only flags credentials that are due for rotation; it never
//! rotates anything itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::context::OpContext;
use super::credential::CredentialInfo;
use super::store::CredentialStore;
use crate::errors::Result;

const SECS_PER_DAY: u64 = 86_400;

/// Longest scan period; larger policies still scan at this pace.
const MAX_PERIOD: Duration = Duration::from_secs(u32::MAX as u64);

/// Scans a store for credentials older than the rotation policy.
pub struct RotationMonitor {
    store: Arc<CredentialStore>,
    policy: chrono::Duration,
}

impl RotationMonitor {
    /// A monitor for a `policy_days` policy; `None` unless strictly positive.
    pub fn new(store: Arc<CredentialStore>, policy_days: i64) -> Option<Self> {
        if policy_days <= 0 {
            return None;
        }
        Some(Self {
            store,
            policy: chrono::Duration::try_days(policy_days)?,
        })
    }

    /// Spawn the periodic scan on the current tokio runtime.
    ///
    /// The first scan runs immediately, then once per policy period.
    pub fn spawn(store: Arc<CredentialStore>, policy_days: i64) -> Option<MonitorHandle> {
        let monitor = Self::new(store, policy_days)?;
        let period = scan_period(policy_days);

        let token = CancellationToken::new();
        let task = tokio::spawn(monitor.run(period, token.clone()));
        tracing::info!(policy_days, "rotation monitor started");

        Some(MonitorHandle { token, task })
    }

    /// Flag every credential due for rotation and return them.
    pub async fn scan_once(&self) -> Result<Vec<CredentialInfo>> {
        let due = self
            .store
            .stale_credentials(&OpContext::background(), self.policy)
            .await?;
        for info in &due {
            self.store.announce_rotation_due(info);
        }
        Ok(due)
    }

    async fn run(self, period: Duration, token: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => match self.scan_once().await {
                    Ok(due) => tracing::debug!(due = due.len(), "rotation scan finished"),
                    Err(err) => tracing::warn!(error = %err, "rotation scan failed"),
                },
            }
        }
        tracing::info!("rotation monitor stopped");
    }
}

fn scan_period(policy_days: i64) -> Duration {
    let days = u64::try_from(policy_days).unwrap_or(0);
    Duration::from_secs(days.saturating_mul(SECS_PER_DAY)).min(MAX_PERIOD)
}

/// Handle to a running monitor task.
pub struct MonitorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for its task to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "rotation monitor task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::backend::MemoryBackend;
    use crate::vault::credential::{Credential, CredentialType};
    use chrono::Utc;

    async fn store_with_old_and_new(audit: Arc<MemoryAuditSink>) -> Arc<CredentialStore> {
        let store = CredentialStore::builder(Arc::new(MemoryBackend::new()))
            .audit_sink(audit)
            .rotation_days(90)
            .build();
        let ctx = OpContext::background();

        let mut old = Credential::new("legacy", CredentialType::Password, "hunter2-but-longer");
        old.created_at = Utc::now() - chrono::Duration::days(120);
        store.set(&ctx, old).await.unwrap();

        let fresh = Credential::new("fresh", CredentialType::Password, "brand-new-password");
        store.set(&ctx, fresh).await.unwrap();

        Arc::new(store)
    }

    #[tokio::test]
    async fn disabled_policy_spawns_nothing() {
        let store = Arc::new(CredentialStore::builder(Arc::new(MemoryBackend::new())).build());
        assert!(RotationMonitor::spawn(store.clone(), 0).is_none());
        assert!(RotationMonitor::spawn(store.clone(), -3).is_none());
        assert!(RotationMonitor::new(store, 0).is_none());
    }

    #[test]
    fn scan_period_is_capped() {
        assert_eq!(scan_period(1), Duration::from_secs(SECS_PER_DAY));
        assert_eq!(scan_period(90), Duration::from_secs(90 * SECS_PER_DAY));
        assert_eq!(scan_period(10_000_000_000), MAX_PERIOD);
    }

    #[tokio::test]
    async fn huge_policy_still_runs_and_shuts_down() {
        let audit = Arc::new(MemoryAuditSink::new());
        let store = store_with_old_and_new(audit).await;

        let handle = RotationMonitor::spawn(store, 10_000_000_000).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn scan_flags_only_stale_credentials() {
        let audit = Arc::new(MemoryAuditSink::new());
        let store = store_with_old_and_new(audit.clone()).await;
        audit.clear();

        let monitor = RotationMonitor::new(store, 90).unwrap();
        let due = monitor.scan_once().await.unwrap();

        let names: Vec<&str> = due.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["legacy"]);

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "rotation_due");
        assert_eq!(events[0].credential, "legacy");
    }

    #[tokio::test]
    async fn rotated_credential_is_no_longer_due() {
        let audit = Arc::new(MemoryAuditSink::new());
        let store = store_with_old_and_new(audit).await;
        store
            .rotate(&OpContext::background(), "legacy", "rotated-password-value")
            .await
            .unwrap();

        let monitor = RotationMonitor::new(store, 90).unwrap();
        assert!(monitor.scan_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawned_monitor_scans_immediately_and_shuts_down() {
        let audit = Arc::new(MemoryAuditSink::new());
        let store = store_with_old_and_new(audit.clone()).await;
        audit.clear();

        let handle = store.start_rotation_monitor().unwrap();
        for _ in 0..200 {
            if audit.actions().iter().any(|a| a == "rotation_due") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(audit.actions().iter().any(|a| a == "rotation_due"));

        handle.shutdown().await;
    }
}
