//! Periodic purge of analyzed documents.
//!
//! Documents that have a verdict and are older than the result TTL are
//! removed from the metadata store once per TTL period. Pending documents
//! are never purged, whatever their age.

use crate::audit;
use crate::core::MetadataResult;
use crate::store::ArcMetadataStore;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Removes expired, analyzed documents on a fixed period.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    metadata: ArcMetadataStore,
    ttl: chrono::Duration,
}

impl RetentionSweeper {
    /// Creates a sweeper. A zero or negative `ttl` disables it.
    pub fn new(metadata: ArcMetadataStore, ttl: chrono::Duration) -> Self {
        Self { metadata, ttl }
    }

    /// The result TTL, which is also the sweep period.
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Returns `true` if the TTL is positive.
    pub fn is_enabled(&self) -> bool {
        self.ttl > chrono::Duration::zero()
    }

    /// Purges non-pending documents created before `now - ttl`.
    ///
    /// Returns the number of removed documents.
    pub async fn sweep_once(&self) -> MetadataResult<u64> {
        let cutoff = Utc::now() - self.ttl;
        let removed = self.metadata.purge(cutoff).await?;
        audit::emit_purge_completed(removed, cutoff);
        Ok(removed)
    }

    /// Starts the periodic sweep on the current runtime.
    ///
    /// Returns `None` when the sweeper is disabled. The first sweep runs one
    /// full period after this call. A failed sweep is logged and the next
    /// tick proceeds normally.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            tracing::info!("Retention sweeper disabled");
            return None;
        }
        let period = self.ttl.to_std().ok()?;

        tracing::info!(period_secs = period.as_secs(), "Retention sweeper started");
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep_once().await {
                    tracing::error!(error = %e, "Retention sweep failed");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::derive_identity;
    use crate::core::{AnalysisStatus, Document};
    use crate::store::{InMemoryMetadataStore, MetadataStore};
    use std::sync::Arc;
    use std::time::Duration;

    async fn seed(
        store: &InMemoryMetadataStore,
        tag: &str,
        status: AnalysisStatus,
        age: chrono::Duration,
    ) -> Document {
        let identity = derive_identity(tag.as_bytes(), tag);
        let mut doc = Document::new_pending(identity.id, identity.hash, tag);
        doc.status = status;
        doc.created_at = Utc::now() - age;
        store.save(&doc).await.unwrap();
        doc
    }

    #[tokio::test]
    async fn test_sweep_once_removes_only_expired_verdicts() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let three_hours = chrono::Duration::hours(3);
        let old_clean = seed(&store, "old-clean", AnalysisStatus::Clean, three_hours).await;
        let old_infected = seed(&store, "old-infected", AnalysisStatus::Infected, three_hours).await;
        let old_pending = seed(&store, "old-pending", AnalysisStatus::Pending, three_hours).await;
        let minute = chrono::Duration::minutes(1);
        let fresh = seed(&store, "fresh", AnalysisStatus::Clean, minute).await;

        let sweeper = RetentionSweeper::new(store.clone(), chrono::Duration::hours(1));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 2);

        assert!(store.get(&old_clean.id).await.unwrap_err().is_not_found());
        assert!(store.get(&old_infected.id).await.unwrap_err().is_not_found());
        assert!(store.get(&old_pending.id).await.is_ok());
        assert!(store.get(&fresh.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_positive_ttl_disables_sweeper() {
        let store = Arc::new(InMemoryMetadataStore::new());
        assert!(RetentionSweeper::new(store.clone(), chrono::Duration::zero())
            .spawn()
            .is_none());
        assert!(RetentionSweeper::new(store, chrono::Duration::seconds(-5))
            .spawn()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_runs_after_one_period() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let old = seed(&store, "old", AnalysisStatus::Clean, chrono::Duration::hours(2)).await;

        let handle = RetentionSweeper::new(store.clone(), chrono::Duration::hours(1))
            .spawn()
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        assert!(store.get(&old.id).await.is_ok());

        tokio::time::sleep(Duration::from_secs(31 * 60)).await;
        tokio::task::yield_now().await;
        assert!(store.get(&old.id).await.unwrap_err().is_not_found());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sweep_does_not_stop_the_sweeper() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let old = seed(&store, "old", AnalysisStatus::Infected, chrono::Duration::hours(5)).await;
        store.set_online(false);

        let handle = RetentionSweeper::new(store.clone(), chrono::Duration::hours(1))
            .spawn()
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61 * 60)).await;
        store.set_online(true);
        assert!(store.get(&old.id).await.is_ok());

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        tokio::task::yield_now().await;
        assert!(store.get(&old.id).await.unwrap_err().is_not_found());
        assert!(!handle.is_finished());

        handle.abort();
    }
}
