//! repo::sweeper
//!
//! Reclaims disk space of closed changes.
//!
//! Each pass asks the review server for the project's merged and abandoned
//! changes and, for every one that still has a clone, removes the clone
//! under the version's lock. The cached facade, the cached dates and the
//! lock-registry entry of that version are dropped with it.
//!
//! A failure on one change is logged and counted; it never stops the pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::factory::RepositoryFactory;
use super::{run_blocking, RepoError};
use crate::core::types::VersionId;
use crate::review::{ChangeQuery, QueryStatus};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Versions whose clone was removed
    pub removed: Vec<VersionId>,
    /// Closed changes without a local clone
    pub skipped: usize,
    /// Changes whose removal failed
    pub failed: usize,
}

/// Periodic eviction of closed changes.
#[derive(Debug)]
pub struct EvictionSweeper {
    factory: Arc<RepositoryFactory>,
    project: String,
}

impl EvictionSweeper {
    pub fn new(factory: Arc<RepositoryFactory>, project: impl Into<String>) -> Self {
        Self {
            factory,
            project: project.into(),
        }
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Only the change query itself can fail the pass.
    pub async fn sweep_once(&self) -> Result<SweepReport, RepoError> {
        let ctx = self.factory.context();
        let query = ChangeQuery::new(&self.project).with_status(QueryStatus::Closed);
        let changes = ctx.review().query_changes(&query).await?;

        let head = self.factory.head_id();
        let mut report = SweepReport::default();

        for change in changes {
            let id = match VersionId::new(change.number.to_string()) {
                Ok(id) if id != head => id,
                _ => continue,
            };

            if !ctx.sync().version_dir(&id).exists() {
                report.skipped += 1;
                continue;
            }

            match self.evict_version(&id).await {
                Ok(()) => report.removed.push(id),
                Err(err) => {
                    warn!(version = %id, error = %err, "failed to evict closed change");
                    report.failed += 1;
                }
            }
        }

        info!(
            removed = report.removed.len(),
            skipped = report.skipped,
            failed = report.failed,
            "sweep finished"
        );
        Ok(report)
    }

    async fn evict_version(&self, id: &VersionId) -> Result<(), RepoError> {
        let ctx = Arc::clone(self.factory.context());
        let guard = ctx.locks().acquire(id).await;

        // Facade and dates are dropped before the directory, under the lock
        self.factory.evict(id);
        ctx.dates().evict_version(id);

        let removal = {
            let ctx = Arc::clone(&ctx);
            let id = id.clone();
            run_blocking(move || {
                let _guard = guard;
                ctx.sync().remove_clone(&id).map(drop)
            })
            .await
        };

        ctx.locks().sweep(id);
        removal
    }

    /// Run [`Self::sweep_once`] every `interval` on the current runtime.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep_once().await {
                    warn!(error = %err, "sweep pass failed");
                }
            }
        })
    }
}
