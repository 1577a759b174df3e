//! Operator-side cache maintenance.

use std::sync::Arc;

use sessionlens_api_types::PurgeSummary;
use tracing::info;

use super::repos::{CacheMaintenanceRepo, RepoError};

/// Which tables a purge should empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeTargets {
    pub responses: bool,
    pub analyses: bool,
}

impl PurgeTargets {
    /// With neither flag set, both tables are purged.
    pub fn from_flags(responses: bool, analyses: bool) -> Self {
        if !responses && !analyses {
            return Self {
                responses: true,
                analyses: true,
            };
        }
        Self {
            responses,
            analyses,
        }
    }
}

pub struct MaintenanceService {
    store: Arc<dyn CacheMaintenanceRepo>,
}

impl MaintenanceService {
    pub fn new(store: Arc<dyn CacheMaintenanceRepo>) -> Self {
        Self { store }
    }

    pub async fn purge(&self, targets: PurgeTargets) -> Result<PurgeSummary, RepoError> {
        let mut summary = PurgeSummary::default();
        if targets.responses {
            summary.responses = self.store.purge_responses().await?;
        }
        if targets.analyses {
            summary.analyses = self.store.purge_analyses().await?;
        }
        info!(
            responses = summary.responses,
            analyses = summary.analyses,
            "cache purged"
        );
        Ok(summary)
    }

    pub async fn health(&self) -> Result<(), RepoError> {
        self.store.ping().await
    }
}
