//! Speculative job tracker
//!
//! Counts started-but-unfinished jobs. A pending count is capacity only;
//! completion is decided by the completion detector.

use crate::diagnostics::EngineStats;
use crate::ledger::JobLedger;
use crate::types::{JobKey, JobLedgerEntry};
use std::sync::Arc;
use tracing::debug;

pub struct SpeculativeTracker {
    ledger: Arc<JobLedger>,
    stats: Arc<EngineStats>,
}

impl SpeculativeTracker {
    pub fn new(ledger: Arc<JobLedger>, stats: Arc<EngineStats>) -> Self {
        Self { ledger, stats }
    }

    pub fn on_job_started(&self, key: JobKey) -> JobLedgerEntry {
        let entry = self.ledger.add_pending(key);
        self.stats.job_started();
        debug!("Adding craft {} | pending {}", key, entry.pending);
        entry
    }

    /// Cancels one pending job. Stopping a job that was never tracked, or
    /// whose credit was already validated, changes nothing.
    pub fn on_job_stopped(&self, key: JobKey) -> Option<JobLedgerEntry> {
        match self.ledger.cancel_pending(key) {
            Some(entry) => {
                self.stats.job_stopped();
                debug!("Removing craft {} | pending {}", key, entry.pending);
                Some(entry)
            }
            None => {
                debug!("Stop for {} had no pending job", key);
                None
            }
        }
    }
}
