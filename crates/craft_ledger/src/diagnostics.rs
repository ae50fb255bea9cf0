//! Diagnostics and statistics
//!
//! Mismatches and dropped events are never surfaced to players. They are
//! recorded here for offline exploit and bug analysis.

use crate::error::IngestError;
use crate::types::JobKey;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Which credit a state transition expected but did not find
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mismatch {
    /// Threshold crossed while the job had no pending credit
    ThresholdWithoutPending,
    /// Item obtained while the job had no validated credit
    ConsumeWithoutValidated,
}

/// Structured diagnostic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    EventDropped {
        event: String,
        reason: String,
    },
    LedgerMismatch {
        key: JobKey,
        mismatch: Mismatch,
    },
}

impl From<&IngestError> for Diagnostic {
    fn from(error: &IngestError) -> Self {
        Diagnostic::EventDropped {
            event: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

/// Receiver of diagnostic records
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Emits every record as a structured `warn!` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, diagnostic: Diagnostic) {
        let record = serde_json::to_string(&diagnostic).unwrap_or_else(|_| format!("{:?}", diagnostic));
        match &diagnostic {
            Diagnostic::EventDropped { event, .. } => {
                warn!(target: "craft_ledger::diagnostics", event = %event, %record, "event dropped");
            }
            Diagnostic::LedgerMismatch { key, mismatch } => {
                warn!(target: "craft_ledger::diagnostics", key = %key, ?mismatch, %record, "ledger mismatch");
            }
        }
    }
}

// ============================================================================
// Engine Statistics
// ============================================================================

/// Running counters shared by every engine component
#[derive(Debug, Default)]
pub struct EngineStats {
    events_ingested: AtomicU64,
    events_dropped: AtomicU64,
    jobs_started: AtomicU64,
    jobs_stopped: AtomicU64,
    credits_validated: AtomicU64,
    credits_retracted: AtomicU64,
    awards_dispatched: AtomicU64,
    mismatches: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatsSnapshot {
    pub events_ingested: u64,
    pub events_dropped: u64,
    pub jobs_started: u64,
    pub jobs_stopped: u64,
    pub credits_validated: u64,
    pub credits_retracted: u64,
    pub awards_dispatched: u64,
    pub mismatches: u64,
}

impl EngineStats {
    pub(crate) fn add_ingested(&self, n: u64) {
        self.events_ingested.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_dropped(&self, n: u64) {
        self.events_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn job_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_stopped(&self) {
        self.jobs_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn credit_validated(&self) {
        self.credits_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn credit_retracted(&self) {
        self.credits_retracted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn award_dispatched(&self) {
        self.awards_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mismatch(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_stopped: self.jobs_stopped.load(Ordering::Relaxed),
            credits_validated: self.credits_validated.load(Ordering::Relaxed),
            credits_retracted: self.credits_retracted.load(Ordering::Relaxed),
            awards_dispatched: self.awards_dispatched.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Relaxed),
        }
    }
}
