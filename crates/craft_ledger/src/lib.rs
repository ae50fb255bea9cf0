//! Craft Ledger - Crafting Job Ledger & Completion Validation Engine
//!
//! Tracks in-flight crafting jobs per player per workstation and decides
//! when a craft has genuinely completed:
//! - Event ingestion with per-tick ordering and tick deduplication
//! - Speculative job tracking (pending credit)
//! - Completion detection with a debounced threshold state machine
//! - Exploit guard that retracts credit on lateral item moves
//! - Credit consumption gating every progression award
//! - Structured diagnostics for ledger mismatches and dropped events

pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod guard;
pub mod ingestion;
pub mod ledger;
pub mod registry;
pub mod tracker;
pub mod types;
pub mod world;

// Re-export the common surface
pub use crate::types::*;
pub use config::{AwardSettings, CraftingConfig, EngineConfig, StationSettings, DEFAULT_CRAFT_THRESHOLD};
pub use detector::{CompletionDetector, CraftInstance, CraftState, TickOutcome, Transition};
pub use diagnostics::{Diagnostic, DiagnosticSink, EngineStats, EngineStatsSnapshot, Mismatch, TracingDiagnostics};
pub use dispatch::{AwardSink, CreditConsumer, ProgressionGrant, ProgressionSink, QuestProgress, ScaledAwardSink};
pub use engine::{BatchReport, CraftLedgerEngine, EventEffect};
pub use error::{ConfigError, ConfigResult, IngestError, IngestResult, RegistryError, RegistryResult};
pub use guard::{ExploitGuard, Retraction};
pub use ingestion::{EventIngestor, IngestedBatch};
pub use ledger::{JobLedger, Retracted};
pub use registry::{Recipe, RecipeRegistry, RecipeTable};
pub use tracker::SpeculativeTracker;
pub use world::{StaticWorld, WorldView};
