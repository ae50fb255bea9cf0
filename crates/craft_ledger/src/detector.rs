//! Completion detector
//!
//! One state machine per workstation's active craft slot. Progress ticks are
//! turned into a ratio of the adjusted craft duration, and the first tick at
//! or above the threshold promotes one pending job to validated credit.
//! Repeated ticks above the threshold do nothing; the slot re-arms only after
//! the ratio falls back below it.

use crate::config::CraftingConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, EngineStats, Mismatch};
use crate::ledger::JobLedger;
use crate::registry::RecipeRegistry;
use crate::types::{JobKey, PlayerId, StationId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle of a craft slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraftState {
    Idle,
    InProgress,
    ThresholdCrossed,
}

/// Result of feeding one ratio into a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle -> InProgress
    Began,
    /// InProgress, still below the threshold
    Progressing,
    /// Entered ThresholdCrossed
    Crossed,
    /// Still ThresholdCrossed
    Holding,
    /// ThresholdCrossed -> InProgress
    Regressed,
}

/// Ephemeral state of the craft occupying a station's active slot
#[derive(Debug, Clone, PartialEq)]
pub struct CraftInstance {
    pub key: JobKey,
    pub state: CraftState,
    pub progress_ratio: f32,
}

impl CraftInstance {
    pub fn new(key: JobKey) -> Self {
        Self {
            key,
            state: CraftState::Idle,
            progress_ratio: 0.0,
        }
    }

    pub fn advance(&mut self, ratio: f32, threshold: f32) -> Transition {
        self.progress_ratio = ratio;
        let reached = ratio >= threshold;

        match (self.state, reached) {
            (CraftState::ThresholdCrossed, true) => Transition::Holding,
            (CraftState::ThresholdCrossed, false) => {
                self.state = CraftState::InProgress;
                Transition::Regressed
            }
            (_, true) => {
                self.state = CraftState::ThresholdCrossed;
                Transition::Crossed
            }
            (CraftState::Idle, false) => {
                self.state = CraftState::InProgress;
                Transition::Began
            }
            (CraftState::InProgress, false) => Transition::Progressing,
        }
    }
}

/// What a progress tick did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick could not be evaluated
    Ignored,
    /// Slot state changed or held without touching the ledger
    Observed(Transition),
    /// Threshold crossed and one pending job became validated
    Validated,
    /// Threshold crossed with nothing pending
    Mismatched,
}

pub struct CompletionDetector {
    instances: DashMap<StationId, CraftInstance>,
    ledger: Arc<JobLedger>,
    registry: Arc<dyn RecipeRegistry>,
    config: Arc<dyn CraftingConfig>,
    diagnostics: Arc<dyn DiagnosticSink>,
    stats: Arc<EngineStats>,
}

impl CompletionDetector {
    pub fn new(
        ledger: Arc<JobLedger>,
        registry: Arc<dyn RecipeRegistry>,
        config: Arc<dyn CraftingConfig>,
        diagnostics: Arc<dyn DiagnosticSink>,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            instances: DashMap::new(),
            ledger,
            registry,
            config,
            diagnostics,
            stats,
        }
    }

    /// `progress_time / (nominal * station reduction / global rate)`
    pub fn progress_ratio(&self, key: JobKey, progress_time: f32) -> Option<f32> {
        let recipe = self.registry.recipe(key.recipe)?;
        let adjusted = recipe.nominal_duration * self.config.station_reduction_factor(key.station)
            / self.config.global_rate_modifier();
        let ratio = progress_time / adjusted;
        (adjusted > 0.0 && ratio.is_finite()).then_some(ratio)
    }

    pub fn on_job_ticked(&self, key: JobKey, progress_time: f32) -> TickOutcome {
        let Some(ratio) = self.progress_ratio(key, progress_time) else {
            warn!("Ignoring tick for {} with progress {}", key, progress_time);
            return TickOutcome::Ignored;
        };
        let threshold = self.config.craft_threshold();

        let transition = {
            let mut slot = self
                .instances
                .entry(key.station)
                .or_insert_with(|| CraftInstance::new(key));
            if slot.key != key {
                // The queue head moved on to another craft.
                debug!("Station {} slot now crafting {}", key.station, key);
                *slot = CraftInstance::new(key);
            }
            slot.advance(ratio, threshold)
        };

        match transition {
            Transition::Crossed => self.validate(key, ratio),
            Transition::Regressed => {
                debug!("Crafting progress reset for {} | ratio {:.3}", key, ratio);
                TickOutcome::Observed(transition)
            }
            other => TickOutcome::Observed(other),
        }
    }

    fn validate(&self, key: JobKey, ratio: f32) -> TickOutcome {
        match self.ledger.promote(key) {
            Some(entry) => {
                self.stats.credit_validated();
                debug!(
                    "Crafting progress finished for {} | ratio {:.3} | pending {} validated {}",
                    key, ratio, entry.pending, entry.validated
                );
                TickOutcome::Validated
            }
            None => {
                self.stats.mismatch();
                self.diagnostics.record(Diagnostic::LedgerMismatch {
                    key,
                    mismatch: Mismatch::ThresholdWithoutPending,
                });
                TickOutcome::Mismatched
            }
        }
    }

    /// Destroy the slot state of a station
    pub fn release(&self, station: StationId) -> Option<CraftInstance> {
        self.instances.remove(&station).map(|(_, instance)| instance)
    }

    /// Destroy every slot whose craft was initiated by the player
    pub fn release_player(&self, player: PlayerId) -> usize {
        let before = self.instances.len();
        self.instances.retain(|_, instance| instance.key.player != player);
        before.saturating_sub(self.instances.len())
    }

    pub fn instance(&self, station: StationId) -> Option<CraftInstance> {
        self.instances.get(&station).map(|r| r.value().clone())
    }

    pub fn active_instances(&self) -> usize {
        self.instances.len()
    }
}
