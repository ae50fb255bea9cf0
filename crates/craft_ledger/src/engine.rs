//! Crafting ledger engine
//!
//! Wires ingestion, the tracker, the completion detector, the exploit guard
//! and the credit consumer around one shared ledger. Hosts feed it one batch
//! of raw events per simulation tick, or apply already-normalized events from
//! their own hook threads.

use crate::config::{CraftingConfig, EngineConfig};
use crate::detector::{CompletionDetector, CraftInstance, TickOutcome};
use crate::diagnostics::{Diagnostic, DiagnosticSink, EngineStats, EngineStatsSnapshot, TracingDiagnostics};
use crate::dispatch::{AwardSink, CreditConsumer};
use crate::guard::{ExploitGuard, Retraction};
use crate::ingestion::EventIngestor;
use crate::ledger::JobLedger;
use crate::registry::RecipeRegistry;
use crate::tracker::SpeculativeTracker;
use crate::types::{AwardInstruction, CraftEvent, JobKey, JobLedgerEntry, RawEvent, StationId};
use crate::world::WorldView;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// What applying one event did
#[derive(Debug, Clone, PartialEq)]
pub enum EventEffect {
    Started(JobLedgerEntry),
    Stopped(Option<JobLedgerEntry>),
    Ticked(TickOutcome),
    Relocated(Option<Retraction>),
    Obtained(Option<AwardInstruction>),
    Released(Option<CraftInstance>),
    Disconnected { entries: usize, instances: usize },
}

/// Summary of one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub tick: u64,
    pub applied: usize,
    pub dropped: usize,
    pub credits_validated: usize,
    pub credits_retracted: usize,
    pub awards_dispatched: usize,
}

impl BatchReport {
    fn record(&mut self, effect: &EventEffect) {
        self.applied += 1;
        match effect {
            EventEffect::Ticked(TickOutcome::Validated) => self.credits_validated += 1,
            EventEffect::Relocated(Some(_)) => self.credits_retracted += 1,
            EventEffect::Obtained(Some(_)) => self.awards_dispatched += 1,
            _ => {}
        }
    }
}

pub struct CraftLedgerEngine {
    enabled: bool,
    tick: AtomicU64,
    ledger: Arc<JobLedger>,
    stats: Arc<EngineStats>,
    diagnostics: Arc<dyn DiagnosticSink>,
    ingestor: EventIngestor,
    tracker: SpeculativeTracker,
    detector: CompletionDetector,
    guard: ExploitGuard,
    consumer: CreditConsumer,
}

impl CraftLedgerEngine {
    /// Engine reporting diagnostics through `tracing`
    pub fn new(
        registry: Arc<dyn RecipeRegistry>,
        config: Arc<EngineConfig>,
        world: Arc<dyn WorldView>,
        awards: Arc<dyn AwardSink>,
    ) -> Self {
        Self::with_diagnostics(registry, config, world, awards, Arc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(
        registry: Arc<dyn RecipeRegistry>,
        config: Arc<EngineConfig>,
        world: Arc<dyn WorldView>,
        awards: Arc<dyn AwardSink>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let ledger = Arc::new(JobLedger::new());
        let stats = Arc::new(EngineStats::default());
        let crafting: Arc<dyn CraftingConfig> = config.clone();

        info!(
            "🔨 Crafting ledger engine ready | threshold {} | rate {} | enabled {}",
            config.craft_threshold, config.global_rate_modifier, config.enabled
        );

        Self {
            enabled: config.enabled,
            tick: AtomicU64::new(0),
            ingestor: EventIngestor::new(registry.clone(), world.clone()),
            tracker: SpeculativeTracker::new(ledger.clone(), stats.clone()),
            detector: CompletionDetector::new(
                ledger.clone(),
                registry.clone(),
                crafting,
                diagnostics.clone(),
                stats.clone(),
            ),
            guard: ExploitGuard::new(ledger.clone(), registry.clone(), world, stats.clone()),
            consumer: CreditConsumer::new(
                ledger.clone(),
                registry,
                awards,
                diagnostics.clone(),
                stats.clone(),
                config.base_award_value,
            ),
            ledger,
            stats,
            diagnostics,
        }
    }

    /// Normalize and apply one simulation tick's worth of raw events
    pub fn process_batch(&self, batch: Vec<RawEvent>) -> BatchReport {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = BatchReport { tick, ..Default::default() };

        if !self.enabled {
            debug!("Engine disabled; ignoring {} events for tick {}", batch.len(), tick);
            return report;
        }

        self.stats.add_ingested(batch.len() as u64);
        let ingested = self.ingestor.ingest(batch);

        report.dropped = ingested.dropped.len();
        self.stats.add_dropped(report.dropped as u64);
        for error in &ingested.dropped {
            self.diagnostics.record(Diagnostic::from(error));
        }

        for event in ingested.events {
            let effect = self.apply(event);
            report.record(&effect);
        }

        if report.credits_validated + report.credits_retracted + report.awards_dispatched > 0 {
            debug!(
                "Tick {} | applied {} | validated {} | retracted {} | awarded {}",
                tick, report.applied, report.credits_validated, report.credits_retracted, report.awards_dispatched
            );
        }
        report
    }

    /// Apply a single normalized event. Safe to call from several threads;
    /// events for the same key must arrive in ingestion order.
    pub fn apply(&self, event: CraftEvent) -> EventEffect {
        match event {
            CraftEvent::JobStarted(key) => EventEffect::Started(self.tracker.on_job_started(key)),
            CraftEvent::JobStopped(key) => EventEffect::Stopped(self.tracker.on_job_stopped(key)),
            CraftEvent::JobTicked { key, progress_time } => {
                EventEffect::Ticked(self.detector.on_job_ticked(key, progress_time))
            }
            CraftEvent::ItemRelocated {
                player,
                from_inventory,
                to_inventory,
                item,
            } => EventEffect::Relocated(self.guard.on_item_relocated(player, from_inventory, to_inventory, item)),
            CraftEvent::ItemObtained { player, item } => {
                EventEffect::Obtained(self.consumer.on_item_obtained(player, item))
            }
            CraftEvent::QueueEmptied(station) | CraftEvent::StationRemoved(station) => {
                EventEffect::Released(self.release_station(station))
            }
            CraftEvent::PlayerDisconnected(player) => {
                let entries = self.ledger.clear_player(player);
                let instances = self.detector.release_player(player);
                info!(
                    "👋 Cleared crafting state for {} | {} entries | {} instances",
                    player, entries, instances
                );
                EventEffect::Disconnected { entries, instances }
            }
        }
    }

    fn release_station(&self, station: StationId) -> Option<CraftInstance> {
        let released = self.detector.release(station);
        if let Some(instance) = &released {
            debug!("Released craft slot {} ({:?})", instance.key, instance.state);
        }
        released
    }

    pub fn entry(&self, key: JobKey) -> Option<JobLedgerEntry> {
        self.ledger.entry(key)
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn ingestor(&self) -> &EventIngestor {
        &self.ingestor
    }

    pub fn detector(&self) -> &CompletionDetector {
        &self.detector
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of batches processed so far
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::CraftState;
    use crate::registry::{Recipe, RecipeTable};
    use crate::types::{InventoryId, ItemId, PlayerId, RecipeId};
    use crate::world::StaticWorld;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Awards(Mutex<Vec<AwardInstruction>>);

    impl AwardSink for Awards {
        fn award_credit(&self, award: AwardInstruction) {
            self.0.lock().push(award);
        }
    }

    #[derive(Default)]
    struct Diagnostics(Mutex<Vec<Diagnostic>>);

    impl DiagnosticSink for Diagnostics {
        fn record(&self, diagnostic: Diagnostic) {
            self.0.lock().push(diagnostic);
        }
    }

    const PLAYER: PlayerId = PlayerId(76561198000000001);
    const STATION: StationId = StationId(10);
    const STATION_INV: InventoryId = InventoryId(1000);
    const PLAYER_INV: InventoryId = InventoryId(2000);
    const CHEST_INV: InventoryId = InventoryId(3000);

    fn engine(config: EngineConfig) -> (CraftLedgerEngine, Arc<Awards>, Arc<Diagnostics>) {
        let registry = RecipeTable::from_recipes(vec![Recipe {
            id: RecipeId(-1000),
            name: "Recipe_Ingot_Iron".to_string(),
            nominal_duration: 20.0,
            tier: 2,
            output_item: ItemId(-500),
            profession: Some("Blacksmithing".to_string()),
        }])
        .unwrap();
        let world = StaticWorld::new();
        world.register_station(STATION, [STATION_INV]);
        world.register_player_inventory(PLAYER_INV, PLAYER);
        world.register_inventory(CHEST_INV);

        let awards = Arc::new(Awards::default());
        let diagnostics = Arc::new(Diagnostics::default());
        let engine = CraftLedgerEngine::with_diagnostics(
            Arc::new(registry),
            Arc::new(config),
            Arc::new(world),
            awards.clone(),
            diagnostics.clone(),
        );
        (engine, awards, diagnostics)
    }

    fn key() -> JobKey {
        JobKey::new(PLAYER, STATION, RecipeId(-1000))
    }

    fn started() -> RawEvent {
        RawEvent::JobStarted { player: PLAYER, station: STATION, recipe: RecipeId(-1000) }
    }

    fn ticked(progress_time: f32) -> RawEvent {
        RawEvent::JobTicked {
            player: PLAYER,
            station: STATION,
            recipe: RecipeId(-1000),
            progress_time,
        }
    }

    fn obtained() -> RawEvent {
        RawEvent::ItemObtained { player: PLAYER, item: ItemId(-500), source_inventory: STATION_INV }
    }

    #[test]
    fn test_full_craft_cycle() {
        let (engine, awards, diagnostics) = engine(EngineConfig::default());

        let report = engine.process_batch(vec![ticked(2.0), started()]);
        assert_eq!(report.tick, 1);
        assert_eq!(report.applied, 2);

        let report = engine.process_batch(vec![ticked(19.8)]);
        assert_eq!(report.credits_validated, 1);
        assert_eq!(engine.entry(key()), Some(JobLedgerEntry { pending: 0, validated: 1 }));

        let report = engine.process_batch(vec![obtained(), RawEvent::QueueEmptied { station: STATION }]);
        assert_eq!(report.awards_dispatched, 1);
        assert!(engine.ledger().is_empty());
        assert_eq!(engine.detector().active_instances(), 0);

        assert_eq!(awards.0.lock().len(), 1);
        assert!(diagnostics.0.lock().is_empty());
        assert_eq!(engine.current_tick(), 3);
    }

    #[test]
    fn test_same_tick_pickup_still_awards() {
        let (engine, awards, _) = engine(EngineConfig::default());
        engine.process_batch(vec![started()]);
        engine.process_batch(vec![ticked(19.8)]);

        let report = engine.process_batch(vec![
            obtained(),
            RawEvent::ItemRelocated {
                player: PLAYER,
                from_inventory: STATION_INV,
                to_inventory: PLAYER_INV,
                item: ItemId(-500),
                slot: 0,
            },
        ]);
        assert_eq!(report.credits_retracted, 0);
        assert_eq!(report.awards_dispatched, 1);
        assert_eq!(awards.0.lock().len(), 1);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_dropped_events_are_reported() {
        let (engine, _, diagnostics) = engine(EngineConfig::default());
        let report = engine.process_batch(vec![
            RawEvent::JobStarted { player: PLAYER, station: StationId(99), recipe: RecipeId(-1000) },
            started(),
        ]);

        assert_eq!(report.applied, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(diagnostics.0.lock().len(), 1);

        let stats = engine.stats();
        assert_eq!(stats.events_ingested, 2);
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(stats.jobs_started, 1);
    }

    #[test]
    fn test_disabled_engine_ignores_batches() {
        let config = EngineConfig { enabled: false, ..EngineConfig::default() };
        let (engine, _, _) = engine(config);

        let report = engine.process_batch(vec![started(), ticked(20.0)]);
        assert_eq!(report.tick, 1);
        assert_eq!(report.applied, 0);
        assert!(engine.ledger().is_empty());
        assert_eq!(engine.stats().events_ingested, 0);
    }

    #[test]
    fn test_disconnect_clears_player_state() {
        let (engine, awards, _) = engine(EngineConfig::default());
        engine.process_batch(vec![started(), started(), ticked(10.0)]);
        assert_eq!(engine.detector().instance(STATION).map(|i| i.state), Some(CraftState::InProgress));

        let report = engine.process_batch(vec![RawEvent::PlayerDisconnected { player: PLAYER }]);
        assert_eq!(report.applied, 1);
        assert!(engine.ledger().is_empty());
        assert_eq!(engine.detector().active_instances(), 0);

        engine.process_batch(vec![obtained()]);
        assert!(awards.0.lock().is_empty());
    }

    #[test]
    fn test_apply_reports_effects() {
        let (engine, _, _) = engine(EngineConfig::default());

        assert_eq!(
            engine.apply(CraftEvent::JobStarted(key())),
            EventEffect::Started(JobLedgerEntry { pending: 1, validated: 0 })
        );
        assert_eq!(
            engine.apply(CraftEvent::JobTicked { key: key(), progress_time: 20.0 }),
            EventEffect::Ticked(TickOutcome::Validated)
        );
        let effect = engine.apply(CraftEvent::ItemRelocated {
            player: PLAYER,
            from_inventory: STATION_INV,
            to_inventory: CHEST_INV,
            item: ItemId(-500),
        });
        assert!(matches!(effect, EventEffect::Relocated(Some(_))));

        match engine.apply(CraftEvent::StationRemoved(STATION)) {
            EventEffect::Released(Some(instance)) => assert_eq!(instance.state, CraftState::ThresholdCrossed),
            other => panic!("unexpected effect {:?}", other),
        }
        assert_eq!(engine.apply(CraftEvent::StationRemoved(STATION)), EventEffect::Released(None));
    }
}
