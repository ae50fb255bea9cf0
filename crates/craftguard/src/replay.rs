//! Event replay
//!
//! Reads recorded per-tick batches of raw host events and feeds them through
//! the engine, tallying what the reference progression sink was granted.

use anyhow::Context;
use craft_ledger::{
    BatchReport, CraftLedgerEngine, EngineStatsSnapshot, ItemId, PlayerId, ProgressionGrant, ProgressionSink,
    QuestProgress, RawEvent,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// One recorded simulation tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickBatch {
    /// Host tick number, informational only
    #[serde(default)]
    pub tick: Option<u64>,
    pub events: Vec<RawEvent>,
}

/// Parse JSON lines of tick batches; blank lines are skipped
pub fn parse_batches(content: &str) -> anyhow::Result<Vec<TickBatch>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid event batch on line {}", index + 1))
        })
        .collect()
}

// ============================================================================
// Progression Tally
// ============================================================================

/// Total progression granted to one player in one profession
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionTotal {
    pub player: PlayerId,
    pub profession: String,
    pub grants: u32,
    pub value: f32,
}

/// Craft quest progress of one player toward one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestTotal {
    pub player: PlayerId,
    pub target: ItemId,
    pub progress: u32,
}

/// Progression sink that sums grants per player and profession, and quest
/// progress per player and target item
#[derive(Debug, Default)]
pub struct TallyProgression {
    totals: Mutex<BTreeMap<(PlayerId, String), (u32, f32)>>,
    quests: Mutex<BTreeMap<(PlayerId, ItemId), u32>>,
}

impl TallyProgression {
    pub fn totals(&self) -> Vec<ProgressionTotal> {
        self.totals
            .lock()
            .iter()
            .map(|((player, profession), (grants, value))| ProgressionTotal {
                player: *player,
                profession: profession.clone(),
                grants: *grants,
                value: *value,
            })
            .collect()
    }

    pub fn quest_totals(&self) -> Vec<QuestTotal> {
        self.quests
            .lock()
            .iter()
            .map(|((player, target), progress)| QuestTotal {
                player: *player,
                target: *target,
                progress: *progress,
            })
            .collect()
    }
}

impl ProgressionSink for TallyProgression {
    fn grant(&self, grant: ProgressionGrant) {
        let mut totals = self.totals.lock();
        let total = totals.entry((grant.player, grant.profession)).or_default();
        total.0 += 1;
        total.1 += grant.value;
    }

    fn advance_quest(&self, progress: QuestProgress) {
        *self.quests.lock().entry((progress.player, progress.target)).or_default() += progress.amount;
    }
}

// ============================================================================
// Replay Loop
// ============================================================================

/// Accumulated batch reports of a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub ticks: u64,
    pub applied: usize,
    pub dropped: usize,
    pub credits_validated: usize,
    pub credits_retracted: usize,
    pub awards_dispatched: usize,
    pub interrupted: bool,
    pub stats: EngineStatsSnapshot,
}

impl ReplaySummary {
    fn absorb(&mut self, report: &BatchReport) {
        self.ticks += 1;
        self.applied += report.applied;
        self.dropped += report.dropped;
        self.credits_validated += report.credits_validated;
        self.credits_retracted += report.credits_retracted;
        self.awards_dispatched += report.awards_dispatched;
    }
}

/// Feed every batch through the engine, pacing ticks when `tick_interval_ms`
/// is non-zero. A paced replay stops early once `shutdown` resolves.
pub async fn replay<F>(
    engine: &CraftLedgerEngine,
    batches: Vec<TickBatch>,
    tick_interval_ms: u64,
    shutdown: F,
) -> ReplaySummary
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = ReplaySummary::default();
    let mut interval =
        (tick_interval_ms > 0).then(|| tokio::time::interval(Duration::from_millis(tick_interval_ms)));

    for batch in batches {
        if let Some(interval) = interval.as_mut() {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("🛑 Replay interrupted after {} ticks", summary.ticks);
                    summary.interrupted = true;
                    break;
                }
                _ = interval.tick() => {}
            }
        }

        let host_tick = batch.tick;
        let report = engine.process_batch(batch.events);
        if let Some(host_tick) = host_tick {
            debug!("Host tick {} replayed as engine tick {}", host_tick, report.tick);
        }
        summary.absorb(&report);
    }

    summary.stats = engine.stats();
    summary
}
