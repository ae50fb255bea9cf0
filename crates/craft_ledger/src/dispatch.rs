//! Credit consumer and award dispatcher
//!
//! An obtained item fires progression only by consuming one unit of
//! validated credit for a recipe that produces it. Items that arrive
//! without validated credit (bought, traded, looted) award nothing.

use crate::config::{AwardSettings, EngineConfig};
use crate::diagnostics::{Diagnostic, DiagnosticSink, EngineStats, Mismatch};
use crate::ledger::JobLedger;
use crate::registry::RecipeRegistry;
use crate::types::{AwardInstruction, ItemId, JobKey, PlayerId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Progression award sink; receives one call per consumed credit
pub trait AwardSink: Send + Sync {
    fn award_credit(&self, award: AwardInstruction);
}

pub struct CreditConsumer {
    ledger: Arc<JobLedger>,
    registry: Arc<dyn RecipeRegistry>,
    sink: Arc<dyn AwardSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    stats: Arc<EngineStats>,
    base_award_value: f32,
}

impl CreditConsumer {
    pub fn new(
        ledger: Arc<JobLedger>,
        registry: Arc<dyn RecipeRegistry>,
        sink: Arc<dyn AwardSink>,
        diagnostics: Arc<dyn DiagnosticSink>,
        stats: Arc<EngineStats>,
        base_award_value: f32,
    ) -> Self {
        Self {
            ledger,
            registry,
            sink,
            diagnostics,
            stats,
            base_award_value,
        }
    }

    /// Consume one validated credit for the item and dispatch its award
    pub fn on_item_obtained(&self, player: PlayerId, item: ItemId) -> Option<AwardInstruction> {
        let producers = self.registry.recipes_for_item(item);
        if producers.is_empty() {
            return None;
        }

        let candidates: Vec<JobKey> = self
            .ledger
            .keys_for_player(player)
            .into_iter()
            .filter(|key| producers.contains(&key.recipe))
            .collect();

        for key in &candidates {
            let Some(recipe) = self.registry.recipe(key.recipe) else {
                continue;
            };
            // The check and the decrement happen under the entry's lock.
            if let Some(entry) = self.ledger.consume(*key) {
                let award = AwardInstruction {
                    player,
                    station: key.station,
                    recipe: key.recipe,
                    item,
                    tier: recipe.tier,
                    profession: recipe.profession.clone(),
                    base_value: self.base_award_value,
                };
                debug!(
                    "Consumed credit for {} | pending {} validated {}",
                    key, entry.pending, entry.validated
                );
                self.stats.award_dispatched();
                self.sink.award_credit(award.clone());
                return Some(award);
            }
        }

        match candidates.first() {
            Some(key) => {
                self.stats.mismatch();
                self.diagnostics.record(Diagnostic::LedgerMismatch {
                    key: *key,
                    mismatch: Mismatch::ConsumeWithoutValidated,
                });
            }
            None => debug!("Item {} obtained by {} without crafting credit", item, player),
        }
        None
    }
}

// ============================================================================
// Reference Progression Sink
// ============================================================================

/// Scaled progression for one profession
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionGrant {
    pub player: PlayerId,
    pub profession: String,
    pub item: ItemId,
    pub value: f32,
}

/// One step of craft quest progress toward an item target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub player: PlayerId,
    pub target: ItemId,
    pub amount: u32,
}

/// Receiver of scaled progression (profession and quest systems)
pub trait ProgressionSink: Send + Sync {
    fn grant(&self, grant: ProgressionGrant);
    fn advance_quest(&self, progress: QuestProgress);
}

/// Scales awards by tier and profession before forwarding them
pub struct ScaledAwardSink<P> {
    settings: AwardSettings,
    progression: P,
}

impl<P: ProgressionSink> ScaledAwardSink<P> {
    pub fn new(settings: AwardSettings, progression: P) -> Self {
        Self { settings, progression }
    }

    pub fn from_config(config: &EngineConfig, progression: P) -> Self {
        Self::new(config.awards.clone(), progression)
    }

    pub fn progression(&self) -> &P {
        &self.progression
    }

    /// Value credited to `profession` for an award
    pub fn scaled_value(&self, award: &AwardInstruction, profession: &str) -> f32 {
        let mut value = award.base_value * self.settings.profession_multiplier;
        if self.settings.tier_scaling {
            value *= f32::from(award.tier.max(1));
        }

        let profession = profession.to_lowercase();
        // Longest matching fragment wins.
        let factor = self
            .settings
            .profession_factors
            .iter()
            .filter(|(fragment, _)| profession.contains(fragment.to_lowercase().as_str()))
            .max_by_key(|(fragment, _)| fragment.len())
            .map(|(_, factor)| *factor)
            .unwrap_or(1.0);

        value * factor
    }
}

impl<P: ProgressionSink> AwardSink for ScaledAwardSink<P> {
    fn award_credit(&self, award: AwardInstruction) {
        if self.settings.quests {
            info!("📜 {} advances craft quests for item {}", award.player, award.item);
            self.progression.advance_quest(QuestProgress {
                player: award.player,
                target: award.item,
                amount: 1,
            });
        }

        if !self.settings.professions {
            return;
        }
        let Some(profession) = award.profession.as_deref() else {
            debug!("Recipe {} has no profession; nothing to grant", award.recipe);
            return;
        };

        let value = self.scaled_value(&award, profession);
        info!("⚒️ {} gains {:.1} {} from item {}", award.player, value, profession, award.item);
        self.progression.grant(ProgressionGrant {
            player: award.player,
            profession: profession.to_string(),
            item: award.item,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Recipe, RecipeTable};
    use crate::types::{RecipeId, StationId};
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

    #[derive(Default)]
    struct Grants {
        grants: Mutex<Vec<ProgressionGrant>>,
        quests: Mutex<Vec<QuestProgress>>,
    }

    impl ProgressionSink for Grants {
        fn grant(&self, grant: ProgressionGrant) {
            self.grants.lock().push(grant);
        }

        fn advance_quest(&self, progress: QuestProgress) {
            self.quests.lock().push(progress);
        }
    }

    fn registry() -> Arc<RecipeTable> {
        Arc::new(
            RecipeTable::from_recipes(vec![Recipe {
                id: RecipeId(1),
                name: "Recipe_Potion".to_string(),
                nominal_duration: 10.0,
                tier: 3,
                output_item: ItemId(90),
                profession: Some("Alchemy".to_string()),
            }])
            .unwrap(),
        )
    }

    fn consumer() -> (CreditConsumer, Arc<JobLedger>, Arc<Awards>, Arc<Diagnostics>) {
        let ledger = Arc::new(JobLedger::new());
        let awards = Arc::new(Awards::default());
        let diagnostics = Arc::new(Diagnostics::default());
        let consumer = CreditConsumer::new(
            ledger.clone(),
            registry(),
            awards.clone(),
            diagnostics.clone(),
            Arc::new(EngineStats::default()),
            50.0,
        );
        (consumer, ledger, awards, diagnostics)
    }

    fn key(station: u64) -> JobKey {
        JobKey::new(PlayerId(1), StationId(station), RecipeId(1))
    }

    #[test]
    fn test_validated_credit_fires_one_award() {
        let (consumer, ledger, awards, diagnostics) = consumer();
        ledger.add_pending(key(4));
        ledger.promote(key(4));

        let award = consumer.on_item_obtained(PlayerId(1), ItemId(90)).unwrap();
        assert_eq!(award.station, StationId(4));
        assert_eq!(award.tier, 3);
        assert_eq!(award.base_value, 50.0);
        assert!(ledger.is_empty());

        assert_eq!(consumer.on_item_obtained(PlayerId(1), ItemId(90)), None);
        assert_eq!(awards.0.lock().len(), 1);
        assert!(diagnostics.0.lock().is_empty());
    }

    #[test]
    fn test_pending_only_records_mismatch() {
        let (consumer, ledger, awards, diagnostics) = consumer();
        ledger.add_pending(key(4));

        assert_eq!(consumer.on_item_obtained(PlayerId(1), ItemId(90)), None);
        assert!(awards.0.lock().is_empty());
        assert_eq!(
            diagnostics.0.lock().as_slice(),
            &[Diagnostic::LedgerMismatch {
                key: key(4),
                mismatch: Mismatch::ConsumeWithoutValidated,
            }]
        );
    }

    #[test]
    fn test_untracked_item_is_silent() {
        let (consumer, _, awards, diagnostics) = consumer();
        assert_eq!(consumer.on_item_obtained(PlayerId(1), ItemId(90)), None);
        assert_eq!(consumer.on_item_obtained(PlayerId(1), ItemId(12345)), None);
        assert!(awards.0.lock().is_empty());
        assert!(diagnostics.0.lock().is_empty());
    }

    #[test]
    fn test_consumes_from_any_station() {
        let (consumer, ledger, _, _) = consumer();
        ledger.add_pending(key(4));
        ledger.add_pending(key(9));
        ledger.promote(key(9));

        let award = consumer.on_item_obtained(PlayerId(1), ItemId(90)).unwrap();
        assert_eq!(award.station, StationId(9));
        assert_eq!(ledger.entry(key(4)).map(|e| e.pending), Some(1));
    }

    #[test]
    fn test_scaled_sink_applies_tier_and_profession_factor() {
        let sink = ScaledAwardSink::new(AwardSettings::default(), Grants::default());
        sink.award_credit(AwardInstruction {
            player: PlayerId(1),
            station: StationId(4),
            recipe: RecipeId(1),
            item: ItemId(90),
            tier: 3,
            profession: Some("Alchemy".to_string()),
            base_value: 50.0,
        });

        let grants = sink.progression().grants.lock();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].profession, "Alchemy");
        assert_eq!(grants[0].value, 450.0);
        assert_eq!(
            sink.progression().quests.lock().as_slice(),
            &[QuestProgress { player: PlayerId(1), target: ItemId(90), amount: 1 }]
        );
    }

    #[test]
    fn test_recipes_without_profession_still_advance_quests() {
        let mut settings = AwardSettings::default();
        settings.tier_scaling = false;
        let sink = ScaledAwardSink::new(settings, Grants::default());
        let mut award = AwardInstruction {
            player: PlayerId(1),
            station: StationId(4),
            recipe: RecipeId(1),
            item: ItemId(90),
            tier: 5,
            profession: None,
            base_value: 50.0,
        };
        sink.award_credit(award.clone());
        sink.award_credit(award.clone());
        assert!(sink.progression().grants.lock().is_empty());
        assert_eq!(sink.progression().quests.lock().len(), 2);

        award.profession = Some("Blacksmithing".to_string());
        assert_eq!(sink.scaled_value(&award, "Blacksmithing"), 50.0);
    }

    #[test]
    fn test_forwards_can_be_switched_off() {
        let award = AwardInstruction {
            player: PlayerId(1),
            station: StationId(4),
            recipe: RecipeId(1),
            item: ItemId(90),
            tier: 1,
            profession: Some("Alchemy".to_string()),
            base_value: 50.0,
        };

        let settings = AwardSettings { quests: false, ..AwardSettings::default() };
        let sink = ScaledAwardSink::new(settings, Grants::default());
        sink.award_credit(award.clone());
        assert_eq!(sink.progression().grants.lock().len(), 1);
        assert!(sink.progression().quests.lock().is_empty());

        let settings = AwardSettings { professions: false, ..AwardSettings::default() };
        let sink = ScaledAwardSink::new(settings, Grants::default());
        sink.award_credit(award);
        assert!(sink.progression().grants.lock().is_empty());
        assert_eq!(sink.progression().quests.lock().len(), 1);
    }
}
