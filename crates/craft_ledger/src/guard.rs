//! Exploit guard
//!
//! Retracts crafting credit when a recipe output is moved between
//! inventories and either side is a workstation the player holds credit at.
//! Taking an output from a workstation into the mover's own inventory is
//! the normal pickup path and leaves credit alone; the obtained event
//! consumes it. Every other matching lateral move counts as farming.
//! The guard only ever removes credit.

use crate::diagnostics::EngineStats;
use crate::ledger::{JobLedger, Retracted};
use crate::registry::RecipeRegistry;
use crate::types::{InventoryId, ItemId, JobKey, PlayerId};
use crate::world::WorldView;
use std::sync::Arc;
use tracing::{debug, info};

/// Credit removed by a relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retraction {
    pub key: JobKey,
    pub retracted: Retracted,
}

pub struct ExploitGuard {
    ledger: Arc<JobLedger>,
    registry: Arc<dyn RecipeRegistry>,
    world: Arc<dyn WorldView>,
    stats: Arc<EngineStats>,
}

impl ExploitGuard {
    pub fn new(
        ledger: Arc<JobLedger>,
        registry: Arc<dyn RecipeRegistry>,
        world: Arc<dyn WorldView>,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            ledger,
            registry,
            world,
            stats,
        }
    }

    /// Retract at most one unit of credit for the moving player
    pub fn on_item_relocated(
        &self,
        player: PlayerId,
        from_inventory: InventoryId,
        to_inventory: InventoryId,
        item: ItemId,
    ) -> Option<Retraction> {
        if from_inventory == to_inventory {
            return None;
        }

        let recipes = self.registry.recipes_for_item(item);
        if recipes.is_empty() {
            return None;
        }

        if self.is_pickup(player, from_inventory, to_inventory) {
            debug!("{} picked up item {} from a workstation", player, item);
            return None;
        }

        // Destination first, then source.
        let mut stations = Vec::with_capacity(2);
        for inventory in [to_inventory, from_inventory] {
            if let Some(station) = self.world.station_for_inventory(inventory) {
                if !stations.contains(&station) {
                    stations.push(station);
                }
            }
        }

        for station in stations {
            for recipe in recipes {
                let key = JobKey::new(player, station, *recipe);
                if let Some((retracted, entry)) = self.ledger.retract(key) {
                    self.stats.credit_retracted();
                    info!(
                        "🛡️ Crafting credit removed via exploit prevention for {} ({:?}) | pending {} validated {}",
                        key, retracted, entry.pending, entry.validated
                    );
                    return Some(Retraction { key, retracted });
                }
            }
        }

        debug!(
            "Relocation of item {} by {} matched no outstanding credit",
            item, player
        );
        None
    }

    fn is_pickup(&self, player: PlayerId, from_inventory: InventoryId, to_inventory: InventoryId) -> bool {
        self.world.station_for_inventory(from_inventory).is_some()
            && self.world.inventory_owner(to_inventory) == Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Recipe, RecipeTable};
    use crate::types::{JobLedgerEntry, RecipeId, StationId};
    use crate::world::StaticWorld;

    const STATION_INV: InventoryId = InventoryId(100);
    const PLAYER_INV: InventoryId = InventoryId(200);
    const OTHER_PLAYER_INV: InventoryId = InventoryId(201);
    const CHEST_INV: InventoryId = InventoryId(300);

    fn guard() -> (ExploitGuard, Arc<JobLedger>) {
        let ledger = Arc::new(JobLedger::new());
        let registry = RecipeTable::from_recipes(vec![Recipe {
            id: RecipeId(1),
            name: "Recipe_Bracer".to_string(),
            nominal_duration: 10.0,
            tier: 2,
            output_item: ItemId(50),
            profession: Some("Tailoring".to_string()),
        }])
        .unwrap();
        let world = StaticWorld::new();
        world.register_station(StationId(7), [STATION_INV]);
        world.register_player_inventory(PLAYER_INV, PlayerId(1));
        world.register_player_inventory(OTHER_PLAYER_INV, PlayerId(2));
        world.register_inventory(CHEST_INV);

        let guard = ExploitGuard::new(
            ledger.clone(),
            Arc::new(registry),
            Arc::new(world),
            Arc::new(EngineStats::default()),
        );
        (guard, ledger)
    }

    fn key() -> JobKey {
        JobKey::new(PlayerId(1), StationId(7), RecipeId(1))
    }

    #[test]
    fn test_move_into_station_retracts_validated_first() {
        let (guard, ledger) = guard();
        ledger.add_pending(key());
        ledger.add_pending(key());
        ledger.promote(key());

        let retraction = guard
            .on_item_relocated(PlayerId(1), PLAYER_INV, STATION_INV, ItemId(50))
            .unwrap();
        assert_eq!(retraction.retracted, Retracted::Validated);
        assert_eq!(ledger.entry(key()), Some(JobLedgerEntry { pending: 1, validated: 0 }));
    }

    #[test]
    fn test_move_out_of_station_falls_back_to_pending() {
        let (guard, ledger) = guard();
        ledger.add_pending(key());

        let retraction = guard
            .on_item_relocated(PlayerId(1), STATION_INV, CHEST_INV, ItemId(50))
            .unwrap();
        assert_eq!(retraction.retracted, Retracted::Pending);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_pickup_into_own_inventory_keeps_credit() {
        let (guard, ledger) = guard();
        ledger.add_pending(key());
        ledger.promote(key());

        assert_eq!(guard.on_item_relocated(PlayerId(1), STATION_INV, PLAYER_INV, ItemId(50)), None);
        assert_eq!(ledger.entry(key()), Some(JobLedgerEntry { pending: 0, validated: 1 }));

        // Handing the output to someone else's inventory is not a pickup.
        let retraction = guard
            .on_item_relocated(PlayerId(1), STATION_INV, OTHER_PLAYER_INV, ItemId(50))
            .unwrap();
        assert_eq!(retraction.retracted, Retracted::Validated);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_unrelated_moves_are_ignored() {
        let (guard, ledger) = guard();
        ledger.add_pending(key());

        // Neither inventory belongs to a station.
        assert_eq!(guard.on_item_relocated(PlayerId(1), PLAYER_INV, CHEST_INV, ItemId(50)), None);
        // Item is not a recipe output.
        assert_eq!(guard.on_item_relocated(PlayerId(1), PLAYER_INV, STATION_INV, ItemId(51)), None);
        // Another player's credit is untouched.
        assert_eq!(guard.on_item_relocated(PlayerId(2), PLAYER_INV, STATION_INV, ItemId(50)), None);
        // Shuffling within one inventory is not a lateral move.
        assert_eq!(guard.on_item_relocated(PlayerId(1), STATION_INV, STATION_INV, ItemId(50)), None);

        assert_eq!(ledger.entry(key()), Some(JobLedgerEntry { pending: 1, validated: 0 }));
    }

    #[test]
    fn test_guard_never_goes_negative() {
        let (guard, ledger) = guard();
        for _ in 0..5 {
            assert_eq!(guard.on_item_relocated(PlayerId(1), PLAYER_INV, STATION_INV, ItemId(50)), None);
        }
        assert!(ledger.is_empty());
    }
}
