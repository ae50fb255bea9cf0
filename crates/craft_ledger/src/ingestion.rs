//! Event ingestion
//!
//! Translates one tick's unordered batch of host events into the ordered
//! sequence the engine applies. Within a tick:
//! - stops apply before starts, so a same-tick restart cannot swallow a stop
//! - progress ticks apply after every ledger-changing event
//! - a tick that repeats the station's previous reading is dropped; every
//!   other reading is kept in arrival order so no crossing is lost
//!
//! A malformed event is dropped on its own; the rest of the batch proceeds.

use crate::error::{IngestError, IngestResult};
use crate::registry::RecipeRegistry;
use crate::types::{CraftEvent, InventoryId, JobKey, RawEvent, RecipeId, StationId};
use crate::world::WorldView;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ordered events plus the ones that were dropped
#[derive(Debug, Default)]
pub struct IngestedBatch {
    pub events: Vec<CraftEvent>,
    pub dropped: Vec<IngestError>,
}

pub struct EventIngestor {
    registry: Arc<dyn RecipeRegistry>,
    world: Arc<dyn WorldView>,
}

impl EventIngestor {
    pub fn new(registry: Arc<dyn RecipeRegistry>, world: Arc<dyn WorldView>) -> Self {
        Self { registry, world }
    }

    pub fn ingest(&self, batch: impl IntoIterator<Item = RawEvent>) -> IngestedBatch {
        let mut ingested = IngestedBatch::default();
        let mut last_tick: HashMap<StationId, (JobKey, f32)> = HashMap::new();

        for raw in batch {
            match self.translate(raw) {
                Ok(CraftEvent::JobTicked { key, progress_time }) => {
                    if last_tick.insert(key.station, (key, progress_time)) == Some((key, progress_time)) {
                        debug!("Dropping repeated tick for station {}", key.station);
                        continue;
                    }
                    ingested.events.push(CraftEvent::JobTicked { key, progress_time });
                }
                Ok(event) => ingested.events.push(event),
                Err(error) => ingested.dropped.push(error),
            }
        }

        // Stable: arrival order is kept within each class.
        ingested.events.sort_by_key(CraftEvent::rank);
        ingested
    }

    pub fn translate(&self, raw: RawEvent) -> IngestResult<CraftEvent> {
        let kind = raw.kind();
        match raw {
            RawEvent::JobStarted { player, station, recipe } => {
                self.job_key(kind, player, station, recipe).map(CraftEvent::JobStarted)
            }
            RawEvent::JobStopped { player, station, recipe } => {
                self.job_key(kind, player, station, recipe).map(CraftEvent::JobStopped)
            }
            RawEvent::JobTicked {
                player,
                station,
                recipe,
                progress_time,
            } => self
                .job_key(kind, player, station, recipe)
                .map(|key| CraftEvent::JobTicked { key, progress_time }),
            RawEvent::ItemRelocated {
                player,
                from_inventory,
                to_inventory,
                item,
                ..
            } => {
                self.check_inventory(kind, from_inventory)?;
                self.check_inventory(kind, to_inventory)?;
                Ok(CraftEvent::ItemRelocated {
                    player,
                    from_inventory,
                    to_inventory,
                    item,
                })
            }
            RawEvent::ItemObtained {
                player,
                item,
                source_inventory,
            } => {
                self.check_inventory(kind, source_inventory)?;
                Ok(CraftEvent::ItemObtained { player, item })
            }
            RawEvent::QueueEmptied { station } => Ok(CraftEvent::QueueEmptied(station)),
            RawEvent::StationRemoved { station } => Ok(CraftEvent::StationRemoved(station)),
            RawEvent::PlayerDisconnected { player } => Ok(CraftEvent::PlayerDisconnected(player)),
        }
    }

    fn job_key(
        &self,
        kind: &'static str,
        player: crate::types::PlayerId,
        station: StationId,
        recipe: RecipeId,
    ) -> IngestResult<JobKey> {
        if self.registry.recipe(recipe).is_none() {
            return Err(IngestError::UnknownRecipe { kind, recipe });
        }
        if !self.world.station_exists(station) {
            return Err(IngestError::StaleStation { kind, station });
        }
        Ok(JobKey::new(player, station, recipe))
    }

    fn check_inventory(&self, kind: &'static str, inventory: InventoryId) -> IngestResult<()> {
        if self.world.inventory_exists(inventory) {
            Ok(())
        } else {
            Err(IngestError::StaleInventory { kind, inventory })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Recipe, RecipeTable};
    use crate::types::{ItemId, PlayerId};
    use crate::world::StaticWorld;

    fn ingestor() -> EventIngestor {
        let registry = RecipeTable::from_recipes(vec![Recipe {
            id: RecipeId(1),
            name: "Recipe_Plank".to_string(),
            nominal_duration: 5.0,
            tier: 1,
            output_item: ItemId(10),
            profession: Some("Woodworking".to_string()),
        }])
        .unwrap();
        let world = StaticWorld::new();
        world.register_station(StationId(1), [InventoryId(100)]);
        world.register_station(StationId(2), [InventoryId(101)]);
        world.register_inventory(InventoryId(200));
        EventIngestor::new(Arc::new(registry), Arc::new(world))
    }

    fn started(station: u64) -> RawEvent {
        RawEvent::JobStarted {
            player: PlayerId(1),
            station: StationId(station),
            recipe: RecipeId(1),
        }
    }

    fn stopped(station: u64) -> RawEvent {
        RawEvent::JobStopped {
            player: PlayerId(1),
            station: StationId(station),
            recipe: RecipeId(1),
        }
    }

    fn ticked(station: u64, progress_time: f32) -> RawEvent {
        RawEvent::JobTicked {
            player: PlayerId(1),
            station: StationId(station),
            recipe: RecipeId(1),
            progress_time,
        }
    }

    fn key(station: u64) -> JobKey {
        JobKey::new(PlayerId(1), StationId(station), RecipeId(1))
    }

    #[test]
    fn test_orders_stops_starts_then_ticks() {
        let batch = ingestor().ingest(vec![ticked(1, 1.0), started(1), stopped(1), started(2)]);

        assert!(batch.dropped.is_empty());
        assert_eq!(
            batch.events,
            vec![
                CraftEvent::JobStopped(key(1)),
                CraftEvent::JobStarted(key(1)),
                CraftEvent::JobStarted(key(2)),
                CraftEvent::JobTicked { key: key(1), progress_time: 1.0 },
            ]
        );
    }

    #[test]
    fn test_drops_only_repeated_ticks() {
        let batch = ingestor().ingest(vec![ticked(1, 3.0), ticked(2, 2.0), ticked(1, 3.0), ticked(1, 1.0)]);
        assert_eq!(
            batch.events,
            vec![
                CraftEvent::JobTicked { key: key(1), progress_time: 3.0 },
                CraftEvent::JobTicked { key: key(2), progress_time: 2.0 },
                CraftEvent::JobTicked { key: key(1), progress_time: 1.0 },
            ]
        );
    }

    #[test]
    fn test_crossing_then_restart_keeps_both_ticks() {
        let batch = ingestor().ingest(vec![ticked(1, 4.95), ticked(1, 0.25)]);
        assert_eq!(
            batch.events,
            vec![
                CraftEvent::JobTicked { key: key(1), progress_time: 4.95 },
                CraftEvent::JobTicked { key: key(1), progress_time: 0.25 },
            ]
        );
    }

    #[test]
    fn test_bad_events_are_dropped_individually() {
        let batch = ingestor().ingest(vec![
            RawEvent::JobStarted {
                player: PlayerId(1),
                station: StationId(1),
                recipe: RecipeId(999),
            },
            started(3),
            RawEvent::ItemObtained {
                player: PlayerId(1),
                item: ItemId(10),
                source_inventory: InventoryId(404),
            },
            started(1),
        ]);

        assert_eq!(batch.events, vec![CraftEvent::JobStarted(key(1))]);
        assert_eq!(
            batch.dropped,
            vec![
                IngestError::UnknownRecipe { kind: "job_started", recipe: RecipeId(999) },
                IngestError::StaleStation { kind: "job_started", station: StationId(3) },
                IngestError::StaleInventory { kind: "item_obtained", inventory: InventoryId(404) },
            ]
        );
    }

    #[test]
    fn test_relocation_and_lifecycle_events_translate() {
        let batch = ingestor().ingest(vec![
            RawEvent::PlayerDisconnected { player: PlayerId(1) },
            RawEvent::QueueEmptied { station: StationId(9) },
            RawEvent::ItemRelocated {
                player: PlayerId(1),
                from_inventory: InventoryId(100),
                to_inventory: InventoryId(200),
                item: ItemId(10),
                slot: 4,
            },
        ]);

        assert_eq!(
            batch.events,
            vec![
                CraftEvent::ItemRelocated {
                    player: PlayerId(1),
                    from_inventory: InventoryId(100),
                    to_inventory: InventoryId(200),
                    item: ItemId(10),
                },
                CraftEvent::QueueEmptied(StationId(9)),
                CraftEvent::PlayerDisconnected(PlayerId(1)),
            ]
        );
    }
}
