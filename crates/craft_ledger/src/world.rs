//! Host world view
//!
//! The engine never owns entities. It asks the host whether a station or
//! inventory still exists, which workstation an inventory belongs to and
//! which player carries it.

use crate::types::{InventoryId, PlayerId, StationId};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Entity lookups provided by the host simulation
pub trait WorldView: Send + Sync {
    fn station_exists(&self, station: StationId) -> bool;
    fn inventory_exists(&self, inventory: InventoryId) -> bool;
    /// Workstation whose receiving inventory is `inventory`, if any
    fn station_for_inventory(&self, inventory: InventoryId) -> Option<StationId>;
    /// Player whose personal inventory `inventory` is, if any
    fn inventory_owner(&self, inventory: InventoryId) -> Option<PlayerId>;
}

#[derive(Debug, Default)]
struct WorldState {
    stations: HashMap<StationId, Vec<InventoryId>>,
    station_inventories: HashMap<InventoryId, StationId>,
    player_inventories: HashMap<InventoryId, PlayerId>,
    inventories: HashSet<InventoryId>,
}

/// Registry-backed world view for hosts that mirror entity lifetimes
#[derive(Debug, Default)]
pub struct StaticWorld {
    state: RwLock<WorldState>,
}

impl StaticWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workstation together with its inventories
    pub fn register_station(&self, station: StationId, inventories: impl IntoIterator<Item = InventoryId>) {
        let mut state = self.state.write();
        let inventories: Vec<InventoryId> = inventories.into_iter().collect();
        for inventory in &inventories {
            state.station_inventories.insert(*inventory, station);
            state.inventories.insert(*inventory);
        }
        state.stations.entry(station).or_default().extend(inventories);
        debug!("Registered station {}", station);
    }

    /// Register an inventory that belongs to no workstation
    pub fn register_inventory(&self, inventory: InventoryId) {
        self.state.write().inventories.insert(inventory);
    }

    /// Register a player's personal inventory
    pub fn register_player_inventory(&self, inventory: InventoryId, player: PlayerId) {
        let mut state = self.state.write();
        state.player_inventories.insert(inventory, player);
        state.inventories.insert(inventory);
    }

    /// Forget a workstation and its inventories
    pub fn remove_station(&self, station: StationId) -> bool {
        let mut state = self.state.write();
        match state.stations.remove(&station) {
            Some(inventories) => {
                for inventory in inventories {
                    state.station_inventories.remove(&inventory);
                    state.inventories.remove(&inventory);
                }
                debug!("Removed station {}", station);
                true
            }
            None => false,
        }
    }
}

impl WorldView for StaticWorld {
    fn station_exists(&self, station: StationId) -> bool {
        self.state.read().stations.contains_key(&station)
    }

    fn inventory_exists(&self, inventory: InventoryId) -> bool {
        self.state.read().inventories.contains(&inventory)
    }

    fn station_for_inventory(&self, inventory: InventoryId) -> Option<StationId> {
        self.state.read().station_inventories.get(&inventory).copied()
    }

    fn inventory_owner(&self, inventory: InventoryId) -> Option<PlayerId> {
        self.state.read().player_inventories.get(&inventory).copied()
    }
}
