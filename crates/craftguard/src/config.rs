//! Configuration management for the craftguard replay harness.
//!
//! Loads the engine settings, the mirrored world layout, logging and replay
//! options from a single TOML file.

use craft_ledger::{EngineConfig, InventoryId, PlayerId, StaticWorld, StationId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default tick pacing for serde deserialization
fn default_tick_interval() -> u64 {
    0 // replay as fast as possible
}

fn default_level() -> String {
    "info".to_string()
}

fn default_recipes_path() -> String {
    "recipes.json".to_string()
}

fn default_events_path() -> String {
    "events.jsonl".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crafting ledger engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Stations and inventories known to the replayed world
    #[serde(default)]
    pub world: WorldSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Input files and pacing
    #[serde(default)]
    pub replay: ReplaySettings,
}

/// One workstation and the inventories it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationLayout {
    pub id: StationId,
    #[serde(default)]
    pub inventories: Vec<InventoryId>,
}

/// A player's personal inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInventory {
    pub player: PlayerId,
    pub inventory: InventoryId,
}

/// Mirror of the host's entities for the replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    #[serde(default)]
    pub stations: Vec<StationLayout>,
    #[serde(default)]
    pub player_inventories: Vec<PlayerInventory>,
    /// Inventories owned by neither a workstation nor a player (chests)
    #[serde(default)]
    pub inventories: Vec<InventoryId>,
}

impl WorldSettings {
    pub fn build(&self) -> StaticWorld {
        let world = StaticWorld::new();
        for station in &self.stations {
            world.register_station(station.id, station.inventories.iter().copied());
        }
        for owned in &self.player_inventories {
            world.register_player_inventory(owned.inventory, owned.player);
        }
        for inventory in &self.inventories {
            world.register_inventory(*inventory);
        }
        world
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_format: false,
        }
    }
}

/// Replay inputs and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// Recipe table (JSON array of recipes)
    #[serde(default = "default_recipes_path")]
    pub recipes_path: String,
    /// Event batches, one JSON object per line
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Delay between ticks in milliseconds (0 to disable pacing)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            recipes_path: default_recipes_path(),
            events_path: default_events_path(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn recipes_path(&self) -> PathBuf {
        PathBuf::from(&self.replay.recipes_path)
    }

    pub fn events_path(&self) -> PathBuf {
        PathBuf::from(&self.replay.events_path)
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        self.engine.validate().map_err(|e| e.to_string())?;

        let mut stations = HashSet::new();
        let mut inventories = HashSet::new();
        for station in &self.world.stations {
            if !stations.insert(station.id) {
                return Err(format!("Duplicate station id: {}", station.id));
            }
            for inventory in &station.inventories {
                if !inventories.insert(*inventory) {
                    return Err(format!("Inventory {} is listed more than once", inventory));
                }
            }
        }
        let owned = self.world.player_inventories.iter().map(|owned| &owned.inventory);
        for inventory in owned.chain(&self.world.inventories) {
            if !inventories.insert(*inventory) {
                return Err(format!("Inventory {} is listed more than once", inventory));
            }
        }

        if self.replay.recipes_path.is_empty() {
            return Err("Recipe table path cannot be empty".to_string());
        }
        if self.replay.events_path.is_empty() {
            return Err("Event file path cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
