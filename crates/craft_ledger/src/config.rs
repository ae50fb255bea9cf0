//! Engine configuration
//!
//! Supplies the station reduction factors, server craft rate and completion
//! threshold the detector needs, along with the base award value and the
//! settings of the reference award sink.

use crate::error::{ConfigError, ConfigResult};
use crate::types::StationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default fraction of the adjusted craft duration that counts as done
pub const DEFAULT_CRAFT_THRESHOLD: f32 = 0.975;

/// Configuration queries used by the completion detector
pub trait CraftingConfig: Send + Sync {
    fn station_reduction_factor(&self, station: StationId) -> f32;
    fn global_rate_modifier(&self) -> f32;
    fn craft_threshold(&self) -> f32;
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f32 {
    DEFAULT_CRAFT_THRESHOLD
}

fn default_one() -> f32 {
    1.0
}

fn default_matching_floor_reduction() -> f32 {
    0.75
}

fn default_base_award_value() -> f32 {
    50.0
}

fn default_profession_factors() -> HashMap<String, f32> {
    HashMap::from([("alchemy".to_string(), 3.0)])
}

/// Per-station overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSettings {
    pub id: StationId,
    /// Station sits on its matching floor and crafts faster
    #[serde(default)]
    pub matching_floor: bool,
    /// Explicit factor; wins over `matching_floor`
    #[serde(default)]
    pub reduction_factor: Option<f32>,
}

/// Settings for the reference award sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardSettings {
    /// Forward scaled profession grants
    #[serde(default = "default_true")]
    pub professions: bool,
    /// Advance craft quests by one per consumed credit
    #[serde(default = "default_true")]
    pub quests: bool,
    #[serde(default = "default_one")]
    pub profession_multiplier: f32,
    #[serde(default = "default_true")]
    pub tier_scaling: bool,
    /// Extra factor keyed by a lowercase fragment of the profession name
    #[serde(default = "default_profession_factors")]
    pub profession_factors: HashMap<String, f32>,
}

impl Default for AwardSettings {
    fn default() -> Self {
        Self {
            professions: true,
            quests: true,
            profession_multiplier: 1.0,
            tier_scaling: true,
            profession_factors: default_profession_factors(),
        }
    }
}

/// Engine configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub craft_threshold: f32,
    /// Server-wide craft rate; higher values shorten crafts
    #[serde(default = "default_one")]
    pub global_rate_modifier: f32,
    #[serde(default = "default_one")]
    pub default_reduction_factor: f32,
    #[serde(default = "default_matching_floor_reduction")]
    pub matching_floor_reduction: f32,
    #[serde(default = "default_base_award_value")]
    pub base_award_value: f32,
    #[serde(default)]
    pub stations: Vec<StationSettings>,
    #[serde(default)]
    pub awards: AwardSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            craft_threshold: DEFAULT_CRAFT_THRESHOLD,
            global_rate_modifier: 1.0,
            default_reduction_factor: 1.0,
            matching_floor_reduction: default_matching_floor_reduction(),
            base_award_value: default_base_award_value(),
            stations: Vec::new(),
            awards: AwardSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.craft_threshold > 0.0 && self.craft_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.craft_threshold));
        }
        if !(self.global_rate_modifier > 0.0) || !self.global_rate_modifier.is_finite() {
            return Err(ConfigError::InvalidRateModifier(self.global_rate_modifier));
        }
        if !(self.default_reduction_factor > 0.0) || !self.default_reduction_factor.is_finite() {
            return Err(ConfigError::InvalidReductionFactor {
                scope: "default".to_string(),
                factor: self.default_reduction_factor,
            });
        }
        if !(self.matching_floor_reduction > 0.0) || !self.matching_floor_reduction.is_finite() {
            return Err(ConfigError::InvalidReductionFactor {
                scope: "matching floor".to_string(),
                factor: self.matching_floor_reduction,
            });
        }
        for station in &self.stations {
            if let Some(factor) = station.reduction_factor {
                if !(factor > 0.0) || !factor.is_finite() {
                    return Err(ConfigError::InvalidReductionFactor {
                        scope: format!("station {}", station.id),
                        factor,
                    });
                }
            }
        }
        if !(self.base_award_value >= 0.0) || !self.base_award_value.is_finite() {
            return Err(ConfigError::InvalidBaseAward(self.base_award_value));
        }
        Ok(())
    }

    fn station(&self, station: StationId) -> Option<&StationSettings> {
        self.stations.iter().find(|s| s.id == station)
    }
}

impl CraftingConfig for EngineConfig {
    fn station_reduction_factor(&self, station: StationId) -> f32 {
        match self.station(station) {
            Some(StationSettings { reduction_factor: Some(factor), .. }) => *factor,
            Some(StationSettings { matching_floor: true, .. }) => self.matching_floor_reduction,
            _ => self.default_reduction_factor,
        }
    }

    fn global_rate_modifier(&self) -> f32 {
        self.global_rate_modifier
    }

    fn craft_threshold(&self) -> f32 {
        self.craft_threshold
    }
}
