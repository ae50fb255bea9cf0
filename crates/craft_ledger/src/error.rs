//! Error types for the crafting ledger

use crate::types::{InventoryId, RecipeId, StationId};
use thiserror::Error;

/// Reasons a single raw event is dropped during ingestion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("{kind} references unknown recipe {recipe}")]
    UnknownRecipe { kind: &'static str, recipe: RecipeId },

    #[error("{kind} references stale station {station}")]
    StaleStation { kind: &'static str, station: StationId },

    #[error("{kind} references stale inventory {inventory}")]
    StaleInventory { kind: &'static str, inventory: InventoryId },
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnknownRecipe { kind, .. }
            | IngestError::StaleStation { kind, .. }
            | IngestError::StaleInventory { kind, .. } => kind,
        }
    }
}

/// Recipe table loading errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to deserialize recipe table: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Duplicate recipe: {0}")]
    DuplicateRecipe(RecipeId),

    #[error("Invalid craft duration for recipe {recipe}: {duration} (must be > 0)")]
    InvalidDuration { recipe: RecipeId, duration: f32 },

    #[error("Invalid tier for recipe {0} (must be >= 1)")]
    InvalidTier(RecipeId),
}

/// Engine configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Craft threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("Global rate modifier must be > 0, got {0}")]
    InvalidRateModifier(f32),

    #[error("Reduction factor for {scope} must be > 0, got {factor}")]
    InvalidReductionFactor { scope: String, factor: f32 },

    #[error("Base award value must be >= 0, got {0}")]
    InvalidBaseAward(f32),
}

pub type IngestResult<T> = Result<T, IngestError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
