//! Recipe registry
//!
//! Read-only lookup of recipe durations, tiers and outputs, plus the reverse
//! index from output item to the recipes that produce it.

use crate::error::{RegistryError, RegistryResult};
use crate::types::{ItemId, RecipeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Crafting recipe definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    #[serde(default)]
    pub name: String,
    /// Craft duration in seconds before station and server modifiers.
    pub nominal_duration: f32,
    #[serde(default = "default_tier")]
    pub tier: u8,
    pub output_item: ItemId,
    /// Profession credited when the output is obtained.
    #[serde(default)]
    pub profession: Option<String>,
}

fn default_tier() -> u8 {
    1
}

/// Source of recipe data for the engine
pub trait RecipeRegistry: Send + Sync {
    fn recipe(&self, id: RecipeId) -> Option<&Recipe>;

    /// Recipes whose output is `item`, ordered by recipe id.
    fn recipes_for_item(&self, item: ItemId) -> &[RecipeId];
}

/// In-memory recipe table
#[derive(Debug, Default, Clone)]
pub struct RecipeTable {
    recipes: HashMap<RecipeId, Recipe>,
    by_output: HashMap<ItemId, Vec<RecipeId>>,
}

impl RecipeTable {
    /// Build a table, rejecting invalid or duplicate recipes
    pub fn from_recipes(recipes: impl IntoIterator<Item = Recipe>) -> RegistryResult<Self> {
        let mut table = Self::default();

        for recipe in recipes {
            if !recipe.nominal_duration.is_finite() || recipe.nominal_duration <= 0.0 {
                return Err(RegistryError::InvalidDuration {
                    recipe: recipe.id,
                    duration: recipe.nominal_duration,
                });
            }
            if recipe.tier == 0 {
                return Err(RegistryError::InvalidTier(recipe.id));
            }
            if table.recipes.contains_key(&recipe.id) {
                return Err(RegistryError::DuplicateRecipe(recipe.id));
            }

            debug!("Loaded recipe {} ({}) -> item {}", recipe.id, recipe.name, recipe.output_item);
            table.by_output.entry(recipe.output_item).or_default().push(recipe.id);
            table.recipes.insert(recipe.id, recipe);
        }

        for producers in table.by_output.values_mut() {
            producers.sort();
        }

        Ok(table)
    }

    /// Parse a JSON array of recipes
    pub fn from_json_str(json: &str) -> RegistryResult<Self> {
        let recipes: Vec<Recipe> = serde_json::from_str(json)?;
        let table = Self::from_recipes(recipes)?;
        info!("📋 Recipe table ready with {} recipes", table.len());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl RecipeRegistry for RecipeTable {
    fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    fn recipes_for_item(&self, item: ItemId) -> &[RecipeId] {
        self.by_output.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }
}
