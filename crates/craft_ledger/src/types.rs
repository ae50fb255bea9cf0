// crates/craft_ledger/src/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Platform identity of a player.
    PlayerId(u64)
);
id_newtype!(
    /// Network identity of a crafting workstation.
    StationId(u64)
);
id_newtype!(
    /// Network identity of an inventory container.
    InventoryId(u64)
);
id_newtype!(
    /// Prefab hash of a recipe.
    RecipeId(i32)
);
id_newtype!(
    /// Prefab hash of an item.
    ItemId(i32)
);

/// One class of crafting work a player may have queued at a workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub player: PlayerId,
    pub station: StationId,
    pub recipe: RecipeId,
}

impl JobKey {
    pub fn new(player: PlayerId, station: StationId, recipe: RecipeId) -> Self {
        Self { player, station, recipe }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.player, self.station, self.recipe)
    }
}

/// Outstanding credit for a single [`JobKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLedgerEntry {
    /// Jobs started but not yet threshold-crossed or cancelled.
    pub pending: u32,
    /// Jobs threshold-crossed but not yet consumed by an obtained item.
    pub validated: u32,
}

impl JobLedgerEntry {
    pub fn is_empty(&self) -> bool {
        self.pending == 0 && self.validated == 0
    }
}

// ============================================================================
// Host events
// ============================================================================

/// Events as the host simulation reports them, once per tick, unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    JobStarted {
        player: PlayerId,
        station: StationId,
        recipe: RecipeId,
    },
    JobStopped {
        player: PlayerId,
        station: StationId,
        recipe: RecipeId,
    },
    JobTicked {
        player: PlayerId,
        station: StationId,
        recipe: RecipeId,
        progress_time: f32,
    },
    ItemRelocated {
        player: PlayerId,
        from_inventory: InventoryId,
        to_inventory: InventoryId,
        item: ItemId,
        #[serde(default)]
        slot: u32,
    },
    ItemObtained {
        player: PlayerId,
        item: ItemId,
        source_inventory: InventoryId,
    },
    QueueEmptied {
        station: StationId,
    },
    StationRemoved {
        station: StationId,
    },
    PlayerDisconnected {
        player: PlayerId,
    },
}

impl RawEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::JobStarted { .. } => "job_started",
            RawEvent::JobStopped { .. } => "job_stopped",
            RawEvent::JobTicked { .. } => "job_ticked",
            RawEvent::ItemRelocated { .. } => "item_relocated",
            RawEvent::ItemObtained { .. } => "item_obtained",
            RawEvent::QueueEmptied { .. } => "queue_emptied",
            RawEvent::StationRemoved { .. } => "station_removed",
            RawEvent::PlayerDisconnected { .. } => "player_disconnected",
        }
    }
}

/// Normalized event applied by the engine components.
#[derive(Debug, Clone, PartialEq)]
pub enum CraftEvent {
    JobStopped(JobKey),
    JobStarted(JobKey),
    ItemRelocated {
        player: PlayerId,
        from_inventory: InventoryId,
        to_inventory: InventoryId,
        item: ItemId,
    },
    ItemObtained {
        player: PlayerId,
        item: ItemId,
    },
    JobTicked {
        key: JobKey,
        progress_time: f32,
    },
    QueueEmptied(StationId),
    StationRemoved(StationId),
    PlayerDisconnected(PlayerId),
}

impl CraftEvent {
    /// Position of the event within a tick. Lower ranks apply first.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            CraftEvent::JobStopped(_) => 0,
            CraftEvent::JobStarted(_) => 1,
            CraftEvent::ItemRelocated { .. } => 2,
            CraftEvent::ItemObtained { .. } => 3,
            CraftEvent::JobTicked { .. } => 4,
            CraftEvent::QueueEmptied(_) => 5,
            CraftEvent::StationRemoved(_) => 6,
            CraftEvent::PlayerDisconnected(_) => 7,
        }
    }
}

// ============================================================================
// Awards
// ============================================================================

/// Instruction handed to the progression sink for one consumed credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardInstruction {
    pub player: PlayerId,
    pub station: StationId,
    pub recipe: RecipeId,
    pub item: ItemId,
    pub tier: u8,
    pub profession: Option<String>,
    pub base_value: f32,
}
