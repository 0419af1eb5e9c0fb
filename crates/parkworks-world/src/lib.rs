//! Parkworks world -- the deterministic theme park simulation model.
//!
//! Everything that must evolve identically on every peer lives here: the
//! logical clock, the seeded RNG, the calendar, climate, tile map, rides,
//! guests and other entities, the park finances and the game-action queue.
//! Nothing in this crate reads the wall clock or performs I/O.
//!
//! # Quick Start
//!
//! ```
//! use parkworks_world::prelude::*;
//!
//! let mut state = SimulationState::demo(42);
//! let mut queue = ActionQueue::new();
//! queue.enqueue(GameAction::new(0, ActionKind::SetParkEntranceFee { fee: 25 }));
//! let results = queue.process_queue(&mut state);
//! assert!(results[0].is_applied());
//!
//! let snapshot = WorldSnapshot::capture(&state);
//! assert_eq!(snapshot.tick, 0);
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod climate;
pub mod coords;
pub mod date;
pub mod entity;
pub mod guest;
pub mod map;
pub mod misc;
pub mod park;
pub mod registry;
pub mod ride;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod vehicle;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {0} does not exist (stale or never allocated)")]
    StaleEntity(entity::EntityId),

    #[error("{0} does not exist")]
    UnknownRide(ride::RideId),

    /// A game action failed validation.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("failed to decode snapshot: {0}")]
    SnapshotDecode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action::{ActionKind, ActionQueue, ActionResult, ActionStatus, GameAction};
    pub use crate::climate::{Climate, ClimateSound, WeatherKind};
    pub use crate::coords::{CoordsXYZ, TileCoords};
    pub use crate::date::GameDate;
    pub use crate::entity::EntityId;
    pub use crate::map::{TileElementKind, TileMap};
    pub use crate::park::{NewsQueue, Park, Research, ScenarioStatus};
    pub use crate::registry::{Entity, EntityData, EntityKind, EntityRegistry};
    pub use crate::ride::{Ride, RideId, RideStatus, RideType};
    pub use crate::rng::ParkRng;
    pub use crate::snapshot::{compare, EntityChange, EntityDiff, FieldDiff, SnapshotDiff, WorldSnapshot};
    pub use crate::state::{PauseFlags, ScreenMode, SimulationState};
    pub use crate::WorldError;
}
