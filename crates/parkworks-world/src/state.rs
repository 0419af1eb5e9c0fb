//! The simulation state object.
//!
//! Everything the deterministic simulation reads or writes lives in one
//! [`SimulationState`]. It is owned by the engine's game state and handed by
//! reference to each subsystem update; loading a park replaces it wholesale.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::climate::Climate;
use crate::coords::{CoordsXYZ, TileCoords};
use crate::date::GameDate;
use crate::guest::Guest;
use crate::map::{TileElementKind, TileMap};
use crate::misc::Duck;
use crate::park::{NewsQueue, Park, Research};
use crate::registry::{EntityData, EntityRegistry};
use crate::ride::{Ride, RideId, RideStatus, RideType};
use crate::rng::ParkRng;
use crate::vehicle;

/// Default map edge length in tiles.
pub const DEFAULT_MAP_SIZE: i32 = 64;

bitflags! {
    /// Reasons the game is paused. The game is paused while any flag is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PauseFlags: u8 {
        /// The player pressed pause.
        const NORMAL = 1 << 0;
        /// A modal window is open.
        const MODAL = 1 << 1;
        /// A save is in progress.
        const SAVING = 1 << 2;
    }
}

/// What the host is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenMode {
    #[default]
    Playing,
    TitleDemo,
    ScenarioEditor,
    TrackDesigner,
    TrackManager,
}

impl ScreenMode {
    /// Modes in which autosaving makes no sense.
    pub fn suppresses_autosave(self) -> bool {
        matches!(
            self,
            ScreenMode::TitleDemo | ScreenMode::TrackDesigner | ScreenMode::TrackManager
        )
    }
}

/// The complete deterministic world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    /// The logical clock. Advanced by exactly one per simulation step.
    pub current_ticks: u32,
    /// The only source of randomness the simulation may use.
    pub rng: ParkRng,
    /// Calendar position.
    pub date: GameDate,
    /// Weather and temperature.
    pub climate: Climate,
    /// Footpaths, track and scenery.
    pub map: TileMap,
    /// Built rides, in id order.
    pub rides: BTreeMap<RideId, Ride>,
    /// Id the next built ride receives.
    pub next_ride_id: u16,
    /// Ride whose ratings are measured next. Ratings advance one ride per tick.
    pub ride_ratings_cursor: Option<RideId>,
    /// Guests, vehicles and loose sprites.
    pub entities: EntityRegistry,
    /// Finances and scenario progress.
    pub park: Park,
    /// Ride research.
    pub research: Research,
    /// The news ticker.
    pub news: NewsQueue,
    /// Pause is a host concern and never part of a snapshot.
    #[serde(skip)]
    pub pause_flags: PauseFlags,
}

impl SimulationState {
    /// An empty park seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            current_ticks: 0,
            rng: ParkRng::from_seed(seed),
            date: GameDate::default(),
            climate: Climate::default(),
            map: TileMap::new(DEFAULT_MAP_SIZE),
            rides: BTreeMap::new(),
            next_ride_id: 0,
            ride_ratings_cursor: None,
            entities: EntityRegistry::new(),
            park: Park::default(),
            research: Research::default(),
            news: NewsQueue::default(),
            pause_flags: PauseFlags::empty(),
        }
    }

    /// A small working park: an entrance, a footpath loop, two open rides, a
    /// fountain, a duck and a few guests.
    pub fn demo(seed: u64) -> Self {
        let mut state = Self::new(seed);
        state.park.name = String::from("Demo Park");

        let entrance = TileCoords::new(2, 8);
        state.map.place(entrance, TileElementKind::Entrance, false);
        for x in 2..=12 {
            state.map.place(TileCoords::new(x, 8), TileElementKind::Footpath, false);
            state.map.place(TileCoords::new(x, 12), TileElementKind::Footpath, false);
        }
        for y in 9..12 {
            state.map.place(TileCoords::new(12, y), TileElementKind::Footpath, false);
        }
        state
            .map
            .place(TileCoords::new(6, 10), TileElementKind::AnimatedScenery, false);

        let carousel = vec![
            TileCoords::new(4, 6),
            TileCoords::new(5, 6),
            TileCoords::new(5, 5),
            TileCoords::new(4, 5),
        ];
        let wheel = vec![TileCoords::new(8, 5), TileCoords::new(8, 4), TileCoords::new(9, 4)];
        for (ride_type, track, price) in [
            (RideType::Carousel, carousel, 20),
            (RideType::FerrisWheel, wheel, 15),
        ] {
            let id = RideId(state.next_ride_id);
            state.next_ride_id += 1;
            let mut ride = Ride::new(id, ride_type, track);
            ride.price = price;
            ride.set_status(RideStatus::Open);
            ride.measurement.complete = true;
            for tile in &ride.track {
                state.map.place(*tile, TileElementKind::Track { ride: id }, false);
            }
            vehicle::spawn_trains(&mut state.entities, &ride);
            state.rides.insert(id, ride);
        }

        for _ in 0..6 {
            state
                .entities
                .spawn(entrance.centre(), EntityData::Guest(Guest::new(300)));
        }
        let pond = CoordsXYZ::new(320, 320, 0);
        state
            .entities
            .spawn(pond, EntityData::Duck(Duck { target: pond, frame: 0 }));
        state.entities.rebuild_spatial_index();
        state
    }

    /// Whether any pause flag is set.
    pub fn is_paused(&self) -> bool {
        !self.pause_flags.is_empty()
    }

    /// Flip the player pause flag.
    pub fn toggle_pause(&mut self) {
        self.pause_flags.toggle(PauseFlags::NORMAL);
        tracing::debug!(paused = self.is_paused(), tick = self.current_ticks, "pause toggled");
    }

    /// The desync fingerprint peers exchange every tick.
    pub fn srand0(&self) -> u32 {
        self.rng.srand0()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
