//! Ride vehicles running around their track circuit.

use serde::{Deserialize, Serialize};

use crate::coords::{CoordsXYZ, COORDS_XY_STEP};
use crate::entity::EntityId;
use crate::registry::{EntityData, EntityKind, EntityRegistry};
use crate::ride::{Ride, RideId, RideStatus};
use crate::state::SimulationState;

/// Progress units per track piece.
const PIECE_LENGTH: u8 = COORDS_XY_STEP as u8;

/// A car of a ride train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Ride the vehicle belongs to.
    pub ride: RideId,
    /// Track piece the vehicle is on.
    pub track_index: u16,
    /// Distance travelled along the current piece, `0..PIECE_LENGTH`.
    pub progress: u8,
    /// Progress units per tick, up to the ride's top speed.
    pub speed: u8,
}

impl Vehicle {
    /// A stopped vehicle at the start of piece `track_index`.
    pub fn new(ride: RideId, track_index: u16) -> Self {
        Self {
            ride,
            track_index,
            progress: 0,
            speed: 0,
        }
    }
}

/// Spawn the trains for a freshly built ride, spread evenly along the track.
pub fn spawn_trains(entities: &mut EntityRegistry, ride: &Ride) -> Vec<EntityId> {
    let pieces = ride.track.len();
    if pieces == 0 {
        return Vec::new();
    }
    let trains = ride.train_count();
    (0..trains)
        .map(|n| {
            let index = n * pieces / trains;
            entities.spawn(
                ride.track[index].centre(),
                EntityData::Vehicle(Vehicle::new(ride.id, index as u16)),
            )
        })
        .collect()
}

fn position_on_track(ride: &Ride, track_index: u16, progress: u8) -> CoordsXYZ {
    let len = ride.track.len();
    let from = ride.track[track_index as usize % len].centre();
    let to = ride.track[(track_index as usize + 1) % len].centre();
    let t = progress as i32;
    let span = PIECE_LENGTH as i32;
    CoordsXYZ::new(
        from.x + (to.x - from.x) * t / span,
        from.y + (to.y - from.y) * t / span,
        from.z + (to.z - from.z) * t / span,
    )
}

/// Advance every vehicle by one tick.
///
/// Vehicles accelerate while their ride is running and brake when it is
/// closed. Vehicles whose ride no longer exists are left in place.
pub fn update_all(state: &mut SimulationState) {
    for id in state.entities.ids_of_kind(EntityKind::Vehicle) {
        let Some(entity) = state.entities.get_mut(id) else {
            continue;
        };
        let EntityData::Vehicle(vehicle) = &mut entity.data else {
            continue;
        };
        let Some(ride) = state.rides.get(&vehicle.ride) else {
            continue;
        };
        if ride.track.is_empty() {
            continue;
        }

        if ride.status == RideStatus::Closed {
            vehicle.speed = vehicle.speed.saturating_sub(1);
        } else if vehicle.speed < ride.top_speed() {
            vehicle.speed += 1;
        }

        let mut progress = vehicle.progress as u16 + vehicle.speed as u16;
        while progress >= PIECE_LENGTH as u16 {
            progress -= PIECE_LENGTH as u16;
            vehicle.track_index = ((vehicle.track_index as usize + 1) % ride.track.len()) as u16;
        }
        vehicle.progress = progress as u8;
        entity.position = position_on_track(ride, vehicle.track_index, vehicle.progress);
    }
}

/// Moving vehicles that should be emitting sound, with their volume.
pub fn sound_sources(entities: &EntityRegistry) -> Vec<(EntityId, CoordsXYZ, u8)> {
    entities
        .iter_kind(EntityKind::Vehicle)
        .filter_map(|e| match &e.data {
            EntityData::Vehicle(v) if v.speed > 0 => Some((e.id, e.position, v.speed.saturating_mul(16))),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
