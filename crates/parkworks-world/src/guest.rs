//! Park guests.
//!
//! Guests wander between footpath tiles, sometimes head for an open ride, pay
//! to board it and ride for a while. They occasionally drop litter or let go
//! of a balloon.

use serde::{Deserialize, Serialize};

use crate::coords::{CoordsXYZ, TileCoords};
use crate::misc::{Balloon, Litter, MoneyEffect};
use crate::registry::{EntityData, EntityKind, EntityRegistry};
use crate::ride::RideId;
use crate::state::SimulationState;

const RIDE_DURATION_TICKS: u16 = 200;
const LITTER_ONE_IN: u32 = 1500;
const BALLOON_ONE_IN: u32 = 4000;
const RIDE_ONE_IN: u32 = 3;

/// A park visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    /// Money left to spend.
    pub cash: i32,
    /// `0..=255`. Feeds the park rating.
    pub happiness: u8,
    /// Drops while walking. Tired guests rest instead of moving.
    pub energy: u8,
    /// Footpath tile the guest is walking towards.
    pub destination: Option<TileCoords>,
    /// Ride the guest has decided to visit next.
    pub target_ride: Option<RideId>,
    /// Set while the guest is on a ride.
    pub riding: Option<RideId>,
    /// Ticks spent on the current ride.
    pub ride_ticks: u16,
    /// Rides finished so far.
    pub rides_ridden: u16,
}

impl Guest {
    /// A fresh guest carrying `cash`.
    pub fn new(cash: i32) -> Self {
        Self {
            cash,
            happiness: 128,
            energy: 200,
            destination: None,
            target_ride: None,
            riding: None,
            ride_ticks: 0,
            rides_ridden: 0,
        }
    }
}

enum Spawn {
    Litter(CoordsXYZ),
    Balloon(CoordsXYZ),
    Money(CoordsXYZ, i32),
}

/// Advance every guest by one tick.
///
/// Provisional map elements must already be lifted off the map; guests pick
/// destinations from the committed footpath only.
pub fn update_all(state: &mut SimulationState) {
    let paths = state.map.footpath_tiles();
    let open_rides: Vec<RideId> = state
        .rides
        .values()
        .filter(|r| r.is_open() && !r.track.is_empty())
        .map(|r| r.id)
        .collect();
    let mut spawns = Vec::new();

    for id in state.entities.ids_of_kind(EntityKind::Guest) {
        let Some(entity) = state.entities.get_mut(id) else {
            continue;
        };
        let EntityData::Guest(guest) = &mut entity.data else {
            continue;
        };

        if let Some(ride) = guest.riding {
            guest.ride_ticks = guest.ride_ticks.saturating_sub(1);
            if guest.ride_ticks == 0 {
                guest.riding = None;
                guest.rides_ridden += 1;
                guest.happiness = guest.happiness.saturating_add(20);
                tracing::trace!(guest = %id, %ride, "left ride");
            }
            continue;
        }

        guest.energy = guest.energy.saturating_sub(state.rng.one_in(64) as u8);

        let position = entity.position;
        let arrived = guest.destination.map_or(true, |d| position == d.centre());
        if arrived {
            if let Some(ride_id) = guest.target_ride.take() {
                if let Some(ride) = state.rides.get_mut(&ride_id).filter(|r| r.is_open()) {
                    let price = ride.price as i32;
                    if guest.cash >= price {
                        guest.cash -= price;
                        guest.riding = Some(ride_id);
                        guest.ride_ticks = RIDE_DURATION_TICKS;
                        ride.total_customers += 1;
                        ride.income += price as i64;
                        state.park.cash += price as i64;
                        if price > 0 {
                            spawns.push(Spawn::Money(position, price));
                        }
                        guest.destination = None;
                        continue;
                    }
                    guest.happiness = guest.happiness.saturating_sub(10);
                }
            }
            guest.destination = None;
            if !open_rides.is_empty() && state.rng.one_in(RIDE_ONE_IN) {
                let ride_id = open_rides[state.rng.next_range(open_rides.len() as u32) as usize];
                guest.target_ride = Some(ride_id);
                guest.destination = state.rides.get(&ride_id).and_then(|r| r.track.first().copied());
            } else if !paths.is_empty() {
                guest.destination = Some(paths[state.rng.next_range(paths.len() as u32) as usize]);
            }
        }

        if let Some(destination) = guest.destination {
            entity.position = entity.position.step_towards(destination.centre());
        }

        if state.rng.one_in(LITTER_ONE_IN) {
            spawns.push(Spawn::Litter(entity.position));
        }
        if state.rng.one_in(BALLOON_ONE_IN) {
            spawns.push(Spawn::Balloon(entity.position));
        }
    }

    for spawn in spawns {
        match spawn {
            Spawn::Litter(at) => {
                state.entities.spawn(at, EntityData::Litter(Litter::default()));
            }
            Spawn::Balloon(at) => {
                let colour = state.rng.next_range(16) as u8;
                state.entities.spawn(at, EntityData::Balloon(Balloon::new(colour)));
            }
            Spawn::Money(at, value) => {
                state.entities.spawn(at, EntityData::MoneyEffect(MoneyEffect::new(value)));
            }
        }
    }
}

/// Crowd noise volume in `0..=255` from the number of guests walking around.
pub fn crowd_noise_level(entities: &EntityRegistry) -> u8 {
    let walking = entities
        .iter_kind(EntityKind::Guest)
        .filter(|e| matches!(&e.data, EntityData::Guest(g) if g.riding.is_none()))
        .count();
    (walking * 4).min(255) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
