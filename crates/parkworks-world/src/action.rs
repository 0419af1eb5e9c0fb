//! Game actions and the action queue.
//!
//! Every player-initiated change to the park is a [`GameAction`]. Actions are
//! queued against the tick they must run on and applied by
//! [`ActionQueue::process_queue`] at one fixed point of the tick step, after
//! the world has been updated for that tick. Every peer applies the same
//! actions at the same point, which is what keeps their worlds identical.
//!
//! Actions are applied in `(tick, insertion order)` order. An action queued
//! for a tick that has already passed runs at the next opportunity and is
//! logged as late.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coords::TileCoords;
use crate::guest::Guest;
use crate::map::TileElementKind;
use crate::registry::{EntityData, EntityKind};
use crate::ride::{Ride, RideId, RideStatus, RideType};
use crate::state::SimulationState;
use crate::vehicle;
use crate::WorldError;

const RIDE_BUILD_COST: i64 = 1_000;
const FOOTPATH_COST: i64 = 10;
const GUEST_CASH: i32 = 300;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// What a [`GameAction`] does to the park.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Flip the player pause flag.
    TogglePause,
    /// Build a ride of `ride_type` over `track` and spawn its trains.
    PlaceRide {
        ride_type: RideType,
        track: Vec<TileCoords>,
    },
    /// Open, close or test a ride.
    SetRideStatus {
        ride: RideId,
        status: RideStatus,
    },
    /// Change what guests pay to board a ride.
    SetRidePrice {
        ride: RideId,
        price: u16,
    },
    /// Remove a ride, its track and its vehicles.
    DemolishRide {
        ride: RideId,
    },
    /// Change the park admission fee.
    SetParkEntranceFee {
        fee: u16,
    },
    /// Place the park entrance.
    PlaceEntrance {
        tile: TileCoords,
    },
    /// Place a footpath tile, optionally as a construction preview.
    PlaceFootpath {
        tile: TileCoords,
        provisional: bool,
    },
    /// Turn a previewed footpath into a real one.
    CommitFootpath {
        tile: TileCoords,
    },
    /// Remove the footpath on a tile.
    RemoveFootpath {
        tile: TileCoords,
    },
    /// Sweep up every piece of litter on a tile.
    ClearLitter {
        tile: TileCoords,
    },
    /// Put a new guest on a tile, bypassing admission.
    SpawnGuest {
        tile: TileCoords,
    },
}

/// An action scheduled for a specific tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAction {
    /// Tick the action must run on.
    pub tick: u32,
    /// Issuing player. `0` is the host.
    pub player: u8,
    /// What to do.
    pub kind: ActionKind,
}

impl GameAction {
    /// An action issued by the host.
    pub fn new(tick: u32, kind: ActionKind) -> Self {
        Self {
            tick,
            player: 0,
            kind,
        }
    }
}

/// Outcome of applying one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    /// The action changed the world.
    Applied,
    /// The action was invalid for the current world and changed nothing.
    Rejected { reason: String },
}

/// What happened to one processed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Tick the action actually ran on. Later than `action.tick` if it was late.
    pub executed_at: u32,
    /// The action as it was queued.
    pub action: GameAction,
    /// Whether it was applied.
    pub status: ActionStatus,
}

impl ActionResult {
    /// Shorthand for `status == Applied`.
    pub fn is_applied(&self) -> bool {
        self.status == ActionStatus::Applied
    }
}

// ---------------------------------------------------------------------------
// ActionQueue
// ---------------------------------------------------------------------------

/// Actions waiting for their tick, keyed by `(tick, insertion sequence)`.
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    queued: BTreeMap<(u32, u64), GameAction>,
    next_seq: u64,
}

impl ActionQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` behind everything already queued for the same tick.
    pub fn enqueue(&mut self, action: GameAction) {
        self.queued.insert((action.tick, self.next_seq), action);
        self.next_seq += 1;
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Drop every pending action.
    pub fn clear(&mut self) {
        self.queued.clear();
    }

    /// Actions still waiting, in the order they will run.
    pub fn pending(&self) -> impl Iterator<Item = &GameAction> {
        self.queued.values()
    }

    /// Apply every action due at or before the current tick.
    pub fn process_queue(&mut self, state: &mut SimulationState) -> Vec<ActionResult> {
        let now = state.current_ticks;
        let mut results = Vec::new();
        while let Some(entry) = self.queued.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let action = entry.remove();
            if action.tick < now {
                warn!(action_tick = action.tick, now, kind = ?action.kind, "late game action");
            }
            let status = match execute(&action.kind, state) {
                Ok(()) => ActionStatus::Applied,
                Err(err) => {
                    tracing::debug!(%err, "game action rejected");
                    ActionStatus::Rejected {
                        reason: err.to_string(),
                    }
                }
            };
            results.push(ActionResult {
                executed_at: now,
                action,
                status,
            });
        }
        results
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn ride_mut(state: &mut SimulationState, id: RideId) -> Result<&mut Ride, WorldError> {
    state.rides.get_mut(&id).ok_or(WorldError::UnknownRide(id))
}

fn charge(state: &mut SimulationState, cost: i64) -> Result<(), WorldError> {
    if state.park.cash < cost {
        return Err(WorldError::InvalidAction(format!(
            "not enough cash: need {cost}, have {}",
            state.park.cash
        )));
    }
    state.park.cash -= cost;
    Ok(())
}

fn check_bounds(state: &SimulationState, tile: TileCoords) -> Result<(), WorldError> {
    if state.map.in_bounds(tile) {
        Ok(())
    } else {
        Err(WorldError::InvalidAction(format!("tile ({}, {}) is off the map", tile.x, tile.y)))
    }
}

fn execute(kind: &ActionKind, state: &mut SimulationState) -> Result<(), WorldError> {
    match kind {
        ActionKind::TogglePause => {
            state.toggle_pause();
        }
        ActionKind::PlaceRide { ride_type, track } => {
            if !state.research.is_invented(*ride_type) {
                return Err(WorldError::InvalidAction(format!("{ride_type:?} is not invented yet")));
            }
            if track.is_empty() {
                return Err(WorldError::InvalidAction("ride has no track".into()));
            }
            for tile in track {
                check_bounds(state, *tile)?;
            }
            charge(state, RIDE_BUILD_COST)?;
            let id = RideId(state.next_ride_id);
            state.next_ride_id += 1;
            let ride = Ride::new(id, *ride_type, track.clone());
            for tile in track {
                state.map.place(*tile, TileElementKind::Track { ride: id }, false);
            }
            vehicle::spawn_trains(&mut state.entities, &ride);
            state.rides.insert(id, ride);
        }
        ActionKind::SetRideStatus { ride, status } => {
            ride_mut(state, *ride)?.set_status(*status);
        }
        ActionKind::SetRidePrice { ride, price } => {
            ride_mut(state, *ride)?.price = *price;
        }
        ActionKind::DemolishRide { ride } => {
            state.rides.remove(ride).ok_or(WorldError::UnknownRide(*ride))?;
            state.map.remove_ride(*ride);
            let mut doomed = Vec::new();
            for entity in state.entities.iter_mut() {
                match &mut entity.data {
                    EntityData::Vehicle(v) if v.ride == *ride => doomed.push(entity.id),
                    EntityData::Guest(g) => {
                        if g.riding == Some(*ride) {
                            g.riding = None;
                            g.ride_ticks = 0;
                        }
                        if g.target_ride == Some(*ride) {
                            g.target_ride = None;
                            g.destination = None;
                        }
                    }
                    _ => {}
                }
            }
            for id in doomed {
                state.entities.despawn(id)?;
            }
        }
        ActionKind::SetParkEntranceFee { fee } => {
            state.park.entrance_fee = *fee;
        }
        ActionKind::PlaceEntrance { tile } => {
            check_bounds(state, *tile)?;
            state.map.place(*tile, TileElementKind::Entrance, false);
        }
        ActionKind::PlaceFootpath { tile, provisional } => {
            check_bounds(state, *tile)?;
            if !provisional {
                charge(state, FOOTPATH_COST)?;
            }
            state.map.place(*tile, TileElementKind::Footpath, *provisional);
        }
        ActionKind::CommitFootpath { tile } => {
            if state.map.commit_provisional(*tile) == 0 {
                return Err(WorldError::InvalidAction("nothing provisional on tile".into()));
            }
        }
        ActionKind::RemoveFootpath { tile } => {
            if state.map.remove(*tile, TileElementKind::Footpath) == 0 {
                return Err(WorldError::InvalidAction("no footpath on tile".into()));
            }
        }
        ActionKind::ClearLitter { tile } => {
            let litter: Vec<_> = state
                .entities
                .entities_on_tile(*tile)
                .iter()
                .copied()
                .filter(|id| state.entities.get(*id).map(|e| e.kind()) == Some(EntityKind::Litter))
                .collect();
            for id in litter {
                state.entities.despawn(id)?;
            }
        }
        ActionKind::SpawnGuest { tile } => {
            check_bounds(state, *tile)?;
            state
                .entities
                .spawn(tile.centre(), EntityData::Guest(Guest::new(GUEST_CASH)));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
