//! Miscellaneous sprites: litter, balloons, floating money and the duck.

use serde::{Deserialize, Serialize};

use crate::coords::CoordsXYZ;
use crate::registry::{EntityData, EntityKind};
use crate::state::SimulationState;

/// Balloons pop after rising for this many ticks.
const BALLOON_LIFETIME: u16 = 320;

/// Money effects are removed after this many upward moves.
pub const MONEY_EFFECT_MAX_MOVES: u16 = 55;

/// Ticks between money effect moves.
const MONEY_EFFECT_MOVE_DELAY: u8 = 2;

const DUCK_WANDER: i32 = 64;
const DUCK_FRAMES: u8 = 4;

/// Rubbish dropped by a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Litter {
    /// Ticks since it was dropped.
    pub age: u16,
}

/// A balloon a guest let go of. It rises, then pops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balloon {
    /// Palette index.
    pub colour: u8,
    /// Ticks since release. Pops at the end of its lifetime.
    pub age: u16,
}

impl Balloon {
    /// A freshly released balloon.
    pub fn new(colour: u8) -> Self {
        Self { colour, age: 0 }
    }
}

/// Floating price text shown where a guest paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyEffect {
    /// Amount shown.
    pub value: i32,
    /// Upward moves so far. Removed at [`MONEY_EFFECT_MAX_MOVES`].
    pub moves: u16,
    /// Ticks since the last move.
    pub move_delay: u8,
}

impl MoneyEffect {
    /// An effect showing `value`, not yet moved.
    pub fn new(value: i32) -> Self {
        Self {
            value,
            moves: 0,
            move_delay: 0,
        }
    }
}

/// The pond duck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duck {
    /// Where it is paddling to.
    pub target: CoordsXYZ,
    /// Swimming animation frame.
    pub frame: u8,
}

/// Update litter, balloons, the duck and money effects.
pub fn update_all(state: &mut SimulationState) {
    let mut popped = Vec::new();
    for entity in state.entities.iter_mut() {
        match &mut entity.data {
            EntityData::Litter(litter) => litter.age = litter.age.saturating_add(1),
            EntityData::Balloon(balloon) => {
                balloon.age += 1;
                if balloon.age % 2 == 0 {
                    entity.position.z += 1;
                }
                if balloon.age >= BALLOON_LIFETIME {
                    popped.push(entity.id);
                }
            }
            EntityData::Duck(duck) => {
                if entity.position == duck.target {
                    let dx = state.rng.next_range(DUCK_WANDER as u32 * 2) as i32 - DUCK_WANDER;
                    let dy = state.rng.next_range(DUCK_WANDER as u32 * 2) as i32 - DUCK_WANDER;
                    duck.target = CoordsXYZ::new(entity.position.x + dx, entity.position.y + dy, entity.position.z);
                }
                entity.position = entity.position.step_towards(duck.target);
                duck.frame = (duck.frame + 1) % DUCK_FRAMES;
            }
            _ => {}
        }
    }
    for id in popped {
        // Ids came from a live iteration; despawn cannot fail here.
        let _ = state.entities.despawn(id);
    }
    update_money_effects(state);
}

/// Float money effects upwards and remove finished ones.
///
/// Runs every frame, including while the game is paused.
pub fn update_money_effects(state: &mut SimulationState) {
    let mut finished = Vec::new();
    for id in state.entities.ids_of_kind(EntityKind::MoneyEffect) {
        let Some(entity) = state.entities.get_mut(id) else {
            continue;
        };
        let EntityData::MoneyEffect(effect) = &mut entity.data else {
            continue;
        };
        effect.move_delay += 1;
        if effect.move_delay < MONEY_EFFECT_MOVE_DELAY {
            continue;
        }
        effect.move_delay = 0;
        entity.position.z += 1;
        effect.moves += 1;
        if effect.moves >= MONEY_EFFECT_MAX_MOVES {
            finished.push(id);
        }
    }
    for id in finished {
        let _ = state.entities.despawn(id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
