//! Serialized world snapshots and field-level diffing.
//!
//! A [`WorldSnapshot`] holds the complete [`SimulationState`] as a JSON value
//! tree. JSON objects are key-sorted, so two identical states always produce
//! byte-identical snapshots and identical BLAKE3 checksums.
//!
//! [`compare`] walks two snapshots and reports every differing leaf, grouped
//! into park-wide globals and per-entity-slot differences. It exists for
//! desync diagnosis only.
//!
//! # What Is NOT Captured
//!
//! - Pause flags (a host concern).
//! - The entity spatial index (rebuilt on restore).
//! - Render-position overrides (visual only).
//! - Provisional map elements lifted off mid-tick (always empty between
//!   ticks).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::SimulationState;
use crate::WorldError;

// ---------------------------------------------------------------------------
// WorldSnapshot
// ---------------------------------------------------------------------------

/// A captured [`SimulationState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Logical clock at capture time.
    pub tick: u32,
    /// RNG fingerprint at capture time.
    pub srand0: u32,
    state: Value,
}

impl WorldSnapshot {
    /// Serialize `state` into a snapshot.
    pub fn capture(state: &SimulationState) -> Self {
        let value = serde_json::to_value(state)
            .expect("SimulationState should always be JSON-serializable");
        Self {
            tick: state.current_ticks,
            srand0: state.srand0(),
            state: value,
        }
    }

    /// Rebuild a live state from this snapshot.
    ///
    /// The returned state is unpaused and has a fresh spatial index.
    pub fn restore(&self) -> Result<SimulationState, WorldError> {
        let mut state: SimulationState = serde_json::from_value(self.state.clone())?;
        state.entities.rebuild_spatial_index();
        Ok(state)
    }

    /// Encode as JSON bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("WorldSnapshot should always be JSON-serializable")
    }

    /// Decode bytes written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WorldError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// BLAKE3 hex digest of the captured state.
    pub fn checksum(&self) -> String {
        let bytes = serde_json::to_vec(&self.state)
            .expect("snapshot value should always be JSON-serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// The captured state as a JSON tree.
    pub fn state_value(&self) -> &Value {
        &self.state
    }
}

// ---------------------------------------------------------------------------
// Diffing
// ---------------------------------------------------------------------------

/// One differing leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    /// Dotted path to the field, e.g. `park.cash` or `position.x`.
    pub path: String,
    /// Value in the left snapshot, as JSON text.
    pub left: String,
    /// Value in the right snapshot, as JSON text.
    pub right: String,
}

/// How one entity slot differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntityChange {
    /// The slot is occupied only in the left snapshot.
    OnlyLeft,
    /// The slot is occupied only in the right snapshot.
    OnlyRight,
    /// Occupied in both, with these fields differing.
    Fields(Vec<FieldDiff>),
}

/// Differences in one entity slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDiff {
    /// Slot index.
    pub index: usize,
    /// Kind name, from whichever side holds the entity.
    pub kind: String,
    /// What differs.
    pub change: EntityChange,
}

/// Result of [`compare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Tick of the left snapshot.
    pub tick_left: u32,
    /// Tick of the right snapshot.
    pub tick_right: u32,
    /// RNG fingerprint of the left snapshot.
    pub srand0_left: u32,
    /// RNG fingerprint of the right snapshot.
    pub srand0_right: u32,
    /// Differences outside the entity registry.
    pub globals: Vec<FieldDiff>,
    /// Differing entity slots, in slot order.
    pub entities: Vec<EntityDiff>,
}

impl SnapshotDiff {
    /// Whether the snapshots agree. Ticks are not compared.
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.entities.is_empty() && self.srand0_left == self.srand0_right
    }

    /// Human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "tick: {} / {}", self.tick_left, self.tick_right);
        let _ = writeln!(out, "srand0: {:#010x} / {:#010x}", self.srand0_left, self.srand0_right);
        if self.is_empty() {
            let _ = writeln!(out, "no differences");
            return out;
        }
        if !self.globals.is_empty() {
            let _ = writeln!(out, "globals ({} differences):", self.globals.len());
            for field in &self.globals {
                let _ = writeln!(out, "  {}: {} != {}", field.path, field.left, field.right);
            }
        }
        for entity in &self.entities {
            match &entity.change {
                EntityChange::OnlyLeft => {
                    let _ = writeln!(out, "entity {} ({}): only in left", entity.index, entity.kind);
                }
                EntityChange::OnlyRight => {
                    let _ = writeln!(out, "entity {} ({}): only in right", entity.index, entity.kind);
                }
                EntityChange::Fields(fields) => {
                    let _ = writeln!(out, "entity {} ({}):", entity.index, entity.kind);
                    for field in fields {
                        let _ = writeln!(out, "  {}: {} != {}", field.path, field.left, field.right);
                    }
                }
            }
        }
        out
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(key), child, out);
            }
        }
        Value::Array(items) => {
            out.insert(join("len"), items.len().to_string());
            for (i, child) in items.iter().enumerate() {
                flatten(&join(&i.to_string()), child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_owned(), leaf.to_string());
        }
    }
}

fn diff_values(left: &Value, right: &Value) -> Vec<FieldDiff> {
    let mut l = BTreeMap::new();
    let mut r = BTreeMap::new();
    flatten("", left, &mut l);
    flatten("", right, &mut r);
    let missing = String::from("<missing>");
    let mut paths: Vec<&String> = l.keys().chain(r.keys()).collect();
    paths.sort();
    paths.dedup();
    paths
        .into_iter()
        .filter_map(|path| {
            let lv = l.get(path).unwrap_or(&missing);
            let rv = r.get(path).unwrap_or(&missing);
            (lv != rv).then(|| FieldDiff {
                path: path.clone(),
                left: lv.clone(),
                right: rv.clone(),
            })
        })
        .collect()
}

/// Entity kind name from an externally tagged `data` object.
fn entity_kind(entity: &Value) -> String {
    entity
        .get("data")
        .and_then(Value::as_object)
        .and_then(|m| m.keys().next())
        .cloned()
        .unwrap_or_else(|| String::from("unknown"))
}

/// Split a state value into (globals, entity slots).
fn split_entities(state: &Value) -> (Value, Vec<Value>) {
    let mut globals = state.clone();
    let slots = globals
        .get_mut("entities")
        .and_then(Value::as_object_mut)
        .and_then(|e| e.remove("slots"))
        .and_then(|s| match s {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default();
    (globals, slots)
}

/// Field-level differences between two snapshots.
pub fn compare(left: &WorldSnapshot, right: &WorldSnapshot) -> SnapshotDiff {
    let (left_globals, left_slots) = split_entities(&left.state);
    let (right_globals, right_slots) = split_entities(&right.state);

    let mut entities = Vec::new();
    let slots = left_slots.len().max(right_slots.len());
    for index in 0..slots {
        let l = left_slots.get(index).filter(|v| !v.is_null());
        let r = right_slots.get(index).filter(|v| !v.is_null());
        let diff = match (l, r) {
            (None, None) => None,
            (Some(l), None) => Some(EntityDiff {
                index,
                kind: entity_kind(l),
                change: EntityChange::OnlyLeft,
            }),
            (None, Some(r)) => Some(EntityDiff {
                index,
                kind: entity_kind(r),
                change: EntityChange::OnlyRight,
            }),
            (Some(l), Some(r)) => {
                let fields = diff_values(l, r);
                (!fields.is_empty()).then(|| EntityDiff {
                    index,
                    kind: entity_kind(l),
                    change: EntityChange::Fields(fields),
                })
            }
        };
        entities.extend(diff);
    }

    SnapshotDiff {
        tick_left: left.tick,
        tick_right: right.tick,
        srand0_left: left.srand0,
        srand0_right: right.srand0,
        globals: diff_values(&left_globals, &right_globals),
        entities,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CoordsXYZ;
    use crate::misc::Litter;
    use crate::registry::EntityData;

    #[test]
    fn identical_states_have_identical_bytes() {
        let a = WorldSnapshot::capture(&SimulationState::demo(3));
        let b = WorldSnapshot::capture(&SimulationState::demo(3));
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.checksum().len(), 64);
        assert!(compare(&a, &b).is_empty());
    }

    #[test]
    fn restore_round_trips_state() {
        let original = SimulationState::demo(9);
        let snap = WorldSnapshot::capture(&original);
        let restored = snap.restore().unwrap();
        assert_eq!(WorldSnapshot::capture(&restored).checksum(), snap.checksum());
        assert_eq!(restored.entities.len(), original.entities.len());
    }

    #[test]
    fn compare_reports_globals_and_entities() {
        let mut left = SimulationState::demo(1);
        let mut right = left.clone();
        right.park.cash += 50;
        let id = right.entities.iter().next().unwrap().id;
        right.entities.get_mut(id).unwrap().position.x += 3;
        right
            .entities
            .spawn(CoordsXYZ::default(), EntityData::Litter(Litter::default()));
        left.current_ticks = 5;
        right.current_ticks = 5;

        let diff = compare(&WorldSnapshot::capture(&left), &WorldSnapshot::capture(&right));
        assert!(diff
            .globals
            .iter()
            .any(|f| f.path == "park.cash"));
        let moved = &diff.entities[0];
        assert_eq!(moved.index, id.index() as usize);
        match &moved.change {
            EntityChange::Fields(fields) => assert_eq!(fields[0].path, "position.x"),
            other => panic!("unexpected change {other:?}"),
        }
        let spawned = diff.entities.last().unwrap();
        assert_eq!(spawned.change, EntityChange::OnlyRight);
        assert_eq!(spawned.kind, "Litter");
        assert!(diff.render().contains("park.cash"));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        assert!(matches!(
            WorldSnapshot::from_bytes(b"{not json"),
            Err(WorldError::SnapshotDecode(_))
        ));
    }
}
