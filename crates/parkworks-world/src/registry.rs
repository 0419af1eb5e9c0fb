//! The entity registry: every guest, vehicle and loose sprite in the park.
//!
//! Entities live in a slot vector indexed by [`EntityId::index`], so iteration
//! order is slot order and identical on every peer. Two pieces of derived state
//! ride along without being serialized:
//!
//! - a spatial index from tile to the entities standing on it, rebuilt once per
//!   tick by [`EntityRegistry::rebuild_spatial_index`];
//! - render-position overrides written by the frame interpolator. These are
//!   purely visual and never read by the simulation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::coords::{CoordsXYZ, TileCoords};
use crate::entity::{EntityAllocator, EntityId};
use crate::guest::Guest;
use crate::misc::{Balloon, Duck, Litter, MoneyEffect};
use crate::vehicle::Vehicle;
use crate::WorldError;

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// Discriminant of [`EntityData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Guest,
    Vehicle,
    Litter,
    Balloon,
    MoneyEffect,
    Duck,
}

impl EntityKind {
    /// Whether the frame interpolator tracks this kind. Litter never moves.
    pub fn should_tween(self) -> bool {
        !matches!(self, EntityKind::Litter)
    }

    /// Lowercase name used in logs and snapshot diffs.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Guest => "guest",
            EntityKind::Vehicle => "vehicle",
            EntityKind::Litter => "litter",
            EntityKind::Balloon => "balloon",
            EntityKind::MoneyEffect => "money_effect",
            EntityKind::Duck => "duck",
        }
    }
}

/// Per-kind entity payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityData {
    Guest(Guest),
    Vehicle(Vehicle),
    Litter(Litter),
    Balloon(Balloon),
    MoneyEffect(MoneyEffect),
    Duck(Duck),
}

impl EntityData {
    /// The kind of this payload.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Guest(_) => EntityKind::Guest,
            EntityData::Vehicle(_) => EntityKind::Vehicle,
            EntityData::Litter(_) => EntityKind::Litter,
            EntityData::Balloon(_) => EntityKind::Balloon,
            EntityData::MoneyEffect(_) => EntityKind::MoneyEffect,
            EntityData::Duck(_) => EntityKind::Duck,
        }
    }
}

/// One live entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Generational id. Stale copies stop resolving once the slot is reused.
    pub id: EntityId,
    /// Logical position. Only the simulation writes this.
    pub position: CoordsXYZ,
    /// Per-kind state.
    pub data: EntityData,
}

impl Entity {
    /// Shorthand for `self.data.kind()`.
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Owner of every live entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRegistry {
    allocator: EntityAllocator,
    slots: Vec<Option<Entity>>,
    #[serde(skip)]
    spatial: BTreeMap<TileCoords, Vec<EntityId>>,
    #[serde(skip)]
    render: HashMap<EntityId, CoordsXYZ>,
}

impl EntityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity and return its id.
    pub fn spawn(&mut self, position: CoordsXYZ, data: EntityData) -> EntityId {
        let id = self.allocator.allocate();
        let index = id.index() as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(Entity { id, position, data });
        tracing::trace!(entity = %id, "spawned");
        id
    }

    /// Remove an entity, returning it.
    pub fn despawn(&mut self, id: EntityId) -> Result<Entity, WorldError> {
        if !self.allocator.deallocate(id) {
            return Err(WorldError::StaleEntity(id));
        }
        self.render.remove(&id);
        self.slots[id.index() as usize]
            .take()
            .ok_or(WorldError::StaleEntity(id))
    }

    /// Whether `id` refers to a live entity of the current generation.
    pub fn contains(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    /// The live entity `id`, or `None` if it was despawned.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index() as usize)?.as_ref()
    }

    /// Mutable access to the live entity `id`.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index() as usize)?.as_mut()
    }

    /// Live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().flatten()
    }

    /// Live entities in slot order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.slots.iter_mut().flatten()
    }

    /// Live entities of `kind`, in slot order.
    pub fn iter_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.iter().filter(move |e| e.kind() == kind)
    }

    /// Ids of every live entity of `kind`, in slot order.
    ///
    /// Update passes collect ids first so they can spawn and despawn while
    /// walking the list.
    pub fn ids_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.iter_kind(kind).map(|e| e.id).collect()
    }

    /// Number of live entities of `kind`.
    pub fn count_kind(&self, kind: EntityKind) -> usize {
        self.iter_kind(kind).count()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Whether no entity is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Entity in slot `index`, if the slot is occupied.
    pub fn slot(&self, index: usize) -> Option<&Entity> {
        self.slots.get(index)?.as_ref()
    }

    // -- spatial index ------------------------------------------------------

    /// Recompute the tile index from logical positions.
    pub fn rebuild_spatial_index(&mut self) {
        self.spatial.clear();
        for entity in self.slots.iter().flatten() {
            self.spatial
                .entry(entity.position.tile())
                .or_default()
                .push(entity.id);
        }
    }

    /// Entities on `tile` as of the last spatial rebuild.
    pub fn entities_on_tile(&self, tile: TileCoords) -> &[EntityId] {
        self.spatial.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    // -- render positions ---------------------------------------------------

    /// Draw `id` at `position` instead of its logical position. Ignored for
    /// dead entities.
    pub fn set_render_position(&mut self, id: EntityId, position: CoordsXYZ) {
        if self.allocator.is_alive(id) {
            self.render.insert(id, position);
        }
    }

    /// Draw `id` at its logical position again.
    pub fn clear_render_position(&mut self, id: EntityId) {
        self.render.remove(&id);
    }

    /// Drop every override so entities draw at their logical positions.
    pub fn clear_render_positions(&mut self) {
        self.render.clear();
    }

    /// Whether any entity has a render override.
    pub fn has_render_overrides(&self) -> bool {
        !self.render.is_empty()
    }

    /// Where the entity should be drawn: the interpolated position if one was
    /// set, otherwise its logical position.
    pub fn render_position(&self, id: EntityId) -> Option<CoordsXYZ> {
        let entity = self.get(id)?;
        Some(self.render.get(&id).copied().unwrap_or(entity.position))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misc::Litter;

    fn litter() -> EntityData {
        EntityData::Litter(Litter::default())
    }

    #[test]
    fn spawn_get_despawn() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(CoordsXYZ::new(10, 10, 0), litter());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(id).map(|e| e.kind()), Some(EntityKind::Litter));

        let removed = reg.despawn(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(reg.get(id).is_none());
        assert!(matches!(reg.despawn(id), Err(WorldError::StaleEntity(_))));
    }

    #[test]
    fn spatial_index_groups_by_tile() {
        let mut reg = EntityRegistry::new();
        let a = reg.spawn(CoordsXYZ::new(1, 1, 0), litter());
        let b = reg.spawn(CoordsXYZ::new(30, 5, 0), litter());
        let c = reg.spawn(CoordsXYZ::new(40, 5, 0), litter());
        reg.rebuild_spatial_index();
        assert_eq!(reg.entities_on_tile(TileCoords::new(0, 0)), &[a, b]);
        assert_eq!(reg.entities_on_tile(TileCoords::new(1, 0)), &[c]);
        assert!(reg.entities_on_tile(TileCoords::new(5, 5)).is_empty());
    }

    #[test]
    fn render_position_falls_back_to_logical() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(CoordsXYZ::new(1, 2, 3), litter());
        assert_eq!(reg.render_position(id), Some(CoordsXYZ::new(1, 2, 3)));

        reg.set_render_position(id, CoordsXYZ::new(9, 9, 9));
        assert_eq!(reg.render_position(id), Some(CoordsXYZ::new(9, 9, 9)));
        assert_eq!(reg.get(id).unwrap().position, CoordsXYZ::new(1, 2, 3));

        reg.clear_render_positions();
        assert_eq!(reg.render_position(id), Some(CoordsXYZ::new(1, 2, 3)));
    }

    #[test]
    fn despawn_drops_render_override() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(CoordsXYZ::default(), litter());
        reg.set_render_position(id, CoordsXYZ::new(5, 5, 5));
        reg.despawn(id).unwrap();
        assert!(!reg.has_render_overrides());
    }

    #[test]
    fn render_state_is_not_serialized() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(CoordsXYZ::default(), litter());
        reg.set_render_position(id, CoordsXYZ::new(5, 5, 5));
        let json = serde_json::to_string(&reg).unwrap();
        let back: EntityRegistry = serde_json::from_str(&json).unwrap();
        assert!(!back.has_render_overrides());
        assert_eq!(back.len(), 1);
    }
}
