//! The tile map: footpaths, ride track, scenery and their animations.
//!
//! Elements placed while the player is still previewing a construction are
//! *provisional*. They are drawn but must not influence the simulation, so
//! the tick step lifts them off the map around the guest update with
//! [`TileMap::remove_provisional_elements`] and
//! [`TileMap::restore_provisional_elements`].

use serde::{Deserialize, Serialize};

use crate::coords::TileCoords;
use crate::ride::RideId;

/// Number of frames in a looping tile animation.
const ANIMATION_FRAMES: u8 = 4;

/// What occupies a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileElementKind {
    /// Walkable path.
    Footpath,
    /// One piece of a ride's track circuit.
    Track { ride: RideId },
    /// The park entrance, where new guests appear.
    Entrance,
    /// Scenery with a looping animation (fountains, flags).
    AnimatedScenery,
}

/// One thing placed on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileElement {
    /// Tile the element sits on.
    pub tile: TileCoords,
    /// What the element is.
    pub kind: TileElementKind,
    /// A construction preview, not yet part of the simulation.
    pub provisional: bool,
    /// Only advances for animated scenery.
    pub animation_frame: u8,
}

impl TileElement {
    fn is_animated(&self) -> bool {
        matches!(self.kind, TileElementKind::AnimatedScenery)
    }
}

/// Every element on a square grid, in placement order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileMap {
    size: i32,
    elements: Vec<TileElement>,
    /// Provisional elements lifted off the map for the duration of the guest
    /// update. Empty at every tick boundary.
    #[serde(skip)]
    lifted: Vec<TileElement>,
    /// Animated elements touched by the last invalidation pass.
    #[serde(skip)]
    invalidated: usize,
}

impl TileMap {
    /// Create an empty square map `size` tiles across.
    pub fn new(size: i32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Tiles along one edge.
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Whether `tile` lies on the map.
    pub fn in_bounds(&self, tile: TileCoords) -> bool {
        (0..self.size).contains(&tile.x) && (0..self.size).contains(&tile.y)
    }

    /// Elements currently on the map. Lifted provisional elements are excluded.
    pub fn elements(&self) -> &[TileElement] {
        &self.elements
    }

    /// Place an element. Returns `false` if the tile is outside the map.
    pub fn place(&mut self, tile: TileCoords, kind: TileElementKind, provisional: bool) -> bool {
        if !self.in_bounds(tile) {
            return false;
        }
        self.elements.push(TileElement {
            tile,
            kind,
            provisional,
            animation_frame: 0,
        });
        true
    }

    /// Remove every element of `kind` on `tile`. Returns how many were removed.
    pub fn remove(&mut self, tile: TileCoords, kind: TileElementKind) -> usize {
        let before = self.elements.len();
        self.elements.retain(|e| !(e.tile == tile && e.kind == kind));
        before - self.elements.len()
    }

    /// Remove all track belonging to `ride`.
    pub fn remove_ride(&mut self, ride: RideId) {
        self.elements
            .retain(|e| !matches!(e.kind, TileElementKind::Track { ride: r } if r == ride));
    }

    /// Turn the provisional elements on `tile` into real ones.
    pub fn commit_provisional(&mut self, tile: TileCoords) -> usize {
        let mut committed = 0;
        for element in self.elements.iter_mut().filter(|e| e.tile == tile && e.provisional) {
            element.provisional = false;
            committed += 1;
        }
        committed
    }

    /// Lift every provisional element off the map until
    /// [`restore_provisional_elements`](Self::restore_provisional_elements) puts them back.
    pub fn remove_provisional_elements(&mut self) {
        let (provisional, kept): (Vec<_>, Vec<_>) =
            self.elements.drain(..).partition(|e| e.provisional);
        self.elements = kept;
        self.lifted.extend(provisional);
    }

    /// Put lifted provisional elements back, after the permanent ones.
    pub fn restore_provisional_elements(&mut self) {
        self.elements.append(&mut self.lifted);
    }

    /// Provisional elements currently on the map.
    pub fn provisional_count(&self) -> usize {
        self.elements.iter().filter(|e| e.provisional).count()
    }

    /// Whether guests can walk on `tile`.
    pub fn has_footpath(&self, tile: TileCoords) -> bool {
        self.elements
            .iter()
            .any(|e| e.tile == tile && e.kind == TileElementKind::Footpath)
    }

    /// A tile guests cannot walk through because ride track occupies it.
    pub fn is_blocked(&self, tile: TileCoords) -> bool {
        self.elements.iter().any(|e| {
            e.tile == tile && matches!(e.kind, TileElementKind::Track { .. })
        })
    }

    /// Footpath tiles in placement order.
    pub fn footpath_tiles(&self) -> Vec<TileCoords> {
        self.elements
            .iter()
            .filter(|e| e.kind == TileElementKind::Footpath)
            .map(|e| e.tile)
            .collect()
    }

    /// The first entrance placed, if any.
    pub fn entrance(&self) -> Option<TileCoords> {
        self.elements
            .iter()
            .find(|e| e.kind == TileElementKind::Entrance)
            .map(|e| e.tile)
    }

    /// Step tile animations by one frame.
    pub fn update_tiles(&mut self) {
        for element in self.elements.iter_mut().filter(|e| e.is_animated()) {
            element.animation_frame = (element.animation_frame + 1) % ANIMATION_FRAMES;
        }
    }

    /// Mark animated elements for redraw. Returns how many were marked.
    pub fn invalidate_animations(&mut self) -> usize {
        self.invalidated = self.elements.iter().filter(|e| e.is_animated()).count();
        self.invalidated
    }

    /// Count from the last [`invalidate_animations`](Self::invalidate_animations) call.
    pub fn last_invalidated(&self) -> usize {
        self.invalidated
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_rejects_out_of_bounds() {
        let mut map = TileMap::new(4);
        assert!(map.place(TileCoords::new(3, 3), TileElementKind::Footpath, false));
        assert!(!map.place(TileCoords::new(4, 0), TileElementKind::Footpath, false));
        assert!(!map.place(TileCoords::new(0, -1), TileElementKind::Footpath, false));
    }

    #[test]
    fn provisional_elements_lift_and_restore() {
        let mut map = TileMap::new(8);
        map.place(TileCoords::new(1, 1), TileElementKind::Footpath, false);
        map.place(TileCoords::new(2, 1), TileElementKind::Footpath, true);

        map.remove_provisional_elements();
        assert!(!map.has_footpath(TileCoords::new(2, 1)));
        assert_eq!(map.footpath_tiles(), vec![TileCoords::new(1, 1)]);

        map.restore_provisional_elements();
        assert!(map.has_footpath(TileCoords::new(2, 1)));
        assert_eq!(map.provisional_count(), 1);
    }

    #[test]
    fn commit_makes_element_permanent() {
        let mut map = TileMap::new(8);
        map.place(TileCoords::new(2, 2), TileElementKind::Footpath, true);
        assert_eq!(map.commit_provisional(TileCoords::new(2, 2)), 1);
        map.remove_provisional_elements();
        assert!(map.has_footpath(TileCoords::new(2, 2)));
    }

    #[test]
    fn animations_cycle() {
        let mut map = TileMap::new(8);
        map.place(TileCoords::new(0, 0), TileElementKind::AnimatedScenery, false);
        for _ in 0..5 {
            map.update_tiles();
        }
        assert_eq!(map.elements()[0].animation_frame, 1);
        assert_eq!(map.invalidate_animations(), 1);
    }
}
