//! World and tile coordinates.

use serde::{Deserialize, Serialize};

/// Number of world units along one tile edge.
pub const COORDS_XY_STEP: i32 = 32;

/// Number of world units per height step.
pub const COORDS_Z_STEP: i32 = 8;

/// A tile position on the map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TileCoords {
    /// Column, west to east.
    pub x: i32,
    /// Row, north to south.
    pub y: i32,
}

impl TileCoords {
    /// Tile at column `x`, row `y`.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position of the tile centre at ground level.
    pub fn centre(self) -> CoordsXYZ {
        CoordsXYZ::new(
            self.x * COORDS_XY_STEP + COORDS_XY_STEP / 2,
            self.y * COORDS_XY_STEP + COORDS_XY_STEP / 2,
            0,
        )
    }

    /// Manhattan distance in tiles.
    pub fn distance(self, other: TileCoords) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// An entity position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CoordsXYZ {
    /// World units, west to east.
    pub x: i32,
    /// World units, north to south.
    pub y: i32,
    /// Height in world units, see [`COORDS_Z_STEP`].
    pub z: i32,
}

impl CoordsXYZ {
    /// Position from world units.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The tile this position lies on.
    pub fn tile(self) -> TileCoords {
        TileCoords::new(
            self.x.div_euclid(COORDS_XY_STEP),
            self.y.div_euclid(COORDS_XY_STEP),
        )
    }

    /// Linear interpolation towards `to`, rounded to whole world units.
    ///
    /// `alpha == 0.0` yields `self`, `alpha == 1.0` yields `to`.
    pub fn lerp(self, to: CoordsXYZ, alpha: f32) -> CoordsXYZ {
        let inv = 1.0 - alpha;
        let mix = |a: i32, b: i32| (b as f32 * alpha + a as f32 * inv).round() as i32;
        CoordsXYZ::new(mix(self.x, to.x), mix(self.y, to.y), mix(self.z, to.z))
    }

    /// Move one world unit along each axis towards `target`.
    pub fn step_towards(self, target: CoordsXYZ) -> CoordsXYZ {
        CoordsXYZ::new(
            self.x + (target.x - self.x).signum(),
            self.y + (target.y - self.y).signum(),
            self.z + (target.z - self.z).signum(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_of_negative_position_rounds_down() {
        assert_eq!(CoordsXYZ::new(-1, 31, 0).tile(), TileCoords::new(-1, 0));
        assert_eq!(CoordsXYZ::new(64, 65, 0).tile(), TileCoords::new(2, 2));
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = CoordsXYZ::new(0, 10, 0);
        let b = CoordsXYZ::new(10, 20, 8);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), CoordsXYZ::new(5, 15, 4));
    }

    #[test]
    fn step_towards_moves_one_unit() {
        let p = CoordsXYZ::new(5, 5, 0).step_towards(CoordsXYZ::new(0, 9, 0));
        assert_eq!(p, CoordsXYZ::new(4, 6, 0));
    }
}
