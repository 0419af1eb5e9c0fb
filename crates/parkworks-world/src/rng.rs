//! Seeded scenario RNG.
//!
//! Every random decision the simulation makes draws from a single
//! [`ParkRng`] stored inside the simulation state, so the random stream is
//! part of what a snapshot captures and what peers compare to detect a
//! desync.

use rand::{Rng, RngCore, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// The scenario random number generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkRng {
    rng: Pcg32,
}

impl ParkRng {
    /// Create a generator from a 64-bit seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Draw the next 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Draw a value in `0..bound`. Returns 0 for an empty range.
    pub fn next_range(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }

    /// `true` with probability `1 / one_in`.
    pub fn one_in(&mut self, one_in: u32) -> bool {
        self.next_range(one_in) == 0
    }

    /// Fingerprint of the current generator state.
    ///
    /// This is the value the next draw would return, computed on a copy so the
    /// stream itself is not advanced. Peers exchange it per tick as a cheap
    /// state hash.
    pub fn srand0(&self) -> u32 {
        self.rng.clone().next_u32()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
