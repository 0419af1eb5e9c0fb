//! Ring buffer of per-tick game state snapshots for desync diagnosis.
//!
//! With desync debugging on, the server captures one snapshot every tick and
//! links it to `(tick, srand0)`. When a client detects a desync it captures
//! its own, asks the server for the snapshot of the same tick and writes a
//! field-level comparison to disk. Snapshots are never used for gameplay.

use std::collections::VecDeque;
use std::path::Path;

use parkworks_world::snapshot::{compare, SnapshotDiff, WorldSnapshot};
use parkworks_world::state::SimulationState;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Snapshots kept before the oldest is evicted.
pub const SNAPSHOT_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// GameStateSnapshot
// ---------------------------------------------------------------------------

/// One slot of the snapshot ring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    tick: u32,
    srand0: u32,
    linked: bool,
    world: Option<WorldSnapshot>,
}

impl GameStateSnapshot {
    /// Fill the snapshot from the current state.
    pub fn capture(&mut self, state: &SimulationState) {
        self.world = Some(WorldSnapshot::capture(state));
    }

    /// Tag the snapshot with the tick and RNG fingerprint it belongs to.
    pub fn link(&mut self, tick: u32, srand0: u32) {
        self.tick = tick;
        self.srand0 = srand0;
        self.linked = true;
    }

    /// Tick the snapshot is linked to.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// RNG fingerprint at that tick.
    pub fn srand0(&self) -> u32 {
        self.srand0
    }

    /// Whether [`link`](Self::link) has been called.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// The captured world, if [`capture`](Self::capture) has been called.
    pub fn world(&self) -> Option<&WorldSnapshot> {
        self.world.as_ref()
    }
}

// ---------------------------------------------------------------------------
// GameStateSnapshots
// ---------------------------------------------------------------------------

/// A fixed-size ring of recent snapshots, oldest evicted first.
#[derive(Debug)]
pub struct GameStateSnapshots {
    ring: VecDeque<GameStateSnapshot>,
    capacity: usize,
}

impl Default for GameStateSnapshots {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStateSnapshots {
    /// A ring holding [`SNAPSHOT_CAPACITY`] snapshots.
    pub fn new() -> Self {
        Self::with_capacity(SNAPSHOT_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "snapshot capacity must be positive");
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Start a new, empty snapshot, evicting the oldest if the ring is full.
    pub fn create_snapshot(&mut self) -> &mut GameStateSnapshot {
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(GameStateSnapshot::default());
        let last = self.ring.len() - 1;
        &mut self.ring[last]
    }

    /// Create, capture and link a snapshot of `state` at its current tick.
    pub fn capture_current(&mut self, state: &SimulationState) -> &GameStateSnapshot {
        let snapshot = self.create_snapshot();
        snapshot.capture(state);
        snapshot.link(state.current_ticks, state.srand0());
        snapshot
    }

    /// The most recent snapshot linked to `tick`, if it is still in the ring.
    pub fn get_linked_snapshot(&self, tick: u32) -> Option<&GameStateSnapshot> {
        self.ring
            .iter()
            .rev()
            .find(|s| s.linked && s.tick == tick)
    }

    /// Field-level comparison. `None` if either snapshot was never captured.
    pub fn compare(&self, left: &GameStateSnapshot, right: &GameStateSnapshot) -> Option<SnapshotDiff> {
        Some(compare(left.world.as_ref()?, right.world.as_ref()?))
    }

    /// Encode a snapshot for sending to a peer.
    pub fn serialise_snapshot(&self, snapshot: &GameStateSnapshot) -> Vec<u8> {
        serde_json::to_vec(snapshot).expect("GameStateSnapshot should always be JSON-serializable")
    }

    /// Decode a snapshot received from a peer.
    pub fn deserialise_snapshot(&self, bytes: &[u8]) -> Result<GameStateSnapshot, EngineError> {
        serde_json::from_slice(bytes)
            .map_err(|e| EngineError::World(parkworks_world::WorldError::SnapshotDecode(e)))
    }

    /// Write a human-readable comparison report.
    pub fn log_compare_data_to_file(&self, path: &Path, diff: &SnapshotDiff) -> Result<(), EngineError> {
        let io_err = |source| EngineError::ReportIo {
            path: path.to_owned(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let mut report = String::from("Desync report: local (left) vs server (right)\n\n");
        report.push_str(&diff.render());
        std::fs::write(path, report).map_err(io_err)?;
        tracing::info!(path = %path.display(), "desync report written");
        Ok(())
    }

    /// Snapshots currently held.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the ring holds nothing.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Snapshots held before the oldest is evicted.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. Ring bound -------------------------------------------------------

    #[test]
    fn ring_evicts_oldest_first() {
        let mut snapshots = GameStateSnapshots::new();
        let mut state = SimulationState::new(1);
        for tick in 0..40 {
            state.current_ticks = tick;
            snapshots.capture_current(&state);
        }
        assert_eq!(snapshots.len(), SNAPSHOT_CAPACITY);
        assert!(snapshots.get_linked_snapshot(7).is_none());
        assert!(snapshots.get_linked_snapshot(8).is_some());
        assert_eq!(snapshots.get_linked_snapshot(39).unwrap().tick(), 39);
    }

    #[test]
    fn unlinked_snapshot_is_not_found() {
        let mut snapshots = GameStateSnapshots::new();
        snapshots.create_snapshot().capture(&SimulationState::new(1));
        assert!(snapshots.get_linked_snapshot(0).is_none());
    }

    // -- 2. Compare and serialise -------------------------------------------

    #[test]
    fn compare_needs_captured_worlds() {
        let snapshots = GameStateSnapshots::new();
        let empty = GameStateSnapshot::default();
        assert!(snapshots.compare(&empty, &empty).is_none());
    }

    #[test]
    fn serialise_and_compare_detects_change() {
        let mut snapshots = GameStateSnapshots::new();
        let mut state = SimulationState::demo(4);
        let first = snapshots.capture_current(&state).clone();
        let bytes = snapshots.serialise_snapshot(&first);
        state.park.cash -= 1;
        let local = snapshots.capture_current(&state).clone();

        let remote = snapshots.deserialise_snapshot(&bytes).unwrap();
        let diff = snapshots.compare(&local, &remote).unwrap();
        assert_eq!(diff.globals.len(), 1);
        assert_eq!(diff.globals[0].path, "park.cash");
    }

    #[test]
    fn report_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshots = GameStateSnapshots::new();
        let state = SimulationState::demo(2);
        let a = snapshots.capture_current(&state).clone();
        let diff = snapshots.compare(&a, &a).unwrap();
        let path = dir.path().join("nested").join("report.txt");
        snapshots.log_compare_data_to_file(&path, &diff).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("no differences"));
    }
}
