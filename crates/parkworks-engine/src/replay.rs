//! Recording and playback of game-action streams.
//!
//! A recording captures the world at the tick recording started, every game
//! action executed afterwards together with the tick it executed at, and a
//! BLAKE3 state checksum every `checksum_interval` ticks. The result is a
//! [`ReplayRecord`], written to disk as JSON when recording stops.
//!
//! Playback restores the initial world, feeds the recorded actions back into
//! the [`ActionQueue`] at their ticks and compares checksums as it goes. The
//! first checksum that differs is kept as a [`ReplayMismatch`].
//!
//! Actions applied while the game is paused never reach a simulation step.
//! They are recorded with [`ActionPhase::Paused`] and the index of the paused
//! pass they ran in, and [`ReplayManager::paused_pass`] hands them back on the
//! same pass during playback. An unpause recorded while paused therefore
//! unpauses the playback after the same number of paused passes.
//!
//! ```
//! use parkworks_engine::replay::{ReplayManager, ReplayMode};
//! use parkworks_world::prelude::*;
//!
//! let mut state = SimulationState::demo(3);
//! let mut queue = ActionQueue::new();
//! let mut replay = ReplayManager::new(10);
//! replay.start_recording("demo", &state, 20, None).unwrap();
//! for _ in 0..20 {
//!     replay.update(&state, &mut queue);
//!     state.current_ticks += 1;
//! }
//! replay.update(&state, &mut queue);
//! assert_eq!(replay.mode(), ReplayMode::Normal);
//! assert_eq!(replay.last_record().unwrap().tick_count, 20);
//! ```

use std::path::{Path, PathBuf};

use parkworks_world::action::{ActionQueue, ActionResult, GameAction};
use parkworks_world::snapshot::WorldSnapshot;
use parkworks_world::state::SimulationState;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::EngineError;

/// Current replay file version.
pub const REPLAY_VERSION: u32 = 2;

/// What the replay manager is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Neither recording nor playing.
    Normal,
    /// Recording executed actions and checksums.
    Recording,
    /// Feeding a recording back into the simulation.
    Playing,
}

/// Where in a tick a recorded action was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPhase {
    /// At the end of a simulation step.
    #[default]
    Step,
    /// During paused housekeeping, before any step of that tick. `pass`
    /// counts the paused passes spent at that tick, from zero.
    Paused { pass: u32 },
}

/// One executed action in a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    /// The action, with `tick` set to the tick it executed at.
    pub action: GameAction,
    /// Where in the tick it was applied.
    #[serde(default)]
    pub phase: ActionPhase,
}

impl ReplayMode {
    fn name(self) -> &'static str {
        match self {
            ReplayMode::Normal => "idle",
            ReplayMode::Recording => "recording",
            ReplayMode::Playing => "playing",
        }
    }
}

// ---------------------------------------------------------------------------
// ReplayRecord
// ---------------------------------------------------------------------------

/// A complete recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// File format version, [`REPLAY_VERSION`] when written.
    pub version: u32,
    /// Name given when recording started.
    pub name: String,
    /// Tick of the world in `initial_state`.
    pub start_tick: u32,
    /// Ticks covered. Playback ends at `start_tick + tick_count`.
    pub tick_count: u32,
    /// The world when recording began.
    pub initial_state: WorldSnapshot,
    /// Executed actions in execution order.
    pub actions: Vec<RecordedAction>,
    /// `(tick, checksum)` taken before the tick's world update.
    pub checksums: Vec<(u32, String)>,
}

/// On-disk wrapper. `hash` covers the serialized record.
#[derive(Debug, Serialize, Deserialize)]
struct ReplayFile {
    record: ReplayRecord,
    hash: String,
}

impl ReplayRecord {
    /// The tick at which playback stops.
    pub fn end_tick(&self) -> u32 {
        self.start_tick.saturating_add(self.tick_count)
    }

    /// Write the record as JSON.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let io_err = |source| EngineError::ReplayIo {
            path: path.to_owned(),
            source,
        };
        let body = serde_json::to_vec(self).expect("ReplayRecord should always be JSON-serializable");
        let file = ReplayFile {
            record: self.clone(),
            hash: blake3::hash(&body).to_hex().to_string(),
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(&file).expect("ReplayFile should always be JSON-serializable");
        std::fs::write(path, json).map_err(io_err)
    }

    /// Read and verify a record written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let bytes = std::fs::read(path).map_err(|source| EngineError::ReplayIo {
            path: path.to_owned(),
            source,
        })?;
        let file: ReplayFile =
            serde_json::from_slice(&bytes).map_err(|e| EngineError::ReplayFormat(e.to_string()))?;
        if file.record.version != REPLAY_VERSION {
            return Err(EngineError::ReplayFormat(format!(
                "unsupported replay version {}",
                file.record.version
            )));
        }
        let body = serde_json::to_vec(&file.record).expect("ReplayRecord should always be JSON-serializable");
        if blake3::hash(&body).to_hex().as_str() != file.hash {
            return Err(EngineError::ReplayFormat("hash does not match contents".into()));
        }
        Ok(file.record)
    }
}

/// The first checksum that differed during playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    /// Tick whose checksum differed.
    pub tick: u32,
    /// Checksum stored in the recording.
    pub expected: String,
    /// Checksum of the played-back world.
    pub actual: String,
}

// ---------------------------------------------------------------------------
// ReplayManager
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Recording {
    record: ReplayRecord,
    max_ticks: u32,
    path: Option<PathBuf>,
}

#[derive(Debug)]
struct Playback {
    record: ReplayRecord,
    next_action: usize,
    next_checksum: usize,
}

impl Playback {
    /// Enqueue recorded actions due at or before `now`. On a paused pass,
    /// stop at the first action applied by a step or by a later pass.
    fn inject_due(&mut self, now: u32, queue: &mut ActionQueue, paused_pass: Option<u32>) {
        while let Some(recorded) = self.record.actions.get(self.next_action) {
            if recorded.action.tick > now {
                break;
            }
            if let Some(current) = paused_pass {
                let due = match recorded.phase {
                    ActionPhase::Paused { pass } => recorded.action.tick < now || pass <= current,
                    ActionPhase::Step => false,
                };
                if !due {
                    break;
                }
            }
            queue.enqueue(recorded.action.clone());
            self.next_action += 1;
        }
    }
}

#[derive(Debug)]
enum Session {
    Idle,
    Recording(Recording),
    Playing(Playback),
}

/// Drives recording and playback from inside the simulation step.
#[derive(Debug)]
pub struct ReplayManager {
    session: Session,
    checksum_interval: u32,
    mismatch: Option<ReplayMismatch>,
    last_record: Option<ReplayRecord>,
    /// `(tick, pass)` of the most recent paused pass.
    paused_pass: Option<(u32, u32)>,
}

impl ReplayManager {
    /// # Panics
    ///
    /// Panics if `checksum_interval` is zero.
    pub fn new(checksum_interval: u32) -> Self {
        assert!(checksum_interval > 0, "checksum interval must be positive");
        Self {
            session: Session::Idle,
            checksum_interval,
            mismatch: None,
            last_record: None,
            paused_pass: None,
        }
    }

    /// What the manager is doing.
    pub fn mode(&self) -> ReplayMode {
        match self.session {
            Session::Idle => ReplayMode::Normal,
            Session::Recording(_) => ReplayMode::Recording,
            Session::Playing(_) => ReplayMode::Playing,
        }
    }

    /// The first checksum mismatch of the current or last playback.
    pub fn mismatch(&self) -> Option<&ReplayMismatch> {
        self.mismatch.as_ref()
    }

    /// The record produced by the last finished recording.
    pub fn last_record(&self) -> Option<&ReplayRecord> {
        self.last_record.as_ref()
    }

    fn wrong_mode(&self, operation: &'static str) -> EngineError {
        EngineError::ReplayMode {
            mode: self.mode().name(),
            operation,
        }
    }

    /// Begin recording from `state`. Recording stops by itself after
    /// `max_ticks` ticks and is then written to `path`, if given.
    pub fn start_recording(
        &mut self,
        name: &str,
        state: &SimulationState,
        max_ticks: u32,
        path: Option<PathBuf>,
    ) -> Result<(), EngineError> {
        if !matches!(self.session, Session::Idle) {
            return Err(self.wrong_mode("start recording"));
        }
        info!(name, tick = state.current_ticks, max_ticks, "replay recording started");
        self.session = Session::Recording(Recording {
            record: ReplayRecord {
                version: REPLAY_VERSION,
                name: name.to_owned(),
                start_tick: state.current_ticks,
                tick_count: 0,
                initial_state: WorldSnapshot::capture(state),
                actions: Vec::new(),
                checksums: Vec::new(),
            },
            max_ticks,
            path,
        });
        self.paused_pass = None;
        Ok(())
    }

    /// Finish recording at `current_tick` and write the file, if a path was
    /// given.
    pub fn stop_recording(&mut self, current_tick: u32) -> Result<ReplayRecord, EngineError> {
        let Session::Recording(_) = self.session else {
            return Err(self.wrong_mode("stop recording"));
        };
        let Session::Recording(mut recording) = std::mem::replace(&mut self.session, Session::Idle) else {
            unreachable!("mode checked above");
        };
        let record = &mut recording.record;
        record.tick_count = current_tick.saturating_sub(record.start_tick);
        info!(
            name = %record.name,
            ticks = record.tick_count,
            actions = record.actions.len(),
            "replay recording stopped"
        );
        if let Some(path) = &recording.path {
            record.save(path)?;
            info!(path = %path.display(), "replay written");
        }
        self.last_record = Some(recording.record.clone());
        Ok(recording.record)
    }

    /// Append actions executed by a simulation step. Ignored unless
    /// recording.
    pub fn record_actions(&mut self, results: &[ActionResult]) {
        for result in results {
            self.record_action(result, ActionPhase::Step);
        }
    }

    /// Append actions executed during paused housekeeping.
    ///
    /// Call after [`paused_pass`](Self::paused_pass) for the same pass.
    pub fn record_paused_actions(&mut self, results: &[ActionResult]) {
        let pass = self.paused_pass.map_or(0, |(_, pass)| pass);
        for result in results {
            self.record_action(result, ActionPhase::Paused { pass });
        }
    }

    /// Append one executed action. Ignored unless recording.
    pub fn record_action(&mut self, result: &ActionResult, phase: ActionPhase) {
        if let Session::Recording(recording) = &mut self.session {
            let mut action = result.action.clone();
            action.tick = result.executed_at;
            recording.record.actions.push(RecordedAction { action, phase });
        }
    }

    /// Called once per paused pass of a tick, where no step runs. Counts
    /// the pass and, when playing, feeds back the actions that were applied
    /// on this pass.
    pub fn paused_pass(&mut self, state: &SimulationState, queue: &mut ActionQueue) {
        let now = state.current_ticks;
        let pass = match self.paused_pass {
            Some((tick, pass)) if tick == now => pass + 1,
            _ => 0,
        };
        self.paused_pass = Some((now, pass));
        if let Session::Playing(playback) = &mut self.session {
            playback.inject_due(now, queue, Some(pass));
        }
    }

    /// Begin playing `record` back. Returns the world to continue from.
    pub fn start_playback(&mut self, record: ReplayRecord) -> Result<SimulationState, EngineError> {
        if !matches!(self.session, Session::Idle) {
            return Err(self.wrong_mode("start playback"));
        }
        let state = record.initial_state.restore()?;
        info!(
            name = %record.name,
            start = record.start_tick,
            ticks = record.tick_count,
            "replay playback started"
        );
        self.mismatch = None;
        self.paused_pass = None;
        self.session = Session::Playing(Playback {
            record,
            next_action: 0,
            next_checksum: 0,
        });
        Ok(state)
    }

    /// End playback early, logging whether any mismatch was seen.
    pub fn stop_playback(&mut self) {
        if let Session::Playing(playback) = std::mem::replace(&mut self.session, Session::Idle) {
            match &self.mismatch {
                None => info!(name = %playback.record.name, "replay playback finished, no mismatches"),
                Some(m) => warn!(name = %playback.record.name, tick = m.tick, "replay playback finished with mismatch"),
            }
        }
    }

    /// Called once per simulation step, before the world is updated.
    pub fn update(&mut self, state: &SimulationState, queue: &mut ActionQueue) {
        let now = state.current_ticks;
        match &mut self.session {
            Session::Idle => {}
            Session::Recording(recording) => {
                let elapsed = now.saturating_sub(recording.record.start_tick);
                if elapsed >= recording.max_ticks {
                    if let Err(err) = self.stop_recording(now) {
                        error!(%err, "failed to finish replay recording");
                    }
                    return;
                }
                if elapsed % self.checksum_interval == 0 {
                    let checksum = WorldSnapshot::capture(state).checksum();
                    recording.record.checksums.push((now, checksum));
                }
            }
            Session::Playing(playback) => {
                if now >= playback.record.end_tick() {
                    self.stop_playback();
                    return;
                }
                playback.inject_due(now, queue, None);
                let checksums = &playback.record.checksums;
                while let Some((tick, expected)) = checksums.get(playback.next_checksum) {
                    if *tick > now {
                        break;
                    }
                    playback.next_checksum += 1;
                    if *tick < now || self.mismatch.is_some() {
                        continue;
                    }
                    let actual = WorldSnapshot::capture(state).checksum();
                    if &actual != expected {
                        warn!(tick = now, %expected, %actual, "replay checksum mismatch");
                        self.mismatch = Some(ReplayMismatch {
                            tick: now,
                            expected: expected.clone(),
                            actual,
                        });
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
