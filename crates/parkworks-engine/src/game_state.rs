//! Simulation tick orchestration.
//!
//! [`GameState`] owns the active [`SimulationState`] together with everything
//! that has to happen around a simulation step: the action queue, replays,
//! desync snapshots and the network. Two entry points matter:
//!
//! - [`GameState::tick`] runs once per fixed frame tick. It decides how many
//!   simulation steps to run (game speed, network catch-up, pause and
//!   single-step) and handles network exchange and autosaves around them.
//! - [`GameState::update_logic`] is one simulation step. Its order of
//!   operations is fixed; every peer must apply actions at the same point
//!   for results to match.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use parkworks_world::action::{ActionQueue, GameAction};
use parkworks_world::state::{ScreenMode, SimulationState};
use parkworks_world::{guest, misc, park, ride, vehicle};
use tracing::{debug, error, info, warn};

use crate::collab::{Collaborators, ParkStorage};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::network::{Network, NetworkMode};
use crate::replay::{ReplayManager, ReplayRecord};
use crate::snapshots::GameStateSnapshots;

/// Most steps a client runs in one tick while catching up with the server.
pub const MAX_CLIENT_CATCH_UP: u32 = 10;

/// Highest speed reachable by stepping without debugging tools.
pub const MAX_GAME_SPEED: u8 = 4;

/// Speed unlocked by debugging tools.
pub const DEBUG_GAME_SPEED: u8 = 8;

// ---------------------------------------------------------------------------
// UpdateGuard
// ---------------------------------------------------------------------------

/// Marks the simulation step as running for as long as it is alive.
///
/// # Panics
///
/// [`enter`](Self::enter) panics if the step is already running.
#[derive(Debug)]
pub struct UpdateGuard {
    flag: Rc<Cell<bool>>,
}

impl UpdateGuard {
    /// Set `flag` until the guard is dropped.
    pub fn enter(flag: &Rc<Cell<bool>>) -> Self {
        if flag.replace(true) {
            error!("simulation step re-entered");
            panic!("simulation step re-entered while already running");
        }
        Self { flag: Rc::clone(flag) }
    }
}

impl Drop for UpdateGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

// ---------------------------------------------------------------------------
// AutosaveTimer
// ---------------------------------------------------------------------------

/// Real time since the last autosave. Paused until the first step after a
/// load or save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutosaveTimer {
    started_at_ms: Option<u64>,
}

impl AutosaveTimer {
    /// Start counting from `now_ms` unless already running.
    pub fn start_if_paused(&mut self, now_ms: u64) {
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(now_ms);
        }
    }

    /// Stop counting until the next start.
    pub fn pause(&mut self) {
        self.started_at_ms = None;
    }

    /// Whether the timer is counting.
    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Whether `interval_ms` has passed since the timer started.
    pub fn is_due(&self, now_ms: u64, interval_ms: u64) -> bool {
        self.started_at_ms
            .is_some_and(|start| now_ms.saturating_sub(start) >= interval_ms)
    }
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// What one call to [`GameState::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Steps the tick wanted to run.
    pub requested_updates: u32,
    /// Steps that advanced the logical clock.
    pub executed_updates: u32,
    /// The game was paused for this tick.
    pub paused: bool,
    /// A paused game ran one step on request.
    pub single_stepped: bool,
    /// The paused-frame housekeeping ran.
    pub paused_housekeeping: bool,
    /// File written if the tick autosaved.
    pub autosave: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The simulation together with everything that drives it tick by tick:
/// the action queue, replays, desync snapshots and the network.
pub struct GameState {
    state: SimulationState,
    queue: ActionQueue,
    replay: ReplayManager,
    snapshots: GameStateSnapshots,
    network: Box<dyn Network>,
    config: EngineConfig,
    game_speed: u8,
    single_step_requested: bool,
    screen_age: u32,
    screen_mode: ScreenMode,
    autosave: AutosaveTimer,
    in_update: Rc<Cell<bool>>,
    last_desync_report: Option<PathBuf>,
}

impl std::fmt::Debug for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameState")
            .field("current_ticks", &self.state.current_ticks)
            .field("game_speed", &self.game_speed)
            .field("screen_mode", &self.screen_mode)
            .field("network", &self.network.mode())
            .finish_non_exhaustive()
    }
}

impl GameState {
    /// Wrap `state` at speed 1, in playing mode.
    pub fn new(state: SimulationState, network: Box<dyn Network>, config: &EngineConfig) -> Self {
        Self {
            state,
            queue: ActionQueue::new(),
            replay: ReplayManager::new(config.replay_checksum_interval.max(1)),
            snapshots: GameStateSnapshots::new(),
            network,
            config: config.clone(),
            game_speed: 1,
            single_step_requested: false,
            screen_age: 0,
            screen_mode: ScreenMode::Playing,
            autosave: AutosaveTimer::default(),
            in_update: Rc::new(Cell::new(false)),
            last_desync_report: None,
        }
    }

    // -- accessors ----------------------------------------------------------

    /// The simulated world.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Mutable access to the world, for setup and tools.
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// The logical clock.
    pub fn current_ticks(&self) -> u32 {
        self.state.current_ticks
    }

    /// Actions waiting for their tick.
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Queue an action for its tick.
    pub fn enqueue(&mut self, action: GameAction) {
        self.queue.enqueue(action);
    }

    /// Replay recording and playback state.
    pub fn replay(&self) -> &ReplayManager {
        &self.replay
    }

    /// Mutable access to the replay manager.
    pub fn replay_mut(&mut self) -> &mut ReplayManager {
        &mut self.replay
    }

    /// Recent snapshots kept for desync reports.
    pub fn snapshots(&self) -> &GameStateSnapshots {
        &self.snapshots
    }

    /// The network this game is attached to.
    pub fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }

    /// Mutable access to the network.
    pub fn network_mut(&mut self) -> &mut dyn Network {
        self.network.as_mut()
    }

    /// `1..=8`. Each tick runs `2^(speed - 1)` steps.
    pub fn game_speed(&self) -> u8 {
        self.game_speed
    }

    /// Set the speed directly, clamped to `1..=8`.
    pub fn set_game_speed(&mut self, speed: u8) {
        self.game_speed = speed.clamp(1, DEBUG_GAME_SPEED);
    }

    /// Steps since the game started, wrapping.
    pub fn screen_age(&self) -> u32 {
        self.screen_age
    }

    /// What the game is being used for.
    pub fn screen_mode(&self) -> ScreenMode {
        self.screen_mode
    }

    /// Switch screen mode. Title and editor modes skip some park updates.
    pub fn set_screen_mode(&mut self, mode: ScreenMode) {
        self.screen_mode = mode;
    }

    /// A copy of the autosave timer.
    pub fn autosave_timer(&self) -> AutosaveTimer {
        self.autosave
    }

    /// Whether a simulation step is running right now.
    pub fn is_in_update(&self) -> bool {
        self.in_update.get()
    }

    /// The flag [`UpdateGuard`] sets, for collaborators that need to know
    /// whether they are called from inside a step.
    pub fn update_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.in_update)
    }

    /// Path of the last desync report written.
    pub fn last_desync_report(&self) -> Option<&PathBuf> {
        self.last_desync_report.as_ref()
    }

    // -- speed and pause ----------------------------------------------------

    /// Step up one speed. Beyond 4 the debug speed is reached directly, and
    /// only with debugging tools enabled.
    pub fn increase_game_speed(&mut self) {
        let max = if self.config.debugging_tools { 5 } else { MAX_GAME_SPEED };
        self.game_speed = max.min(self.game_speed + 1);
        if self.game_speed == 5 {
            self.game_speed = DEBUG_GAME_SPEED;
        }
        debug!(speed = self.game_speed, "game speed increased");
    }

    /// Step down one speed. From the debug speed this lands on 4.
    pub fn reduce_game_speed(&mut self) {
        self.game_speed = self.game_speed.saturating_sub(1).max(1);
        if self.game_speed == 7 {
            self.game_speed = MAX_GAME_SPEED;
        }
        debug!(speed = self.game_speed, "game speed reduced");
    }

    /// Run exactly one step on the next tick even though the game is
    /// paused. Ignored in network games.
    pub fn request_single_step(&mut self) {
        self.single_step_requested = true;
    }

    /// Flip the pause flag directly. Not recorded in replays; queue a
    /// `TogglePause` action for that.
    pub fn toggle_pause(&mut self) {
        self.state.toggle_pause();
    }

    // -- state replacement --------------------------------------------------

    /// Make `state` the active simulation, discarding the old one along with
    /// queued actions and snapshots.
    pub fn replace_state(&mut self, state: SimulationState) -> SimulationState {
        info!(tick = state.current_ticks, "simulation state replaced");
        self.queue.clear();
        self.snapshots.clear();
        self.autosave.pause();
        std::mem::replace(&mut self.state, state)
    }

    /// Start recording from the current tick.
    pub fn start_replay_recording(
        &mut self,
        name: &str,
        max_ticks: u32,
        path: Option<PathBuf>,
    ) -> Result<(), EngineError> {
        self.replay.start_recording(name, &self.state, max_ticks, path)
    }

    /// Finish recording at the current tick.
    pub fn stop_replay_recording(&mut self) -> Result<ReplayRecord, EngineError> {
        self.replay.stop_recording(self.state.current_ticks)
    }

    /// Replace the active state with the replay's initial state and play it.
    pub fn start_replay_playback(&mut self, record: ReplayRecord) -> Result<(), EngineError> {
        let state = self.replay.start_playback(record)?;
        self.replace_state(state);
        Ok(())
    }

    // -- the tick -----------------------------------------------------------

    /// One fixed tick: zero or more simulation steps plus network and
    /// autosave housekeeping.
    pub fn tick(&mut self, collab: &mut Collaborators, now_ms: u64) -> TickReport {
        let mut report = TickReport::default();

        collab
            .ui
            .handle_keyboard(self.screen_mode == ScreenMode::TitleDemo);

        if !self.state.is_paused() && collab.ui.is_previewing_title_sequence() {
            collab.ui.update_title_sequence();
        }

        self.network.update();
        self.exchange_snapshots();

        let mut num_updates = if self.network.is_connected_client() {
            let gap = i64::from(self.network.server_tick()) - i64::from(self.state.current_ticks);
            let clamped = gap.clamp(0, i64::from(MAX_CLIENT_CATCH_UP));
            if gap > clamped {
                debug!(gap, clamped, "client catch-up clamped");
            }
            clamped as u32
        } else if self.game_speed > 1 {
            1u32 << (self.game_speed - 1)
        } else {
            1
        };

        let mut is_paused = self.state.is_paused();
        if self.config.headless
            && self.config.pause_server_if_no_clients
            && self.network.mode() == NetworkMode::Server
            && self.network.player_count() <= 1
        {
            is_paused = true;
        }
        report.paused = is_paused;

        if is_paused {
            if self.single_step_requested && self.network.mode() == NetworkMode::None {
                report.single_stepped = true;
                self.state.toggle_pause();
                num_updates = 1;
            } else {
                num_updates = 0;
                misc::update_money_effects(&mut self.state);
                self.network.post_tick();
                self.replay.paused_pass(&self.state, &mut self.queue);
                let results = self.queue.process_queue(&mut self.state);
                self.replay.record_paused_actions(&results);
                self.state.entities.rebuild_spatial_index();
                report.paused_housekeeping = true;
            }
        }
        report.requested_updates = num_updates;

        if num_updates == 0 {
            self.network.tick();
        }

        for _ in 0..num_updates {
            if self.update_logic(collab, now_ms) {
                report.executed_updates += 1;
            }

            if self.game_speed == 1 {
                if collab.ui.input_state().is_idle() {
                    if collab.ui.viewport_scrolling() {
                        collab.ui.clear_viewport_scrolling();
                        break;
                    }
                } else {
                    break;
                }
            }
            // Never run past the server.
            if self.network.mode() == NetworkMode::Client
                && self.network.server_tick() == self.state.current_ticks
            {
                break;
            }
            if self.state.is_paused() {
                break;
            }
        }

        self.network.flush();

        if !self.screen_mode.suppresses_autosave() {
            report.autosave = self.autosave_check(collab.storage.as_mut(), now_ms);
        }

        if report.single_stepped
            && !self.state.is_paused()
            && self.screen_mode != ScreenMode::TitleDemo
        {
            self.state.toggle_pause();
        }
        self.single_step_requested = false;

        report
    }

    /// One simulation step. Returns `false` if a client is already at the
    /// server's tick and nothing was simulated.
    pub fn update_logic(&mut self, collab: &mut Collaborators, now_ms: u64) -> bool {
        let _guard = UpdateGuard::enter(&self.in_update);

        self.screen_age = self.screen_age.wrapping_add(1);
        if self.screen_age == 0 {
            self.screen_age = 1;
        }

        self.replay.update(&self.state, &mut self.queue);
        self.network.tick();

        let tick = self.state.current_ticks;
        let srand0 = self.state.srand0();
        match self.network.mode() {
            NetworkMode::Server => {
                if self.network.gamestate_snapshots_enabled() {
                    self.snapshots.capture_current(&self.state);
                }
                self.network.send_tick(tick, srand0);
            }
            NetworkMode::Client => {
                if self.network.server_tick() == tick {
                    return false;
                }
                if self.network.check_desynchronisation(tick, srand0)
                    && self.network.gamestate_snapshots_enabled()
                    && self.network.is_connected_client()
                {
                    self.snapshots.capture_current(&self.state);
                    self.network.request_gamestate_snapshot(tick);
                }
            }
            NetworkMode::None => {}
        }

        let state = &mut self.state;
        let day_changed = state.date.advance();

        park::update_scenario(state);
        let month = state.date.month();
        state.climate.update(&mut state.rng, month);
        state.map.update_tiles();

        // Guests must not path over elements that are still being placed.
        state.map.remove_provisional_elements();
        guest::update_all(state);
        state.map.restore_provisional_elements();

        vehicle::update_all(state);
        misc::update_all(state);
        ride::update_all(&mut state.rides);

        if self.screen_mode != ScreenMode::ScenarioEditor {
            park::update(state);
        }

        park::update_research(state);
        ride::update_ratings(&mut state.rides, &mut state.ride_ratings_cursor);
        ride::update_measurements(&mut state.rides, &state.entities);
        state.news.update_current();
        state.map.invalidate_animations();
        collab
            .audio
            .update_vehicle_sounds(&vehicle::sound_sources(&state.entities));
        collab
            .audio
            .update_crowd_noise(guest::crowd_noise_level(&state.entities));
        collab.audio.update_climate_sound(state.climate.sound());
        if self.screen_mode == ScreenMode::ScenarioEditor {
            collab.ui.open_windows_for_editor_step();
        }

        state.entities.rebuild_spatial_index();

        self.autosave.start_if_paused(now_ms);

        let results = self.queue.process_queue(&mut self.state);
        self.replay.record_actions(&results);

        self.network.post_tick();
        self.network.flush();

        self.state.current_ticks += 1;

        collab.hooks.on_interval_tick(self.state.current_ticks);
        if day_changed {
            collab.hooks.on_interval_day(&self.state.date);
        }
        true
    }

    // -- helpers ------------------------------------------------------------

    /// Serve snapshot requests as a server, diagnose a received snapshot as a
    /// client.
    fn exchange_snapshots(&mut self) {
        if self.network.mode() == NetworkMode::Server && self.network.gamestate_snapshots_enabled() {
            self.network.serve_snapshot_requests(&self.snapshots);
        }
        let Some(bytes) = self.network.take_received_snapshot() else {
            return;
        };
        let remote = match self.snapshots.deserialise_snapshot(&bytes) {
            Ok(remote) => remote,
            Err(err) => {
                warn!(%err, "discarding undecodable server snapshot");
                return;
            }
        };
        let Some(local) = self.snapshots.get_linked_snapshot(remote.tick()) else {
            warn!(tick = remote.tick(), "no local snapshot for server snapshot");
            return;
        };
        let Some(diff) = self.snapshots.compare(local, &remote) else {
            warn!(tick = remote.tick(), "snapshot without world data");
            return;
        };
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let path = self
            .config
            .desync_log_dir
            .join(format!("desync_{unix}_{}.txt", remote.tick()));
        match self.snapshots.log_compare_data_to_file(&path, &diff) {
            Ok(()) => self.last_desync_report = Some(path),
            Err(err) => warn!(%err, "failed to write desync report"),
        }
    }

    fn autosave_check(&mut self, storage: &mut dyn ParkStorage, now_ms: u64) -> Option<PathBuf> {
        let interval = self.config.autosave_frequency.interval_ms()?;
        if !self.autosave.is_due(now_ms, interval) {
            return None;
        }
        self.autosave.pause();
        match storage.autosave(&self.state) {
            Ok(path) => {
                info!(path = %path.display(), tick = self.state.current_ticks, "autosaved");
                Some(path)
            }
            Err(err) => {
                warn!(%err, "autosave failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
