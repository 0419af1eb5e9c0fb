//! Integration tests for tick scheduling.
//!
//! These tests drive [`GameState::tick`] and [`Context`] frames with scripted
//! clocks, networks and UI state, and check how many simulation steps run.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use parkworks_engine::prelude::*;
use parkworks_world::misc::MoneyEffect;

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct NetCounts {
    updates: u32,
    ticks: u32,
    post_ticks: u32,
    flushes: u32,
}

/// A network whose mode and server tick are set by the test.
struct ScriptedNetwork {
    mode: NetworkMode,
    server_tick: Rc<Cell<u32>>,
    counts: Rc<RefCell<NetCounts>>,
}

impl ScriptedNetwork {
    fn new(mode: NetworkMode) -> (Self, Rc<Cell<u32>>, Rc<RefCell<NetCounts>>) {
        let server_tick = Rc::new(Cell::new(0));
        let counts = Rc::new(RefCell::new(NetCounts::default()));
        let net = Self {
            mode,
            server_tick: Rc::clone(&server_tick),
            counts: Rc::clone(&counts),
        };
        (net, server_tick, counts)
    }
}

impl Network for ScriptedNetwork {
    fn mode(&self) -> NetworkMode {
        self.mode
    }

    fn status(&self) -> NetworkStatus {
        if self.mode == NetworkMode::None {
            NetworkStatus::None
        } else {
            NetworkStatus::Connected
        }
    }

    fn auth_status(&self) -> NetworkAuth {
        NetworkAuth::Ok
    }

    fn server_tick(&self) -> u32 {
        self.server_tick.get()
    }

    fn update(&mut self) {
        self.counts.borrow_mut().updates += 1;
    }

    fn tick(&mut self) {
        self.counts.borrow_mut().ticks += 1;
    }

    fn post_tick(&mut self) {
        self.counts.borrow_mut().post_ticks += 1;
    }

    fn flush(&mut self) {
        self.counts.borrow_mut().flushes += 1;
    }

    fn send_tick(&mut self, _tick: u32, _srand0: u32) {}

    fn check_desynchronisation(&mut self, _tick: u32, _srand0: u32) -> bool {
        false
    }

    fn is_desynchronised(&self) -> bool {
        false
    }

    fn request_gamestate_snapshot(&mut self, _tick: u32) {}

    fn gamestate_snapshots_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct HookCounts {
    interval_ticks: Vec<u32>,
    days: u32,
    frames: u32,
    saw_guard: bool,
}

struct RecordingHooks {
    counts: Rc<RefCell<HookCounts>>,
    in_update: Rc<Cell<bool>>,
}

impl ScriptHooks for RecordingHooks {
    fn on_interval_tick(&mut self, tick: u32) {
        let mut counts = self.counts.borrow_mut();
        counts.interval_ticks.push(tick);
        counts.saw_guard |= self.in_update.get();
    }

    fn on_interval_day(&mut self, _date: &GameDate) {
        self.counts.borrow_mut().days += 1;
    }

    fn tick(&mut self) {
        self.counts.borrow_mut().frames += 1;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn single_player() -> GameState {
    GameState::new(SimulationState::demo(17), Box::new(NullNetwork), &EngineConfig::default())
}

fn client_at(current: u32, server: u32) -> (GameState, Rc<RefCell<NetCounts>>) {
    let (net, server_tick, counts) = ScriptedNetwork::new(NetworkMode::Client);
    server_tick.set(server);
    let mut state = SimulationState::demo(17);
    state.current_ticks = current;
    (GameState::new(state, Box::new(net), &EngineConfig::default()), counts)
}

fn headless_context(game: GameState) -> (Context, ManualClock) {
    let config = EngineConfig {
        headless: true,
        ..Default::default()
    };
    let clock = ManualClock::new();
    let ctx = Context::new(config, game, Collaborators::headless(), Box::new(clock.clone()))
        .expect("headless context");
    (ctx, clock)
}

fn collab_with_ui() -> (Collaborators, HeadlessUi) {
    let ui = HeadlessUi::new();
    let mut collab = Collaborators::headless();
    collab.ui = Box::new(ui.clone());
    (collab, ui)
}

// ===========================================================================
// 1. Frame accumulation
// ===========================================================================

#[test]
fn three_and_a_half_ticks_run_three() {
    let (mut ctx, _) = headless_context(single_player());
    ctx.run_frame_with_delta(Duration::from_micros(3 * TICK_MICROS + TICK_MICROS / 2));
    assert_eq!(ctx.game_state().current_ticks(), 3);
    assert_eq!(ctx.ticks_accumulator(), Duration::from_micros(TICK_MICROS / 2));
    assert_eq!(ctx.current_realtime_ticks(), 3);
}

#[test]
fn pause_freezes_simulation_but_not_real_time() {
    let (mut ctx, clock) = headless_context(single_player());
    ctx.game_state_mut().toggle_pause();
    for _ in 0..20 {
        clock.advance(Duration::from_micros(TICK_MICROS));
        ctx.run_frame();
    }
    assert_eq!(ctx.game_state().current_ticks(), 0);
    assert_eq!(ctx.current_realtime_ticks(), 20);
}

// ===========================================================================
// 2. Updates per tick
// ===========================================================================

#[test]
fn fast_forward_runs_power_of_two() {
    let mut game = single_player();
    let mut collab = Collaborators::headless();
    game.set_game_speed(3);
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.requested_updates, 4);
    assert_eq!(report.executed_updates, 4);
    assert_eq!(game.current_ticks(), 4);
}

#[test]
fn client_catch_up_is_clamped() {
    let (mut game, _) = client_at(100, 250);
    let mut collab = Collaborators::headless();
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.requested_updates, 10);
    assert_eq!(game.current_ticks(), 110);
    game.tick(&mut collab, 0);
    assert_eq!(game.current_ticks(), 120);
}

#[test]
fn client_ahead_of_server_runs_nothing() {
    let (mut game, counts) = client_at(300, 250);
    let mut collab = Collaborators::headless();
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.requested_updates, 0);
    assert_eq!(game.current_ticks(), 300);
    let counts = counts.borrow();
    assert_eq!(counts.updates, 1);
    assert_eq!(counts.ticks, 1, "network still ticks once without steps");
    assert_eq!(counts.flushes, 1);
}

#[test]
fn client_stops_at_server_tick() {
    let (mut game, _) = client_at(100, 103);
    let mut collab = Collaborators::headless();
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 3);
    assert_eq!(game.current_ticks(), 103);
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 0);
    assert_eq!(game.current_ticks(), 103);
}

// ===========================================================================
// 3. Pause and single-step
// ===========================================================================

#[test]
fn paused_housekeeping_runs_once() {
    let (net, _, counts) = ScriptedNetwork::new(NetworkMode::None);
    let mut game = GameState::new(SimulationState::demo(17), Box::new(net), &EngineConfig::default());
    let effect = game
        .state_mut()
        .entities
        .spawn(CoordsXYZ::new(64, 64, 0), EntityData::MoneyEffect(MoneyEffect::new(5)));
    game.enqueue(GameAction::new(0, ActionKind::SetParkEntranceFee { fee: 33 }));
    game.toggle_pause();

    let mut collab = Collaborators::headless();
    let report = game.tick(&mut collab, 0);

    assert!(report.paused);
    assert!(report.paused_housekeeping);
    assert_eq!(report.requested_updates, 0);
    assert_eq!(game.current_ticks(), 0);
    assert_eq!(game.state().park.entrance_fee, 33, "queued action applied while paused");
    match &game.state().entities.get(effect).unwrap().data {
        EntityData::MoneyEffect(m) => assert_eq!(m.move_delay, 1),
        other => panic!("unexpected entity data {other:?}"),
    }
    let counts = counts.borrow();
    assert_eq!(counts.post_ticks, 1);
    assert_eq!(counts.ticks, 1);
}

#[test]
fn single_step_runs_one_update_and_repauses() {
    let mut game = single_player();
    let mut collab = Collaborators::headless();
    game.set_game_speed(4);
    game.toggle_pause();
    game.request_single_step();

    let report = game.tick(&mut collab, 0);
    assert!(report.single_stepped);
    assert_eq!(report.executed_updates, 1);
    assert!(game.state().is_paused());

    // The request is consumed.
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 0);
    assert_eq!(game.current_ticks(), 1);
}

#[test]
fn single_step_ignored_in_network_game() {
    let (net, _, _) = ScriptedNetwork::new(NetworkMode::Server);
    let mut game = GameState::new(SimulationState::demo(17), Box::new(net), &EngineConfig::default());
    let mut collab = Collaborators::headless();
    game.toggle_pause();
    game.request_single_step();
    let report = game.tick(&mut collab, 0);
    assert!(!report.single_stepped);
    assert_eq!(game.current_ticks(), 0);
}

#[test]
fn pause_action_stops_the_loop() {
    let mut game = single_player();
    let mut collab = Collaborators::headless();
    game.set_game_speed(4);
    game.enqueue(GameAction::new(2, ActionKind::TogglePause));
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.requested_updates, 8);
    assert_eq!(report.executed_updates, 3);
    assert!(game.state().is_paused());
}

#[test]
fn lone_headless_server_pauses() {
    let (net, _, _) = ScriptedNetwork::new(NetworkMode::Server);
    let config = EngineConfig {
        headless: true,
        pause_server_if_no_clients: true,
        ..Default::default()
    };
    let mut game = GameState::new(SimulationState::demo(17), Box::new(net), &config);
    let mut collab = Collaborators::headless();
    let report = game.tick(&mut collab, 0);
    assert!(report.paused);
    assert_eq!(game.current_ticks(), 0);
    assert!(!game.state().is_paused(), "auto-pause does not touch pause flags");
}

// ===========================================================================
// 4. Input smoothing at normal speed
// ===========================================================================

#[test]
fn scroll_gesture_stops_catch_up() {
    let (mut game, _) = client_at(0, 5);
    let (mut collab, ui) = collab_with_ui();
    ui.set_input_state(InputState::Normal);
    ui.set_viewport_scrolling(true);

    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 1);
    assert!(!collab.ui.viewport_scrolling(), "scroll flag cleared");

    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 4);
}

#[test]
fn held_pointer_stops_catch_up() {
    let (mut game, _) = client_at(0, 5);
    let (mut collab, ui) = collab_with_ui();
    ui.set_input_state(InputState::WidgetPressed);
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 1);
}

#[test]
fn fast_forward_ignores_input() {
    let mut game = single_player();
    let (mut collab, ui) = collab_with_ui();
    ui.set_input_state(InputState::ViewportDrag);
    game.set_game_speed(2);
    let report = game.tick(&mut collab, 0);
    assert_eq!(report.executed_updates, 2);
}

// ===========================================================================
// 5. Autosave
// ===========================================================================

fn autosave_game(dir: &std::path::Path) -> (GameState, Collaborators) {
    let config = EngineConfig {
        autosave_frequency: AutosaveFrequency::EveryMinute,
        ..Default::default()
    };
    let game = GameState::new(SimulationState::demo(17), Box::new(NullNetwork), &config);
    let mut collab = Collaborators::headless();
    collab.storage = Box::new(JsonParkStorage::new(dir, 3));
    (game, collab)
}

#[test]
fn autosave_after_interval() {
    let dir = tempfile::tempdir().unwrap();
    let (mut game, mut collab) = autosave_game(dir.path());
    assert!(!game.autosave_timer().is_running());

    assert!(game.tick(&mut collab, 1_000).autosave.is_none());
    assert!(game.autosave_timer().is_running());
    assert!(game.tick(&mut collab, 30_000).autosave.is_none());

    let path = game.tick(&mut collab, 61_000).autosave.expect("autosave due");
    assert!(path.exists());
    // Saving pauses the timer; the next step starts it again.
    assert!(!game.autosave_timer().is_running());
    game.tick(&mut collab, 62_000);
    assert!(game.autosave_timer().is_running());
}

#[test]
fn title_demo_never_autosaves() {
    let dir = tempfile::tempdir().unwrap();
    let (mut game, mut collab) = autosave_game(dir.path());
    game.set_screen_mode(ScreenMode::TitleDemo);
    game.tick(&mut collab, 0);
    assert!(game.tick(&mut collab, 600_000).autosave.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// ===========================================================================
// 6. Hooks
// ===========================================================================

#[test]
fn hooks_fire_inside_the_step() {
    let mut game = single_player();
    let counts = Rc::new(RefCell::new(HookCounts::default()));
    let mut collab = Collaborators::headless();
    collab.hooks = Box::new(RecordingHooks {
        counts: Rc::clone(&counts),
        in_update: game.update_flag(),
    });

    // A day lasts a little over 500 steps.
    for _ in 0..700 {
        game.update_logic(&mut collab, 0);
    }

    let counts = counts.borrow();
    assert_eq!(counts.interval_ticks.len(), 700);
    assert_eq!(counts.interval_ticks[0], 1);
    assert!(counts.saw_guard);
    assert!(counts.days >= 1);
    assert!(!game.is_in_update());
}

#[test]
fn frame_hooks_tick_once_per_tick() {
    let counts = Rc::new(RefCell::new(HookCounts::default()));
    let game = single_player();
    let flag = game.update_flag();
    let (mut ctx, _) = headless_context(game);
    ctx.collaborators_mut().hooks = Box::new(RecordingHooks {
        counts: Rc::clone(&counts),
        in_update: flag,
    });
    ctx.run_frame_with_delta(Duration::from_micros(2 * TICK_MICROS));
    assert_eq!(counts.borrow().frames, 2);
}
