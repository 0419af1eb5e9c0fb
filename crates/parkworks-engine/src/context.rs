//! The frame scheduler.
//!
//! [`Context`] turns irregular host frames into fixed 25 ms simulation ticks.
//! Elapsed time is collected in an accumulator and drained one tick at a
//! time. Two strategies exist:
//!
//! - **Fixed frame**: ticks, then one draw. If less than a tick is pending
//!   the frame sleeps for the remainder instead of spinning.
//! - **Variable frame**: used when drawing with uncapped frame rate at up to
//!   4x speed. Entity positions are captured around every tick and the draw
//!   blends them by the leftover fraction of a tick.
//!
//! Both accumulators are capped so a stall never turns into a burst of
//! hundreds of catch-up ticks.
//!
//! Only one `Context` may exist per thread.
//!
//! ```
//! use std::time::Duration;
//! use parkworks_engine::prelude::*;
//!
//! let config = EngineConfig { headless: true, ..Default::default() };
//! let game = GameState::new(SimulationState::demo(1), Box::new(NullNetwork), &config);
//! let clock = ManualClock::new();
//! let mut context =
//!     Context::new(config, game, Collaborators::headless(), Box::new(clock.clone())).unwrap();
//!
//! clock.advance(Duration::from_millis(100));
//! context.run_frame();
//! assert_eq!(context.game_state().current_ticks(), 4);
//! ```

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use parkworks_world::state::ScreenMode;
use tracing::{debug, error, info, warn};

use crate::collab::{Collaborators, DrawingEngine};
use crate::config::{DrawingEngineKind, EngineConfig};
use crate::error::{EngineError, LoadError};
use crate::game_state::{GameState, TickReport, MAX_GAME_SPEED};
use crate::timer::FrameClock;
use crate::tweener::EntityTweener;

/// Duration of one simulation tick in microseconds.
pub const TICK_MICROS: u64 = 25_000;

/// Ticks the tick accumulator may hold.
pub const GAME_MAX_UPDATES: u64 = 4;

/// Ticks the real-time accumulator may hold.
pub const REALTIME_MAX_UPDATES: u64 = 10;

const TICKS_ACCUMULATOR_CAP: u64 = GAME_MAX_UPDATES * TICK_MICROS;
const REALTIME_ACCUMULATOR_CAP: u64 = REALTIME_MAX_UPDATES * TICK_MICROS;

thread_local! {
    static CONTEXT_ALIVE: Cell<bool> = const { Cell::new(false) };
}

/// The top-level screen being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// Title screen with a demo park running behind it.
    Title,
    /// A park being played.
    Game,
}

/// Owns the game state and its collaborators and runs host frames.
pub struct Context {
    config: EngineConfig,
    game_state: GameState,
    collab: Collaborators,
    clock: Box<dyn FrameClock>,
    tweener: EntityTweener,
    drawing_engine: Option<Box<dyn DrawingEngine>>,
    scene: Scene,
    ticks_accumulator: u64,
    realtime_accumulator: u64,
    current_realtime_ticks: u32,
    palette_effect_frame: u64,
    variable_frame: bool,
    last_tick: TickReport,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("game_state", &self.game_state)
            .field("scene", &self.scene)
            .field("ticks_accumulator", &self.ticks_accumulator)
            .field("variable_frame", &self.variable_frame)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Build the context and, unless headless, its drawing engine.
    ///
    /// Fails with [`EngineError::ContextExists`] if another context is alive
    /// on this thread.
    pub fn new(
        config: EngineConfig,
        game_state: GameState,
        collab: Collaborators,
        clock: Box<dyn FrameClock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if CONTEXT_ALIVE.with(|alive| alive.replace(true)) {
            return Err(EngineError::ContextExists);
        }
        let mut context = Self {
            config,
            game_state,
            collab,
            clock,
            tweener: EntityTweener::new(),
            drawing_engine: None,
            scene: Scene::Game,
            ticks_accumulator: 0,
            realtime_accumulator: 0,
            current_realtime_ticks: 0,
            palette_effect_frame: 0,
            variable_frame: false,
            last_tick: TickReport::default(),
        };
        if !context.config.headless {
            context.initialise_drawing_engine()?;
        }
        context.variable_frame = context.should_run_variable_frame();
        info!(
            headless = context.config.headless,
            variable_frame = context.variable_frame,
            "context created"
        );
        Ok(context)
    }

    // -- accessors ----------------------------------------------------------

    /// The configuration the context was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The active game.
    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    /// Mutable access to the active game.
    pub fn game_state_mut(&mut self) -> &mut GameState {
        &mut self.game_state
    }

    /// Swap or reconfigure collaborators between frames.
    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        &mut self.collab
    }

    /// The interpolator used by variable frames.
    pub fn tweener(&self) -> &EntityTweener {
        &self.tweener
    }

    /// The scene being shown.
    pub fn scene(&self) -> Scene {
        self.scene
    }

    /// Switch scenes. The title scene runs its park as a title demo.
    pub fn set_scene(&mut self, scene: Scene) {
        self.scene = scene;
        let mode = match scene {
            Scene::Title => ScreenMode::TitleDemo,
            Scene::Game => ScreenMode::Playing,
        };
        self.game_state.set_screen_mode(mode);
    }

    /// Ticks of wall-clock time, counted regardless of pause and speed.
    pub fn current_realtime_ticks(&self) -> u32 {
        self.current_realtime_ticks
    }

    /// Microseconds of palette animation played.
    pub fn palette_effect_frame(&self) -> u64 {
        self.palette_effect_frame
    }

    /// Time not yet turned into ticks.
    pub fn ticks_accumulator(&self) -> Duration {
        Duration::from_micros(self.ticks_accumulator)
    }

    /// What the game state did on the most recent tick.
    pub fn last_tick(&self) -> &TickReport {
        &self.last_tick
    }

    /// Whether the last frame ran with interpolation.
    pub fn is_variable_frame(&self) -> bool {
        self.variable_frame
    }

    /// Kind of the drawing engine in use. `None` when headless.
    pub fn drawing_engine_kind(&self) -> Option<DrawingEngineKind> {
        self.drawing_engine.as_ref().map(|e| e.kind())
    }

    // -- frame scheduling ---------------------------------------------------

    /// Run one host frame, measuring elapsed time with the frame clock.
    pub fn run_frame(&mut self) {
        let delta = self.clock.elapsed_and_restart();
        self.run_frame_with_delta(delta);
    }

    /// Run one host frame as if `delta` had elapsed since the previous one.
    ///
    /// Both accumulators are filled up to their caps before the frame runs
    /// as fixed or variable. Switching between the two drops any
    /// interpolation still on screen.
    pub fn run_frame_with_delta(&mut self, delta: Duration) {
        let delta = u64::try_from(delta.as_micros()).unwrap_or(u64::MAX);
        self.ticks_accumulator = self
            .ticks_accumulator
            .saturating_add(delta)
            .min(TICKS_ACCUMULATOR_CAP);
        self.realtime_accumulator = self
            .realtime_accumulator
            .saturating_add(delta)
            .min(REALTIME_ACCUMULATOR_CAP);
        while self.realtime_accumulator >= TICK_MICROS {
            self.current_realtime_ticks = self.current_realtime_ticks.wrapping_add(1);
            self.realtime_accumulator -= TICK_MICROS;
        }

        let use_variable_frame = self.should_run_variable_frame();
        if use_variable_frame != self.variable_frame {
            debug!(variable = use_variable_frame, "frame mode switched");
            self.variable_frame = use_variable_frame;
            // Leaving interpolation behind must leave every entity at its
            // end-of-tick position.
            self.tweener
                .restore(&mut self.game_state.state_mut().entities);
            self.tweener.reset();
        }

        if use_variable_frame {
            self.run_variable_frame();
        } else {
            self.run_fixed_frame();
        }
    }

    /// Run `frames` frames using the frame clock.
    pub fn run_frames(&mut self, frames: u32) {
        for _ in 0..frames {
            self.run_frame();
        }
    }

    fn should_draw(&self) -> bool {
        !self.config.headless && self.drawing_engine.is_some() && !self.collab.ui.is_minimised()
    }

    /// Interpolate between ticks only when drawing at an uncapped rate and
    /// at a speed where ticks are still far enough apart to blend.
    pub fn should_run_variable_frame(&self) -> bool {
        self.should_draw() && self.config.uncap_fps && self.game_state.game_speed() <= MAX_GAME_SPEED
    }

    /// Drain the tick accumulator, then handle input and draw once.
    ///
    /// With less than a tick pending the clock sleeps for the shortfall and
    /// nothing else happens this frame.
    pub fn run_fixed_frame(&mut self) {
        self.collab.ui.process_messages();

        if self.ticks_accumulator < TICK_MICROS {
            let deficit = TICK_MICROS - self.ticks_accumulator;
            self.clock.sleep(Duration::from_micros(deficit));
            return;
        }

        while self.ticks_accumulator >= TICK_MICROS {
            self.tick();
            self.ticks_accumulator -= TICK_MICROS;
        }

        self.collab.ui.handle_input();
        self.collab.ui.update_windows();
        if self.should_draw() {
            self.draw();
        }
    }

    /// Drain the tick accumulator with entity positions captured around each
    /// tick, then draw blended by the fraction of a tick left over.
    pub fn run_variable_frame(&mut self) {
        let should_draw = self.should_draw();
        self.collab.ui.process_messages();

        while self.ticks_accumulator >= TICK_MICROS {
            if should_draw {
                self.tweener
                    .pre_tick(&mut self.game_state.state_mut().entities);
            }
            self.tick();
            self.ticks_accumulator -= TICK_MICROS;
            if should_draw {
                self.tweener.post_tick(&self.game_state.state().entities);
            }
        }

        let alpha = (self.ticks_accumulator as f32 / TICK_MICROS as f32).min(1.0);

        self.collab.ui.handle_input();
        self.collab.ui.update_windows();
        if should_draw {
            self.tweener
                .tween(&mut self.game_state.state_mut().entities, alpha);
            self.draw();
        }
    }

    /// One fixed tick of everything: palette, scene, hooks and UI.
    pub fn tick(&mut self) {
        if !self.game_state.state().is_paused() {
            self.palette_effect_frame += TICK_MICROS;
        }

        if self.scene == Scene::Title {
            self.collab.ui.update_title_sequence();
        }
        let now_ms = self.clock.now_ms();
        self.last_tick = self.game_state.tick(&mut self.collab, now_ms);

        self.collab.hooks.tick();
        self.collab.ui.tick();
    }

    /// Paint one frame, unless minimised or headless.
    pub fn draw(&mut self) {
        if self.collab.ui.is_minimised() {
            return;
        }
        let Some(engine) = self.drawing_engine.as_mut() else {
            return;
        };
        engine.begin_draw();
        engine.paint(self.game_state.state());
        engine.end_draw();
    }

    // -- loading ------------------------------------------------------------

    /// Load a park and make it the active game.
    ///
    /// On failure the error is shown to the player and the title screen
    /// takes over; the frame loop keeps running either way.
    pub fn load_park(&mut self, path: &Path) -> Result<(), LoadError> {
        match self.collab.storage.load(path) {
            Ok(state) => {
                self.tweener.reset();
                self.game_state.replace_state(state);
                self.set_scene(Scene::Game);
                info!(path = %path.display(), "park opened");
                Ok(())
            }
            Err(err) => {
                error!(path = %path.display(), %err, "failed to load park");
                self.collab.ui.show_error(err.title(), &err.to_string());
                self.set_scene(Scene::Title);
                Err(err)
            }
        }
    }

    /// Create the configured drawing engine, falling back to software.
    pub fn initialise_drawing_engine(&mut self) -> Result<(), EngineError> {
        let requested = self.config.drawing_engine;
        match self.collab.drawing.create(requested) {
            Ok(engine) => {
                self.drawing_engine = Some(engine);
                return Ok(());
            }
            Err(reason) if requested != DrawingEngineKind::Software => {
                warn!(?requested, %reason, "drawing engine unavailable, falling back to software");
            }
            Err(reason) => {
                error!(%reason, "software drawing engine unavailable");
                return Err(EngineError::NoDrawingEngine { requested });
            }
        }
        match self.collab.drawing.create(DrawingEngineKind::Software) {
            Ok(engine) => {
                self.drawing_engine = Some(engine);
                Ok(())
            }
            Err(reason) => {
                error!(%reason, "software drawing engine unavailable");
                Err(EngineError::NoDrawingEngine { requested })
            }
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        CONTEXT_ALIVE.with(|alive| alive.set(false));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
