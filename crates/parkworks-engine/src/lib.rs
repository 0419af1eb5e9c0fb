//! Parkworks Engine -- frame scheduling and tick orchestration for the park
//! simulation.
//!
//! This crate builds on [`parkworks_world`] to drive the simulation: a
//! [`Context`](context::Context) turns host frames into fixed 25 ms ticks, a
//! [`GameState`](game_state::GameState) runs the deterministic simulation
//! step in a fixed order, and the collaborators around it (network, replays,
//! desync snapshots, UI, drawing, audio, scripting, park storage) are plugged
//! in through traits.
//!
//! # Quick Start
//!
//! ```
//! use parkworks_engine::prelude::*;
//!
//! let config = EngineConfig { headless: true, ..Default::default() };
//! let mut game = GameState::new(SimulationState::demo(5), Box::new(NullNetwork), &config);
//! let mut collab = Collaborators::headless();
//!
//! game.set_game_speed(3);
//! let report = game.tick(&mut collab, 0);
//! assert_eq!(report.executed_updates, 4);
//! assert_eq!(game.current_ticks(), 4);
//! ```

#![deny(unsafe_code)]

pub mod collab;
pub mod config;
pub mod context;
pub mod error;
pub mod game_state;
pub mod network;
pub mod replay;
pub mod snapshots;
pub mod timer;
pub mod tweener;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the world crate for convenience.
pub use parkworks_world;

pub use error::{EngineError, LoadError};

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Everything from the world prelude.
    pub use parkworks_world::prelude::*;

    pub use crate::collab::{
        AudioSink, Collaborators, DrawingEngine, DrawingEngineFactory, HeadlessDrawingFactory,
        HeadlessUi, InputState, JsonParkStorage, NullAudio, NullHooks, NullStorage, ParkStorage,
        ScriptHooks, UiContext,
    };
    pub use crate::config::{AutosaveFrequency, DrawingEngineKind, EngineConfig};
    pub use crate::context::{Context, Scene, TICK_MICROS};
    pub use crate::error::{EngineError, LoadError};
    pub use crate::game_state::{AutosaveTimer, GameState, TickReport, UpdateGuard};
    pub use crate::network::loopback::{LoopbackClient, LoopbackHub, LoopbackServer};
    pub use crate::network::{Network, NetworkAuth, NetworkMode, NetworkStatus, NullNetwork};
    pub use crate::replay::{
        ActionPhase, RecordedAction, ReplayManager, ReplayMismatch, ReplayMode, ReplayRecord,
    };
    pub use crate::snapshots::{GameStateSnapshot, GameStateSnapshots};
    pub use crate::timer::{FrameClock, ManualClock, Timer};
    pub use crate::tweener::EntityTweener;
}
