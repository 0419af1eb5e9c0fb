//! Headless park runner.
//!
//! Usage: `parkworks-headless [config.json] [frames]`
//!
//! Builds a demo park, runs `frames` frames (default 400) of 25 ms each on a
//! scripted clock and prints the final tick and state checksum. Two runs with
//! the same arguments print the same checksum.

use std::time::Duration;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use parkworks_engine::collab::JsonParkStorage;
use parkworks_engine::prelude::*;

const DEFAULT_FRAMES: u32 = 400;
const DEMO_SEED: u64 = 0x5EED;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let mut config = match args.next() {
        Some(path) if path != "-" => {
            EngineConfig::load(&path).with_context(|| format!("loading config {path}"))?
        }
        _ => EngineConfig::default(),
    };
    let frames = match args.next() {
        Some(n) => n.parse::<u32>().with_context(|| format!("invalid frame count {n:?}"))?,
        None => DEFAULT_FRAMES,
    };
    config.headless = true;

    let game = GameState::new(SimulationState::demo(DEMO_SEED), Box::new(NullNetwork), &config);
    let mut collab = Collaborators::headless();
    collab.storage = Box::new(JsonParkStorage::new("autosave", config.autosave_amount));

    let clock = ManualClock::new();
    let mut context = Context::new(config, game, collab, Box::new(clock.clone()))?;

    for _ in 0..frames {
        clock.advance(Duration::from_micros(TICK_MICROS));
        context.run_frame();
    }

    let state = context.game_state().state();
    let checksum = WorldSnapshot::capture(state).checksum();
    tracing::info!(
        tick = state.current_ticks,
        guests = state.entities.count_kind(EntityKind::Guest),
        cash = state.park.cash,
        "run complete"
    );
    println!("tick {} checksum {}", state.current_ticks, checksum);
    Ok(())
}
