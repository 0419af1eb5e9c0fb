//! Integration tests for variable-rate frames and entity interpolation.

use std::time::Duration;

use parkworks_engine::collab::FrameLog;
use parkworks_engine::prelude::*;

/// One and a half ticks.
const FRAME: Duration = Duration::from_micros(TICK_MICROS * 3 / 2);

fn drawing_context() -> (Context, FrameLog, HeadlessUi) {
    let config = EngineConfig {
        uncap_fps: true,
        ..Default::default()
    };
    let factory = HeadlessDrawingFactory::new();
    let log = factory.frame_log();
    let ui = HeadlessUi::new();
    let mut collab = Collaborators::headless();
    collab.drawing = Box::new(factory);
    collab.ui = Box::new(ui.clone());
    let game = GameState::new(SimulationState::demo(23), Box::new(NullNetwork), &config);
    let context = Context::new(config, game, collab, Box::new(ManualClock::new())).unwrap();
    (context, log, ui)
}

fn logical_positions(context: &Context) -> Vec<(EntityId, CoordsXYZ)> {
    context
        .game_state()
        .state()
        .entities
        .iter()
        .map(|e| (e.id, e.position))
        .collect()
}

#[test]
fn variable_frames_draw_between_ticks() {
    let (mut ctx, log, _) = drawing_context();
    assert!(ctx.is_variable_frame());

    ctx.run_frame_with_delta(FRAME);
    assert_eq!(ctx.game_state().current_ticks(), 1);
    assert!(ctx.tweener().is_primed());
    assert_eq!(log.frames(), 1);

    // Two ticks, nothing left over: entities are drawn where the last tick
    // started, not where it ended.
    ctx.run_frame_with_delta(FRAME);
    assert_eq!(ctx.game_state().current_ticks(), 3);
    assert_eq!(ctx.ticks_accumulator(), Duration::ZERO);
    assert_eq!(log.frames(), 2);
    assert!(!log.unbalanced());

    let painted = log.last();
    assert_eq!(painted.tick, 3);
    let logical = logical_positions(&ctx);
    assert!(ctx.game_state().state().entities.has_render_overrides());
    assert_ne!(painted.positions, logical, "some entity moved during the last tick");
}

#[test]
fn fast_forward_drops_interpolation() {
    let (mut ctx, log, _) = drawing_context();
    ctx.run_frame_with_delta(FRAME);
    ctx.run_frame_with_delta(FRAME);
    assert!(ctx.game_state().state().entities.has_render_overrides());

    ctx.game_state_mut().set_game_speed(8);
    ctx.run_frame_with_delta(Duration::from_micros(TICK_MICROS));

    assert!(!ctx.is_variable_frame());
    assert!(!ctx.tweener().is_primed());
    assert!(!ctx.game_state().state().entities.has_render_overrides());
    assert_eq!(ctx.game_state().current_ticks(), 3 + 128);
    assert_eq!(log.last().positions, logical_positions(&ctx));
}

#[test]
fn minimised_window_skips_drawing() {
    let (mut ctx, log, ui) = drawing_context();
    ctx.run_frame_with_delta(FRAME);
    assert_eq!(log.frames(), 1);

    ui.set_minimised(true);
    ctx.run_frame_with_delta(FRAME);
    assert!(!ctx.is_variable_frame());
    assert_eq!(log.frames(), 1);
    assert_eq!(ctx.game_state().current_ticks(), 3, "the simulation keeps running");

    ui.set_minimised(false);
    ctx.run_frame_with_delta(FRAME);
    assert!(ctx.is_variable_frame());
    assert_eq!(log.frames(), 2);
}

#[test]
fn pausing_keeps_drawing_last_positions() {
    let (mut ctx, log, _) = drawing_context();
    ctx.run_frame_with_delta(FRAME);
    ctx.game_state_mut().toggle_pause();
    for _ in 0..4 {
        ctx.run_frame_with_delta(FRAME);
    }
    let ticks = ctx.game_state().current_ticks();
    assert_eq!(ticks, 1);
    assert_eq!(log.frames(), 5);

    ctx.game_state_mut().toggle_pause();
    ctx.run_frame_with_delta(FRAME);
    assert!(ctx.game_state().current_ticks() > ticks);
    assert!(ctx.tweener().is_primed());
}
