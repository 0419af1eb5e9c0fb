//! Integration tests for replay recording and playback through [`GameState`].

use parkworks_engine::prelude::*;

fn game(seed: u64) -> (GameState, Collaborators) {
    let config = EngineConfig {
        replay_checksum_interval: 10,
        ..Default::default()
    };
    let game = GameState::new(SimulationState::demo(seed), Box::new(NullNetwork), &config);
    (game, Collaborators::headless())
}

fn checksum(game: &GameState) -> String {
    WorldSnapshot::capture(game.state()).checksum()
}

/// Record 50 steps with a few player actions. Returns the record and the
/// checksum of the final world.
fn record_session(path: Option<std::path::PathBuf>) -> (ReplayRecord, String) {
    let (mut game, mut collab) = game(42);
    game.start_replay_recording("lockstep-demo", 1_000, path).unwrap();
    assert_eq!(game.replay().mode(), ReplayMode::Recording);

    game.enqueue(GameAction::new(5, ActionKind::SetParkEntranceFee { fee: 25 }));
    game.enqueue(GameAction::new(
        12,
        ActionKind::SpawnGuest {
            tile: TileCoords::new(3, 8),
        },
    ));
    for _ in 0..50 {
        game.update_logic(&mut collab, 0);
    }
    let record = game.stop_replay_recording().unwrap();
    (record, checksum(&game))
}

#[test]
fn playback_reproduces_recorded_world() {
    let (record, expected) = record_session(None);
    assert_eq!(record.tick_count, 50);
    assert_eq!(record.actions.len(), 2);
    assert_eq!(record.checksums.len(), 5);

    // A different starting park is replaced by the recording's.
    let (mut game, mut collab) = game(7);
    game.start_replay_playback(record).unwrap();
    assert_eq!(game.current_ticks(), 0);
    for _ in 0..50 {
        game.update_logic(&mut collab, 0);
    }

    assert_eq!(checksum(&game), expected);
    assert!(game.replay().mismatch().is_none());
    assert_eq!(game.state().park.entrance_fee, 25);

    // Reaching the end tick finishes playback.
    game.update_logic(&mut collab, 0);
    assert_eq!(game.replay().mode(), ReplayMode::Normal);
}

#[test]
fn playback_reports_first_mismatch() {
    let (mut record, _) = record_session(None);
    record.checksums[2].1 = "0".repeat(64);
    record.checksums[3].1 = "1".repeat(64);

    let (mut game, mut collab) = game(42);
    game.start_replay_playback(record).unwrap();
    for _ in 0..50 {
        game.update_logic(&mut collab, 0);
    }
    let mismatch = game.replay().mismatch().expect("mismatch recorded");
    assert_eq!(mismatch.tick, 20);
    assert_eq!(mismatch.expected, "0".repeat(64));
}

#[test]
fn recording_stops_after_max_ticks() {
    let (mut game, mut collab) = game(3);
    game.start_replay_recording("short", 20, None).unwrap();
    for _ in 0..30 {
        game.update_logic(&mut collab, 0);
    }
    assert_eq!(game.replay().mode(), ReplayMode::Normal);
    assert_eq!(game.replay().last_record().unwrap().tick_count, 20);
}

#[test]
fn replay_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replays").join("demo.json");
    let (record, _) = record_session(Some(path.clone()));
    assert!(path.exists());
    assert_eq!(ReplayRecord::load(&path).unwrap(), record);
}

#[test]
fn tampered_replay_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.json");
    record_session(Some(path.clone()));

    let text = std::fs::read_to_string(&path).unwrap();
    let tampered = text.replacen("lockstep-demo", "lockstep-dem0", 1);
    assert_ne!(text, tampered);
    std::fs::write(&path, tampered).unwrap();

    let err = ReplayRecord::load(&path).unwrap_err();
    assert!(matches!(err, EngineError::ReplayFormat(_)), "{err}");
}

#[test]
fn replay_operations_check_mode() {
    let (mut game, _) = game(1);
    assert!(matches!(
        game.stop_replay_recording(),
        Err(EngineError::ReplayMode { .. })
    ));
    game.start_replay_recording("a", 10, None).unwrap();
    assert!(game.start_replay_recording("b", 10, None).is_err());
}

// ---------------------------------------------------------------------------
// Whole ticks
// ---------------------------------------------------------------------------

/// Play `record` back through [`GameState::tick`] until `end_tick`.
fn play_ticks(record: ReplayRecord, speed: u8) -> (GameState, Collaborators) {
    let end = record.end_tick();
    let (mut game, mut collab) = game(7);
    game.set_game_speed(speed);
    game.start_replay_playback(record).unwrap();
    let mut guard = 0;
    while game.current_ticks() < end {
        game.tick(&mut collab, 0);
        guard += 1;
        assert!(guard < 100, "playback stuck at tick {}", game.current_ticks());
    }
    (game, collab)
}

#[test]
fn unpause_applied_while_paused_plays_back() {
    let (mut game, mut collab) = game(42);
    game.start_replay_recording("paused", 1_000, None).unwrap();
    for _ in 0..5 {
        game.tick(&mut collab, 0);
    }
    game.enqueue(GameAction::new(5, ActionKind::TogglePause));
    game.tick(&mut collab, 0);
    assert_eq!(game.current_ticks(), 6);
    assert!(game.state().is_paused());

    for _ in 0..3 {
        let report = game.tick(&mut collab, 0);
        assert!(report.paused_housekeeping);
    }
    game.enqueue(GameAction::new(6, ActionKind::SetParkEntranceFee { fee: 55 }));
    game.enqueue(GameAction::new(6, ActionKind::TogglePause));
    game.tick(&mut collab, 0);
    assert!(!game.state().is_paused());
    assert_eq!(game.current_ticks(), 6);

    for _ in 0..10 {
        game.tick(&mut collab, 0);
    }
    assert_eq!(game.current_ticks(), 16);
    let record = game.stop_replay_recording().unwrap();
    let expected = checksum(&game);
    let phases: Vec<ActionPhase> = record.actions.iter().map(|a| a.phase).collect();
    assert_eq!(
        phases,
        vec![
            ActionPhase::Step,
            ActionPhase::Paused { pass: 3 },
            ActionPhase::Paused { pass: 3 },
        ]
    );

    let (mut played, mut collab) = play_ticks(record, 1);
    assert_eq!(checksum(&played), expected);
    assert!(played.replay().mismatch().is_none());
    assert_eq!(played.state().park.entrance_fee, 55);
    assert!(!played.state().is_paused());

    played.tick(&mut collab, 0);
    assert_eq!(played.replay().mode(), ReplayMode::Normal);
}

#[test]
fn fast_forward_session_plays_back() {
    let (mut game, mut collab) = game(42);
    game.set_game_speed(3);
    game.start_replay_recording("fast", 1_000, None).unwrap();
    game.enqueue(GameAction::new(6, ActionKind::SetParkEntranceFee { fee: 30 }));
    game.enqueue(GameAction::new(
        17,
        ActionKind::SpawnGuest {
            tile: TileCoords::new(3, 8),
        },
    ));
    for _ in 0..10 {
        game.tick(&mut collab, 0);
    }
    assert_eq!(game.current_ticks(), 40);
    let record = game.stop_replay_recording().unwrap();
    let expected = checksum(&game);
    assert_eq!(record.checksums.len(), 4);

    let (played, _) = play_ticks(record, 3);
    assert_eq!(played.current_ticks(), 40);
    assert_eq!(checksum(&played), expected);
    assert!(played.replay().mismatch().is_none());
    assert_eq!(played.state().park.entrance_fee, 30);
}
