//! Integration tests for server/client lockstep over the loopback network.

use std::path::Path;

use parkworks_engine::prelude::*;

const SEED: u64 = 0xC0FFEE;

struct Session {
    server: GameState,
    client: GameState,
    server_collab: Collaborators,
    client_collab: Collaborators,
}

impl Session {
    fn new(desync_dir: &Path, snapshots: bool) -> Self {
        let hub = LoopbackHub::new();
        let server_net = hub.server(snapshots);
        let client_net = hub.client(snapshots, true);
        let config = EngineConfig {
            desync_log_dir: desync_dir.to_path_buf(),
            ..Default::default()
        };
        Self {
            server: GameState::new(SimulationState::demo(SEED), Box::new(server_net), &config),
            client: GameState::new(SimulationState::demo(SEED), Box::new(client_net), &config),
            server_collab: Collaborators::headless(),
            client_collab: Collaborators::headless(),
        }
    }

    /// One host frame on each peer, server first.
    fn frame(&mut self) {
        self.server.tick(&mut self.server_collab, 0);
        self.client.tick(&mut self.client_collab, 0);
    }
}

#[test]
fn client_follows_server_one_tick_behind() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(dir.path(), false);
    for _ in 0..20 {
        session.frame();
    }
    assert_eq!(session.server.current_ticks(), 20);
    assert_eq!(session.client.current_ticks(), 19);
    assert!(!session.client.network().is_desynchronised());
    assert_eq!(session.server.network().player_count(), 2);

    // Same inputs, same world: the client matches the server's state at
    // the client's tick.
    let mut replica = GameState::new(SimulationState::demo(SEED), Box::new(NullNetwork), &EngineConfig::default());
    let mut collab = Collaborators::headless();
    for _ in 0..19 {
        replica.update_logic(&mut collab, 0);
    }
    assert_eq!(
        WorldSnapshot::capture(replica.state()).checksum(),
        WorldSnapshot::capture(session.client.state()).checksum()
    );
}

#[test]
fn client_never_runs_ahead_of_server() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(dir.path(), false);
    session.frame();
    session.frame();
    // The server stalls; the client drains what it has and then waits.
    for _ in 0..5 {
        session.client.tick(&mut session.client_collab, 0);
    }
    assert_eq!(session.client.current_ticks(), session.client.network().server_tick());
}

#[test]
fn desync_writes_snapshot_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(dir.path(), true);
    for _ in 0..20 {
        session.frame();
    }
    assert!(session.client.last_desync_report().is_none());

    session.client.state_mut().rng.next_u32();
    for _ in 0..5 {
        session.frame();
    }

    assert!(session.client.network().is_desynchronised());
    let report = session
        .client
        .last_desync_report()
        .expect("desync report written")
        .clone();
    assert!(report.starts_with(dir.path()));
    let file_name = report.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("desync_"), "{file_name}");
    assert!(file_name.ends_with("_19.txt"), "{file_name}");
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains("rng."), "{text}");
}

#[test]
fn desync_without_snapshots_only_flags() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(dir.path(), false);
    for _ in 0..10 {
        session.frame();
    }
    session.client.state_mut().rng.next_u32();
    for _ in 0..5 {
        session.frame();
    }
    assert!(session.client.network().is_desynchronised());
    assert!(session.client.last_desync_report().is_none());
    assert!(session.client.snapshots().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn server_keeps_bounded_snapshot_ring() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(dir.path(), true);
    for _ in 0..100 {
        session.frame();
    }
    let snapshots = session.server.snapshots();
    assert_eq!(snapshots.len(), snapshots.capacity());
    assert!(snapshots.get_linked_snapshot(99).is_some());
    assert!(snapshots.get_linked_snapshot(0).is_none());
}
