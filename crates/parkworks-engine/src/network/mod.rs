//! The network capability consumed by the tick orchestration.
//!
//! The game state calls into a [`Network`] at fixed points of every frame and
//! every tick. Single-player games use [`NullNetwork`]; [`loopback`] connects
//! a server and clients inside one process, which is enough to exercise tick
//! exchange, catch-up and desync diagnosis without sockets.

pub mod loopback;

use crate::snapshots::GameStateSnapshots;

/// Role of this peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    None,
    Client,
    Server,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    None,
    Connecting,
    Connected,
}

/// Authentication state with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkAuth {
    None,
    Requested,
    Ok,
}

/// The network layer as seen from the tick loop.
///
/// Every method is a non-blocking poll or a buffered send.
pub trait Network {
    /// Role of this peer.
    fn mode(&self) -> NetworkMode;
    /// Connection state.
    fn status(&self) -> NetworkStatus;
    /// Authentication state.
    fn auth_status(&self) -> NetworkAuth;

    /// The newest tick the server has announced. Clients never simulate past
    /// it.
    fn server_tick(&self) -> u32;

    /// Receive and process incoming data. Called once per frame.
    fn update(&mut self);

    /// Per-tick housekeeping. Called once per simulation step, and once per
    /// frame when no step runs.
    fn tick(&mut self);

    /// Called after the tick's game actions are applied.
    fn post_tick(&mut self);

    /// Send everything buffered.
    fn flush(&mut self);

    /// Announce the authoritative tick and its RNG fingerprint to clients.
    fn send_tick(&mut self, tick: u32, srand0: u32);

    /// Compare the local fingerprint for `tick` with the server's.
    ///
    /// Returns `true` only on the first detection.
    fn check_desynchronisation(&mut self, tick: u32, srand0: u32) -> bool;

    /// Whether a desync has been detected since connecting.
    fn is_desynchronised(&self) -> bool;

    /// Ask the server for its snapshot of `tick`.
    fn request_gamestate_snapshot(&mut self, tick: u32);

    /// Whether snapshots are captured and exchanged for desync reports.
    fn gamestate_snapshots_enabled(&self) -> bool;

    /// Connected players including the host.
    fn player_count(&self) -> usize {
        1
    }

    /// Answer pending snapshot requests from clients. Servers only.
    fn serve_snapshot_requests(&mut self, _snapshots: &GameStateSnapshots) {}

    /// A serialized snapshot received from the server, if one arrived.
    fn take_received_snapshot(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn is_connected_client(&self) -> bool {
        self.mode() == NetworkMode::Client
            && self.status() == NetworkStatus::Connected
            && self.auth_status() == NetworkAuth::Ok
    }
}

/// No network: a single-player game.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNetwork;

impl Network for NullNetwork {
    fn mode(&self) -> NetworkMode {
        NetworkMode::None
    }

    fn status(&self) -> NetworkStatus {
        NetworkStatus::None
    }

    fn auth_status(&self) -> NetworkAuth {
        NetworkAuth::None
    }

    fn server_tick(&self) -> u32 {
        0
    }

    fn update(&mut self) {}

    fn tick(&mut self) {}

    fn post_tick(&mut self) {}

    fn flush(&mut self) {}

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
