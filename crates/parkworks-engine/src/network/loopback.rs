//! In-process server and clients.
//!
//! A [`LoopbackHub`] owns the message queues. Messages are buffered by the
//! sender and only become visible to the receiver after the sender's
//! [`Network::flush`] and the receiver's next [`Network::update`], mirroring
//! a real socket's frame-to-frame latency.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::{Network, NetworkAuth, NetworkMode, NetworkStatus};
use crate::snapshots::GameStateSnapshots;

/// Server tick fingerprints a client remembers.
pub const SERVER_TICK_HISTORY: usize = 100;

#[derive(Debug, Clone)]
enum ServerMessage {
    Tick { tick: u32, srand0: u32 },
    Snapshot { bytes: Vec<u8> },
}

#[derive(Debug, Clone)]
enum ClientMessage {
    RequestSnapshot { tick: u32 },
}

#[derive(Debug, Default)]
struct HubState {
    to_clients: Vec<VecDeque<ServerMessage>>,
    connected: Vec<bool>,
    to_server: VecDeque<(usize, ClientMessage)>,
}

/// Shared message queues between one server and its clients.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    inner: Rc<RefCell<HubState>>,
}

impl LoopbackHub {
    /// A hub with nobody attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// The server end. Create one per hub.
    pub fn server(&self, snapshots_enabled: bool) -> LoopbackServer {
        LoopbackServer {
            hub: self.clone(),
            outbox: Vec::new(),
            pending_requests: Vec::new(),
            last_tick: 0,
            snapshots_enabled,
        }
    }

    /// Connect a new client.
    pub fn client(&self, snapshots_enabled: bool, stay_connected: bool) -> LoopbackClient {
        let id = {
            let mut hub = self.inner.borrow_mut();
            hub.to_clients.push(VecDeque::new());
            hub.connected.push(true);
            hub.to_clients.len() - 1
        };
        info!(client = id, "loopback client connected");
        LoopbackClient {
            hub: self.clone(),
            id,
            status: NetworkStatus::Connected,
            server_ticks: BTreeMap::new(),
            server_tick: 0,
            desync_tick: None,
            outbox: Vec::new(),
            received_snapshot: None,
            snapshots_enabled,
            stay_connected,
        }
    }

    fn connected_clients(&self) -> usize {
        self.inner.borrow().connected.iter().filter(|c| **c).count()
    }
}

// ---------------------------------------------------------------------------
// LoopbackServer
// ---------------------------------------------------------------------------

/// In-process server.
#[derive(Debug)]
pub struct LoopbackServer {
    hub: LoopbackHub,
    /// `(recipient, message)`; `None` broadcasts.
    outbox: Vec<(Option<usize>, ServerMessage)>,
    pending_requests: Vec<(usize, u32)>,
    last_tick: u32,
    snapshots_enabled: bool,
}

impl Network for LoopbackServer {
    fn mode(&self) -> NetworkMode {
        NetworkMode::Server
    }

    fn status(&self) -> NetworkStatus {
        NetworkStatus::Connected
    }

    fn auth_status(&self) -> NetworkAuth {
        NetworkAuth::Ok
    }

    fn server_tick(&self) -> u32 {
        self.last_tick
    }

    fn update(&mut self) {
        let mut hub = self.hub.inner.borrow_mut();
        while let Some((client, message)) = hub.to_server.pop_front() {
            match message {
                ClientMessage::RequestSnapshot { tick } => {
                    debug!(client, tick, "snapshot requested");
                    self.pending_requests.push((client, tick));
                }
            }
        }
    }

    fn tick(&mut self) {}

    fn post_tick(&mut self) {}

    fn flush(&mut self) {
        let mut hub = self.hub.inner.borrow_mut();
        for (recipient, message) in self.outbox.drain(..) {
            match recipient {
                Some(client) => {
                    if hub.connected.get(client).copied().unwrap_or(false) {
                        hub.to_clients[client].push_back(message);
                    }
                }
                None => {
                    let HubState {
                        to_clients,
                        connected,
                        ..
                    } = &mut *hub;
                    for (queue, _) in to_clients.iter_mut().zip(connected.iter()).filter(|(_, c)| **c) {
                        queue.push_back(message.clone());
                    }
                }
            }
        }
    }

    fn send_tick(&mut self, tick: u32, srand0: u32) {
        self.last_tick = tick;
        self.outbox.push((None, ServerMessage::Tick { tick, srand0 }));
    }

    fn check_desynchronisation(&mut self, _tick: u32, _srand0: u32) -> bool {
        false
    }

    fn is_desynchronised(&self) -> bool {
        false
    }

    fn request_gamestate_snapshot(&mut self, _tick: u32) {}

    fn gamestate_snapshots_enabled(&self) -> bool {
        self.snapshots_enabled
    }

    fn player_count(&self) -> usize {
        1 + self.hub.connected_clients()
    }

    fn serve_snapshot_requests(&mut self, snapshots: &GameStateSnapshots) {
        for (client, tick) in self.pending_requests.drain(..) {
            match snapshots.get_linked_snapshot(tick) {
                Some(snapshot) => {
                    let bytes = snapshots.serialise_snapshot(snapshot);
                    info!(client, tick, size = bytes.len(), "sending snapshot");
                    self.outbox.push((Some(client), ServerMessage::Snapshot { bytes }));
                }
                None => warn!(client, tick, "requested snapshot no longer available"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LoopbackClient
// ---------------------------------------------------------------------------

/// In-process client.
#[derive(Debug)]
pub struct LoopbackClient {
    hub: LoopbackHub,
    id: usize,
    status: NetworkStatus,
    /// Server fingerprint per tick, newest [`SERVER_TICK_HISTORY`] kept.
    server_ticks: BTreeMap<u32, u32>,
    server_tick: u32,
    desync_tick: Option<u32>,
    outbox: Vec<ClientMessage>,
    received_snapshot: Option<Vec<u8>>,
    snapshots_enabled: bool,
    stay_connected: bool,
}

impl LoopbackClient {
    /// Index of the client on its hub.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The tick at which the desync was first seen.
    pub fn desync_tick(&self) -> Option<u32> {
        self.desync_tick
    }

    /// Server fingerprints currently remembered.
    pub fn server_tick_history_len(&self) -> usize {
        self.server_ticks.len()
    }

    /// Leave the hub. The server stops counting this client.
    pub fn disconnect(&mut self) {
        if self.status == NetworkStatus::None {
            return;
        }
        self.status = NetworkStatus::None;
        if let Some(flag) = self.hub.inner.borrow_mut().connected.get_mut(self.id) {
            *flag = false;
        }
        info!(client = self.id, "loopback client disconnected");
    }
}

impl Network for LoopbackClient {
    fn mode(&self) -> NetworkMode {
        NetworkMode::Client
    }

    fn status(&self) -> NetworkStatus {
        self.status
    }

    fn auth_status(&self) -> NetworkAuth {
        if self.status == NetworkStatus::Connected {
            NetworkAuth::Ok
        } else {
            NetworkAuth::None
        }
    }

    fn server_tick(&self) -> u32 {
        self.server_tick
    }

    fn update(&mut self) {
        if self.status != NetworkStatus::Connected {
            return;
        }
        let messages: Vec<ServerMessage> = {
            let mut hub = self.hub.inner.borrow_mut();
            hub.to_clients[self.id].drain(..).collect()
        };
        for message in messages {
            match message {
                ServerMessage::Tick { tick, srand0 } => {
                    self.server_tick = tick;
                    self.server_ticks.insert(tick, srand0);
                    while self.server_ticks.len() > SERVER_TICK_HISTORY {
                        self.server_ticks.pop_first();
                    }
                }
                ServerMessage::Snapshot { bytes } => {
                    debug!(client = self.id, size = bytes.len(), "snapshot received");
                    self.received_snapshot = Some(bytes);
                }
            }
        }
    }

    fn tick(&mut self) {}

    fn post_tick(&mut self) {}

    fn flush(&mut self) {
        if self.status != NetworkStatus::Connected {
            self.outbox.clear();
            return;
        }
        let mut hub = self.hub.inner.borrow_mut();
        for message in self.outbox.drain(..) {
            hub.to_server.push_back((self.id, message));
        }
    }

    fn send_tick(&mut self, _tick: u32, _srand0: u32) {}

    fn check_desynchronisation(&mut self, tick: u32, srand0: u32) -> bool {
        if self.desync_tick.is_some() {
            return false;
        }
        // A tick that fell out of the history cannot be checked.
        let Some(&server_srand0) = self.server_ticks.get(&tick) else {
            return false;
        };
        if server_srand0 == srand0 {
            return false;
        }
        self.desync_tick = Some(tick);
        warn!(
            client = self.id,
            tick,
            local = srand0,
            server = server_srand0,
            "desynchronised from server"
        );
        if !self.stay_connected {
            self.disconnect();
        }
        true
    }

    fn is_desynchronised(&self) -> bool {
        self.desync_tick.is_some()
    }

    fn request_gamestate_snapshot(&mut self, tick: u32) {
        info!(client = self.id, tick, "requesting server snapshot");
        self.outbox.push(ClientMessage::RequestSnapshot { tick });
    }

    fn gamestate_snapshots_enabled(&self) -> bool {
        self.snapshots_enabled
    }

    fn take_received_snapshot(&mut self) -> Option<Vec<u8>> {
        self.received_snapshot.take()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
