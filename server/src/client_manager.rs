//! Connection bookkeeping for the WebSocket server.
//!
//! This module tracks every open connection and what it is bound to:
//! - The bounded outbound queue served by the connection's writer task
//! - The player the connection controls once it has sent `join`
//! - Liveness, refreshed by any inbound frame and used for timeouts
//! - The capacity limit applied at accept time
//!
//! Sends never block. A full or closed queue drops the frame for that
//! connection only, so one slow client cannot stall the tick.

use log::{debug, info, warn};
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

/// One open WebSocket connection.
#[derive(Debug)]
pub struct Client {
    /// Connection identifier assigned by the accept loop
    pub id: u32,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    /// Last time any frame arrived from this connection
    pub last_seen: Instant,
    /// Player controlled by this connection, set on `join`
    pub player: Option<PlayerId>,
    /// Queue drained by the connection's writer task
    pub sender: mpsc::Sender<Message>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            player: None,
            sender,
        }
    }

    pub fn refresh_last_seen(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a frame without waiting. Returns false if it was dropped.
    pub fn send(&self, message: Message) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for client {}, dropping frame", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Registry of open connections and their player bindings.
///
/// Owned by the server run loop, so no locking is needed. Players are
/// looked up through a reverse index when routing point-to-point messages.
pub struct ClientManager {
    /// Open connections indexed by connection id
    clients: HashMap<u32, Client>,
    /// Player to connection index for routing
    players: HashMap<PlayerId, u32>,
    /// Maximum number of concurrent connections
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            players: HashMap::new(),
            max_clients,
        }
    }

    /// True if another connection may be accepted.
    pub fn has_capacity(&self) -> bool {
        self.clients.len() < self.max_clients
    }

    /// Registers a new connection. Returns false, leaving the registry
    /// unchanged, if the server is full or the id is already taken.
    pub fn add_client(&mut self, id: u32, addr: SocketAddr, sender: mpsc::Sender<Message>) -> bool {
        if !self.has_capacity() {
            warn!("Rejecting client {} from {}: server full", id, addr);
            return false;
        }
        if self.clients.contains_key(&id) {
            warn!("Client id {} already registered", id);
            return false;
        }

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        true
    }

    /// Removes a connection and its player binding. The returned client
    /// tells the caller which player, if any, has to leave the game.
    pub fn remove_client(&mut self, id: u32) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        if let Some(player) = client.player {
            self.players.remove(&player);
        }
        info!("Client {} disconnected", id);
        Some(client)
    }

    pub fn get(&self, id: u32) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Binds a joined player to its connection. A connection controls at
    /// most one player; a second bind is refused.
    pub fn bind_player(&mut self, id: u32, player: PlayerId) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        if client.player.is_some() {
            return false;
        }
        client.player = Some(player);
        self.players.insert(player, id);
        true
    }

    pub fn player_of(&self, id: u32) -> Option<PlayerId> {
        self.clients.get(&id).and_then(|client| client.player)
    }

    pub fn client_of(&self, player: PlayerId) -> Option<u32> {
        self.players.get(&player).copied()
    }

    pub fn touch(&mut self, id: u32) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.refresh_last_seen();
        }
    }

    /// Removes connections that have been silent for longer than `timeout`
    /// and returns them so their players can be cleaned up.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client> {
        let timed_out: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| {
                warn!("Client {} timed out", id);
                self.remove_client(id)
            })
            .collect()
    }

    pub fn send_to(&self, id: u32, message: Message) -> bool {
        self.clients
            .get(&id)
            .map(|client| client.send(message))
            .unwrap_or(false)
    }

    pub fn send_to_player(&self, player: PlayerId, message: Message) -> bool {
        match self.client_of(player) {
            Some(id) => self.send_to(id, message),
            None => false,
        }
    }

    /// Sends a frame to every connection that has joined, skipping the
    /// excluded player. Returns how many queues accepted it.
    pub fn broadcast(&self, message: &Message, exclude: Option<PlayerId>) -> usize {
        self.clients
            .values()
            .filter(|client| client.player.is_some() && client.player != exclude)
            .filter(|client| client.send(message.clone()))
            .count()
    }

    /// Sends a frame to every open connection, joined or not.
    pub fn send_all(&self, message: &Message) -> usize {
        self.clients
            .values()
            .filter(|client| client.send(message.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn joined_count(&self) -> usize {
        self.players.len()
    }
}
