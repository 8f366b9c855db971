//! WebSocket transport and the server run loop.
//!
//! Every connection gets a reader and a writer. The reader decodes JSON
//! frames and forwards them as [`ServerEvent`]s on one bounded queue, waiting
//! when it is full; the writer drains a bounded per-connection queue into the
//! socket. The run
//! loop is the single owner of [`GameState`] and [`ClientManager`]: it
//! consumes events, drives the fixed-rate tick, sends heartbeats and
//! schedules leaderboard flushes.

use crate::client_manager::ClientManager;
use crate::config::{
    ServerConfig, EVENT_CHANNEL_CAPACITY, LEADERBOARD_FLUSH_INTERVAL, OUTBOUND_CHANNEL_CAPACITY,
};
use crate::error::ServerError;
use crate::game::{GameCommand, GameMessage, GameState};
use crate::leaderboard::{self, Leaderboard, DEFAULT_LIMIT};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{self, Message};

/// Events sent from connection tasks to the run loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        client_id: u32,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    },
    Frame {
        client_id: u32,
        message: ClientMessage,
    },
    /// Any other inbound traffic; only refreshes liveness.
    Activity {
        client_id: u32,
    },
    Disconnected {
        client_id: u32,
    },
}

/// Encodes a server message into a WebSocket text frame.
pub fn to_frame(message: &ServerMessage) -> Result<Message, ServerError> {
    Ok(Message::Text(message.encode()?))
}

/// Arena server coordinating networking and game simulation
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    game: GameState,
    clients: ClientManager,
    events_tx: mpsc::Sender<ServerEvent>,
    events_rx: mpsc::Receiver<ServerEvent>,
}

impl Server {
    /// Binds the listener, builds the world and loads the leaderboard.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let mut game = GameState::new(config.game.clone());
        info!(
            "Arena ready with {} bots, floor destruction {}",
            game.config().bot_count,
            if game.floor().is_enabled() { "on" } else { "off" }
        );
        if let Some(path) = &config.leaderboard_path {
            match Leaderboard::load(path).await {
                Ok(board) => game.set_leaderboard(board),
                Err(err) => warn!("Starting with an empty leaderboard: {}", err),
            }
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            listener,
            clients: ClientManager::new(config.max_clients),
            config,
            game,
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Main server loop. Only returns if the event queue closes.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            config,
            mut game,
            mut clients,
            events_tx,
            mut events_rx,
        } = self;

        tokio::spawn(accept_loop(listener, events_tx));

        let mut tick_interval = interval(config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat = interval(config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut flush = interval(LEADERBOARD_FLUSH_INTERVAL);
        flush.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stats_every = u64::from(config.tick_rate.max(1)) * 10;
        let mut last_tick = Instant::now();

        info!("Server started");

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        Some(event) => handle_event(&mut game, &mut clients, event),
                        None => {
                            info!("Event queue closed, shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    game.tick(dt);
                    route_outbox(&mut game, &clients);

                    if game.tick_count() % stats_every == 0 && !clients.is_empty() {
                        debug!(
                            "Tick {}: {} connections, {} joined, {} projectiles, {} pending events",
                            game.tick_count(),
                            clients.len(),
                            clients.joined_count(),
                            game.projectiles().len(),
                            game.pending_events()
                        );
                    }
                },

                _ = heartbeat.tick() => {
                    match to_frame(&ServerMessage::Ping) {
                        Ok(ping) => {
                            clients.send_all(&ping);
                        }
                        Err(err) => error!("Failed to encode heartbeat: {}", err),
                    }
                    for client in clients.check_timeouts(config.client_timeout) {
                        if let Some(player) = client.player {
                            game.leave(player);
                        }
                    }
                    route_outbox(&mut game, &clients);
                },

                _ = flush.tick() => {
                    if let Some(path) = &config.leaderboard_path {
                        flush_leaderboard(&mut game, path.clone());
                    }
                },
            }
        }

        Ok(())
    }
}

/// Accepts TCP connections and spawns a task per connection.
async fn accept_loop(listener: TcpListener, events: mpsc::Sender<ServerEvent>) {
    let mut next_client_id: u32 = 1;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let client_id = next_client_id;
                next_client_id = next_client_id.wrapping_add(1).max(1);
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(client_id, stream, addr, events).await {
                        debug!("Connection {} from {} ended: {}", client_id, addr, err);
                    }
                });
            }
            Err(err) => {
                error!("Failed to accept connection: {}", err);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Runs the WebSocket handshake, then pumps frames both ways until either
/// side closes. Always reports the disconnect.
async fn handle_connection(
    client_id: u32,
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::Sender<ServerEvent>,
) -> Result<(), ServerError> {
    let socket = accept_async(stream).await?;
    let (mut sink, mut source) = socket.split();
    let (sender, mut outbound) = mpsc::channel::<Message>(OUTBOUND_CHANNEL_CAPACITY);

    if events
        .send(ServerEvent::Connected {
            client_id,
            addr,
            sender,
        })
        .await
        .is_err()
    {
        return Ok(());
    }

    let writer = async move {
        while let Some(message) = outbound.recv().await {
            sink.send(message).await?;
        }
        // The run loop dropped our queue: server full or timed out.
        sink.close().await?;
        Ok::<(), tungstenite::Error>(())
    };

    let reader = async {
        while let Some(frame) = source.next().await {
            let event = match frame? {
                Message::Text(text) => match ClientMessage::decode(&text) {
                    Ok(message) => ServerEvent::Frame { client_id, message },
                    Err(err) => {
                        warn!("Malformed frame from client {}: {}", client_id, err);
                        ServerEvent::Activity { client_id }
                    }
                },
                Message::Close(_) => break,
                _ => ServerEvent::Activity { client_id },
            };
            if events.send(event).await.is_err() {
                break;
            }
        }
        Ok::<(), tungstenite::Error>(())
    };

    let result = tokio::select! {
        result = writer => result,
        result = reader => result,
    };

    let _ = events.send(ServerEvent::Disconnected { client_id }).await;
    result.map_err(ServerError::from)
}

fn handle_event(game: &mut GameState, clients: &mut ClientManager, event: ServerEvent) {
    match event {
        ServerEvent::Connected {
            client_id,
            addr,
            sender,
        } => {
            // A rejected sender is dropped here, which closes the socket.
            clients.add_client(client_id, addr, sender);
        }
        ServerEvent::Activity { client_id } => clients.touch(client_id),
        ServerEvent::Frame { client_id, message } => {
            clients.touch(client_id);
            handle_message(game, clients, client_id, message);
        }
        ServerEvent::Disconnected { client_id } => {
            if let Some(player) = clients.remove_client(client_id).and_then(|c| c.player) {
                game.leave(player);
                route_outbox(game, clients);
            }
        }
    }
}

fn handle_message(
    game: &mut GameState,
    clients: &mut ClientManager,
    client_id: u32,
    message: ClientMessage,
) {
    if clients.get(client_id).is_none() {
        return;
    }

    let command = match message {
        ClientMessage::Join { name } => {
            if clients.player_of(client_id).is_some() {
                debug!("Client {} sent join twice", client_id);
                return;
            }
            let player = game.join(name);
            clients.bind_player(client_id, player);
            route_outbox(game, clients);
            return;
        }
        ClientMessage::GetLeaderboard => {
            let reply = ServerMessage::LeaderboardData {
                data: game.leaderboard_rows(DEFAULT_LIMIT),
            };
            match to_frame(&reply) {
                Ok(frame) => {
                    clients.send_to(client_id, frame);
                }
                Err(err) => error!("Failed to encode leaderboard: {}", err),
            }
            return;
        }
        ClientMessage::Pong => return,
        other => other,
    };

    let Some(player) = clients.player_of(client_id) else {
        debug!("Ignoring {:?} from client {} before join", command, client_id);
        return;
    };

    let command = match command {
        ClientMessage::Input { input } => GameCommand::Input { player, input },
        ClientMessage::Shoot { angle } => GameCommand::Shoot { player, angle },
        ClientMessage::Reload => GameCommand::Reload { player },
        ClientMessage::AllocateStat { stat } => GameCommand::AllocateStat { player, stat },
        ClientMessage::SyncStats { stats } => GameCommand::SyncStats {
            player,
            progress: stats,
        },
        ClientMessage::Join { .. } | ClientMessage::GetLeaderboard | ClientMessage::Pong => {
            return
        }
    };
    game.submit(command);
}

/// Delivers everything the game queued. Broadcast frames are encoded once.
fn route_outbox(game: &mut GameState, clients: &ClientManager) {
    for outgoing in game.drain_outbox() {
        match outgoing {
            GameMessage::Send { to, message } => match to_frame(&message) {
                Ok(frame) => {
                    clients.send_to_player(to, frame);
                }
                Err(err) => error!("Failed to encode {}: {}", message.kind(), err),
            },
            GameMessage::Broadcast { message, exclude } => {
                if clients.joined_count() == 0 {
                    continue;
                }
                match to_frame(&message) {
                    Ok(frame) => {
                        clients.broadcast(&frame, exclude);
                    }
                    Err(err) => error!("Failed to encode {}: {}", message.kind(), err),
                }
            }
        }
    }
}

/// Serializes the leaderboard if it changed and writes it off the tick.
fn flush_leaderboard(game: &mut GameState, path: std::path::PathBuf) {
    if !game.leaderboard().is_dirty() {
        return;
    }
    let json = match game.leaderboard_mut().take_snapshot() {
        Ok(json) => json,
        Err(err) => {
            error!("Failed to serialize leaderboard: {}", err);
            return;
        }
    };
    tokio::spawn(async move {
        match leaderboard::save(&path, json).await {
            Ok(()) => debug!("Leaderboard saved to {}", path.display()),
            Err(err) => error!("{}", err),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use serde_json::Value;
    use shared::{InputState, PlayerId};
    use tokio::time::timeout;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            game: GameConfig {
                bot_count: 0,
                floor_destruction: false,
                seed: Some(5),
            },
            ..ServerConfig::default()
        }
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn connect(
        game: &mut GameState,
        clients: &mut ClientManager,
        client_id: u32,
    ) -> mpsc::Receiver<Message> {
        let (sender, receiver) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        handle_event(
            game,
            clients,
            ServerEvent::Connected {
                client_id,
                addr: test_addr(),
                sender,
            },
        );
        receiver
    }

    fn send(game: &mut GameState, clients: &mut ClientManager, id: u32, message: ClientMessage) {
        let event = ServerEvent::Frame {
            client_id: id,
            message,
        };
        handle_event(game, clients, event);
    }

    fn join(game: &mut GameState, clients: &mut ClientManager, id: u32, name: Option<&str>) {
        let name = name.map(str::to_string);
        send(game, clients, id, ClientMessage::Join { name });
    }

    fn received_types(receiver: &mut mpsc::Receiver<Message>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(Message::Text(text)) = receiver.try_recv() {
            let value: Value = serde_json::from_str(&text).unwrap();
            types.push(value["type"].as_str().unwrap_or_default().to_string());
        }
        types
    }

    #[test]
    fn test_to_frame_is_text_json() {
        match to_frame(&ServerMessage::Pong).unwrap() {
            Message::Text(text) => assert_eq!(text, r#"{"type":"pong"}"#),
            other => panic!("Unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_join_routes_welcome_and_announcement() {
        let mut game = GameState::new(test_config().game);
        let mut clients = ClientManager::new(4);
        let mut first = connect(&mut game, &mut clients, 1);
        let mut second = connect(&mut game, &mut clients, 2);

        join(&mut game, &mut clients, 1, None);
        assert_eq!(received_types(&mut first), vec!["welcome"]);

        join(&mut game, &mut clients, 2, Some("Second"));
        assert_eq!(received_types(&mut second), vec!["welcome"]);
        assert_eq!(received_types(&mut first), vec!["playerJoined"]);
        assert_eq!(game.human_count(), 2);
    }

    #[test]
    fn test_second_join_ignored() {
        let mut game = GameState::new(test_config().game);
        let mut clients = ClientManager::new(4);
        let _rx = connect(&mut game, &mut clients, 1);

        join(&mut game, &mut clients, 1, None);
        join(&mut game, &mut clients, 1, None);
        assert_eq!(game.human_count(), 1);
    }

    #[test]
    fn test_commands_before_join_are_ignored() {
        let mut game = GameState::new(test_config().game);
        let mut clients = ClientManager::new(4);
        let _rx = connect(&mut game, &mut clients, 1);

        send(&mut game, &mut clients, 1, ClientMessage::Reload);
        let input = InputState::default();
        send(&mut game, &mut clients, 1, ClientMessage::Input { input });
        game.tick(1.0 / 60.0);
        assert_eq!(game.human_count(), 0);
    }

    #[test]
    fn test_leaderboard_available_without_join() {
        let mut game = GameState::new(test_config().game);
        let mut clients = ClientManager::new(4);
        let mut rx = connect(&mut game, &mut clients, 1);

        send(&mut game, &mut clients, 1, ClientMessage::GetLeaderboard);
        assert_eq!(received_types(&mut rx), vec!["leaderboardData"]);
    }

    #[test]
    fn test_disconnect_leaves_game() {
        let mut game = GameState::new(test_config().game);
        let mut clients = ClientManager::new(4);
        let _first = connect(&mut game, &mut clients, 1);
        let mut second = connect(&mut game, &mut clients, 2);
        join(&mut game, &mut clients, 1, None);
        join(&mut game, &mut clients, 2, None);
        received_types(&mut second);

        let event = ServerEvent::Disconnected { client_id: 1 };
        handle_event(&mut game, &mut clients, event);
        assert_eq!(game.human_count(), 1);
        assert_eq!(received_types(&mut second), vec!["playerLeft"]);
        assert!(game.player(PlayerId(1)).is_none());
    }

    #[test]
    fn test_connection_over_capacity_is_closed() {
        let mut game = GameState::new(test_config().game);
        let mut clients = ClientManager::new(1);
        let _first = connect(&mut game, &mut clients, 1);
        let mut second = connect(&mut game, &mut clients, 2);

        assert_eq!(clients.len(), 1);
        assert!(matches!(
            second.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_reader_waits_on_full_event_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, mut events_rx) = mpsc::channel(4);
        let watcher = events_tx.clone();
        tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            let _ = handle_connection(1, stream, peer, events_tx).await;
        });

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        let pong = ClientMessage::Pong.encode().unwrap();
        for _ in 0..32 {
            socket.send(Message::Text(pong.clone())).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(watcher.capacity(), 0);

        let mut frames = 0;
        while frames < 32 {
            let event = timeout(Duration::from_secs(5), events_rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let ServerEvent::Frame { client_id, message } = event {
                assert_eq!(client_id, 1);
                assert_eq!(message, ClientMessage::Pong);
                frames += 1;
            }
        }
    }

    #[tokio::test]
    async fn test_bind_reports_address() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.game().human_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_failure_is_typed() {
        let first = Server::bind(test_config()).await.unwrap();
        let taken = first.local_addr().unwrap();
        let config = ServerConfig {
            bind_addr: taken.to_string(),
            ..test_config()
        };
        match Server::bind(config).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken.to_string()),
            Err(other) => panic!("Unexpected error {}", other),
            Ok(_) => panic!("Second bind on {} should fail", taken),
        }
    }
}
