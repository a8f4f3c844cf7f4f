//! Signaling relay: room membership plus blind forwarding of connection-setup
//! payloads between members of the same room.

pub mod registry;
#[cfg(feature = "net")]
pub mod server;

#[cfg(feature = "net")]
pub use hub::*;

#[cfg(feature = "net")]
mod hub {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::time::Instant;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
    use tracing::{debug, warn};

    use super::registry::{ConnectionId, Departure, RoomRegistry};
    use crate::config::RelayConfig;
    use crate::player::Player;
    use crate::protocol::{ClientMessage, ServerMessage};
    use crate::signaling::SignalingChannel;

    pub type SharedRelay = Arc<Mutex<Relay>>;

    /// Lock a shared relay, recovering the guard if a holder panicked.
    pub fn lock(relay: &SharedRelay) -> MutexGuard<'_, Relay> {
        relay.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Connection-facing half of the relay. Every connection registers an
    /// outbox; handling a message pushes replies and notifications into the
    /// outboxes of the affected connections.
    pub struct Relay {
        registry: RoomRegistry,
        outboxes: HashMap<ConnectionId, UnboundedSender<ServerMessage>>,
        rng: SmallRng,
        next_conn: ConnectionId,
        config: RelayConfig,
    }

    impl Relay {
        pub fn new(config: RelayConfig) -> Self {
            Self::with_rng(config, SmallRng::from_rng(&mut rand::rng()))
        }

        /// Relay with a fixed room-code generator.
        pub fn with_rng(config: RelayConfig, rng: SmallRng) -> Self {
            Self {
                registry: RoomRegistry::new(config.max_room_players),
                outboxes: HashMap::new(),
                rng,
                next_conn: 1,
                config,
            }
        }

        pub fn shared(self) -> SharedRelay {
            Arc::new(Mutex::new(self))
        }

        pub fn registry(&self) -> &RoomRegistry {
            &self.registry
        }

        pub fn config(&self) -> &RelayConfig {
            &self.config
        }

        pub fn connection_count(&self) -> usize {
            self.outboxes.len()
        }

        /// Register a connection whose outbound messages go to `outbox`.
        pub fn connect(&mut self, outbox: UnboundedSender<ServerMessage>) -> ConnectionId {
            let conn = self.next_conn;
            self.next_conn += 1;
            self.outboxes.insert(conn, outbox);
            debug!(conn, "client connected");
            conn
        }

        /// Drop a connection, leaving its room as if it had sent `leave_room`.
        pub fn disconnect(&mut self, conn: ConnectionId) {
            self.outboxes.remove(&conn);
            if let Some(departure) = self.registry.leave(conn) {
                self.notify_departure(departure);
            }
            debug!(conn, "client disconnected");
        }

        fn send(&self, conn: ConnectionId, msg: ServerMessage) {
            match self.outboxes.get(&conn) {
                Some(outbox) => {
                    if outbox.send(msg).is_err() {
                        debug!(conn, "outbox closed, dropping message");
                    }
                }
                None => debug!(conn, "no outbox for connection"),
            }
        }

        fn notify_departure(&self, departure: Departure) {
            let Departure {
                player_id,
                players,
                remaining,
                ..
            } = departure;
            for conn in remaining {
                self.send(
                    conn,
                    ServerMessage::PlayerLeft {
                        player_id: player_id.clone(),
                        players: players.clone(),
                    },
                );
            }
        }

        /// Handle one raw control frame.
        pub fn handle_text(&mut self, conn: ConnectionId, text: &str) {
            match ClientMessage::parse(text) {
                Ok(msg) => self.handle_message(conn, msg),
                Err(e) => {
                    warn!(conn, error = %e, "rejecting client message");
                    self.send(conn, ServerMessage::error(&e));
                }
            }
        }

        pub fn handle_message(&mut self, conn: ConnectionId, msg: ClientMessage) {
            if let Some((kind, signal)) = msg.as_signal() {
                match self.registry.route(conn, &signal.to) {
                    Some((from, target)) => {
                        self.send(target, ServerMessage::relayed(kind, &from, signal));
                    }
                    None => debug!(conn, to = %signal.to, ?kind, "dropping unroutable signal"),
                }
                return;
            }

            match msg {
                ClientMessage::CreateRoom {
                    player_id,
                    player_name,
                    max_turns,
                } => {
                    let created = self.registry.create_room(
                        &mut self.rng,
                        conn,
                        Player::new(player_id.clone(), player_name),
                        max_turns,
                        Instant::now(),
                    );
                    if let Some(left) = created.left {
                        self.notify_departure(left);
                    }
                    self.send(
                        conn,
                        ServerMessage::RoomCreated {
                            room_code: created.room_code,
                            player_id,
                            players: created.players,
                        },
                    );
                }
                ClientMessage::JoinRoom {
                    room_code,
                    player_id,
                    player_name,
                } => {
                    let player = Player::new(player_id.clone(), player_name);
                    match self.registry.join_room(conn, &room_code, player) {
                        Ok(joined) => {
                            if let Some(left) = joined.left {
                                self.notify_departure(left);
                            }
                            self.send(
                                conn,
                                ServerMessage::RoomJoined {
                                    room_code: joined.room_code,
                                    player_id,
                                    players: joined.players.clone(),
                                },
                            );
                            for other in joined.others {
                                self.send(
                                    other,
                                    ServerMessage::PlayerJoined {
                                        player: joined.player.clone(),
                                        players: joined.players.clone(),
                                    },
                                );
                            }
                        }
                        Err(e) => {
                            debug!(conn, error = %e, "join rejected");
                            self.send(conn, ServerMessage::error(&e));
                        }
                    }
                }
                ClientMessage::LeaveRoom {} => match self.registry.leave(conn) {
                    Some(departure) => self.notify_departure(departure),
                    None => debug!(conn, "leave_room from a connection outside any room"),
                },
                ClientMessage::WebrtcOffer(_)
                | ClientMessage::WebrtcAnswer(_)
                | ClientMessage::WebrtcIceCandidate(_) => {}
            }
        }

        /// Delete rooms past their time-to-live.
        pub fn sweep(&mut self, now: Instant) -> Vec<String> {
            let ttl = self.config.room_ttl;
            self.registry.sweep(now, ttl)
        }

        /// Connect an in-process client. The returned channel behaves like a
        /// websocket connection to this relay.
        pub fn attach(relay: &SharedRelay) -> SignalingChannel {
            let (out_tx, out_rx) = unbounded_channel::<ServerMessage>();
            let (in_tx, mut in_rx) = unbounded_channel::<ClientMessage>();
            let conn = lock(relay).connect(out_tx);
            let relay = relay.clone();
            tokio::spawn(async move {
                while let Some(msg) = in_rx.recv().await {
                    lock(&relay).handle_message(conn, msg);
                }
                lock(&relay).disconnect(conn);
            });
            SignalingChannel::new(in_tx, out_rx)
        }
    }
}
