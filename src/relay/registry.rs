//! Room bookkeeping for the signaling relay.
//!
//! The registry owns every room and the connection-to-membership index. It
//! never sends anything itself: each operation returns what happened and the
//! caller decides whom to notify.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};

use crate::common::RelayError;
use crate::config::{MAX_ROOM_PLAYERS, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use crate::player::{Player, PlayerId};

/// Identifies one client connection to the relay.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub player: Player,
    pub connection: ConnectionId,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    /// Join order; the first member is promoted when the host leaves.
    pub members: Vec<Member>,
    pub host_id: PlayerId,
    pub max_turns: Option<u32>,
    pub created_at: Instant,
}

impl Room {
    /// Roster in join order, with `is_host` set on exactly one entry.
    pub fn players(&self) -> Vec<Player> {
        self.members
            .iter()
            .map(|m| Player {
                is_host: m.player.id == self.host_id,
                ..m.player.clone()
            })
            .collect()
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.connection).collect()
    }

    pub fn member(&self, player_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.player.id == player_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Membership {
    room_code: String,
    player_id: PlayerId,
}

/// Result of creating a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub room_code: String,
    pub players: Vec<Player>,
    /// Room the connection implicitly left, if it was already in one.
    pub left: Option<Departure>,
}

/// Result of joining a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room_code: String,
    pub player: Player,
    pub players: Vec<Player>,
    /// Connections of the members who were already in the room.
    pub others: Vec<ConnectionId>,
    pub left: Option<Departure>,
}

/// Result of a member leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_code: String,
    pub player_id: PlayerId,
    pub players: Vec<Player>,
    /// Connections still in the room, to be notified.
    pub remaining: Vec<ConnectionId>,
    pub new_host: Option<PlayerId>,
    pub room_closed: bool,
}

pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    connections: HashMap<ConnectionId, Membership>,
    max_players: usize,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(MAX_ROOM_PLAYERS)
    }
}

impl RoomRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
            max_players,
        }
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    /// Room code and player id bound to `conn`.
    pub fn membership(&self, conn: ConnectionId) -> Option<(&str, &str)> {
        self.connections
            .get(&conn)
            .map(|m| (m.room_code.as_str(), m.player_id.as_str()))
    }

    fn generate_code<R: Rng>(&self, rng: &mut R) -> String {
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Open a new room with `player` as its host.
    pub fn create_room<R: Rng>(
        &mut self,
        rng: &mut R,
        conn: ConnectionId,
        player: Player,
        max_turns: Option<u32>,
        now: Instant,
    ) -> Created {
        let left = self.leave(conn);
        let code = self.generate_code(rng);
        let room = Room {
            code: code.clone(),
            members: vec![Member {
                player: Player {
                    is_host: true,
                    ..player.clone()
                },
                connection: conn,
            }],
            host_id: player.id.clone(),
            max_turns,
            created_at: now,
        };
        let players = room.players();
        self.rooms.insert(code.clone(), room);
        self.connections.insert(
            conn,
            Membership {
                room_code: code.clone(),
                player_id: player.id.clone(),
            },
        );
        info!(room = %code, host = %player.id, "room created");
        Created {
            room_code: code,
            players,
            left,
        }
    }

    /// Add `player` to the room `code`.
    ///
    /// A member rejoining under the same player id replaces their earlier
    /// entry instead of taking a second seat.
    pub fn join_room(
        &mut self,
        conn: ConnectionId,
        code: &str,
        player: Player,
    ) -> Result<Joined, RelayError> {
        let room = self
            .rooms
            .get(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.to_string()))?;
        let already_seated = room.member(&player.id).is_some()
            || self
                .connections
                .get(&conn)
                .is_some_and(|m| m.room_code == code);
        if !already_seated && room.len() >= self.max_players {
            return Err(RelayError::RoomFull(code.to_string()));
        }

        let in_target = self
            .connections
            .get(&conn)
            .is_some_and(|m| m.room_code == code);
        let left = if in_target { None } else { self.leave(conn) };

        let stale: Option<ConnectionId> = self
            .rooms
            .get(code)
            .and_then(|r| r.member(&player.id))
            .map(|m| m.connection)
            .filter(|c| *c != conn);
        if let Some(stale) = stale {
            debug!(room = code, player = %player.id, "replacing stale membership");
            self.connections.remove(&stale);
        }

        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.to_string()))?;
        room.members
            .retain(|m| m.player.id != player.id && m.connection != conn);
        let others = room.connections();
        room.members.push(Member {
            player: Player {
                is_host: false,
                ..player.clone()
            },
            connection: conn,
        });
        if room.member(&room.host_id).is_none() {
            room.host_id = room.members[0].player.id.clone();
        }
        let players = room.players();
        let joined = players
            .iter()
            .find(|p| p.id == player.id)
            .cloned()
            .unwrap_or(player);
        self.connections.insert(
            conn,
            Membership {
                room_code: code.to_string(),
                player_id: joined.id.clone(),
            },
        );
        info!(room = code, player = %joined.id, members = players.len(), "player joined");
        Ok(Joined {
            room_code: code.to_string(),
            player: joined,
            players,
            others,
            left,
        })
    }

    /// Remove the member bound to `conn` from its room.
    ///
    /// Deletes the room when it empties, otherwise promotes the earliest
    /// remaining member if the host left. Returns `None` when the connection
    /// was not in a room.
    pub fn leave(&mut self, conn: ConnectionId) -> Option<Departure> {
        let membership = self.connections.remove(&conn)?;
        let code = membership.room_code;
        let room = self.rooms.get_mut(&code)?;
        room.members.retain(|m| m.connection != conn);

        if room.members.is_empty() {
            self.rooms.remove(&code);
            info!(room = %code, "room closed");
            return Some(Departure {
                room_code: code,
                player_id: membership.player_id,
                players: Vec::new(),
                remaining: Vec::new(),
                new_host: None,
                room_closed: true,
            });
        }

        let mut new_host = None;
        if room.host_id == membership.player_id {
            let successor = room.members[0].player.id.clone();
            info!(room = %code, host = %successor, "host migrated");
            room.host_id = successor.clone();
            new_host = Some(successor);
        }
        debug!(room = %code, player = %membership.player_id, "player left");
        Some(Departure {
            room_code: code,
            player_id: membership.player_id,
            players: room.players(),
            remaining: room.connections(),
            new_host,
            room_closed: false,
        })
    }

    /// Resolve a signal from `from` addressed to `to_player`: returns the
    /// sender's player id and the target's connection when both are in the
    /// same room.
    pub fn route(&self, from: ConnectionId, to_player: &str) -> Option<(PlayerId, ConnectionId)> {
        let membership = self.connections.get(&from)?;
        let room = self.rooms.get(&membership.room_code)?;
        let target = room.member(to_player)?;
        Some((membership.player_id.clone(), target.connection))
    }

    /// Delete rooms older than `ttl`. Their connections are unbound without
    /// notice. Returns the removed codes.
    pub fn sweep(&mut self, now: Instant, ttl: Duration) -> Vec<String> {
        let expired: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, room)| now.saturating_duration_since(room.created_at) > ttl)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &expired {
            self.rooms.remove(code);
            self.connections.retain(|_, m| &m.room_code != code);
            info!(room = %code, "expired room removed");
        }
        expired
    }
}
