//! Rule constants and runtime configuration.

use core::time::Duration;
use std::net::{IpAddr, Ipv4Addr};

use crate::ship::ShipType;

/// Board edge length per player count. Anything not listed uses [`DEFAULT_BOARD_SIZE`].
pub const BOARD_SIZES: [(usize, usize); 4] = [(2, 5), (3, 7), (4, 10), (5, 12)];
pub const DEFAULT_BOARD_SIZE: usize = 10;

pub const NUM_SHIP_TYPES: usize = 3;
/// Every player receives one ship of each type.
pub const FLEET: [ShipType; NUM_SHIP_TYPES] = [
    ShipType::new("Carrier", 1),
    ShipType::new("Battleship", 1),
    ShipType::new("Cruiser", 1),
];

pub const MAX_ROOM_PLAYERS: usize = 5;
pub const MIN_GAME_PLAYERS: usize = 2;

pub const ROOM_CODE_LEN: usize = 6;
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const PLACEMENT_ATTEMPTS: usize = 1000;
/// Results are not evaluated before this many turns have elapsed.
pub const MIN_TURNS_BEFORE_RESULT: u32 = 2;
/// Turn cap offered by the lobby when the host does not pick one.
pub const DEFAULT_MAX_TURNS: u32 = 50;
/// Attacks reach the cells around the attacking ship.
pub const DEFAULT_ATTACK_RANGE: usize = 1;

pub const TURN_ADVANCE_DELAY: Duration = Duration::from_secs(1);
pub const PEER_READY_GRACE: Duration = Duration::from_secs(2);
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);

pub const ROOM_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const ROOM_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Upper bound on a single peer frame (1 MiB).
pub const MAX_FRAME_SIZE: u32 = 1 << 20;

/// Board edge length for a game with `players` participants.
pub fn board_size_for(players: usize) -> usize {
    BOARD_SIZES
        .iter()
        .find(|(count, _)| *count == players)
        .map(|(_, size)| *size)
        .unwrap_or(DEFAULT_BOARD_SIZE)
}

/// Tunables for the replicated game engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub turn_advance_delay: Duration,
    pub placement_attempts: usize,
    pub min_turns_before_result: u32,
    /// Maximum Chebyshev distance between the attacking ship and its target.
    /// `None` allows any target on the board.
    pub attack_range: Option<usize>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_advance_delay: TURN_ADVANCE_DELAY,
            placement_attempts: PLACEMENT_ATTEMPTS,
            min_turns_before_result: MIN_TURNS_BEFORE_RESULT,
            attack_range: Some(DEFAULT_ATTACK_RANGE),
        }
    }
}

/// Tunables for the signaling relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub room_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_room_players: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            room_ttl: ROOM_TTL,
            sweep_interval: ROOM_SWEEP_INTERVAL,
            max_room_players: MAX_ROOM_PLAYERS,
        }
    }
}

/// Tunables for peer connection setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
    /// A negotiation that has not produced an open channel by then fails.
    pub negotiation_timeout: Duration,
    /// Address listened on and advertised to peers by the TCP connector.
    pub bind_ip: IpAddr,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: NEGOTIATION_TIMEOUT,
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

/// Tunables for a client session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub game: GameConfig,
    pub mesh: MeshConfig,
    /// Wait between a start request and the start itself, giving peer
    /// channels time to open.
    pub peer_ready_grace: Duration,
    /// Host starts automatically once the room holds this many players.
    pub auto_start_players: Option<usize>,
    /// Turn cap sent when creating a room.
    pub max_turns: Option<u32>,
    pub exit_on_game_over: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            mesh: MeshConfig::default(),
            peer_ready_grace: PEER_READY_GRACE,
            auto_start_players: None,
            max_turns: Some(DEFAULT_MAX_TURNS),
            exit_on_game_over: false,
        }
    }
}
