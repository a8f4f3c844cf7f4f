//! Commonly used types and utilities for ease of import.

pub use crate::{
    AiCommander, Commander, Coord, GameConfig, GameEngine, GamePhase, GameResult, Player,
    SessionConfig, TurnPhase,
};

pub use crate::mesh::{InMemoryConnector, InMemoryNetwork, TcpConnector};
pub use crate::relay::{Relay, SharedRelay};
pub use crate::session::{Intent, Session, SessionEvent, SessionHandle};
pub use crate::signaling::SignalingChannel;
pub use crate::transport::{tcp::TcpTransport, PeerChannel, Transport};
