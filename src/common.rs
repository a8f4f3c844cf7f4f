//! Error types shared across the engine, relay and mesh.

use thiserror::Error;

use crate::board::Coord;
use crate::game::{GamePhase, TurnPhase};

/// Rejections produced by the turn state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("game is not in progress (phase: {0:?})")]
    NotPlaying(GamePhase),
    #[error("game has already started")]
    AlreadyStarted,
    #[error("only the host can start the game")]
    NotHost,
    #[error("at least {required} players are needed, found {found}")]
    NotEnoughPlayers { required: usize, found: usize },
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),
    #[error("action requires the {expected:?} phase, current phase is {actual:?}")]
    WrongTurnPhase { expected: TurnPhase, actual: TurnPhase },
    #[error("choose movement or attack first")]
    ActionNotChosen,
    #[error("an action was already taken this turn")]
    ActionAlreadyTaken,
    #[error("no ship selected")]
    NoShipSelected,
    #[error("unknown ship {0}")]
    UnknownShip(String),
    #[error("ship {0} belongs to another player")]
    NotShipOwner(String),
    #[error("ship {0} has been sunk")]
    ShipSunk(String),
    #[error("coordinate {0} is outside the board")]
    OutOfBounds(Coord),
    #[error("cell {0} has already been resolved")]
    CellResolved(Coord),
    #[error("cell {0} holds one of your own ships")]
    OwnShipTargeted(Coord),
    #[error("target {0} is out of the attacking ship's range")]
    OutOfRange(Coord),
    #[error("move destination must differ from the current cell")]
    ZeroDistanceMove,
    #[error("ships only move along a row or a column")]
    DiagonalMove,
    #[error("destination {0} already holds one of your ships")]
    OwnShipAtDestination(Coord),
    #[error("invalid game snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Failures reported back to a relay client as an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

/// Failures while setting up or using a peer link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("peer negotiation with {peer} failed: {reason}")]
    PeerNegotiationFailure { peer: String, reason: String },
    #[error("no negotiation in progress with {0}")]
    NoPendingNegotiation(String),
}

impl MeshError {
    pub fn negotiation(peer: &str, reason: impl Into<String>) -> Self {
        MeshError::PeerNegotiationFailure {
            peer: peer.to_string(),
            reason: reason.into(),
        }
    }
}
