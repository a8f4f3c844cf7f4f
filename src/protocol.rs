//! Wire messages: the relay control channel and the peer data channels.
//!
//! Every message is a JSON object with a `type` discriminator and camelCase
//! fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::board::{BoardSnapshot, Coord};
use crate::common::RelayError;
use crate::player::{Player, PlayerId};
use crate::ship::{Ship, ShipId};

/// Connection-setup payload addressed to one room member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(alias = "targetPeer")]
    pub to: PlayerId,
    #[serde(alias = "offer", alias = "answer", alias = "candidate")]
    pub data: Value,
}

/// Connection-setup payload as delivered by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedSignal {
    pub from: PlayerId,
    pub to: PlayerId,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Messages sent by a client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        player_id: PlayerId,
        player_name: String,
        #[serde(default)]
        max_turns: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        player_id: PlayerId,
        player_name: String,
    },
    LeaveRoom {},
    WebrtcOffer(Signal),
    WebrtcAnswer(Signal),
    WebrtcIceCandidate(Signal),
}

impl ClientMessage {
    const TYPES: [&'static str; 6] = [
        "create_room",
        "join_room",
        "leave_room",
        "webrtc_offer",
        "webrtc_answer",
        "webrtc_ice_candidate",
    ];

    /// Parse a control frame, telling unknown types apart from broken payloads.
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| RelayError::MalformedMessage(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::MalformedMessage("missing \"type\" field".into()))?;
        if !Self::TYPES.contains(&kind) {
            return Err(RelayError::UnknownMessageType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| RelayError::MalformedMessage(e.to_string()))
    }

    pub fn signal(kind: SignalKind, to: impl Into<PlayerId>, data: Value) -> Self {
        let signal = Signal { to: to.into(), data };
        match kind {
            SignalKind::Offer => ClientMessage::WebrtcOffer(signal),
            SignalKind::Answer => ClientMessage::WebrtcAnswer(signal),
            SignalKind::IceCandidate => ClientMessage::WebrtcIceCandidate(signal),
        }
    }

    /// The connection-setup payload carried by this message, if any.
    pub fn as_signal(&self) -> Option<(SignalKind, &Signal)> {
        match self {
            ClientMessage::WebrtcOffer(s) => Some((SignalKind::Offer, s)),
            ClientMessage::WebrtcAnswer(s) => Some((SignalKind::Answer, s)),
            ClientMessage::WebrtcIceCandidate(s) => Some((SignalKind::IceCandidate, s)),
            _ => None,
        }
    }
}

/// Messages sent by the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: String,
        player_id: PlayerId,
        players: Vec<Player>,
    },
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: String,
        player_id: PlayerId,
        players: Vec<Player>,
    },
    PlayerJoined {
        player: Player,
        players: Vec<Player>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: PlayerId,
        players: Vec<Player>,
    },
    WebrtcOffer(RelayedSignal),
    WebrtcAnswer(RelayedSignal),
    WebrtcIceCandidate(RelayedSignal),
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn relayed(kind: SignalKind, from: &str, signal: &Signal) -> Self {
        let relayed = RelayedSignal {
            from: from.to_string(),
            to: signal.to.clone(),
            data: signal.data.clone(),
        };
        match kind {
            SignalKind::Offer => ServerMessage::WebrtcOffer(relayed),
            SignalKind::Answer => ServerMessage::WebrtcAnswer(relayed),
            SignalKind::IceCandidate => ServerMessage::WebrtcIceCandidate(relayed),
        }
    }

    pub fn error(err: &RelayError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}

/// Authoritative start-of-game state broadcast by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub board: BoardSnapshot,
    pub ships: Vec<Ship>,
    pub current_player: Player,
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Turn order. Receivers keep their own roster when this is empty.
    #[serde(default)]
    pub players: Vec<Player>,
}

/// Messages exchanged directly between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    GameStarted(GameSnapshot),
    #[serde(rename_all = "camelCase")]
    AttackSync {
        coordinates: Coord,
        attacker: PlayerId,
        attacking_ship_id: ShipId,
        turn: u32,
    },
    #[serde(rename_all = "camelCase")]
    MoveSync {
        ship_id: ShipId,
        coordinates: Coord,
        player: PlayerId,
        turn: u32,
    },
    #[serde(rename_all = "camelCase")]
    TurnSync {
        current_player: Player,
        turn_count: u32,
        from_player: PlayerId,
    },
}

impl PeerMessage {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
