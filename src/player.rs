//! Player identity and the trait implemented by automated players.

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::board::Coord;
use crate::game::GameEngine;
use crate::ship::ShipId;

pub type PlayerId = String;

/// Room member as seen by the relay and every client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub is_host: bool,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_host: false,
        }
    }

    pub fn host(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            is_host: true,
            ..Self::new(id, name)
        }
    }
}

/// What a player wants to do with its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Attack { ship: ShipId, target: Coord },
    Move { ship: ShipId, to: Coord },
}

/// Interface implemented by automated players.
///
/// A commander is only consulted when it is the local player's turn and no
/// action has been taken yet. Returning `None` passes the turn.
pub trait Commander: Send {
    fn plan(&mut self, rng: &mut SmallRng, engine: &GameEngine) -> Option<Plan>;

    /// Inform the commander that a game started.
    fn game_started(&mut self, _engine: &GameEngine) {}
}
