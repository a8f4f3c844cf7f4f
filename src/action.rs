//! Append-only history of resolved actions.

use serde::{Deserialize, Serialize};

use crate::board::{Coord, SplashHit};
use crate::player::PlayerId;
use crate::ship::ShipId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackResult {
    Hit,
    Miss,
}

/// Direction of a move. Rows grow downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Direction from `from` to `to`, `None` when the cells coincide or are
    /// not on a shared row or column.
    pub fn between(from: Coord, to: Coord) -> Option<Direction> {
        match (from.x == to.x, from.y == to.y) {
            (true, true) | (false, false) => None,
            (false, true) if to.x > from.x => Some(Direction::Down),
            (false, true) => Some(Direction::Up),
            (true, false) if to.y > from.y => Some(Direction::Right),
            (true, false) => Some(Direction::Left),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackRecord {
    pub attacker: PlayerId,
    pub attacking_ship_id: ShipId,
    pub coordinates: Coord,
    pub result: AttackResult,
    pub ships_hit: Vec<ShipId>,
    pub ships_sunk: Vec<ShipId>,
    pub affected_players: Vec<PlayerId>,
    pub splash_cells: Vec<Coord>,
    pub splash_ships: Vec<SplashHit>,
    pub turn: u32,
}

impl AttackRecord {
    pub fn is_hit(&self) -> bool {
        self.result == AttackResult::Hit
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub player: PlayerId,
    pub ship_id: ShipId,
    pub ship_type: String,
    pub old_coordinates: Coord,
    pub new_coordinates: Coord,
    pub direction: Direction,
    pub distance: usize,
    pub turn: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Attack(AttackRecord),
    Move(MoveRecord),
}

impl Action {
    pub fn turn(&self) -> u32 {
        match self {
            Action::Attack(a) => a.turn,
            Action::Move(m) => m.turn,
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            Action::Attack(a) => &a.attacker,
            Action::Move(m) => &m.player,
        }
    }
}
