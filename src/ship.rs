//! Ship definitions and randomized fleet placement.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::board::Coord;
use crate::player::PlayerId;

pub type ShipId = String;

/// Orientation of a ship on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Type of ship: name and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipType {
    name: &'static str,
    size: usize,
}

impl ShipType {
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// A ship on the board. Sunk-ness is derived from `hits`, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub id: ShipId,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: usize,
    pub owner: PlayerId,
    pub orientation: Orientation,
    pub coordinates: Vec<Coord>,
    #[serde(default)]
    pub hits: Vec<Coord>,
}

impl Ship {
    /// Build a ship of `ship_type` with its origin at `origin`. Cells beyond
    /// the origin extend along `orientation` and may fall outside any board;
    /// callers check bounds.
    pub fn new(
        id: impl Into<ShipId>,
        ship_type: ShipType,
        owner: impl Into<PlayerId>,
        orientation: Orientation,
        origin: Coord,
    ) -> Self {
        let coordinates = (0..ship_type.size())
            .map(|i| match orientation {
                Orientation::Horizontal => Coord::new(origin.x, origin.y + i),
                Orientation::Vertical => Coord::new(origin.x + i, origin.y),
            })
            .collect();
        Ship {
            id: id.into(),
            kind: ship_type.name().to_string(),
            size: ship_type.size(),
            owner: owner.into(),
            orientation,
            coordinates,
            hits: Vec::new(),
        }
    }

    /// Canonical id for the `index`-th ship of `owner`.
    pub fn make_id(owner: &str, ship_type: ShipType, index: usize) -> ShipId {
        format!("{}-{}-{}", owner, ship_type.name(), index)
    }

    /// Cell the ship is anchored on.
    pub fn position(&self) -> Option<Coord> {
        self.coordinates.first().copied()
    }

    pub fn occupies(&self, coord: Coord) -> bool {
        self.coordinates.contains(&coord)
    }

    pub fn is_hit_at(&self, coord: Coord) -> bool {
        self.hits.contains(&coord)
    }

    /// Record a hit. Returns `false` if the ship does not occupy `coord`.
    pub fn record_hit(&mut self, coord: Coord) -> bool {
        if !self.occupies(coord) {
            return false;
        }
        if !self.hits.contains(&coord) {
            self.hits.push(coord);
        }
        true
    }

    /// A ship is sunk once every occupied cell has been hit.
    pub fn is_sunk(&self) -> bool {
        !self.coordinates.is_empty() && self.coordinates.iter().all(|c| self.hits.contains(c))
    }

    /// Replace the occupied cells, dropping hits that no longer apply.
    pub fn relocate(&mut self, coordinates: Vec<Coord>) {
        self.hits.retain(|h| coordinates.contains(h));
        self.coordinates = coordinates;
    }
}

/// Generate a fleet for `owner` by rejection sampling.
///
/// Each ship draws a random orientation and origin until all of its cells are
/// in bounds and clear of the owner's earlier ships. A ship that still has no
/// spot after `max_attempts` draws is dropped with a warning.
pub fn random_fleet<R: Rng>(
    rng: &mut R,
    board_size: usize,
    owner: &str,
    fleet: &[ShipType],
    max_attempts: usize,
) -> Vec<Ship> {
    let mut placed: Vec<Ship> = Vec::with_capacity(fleet.len());
    if board_size == 0 {
        warn!(owner, "cannot place ships on an empty board");
        return placed;
    }
    for (index, ship_type) in fleet.iter().enumerate() {
        let id = Ship::make_id(owner, *ship_type, index);
        let mut attempts = 0;
        let mut spot = None;
        while attempts < max_attempts {
            attempts += 1;
            let orientation = if rng.random() {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            };
            let origin = Coord::new(
                rng.random_range(0..board_size),
                rng.random_range(0..board_size),
            );
            let candidate = Ship::new(id.clone(), *ship_type, owner, orientation, origin);
            let fits = candidate.coordinates.iter().all(|c| {
                c.x < board_size
                    && c.y < board_size
                    && !placed.iter().any(|other| other.occupies(*c))
            });
            if fits {
                spot = Some(candidate);
                break;
            }
        }
        match spot {
            Some(ship) => placed.push(ship),
            None => warn!(
                owner,
                ship = ship_type.name(),
                attempts,
                "could not place ship, dropping it"
            ),
        }
    }
    placed
}
