//! Game board: cells, ship occupancy and attack resolution.
//!
//! Cell state is never stored. It is recomputed from three facts on every
//! read: which ships occupy the cell, which of those ships recorded a hit
//! there, and whether a miss landed on the cell while it was empty.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::common::GameError;
use crate::player::PlayerId;
use crate::ship::{Ship, ShipId};

/// Board position. `x` is the row, `y` the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// The up to eight cells surrounding this one that lie on a `size`×`size` board.
    pub fn neighbors(self, size: usize) -> impl Iterator<Item = Coord> {
        const OFFSETS: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        OFFSETS.into_iter().filter_map(move |(dx, dy)| {
            let x = self.x.checked_add_signed(dx)?;
            let y = self.y.checked_add_signed(dy)?;
            (x < size && y < size).then_some(Coord::new(x, y))
        })
    }

    /// Chebyshev distance: number of king steps between the two cells.
    pub fn chebyshev(self, other: Coord) -> usize {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Manhattan distance.
    pub fn manhattan(self, other: Coord) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Observable state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Empty,
    Ship,
    Hit,
    Miss,
    Sunk,
}

impl CellState {
    /// Cells in this state can still be attacked.
    pub fn is_open(self) -> bool {
        matches!(self, CellState::Empty | CellState::Ship)
    }
}

/// Reference from a cell to a ship standing on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipRef {
    pub id: ShipId,
    pub owner: PlayerId,
}

/// Marker left on a missed cell that had an enemy ship next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Splash {
    pub attacker_id: PlayerId,
    pub attack_coord: Coord,
    pub turn: u32,
}

/// Enemy ship reported by a splash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplashHit {
    pub ship_id: ShipId,
    pub ship_type: String,
    pub owner: PlayerId,
    pub coordinates: Coord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    occupants: Vec<ShipRef>,
    splashes: Vec<Splash>,
    missed: bool,
}

impl Cell {
    pub fn occupants(&self) -> &[ShipRef] {
        &self.occupants
    }

    pub fn splashes(&self) -> &[Splash] {
        &self.splashes
    }

    pub fn has_ship_of(&self, owner: &str) -> bool {
        self.occupants.iter().any(|r| r.owner == owner)
    }
}

/// Facts produced by resolving one attack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Strike {
    pub hit: bool,
    pub ships_hit: Vec<ShipId>,
    pub ships_sunk: Vec<ShipId>,
    pub affected_players: Vec<PlayerId>,
    pub splash_cells: Vec<Coord>,
    pub splash_ships: Vec<SplashHit>,
}

/// Square grid plus every ship standing on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
    ships: Vec<Ship>,
}

impl Board {
    /// Empty `size`×`size` board with no ships.
    pub fn new(size: usize) -> Self {
        Board {
            size,
            cells: vec![Cell::default(); size * size],
            ships: Vec::new(),
        }
    }

    /// Fresh board with `ships` written onto it.
    pub fn with_ships(size: usize, ships: Vec<Ship>) -> Result<Self, GameError> {
        let mut board = Board::new(size);
        for ship in ships {
            if ship.coordinates.is_empty() {
                return Err(GameError::InvalidSnapshot(format!(
                    "ship {} has no coordinates",
                    ship.id
                )));
            }
            if board.ship(&ship.id).is_some() {
                return Err(GameError::InvalidSnapshot(format!(
                    "duplicate ship id {}",
                    ship.id
                )));
            }
            if let Some(c) = ship.coordinates.iter().find(|c| !board.contains(**c)) {
                return Err(GameError::OutOfBounds(*c));
            }
            for c in &ship.coordinates {
                let idx = board.index(*c);
                board.cells[idx].occupants.push(ShipRef {
                    id: ship.id.clone(),
                    owner: ship.owner.clone(),
                });
            }
            board.ships.push(ship);
        }
        Ok(board)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.size && coord.y < self.size
    }

    fn index(&self, coord: Coord) -> usize {
        coord.x * self.size + coord.y
    }

    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        if self.contains(coord) {
            self.cells.get(self.index(coord))
        } else {
            None
        }
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn ship(&self, id: &str) -> Option<&Ship> {
        self.ships.iter().find(|s| s.id == id)
    }

    fn ship_mut(&mut self, id: &str) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| s.id == id)
    }

    pub fn ships_of<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Ship> + 'a {
        self.ships.iter().filter(move |s| s.owner == owner)
    }

    /// Ships of `owner` that are not sunk.
    pub fn remaining_ships(&self, owner: &str) -> usize {
        self.ships_of(owner).filter(|s| !s.is_sunk()).count()
    }

    /// Whether `owner` has a ship still afloat at `coord`.
    pub fn has_afloat_ship_of(&self, coord: Coord, owner: &str) -> bool {
        self.cell(coord).is_some_and(|cell| {
            cell.occupants
                .iter()
                .filter(|r| r.owner == owner)
                .any(|r| self.ship(&r.id).is_some_and(|s| !s.is_sunk()))
        })
    }

    /// Derived state of the cell at `coord`, `None` when off the board.
    pub fn state_at(&self, coord: Coord) -> Option<CellState> {
        let cell = self.cell(coord)?;
        let occupants: Vec<&Ship> = cell
            .occupants
            .iter()
            .filter_map(|r| self.ship(&r.id))
            .collect();
        let (afloat, wrecks): (Vec<&Ship>, Vec<&Ship>) =
            occupants.into_iter().partition(|s| !s.is_sunk());
        // A wreck only resolves the cell while nothing afloat shares it.
        let state = if afloat.iter().any(|s| s.is_hit_at(coord)) {
            CellState::Hit
        } else if !afloat.is_empty() {
            CellState::Ship
        } else if !wrecks.is_empty() {
            CellState::Sunk
        } else if cell.missed {
            CellState::Miss
        } else {
            CellState::Empty
        };
        Some(state)
    }

    /// Resolve an attack by `attacker` on `coord`.
    pub fn strike(&mut self, coord: Coord, attacker: &str, turn: u32) -> Result<Strike, GameError> {
        let state = self.state_at(coord).ok_or(GameError::OutOfBounds(coord))?;
        if !state.is_open() {
            return Err(GameError::CellResolved(coord));
        }
        let idx = self.index(coord);
        let occupants: Vec<ShipRef> = self.cells[idx]
            .occupants
            .iter()
            .filter(|r| self.ship(&r.id).is_some_and(|s| !s.is_sunk()))
            .cloned()
            .collect();
        let mut strike = Strike {
            hit: !occupants.is_empty(),
            ..Strike::default()
        };

        if strike.hit {
            for r in &occupants {
                if let Some(ship) = self.ship_mut(&r.id) {
                    ship.record_hit(coord);
                    strike.ships_hit.push(r.id.clone());
                    if !strike.affected_players.contains(&r.owner) {
                        strike.affected_players.push(r.owner.clone());
                    }
                }
            }
            strike.ships_sunk = strike
                .ships_hit
                .iter()
                .filter(|id| self.ship(id).is_some_and(|s| s.is_sunk()))
                .cloned()
                .collect();
        } else {
            self.cells[idx].missed = true;
            for n in coord.neighbors(self.size) {
                let enemies: Vec<&ShipRef> = self.cells[self.index(n)]
                    .occupants
                    .iter()
                    .filter(|r| r.owner != attacker)
                    .collect();
                if enemies.is_empty() {
                    continue;
                }
                strike.splash_cells.push(n);
                for r in enemies {
                    if strike.splash_ships.iter().any(|s| s.ship_id == r.id) {
                        continue;
                    }
                    let ship_type = self
                        .ship(&r.id)
                        .map(|s| s.kind.clone())
                        .unwrap_or_default();
                    strike.splash_ships.push(SplashHit {
                        ship_id: r.id.clone(),
                        ship_type,
                        owner: r.owner.clone(),
                        coordinates: n,
                    });
                }
            }
            if !strike.splash_cells.is_empty() {
                self.cells[idx].splashes.push(Splash {
                    attacker_id: attacker.to_string(),
                    attack_coord: coord,
                    turn,
                });
            }
        }
        Ok(strike)
    }

    /// Move ship `id` so that its anchor lands on `to`, keeping its shape.
    /// Returns the previous anchor. Legality beyond bounds is the caller's job.
    pub fn relocate(&mut self, id: &str, to: Coord) -> Result<Coord, GameError> {
        let ship = self
            .ship(id)
            .ok_or_else(|| GameError::UnknownShip(id.to_string()))?;
        let from = ship
            .position()
            .ok_or_else(|| GameError::UnknownShip(id.to_string()))?;
        let old_cells = ship.coordinates.clone();
        let mut new_cells = Vec::with_capacity(old_cells.len());
        for c in &old_cells {
            let shifted = c
                .x
                .checked_add(to.x)
                .and_then(|x| x.checked_sub(from.x))
                .zip(c.y.checked_add(to.y).and_then(|y| y.checked_sub(from.y)))
                .map(|(x, y)| Coord::new(x, y))
                .filter(|n| self.contains(*n))
                .ok_or(GameError::OutOfBounds(to))?;
            new_cells.push(shifted);
        }

        let owner = ship.owner.clone();
        for c in &old_cells {
            let idx = self.index(*c);
            let cell = &mut self.cells[idx];
            cell.occupants.retain(|r| r.id != id);
            if cell.occupants.is_empty() {
                cell.missed = false;
            }
        }
        for c in &new_cells {
            let idx = self.index(*c);
            let cell = &mut self.cells[idx];
            cell.missed = false;
            cell.occupants.push(ShipRef {
                id: id.to_string(),
                owner: owner.clone(),
            });
        }
        if let Some(ship) = self.ship_mut(id) {
            ship.relocate(new_cells);
        }
        Ok(from)
    }

    /// Render the board for the wire or a consumer.
    pub fn snapshot(&self) -> BoardSnapshot {
        let cells = (0..self.size)
            .map(|x| {
                (0..self.size)
                    .map(|y| {
                        let coord = Coord::new(x, y);
                        let idx = self.index(coord);
                        CellView {
                            x,
                            y,
                            state: self.state_at(coord).unwrap_or(CellState::Empty),
                            ships: self.cells[idx].occupants.clone(),
                            splashes: self.cells[idx].splashes.clone(),
                        }
                    })
                    .collect()
            })
            .collect();
        BoardSnapshot {
            size: self.size,
            cells,
        }
    }
}

/// Read-only rendering of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub x: usize,
    pub y: usize,
    pub state: CellState,
    #[serde(default)]
    pub ships: Vec<ShipRef>,
    #[serde(default)]
    pub splashes: Vec<Splash>,
}

/// Read-only rendering of a board, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub size: usize,
    #[serde(default)]
    pub cells: Vec<Vec<CellView>>,
}
