//! Replicated turn state machine.
//!
//! Every client owns one [`GameEngine`]. Local intents go through the
//! `attack`/`move_ship`/`end_turn` family, which check turn ownership and
//! phase and hand back the [`PeerMessage`] to broadcast. Remote peers'
//! messages go through [`GameEngine::apply_peer_message`], which re-runs the
//! same deterministic transition without turn-ownership checks.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::{Action, AttackRecord, AttackResult, Direction, MoveRecord};
use crate::board::{Board, CellState, Coord};
use crate::common::GameError;
use crate::config::{board_size_for, GameConfig, FLEET, MIN_GAME_PLAYERS};
use crate::player::{Player, PlayerId};
use crate::protocol::{GameSnapshot, PeerMessage};
use crate::ship::{random_fleet, Ship, ShipId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    ChooseAction,
    Movement,
    Attack,
}

/// Remaining ship count for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub player: Player,
    pub remaining_ships: usize,
}

/// Terminal outcome of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameResult {
    /// Exactly one player still has a ship afloat.
    LastSurvivor {
        winner: Player,
        eliminated: Vec<Player>,
    },
    /// Turn cap reached with a single leader.
    MaxTurns {
        winner: Player,
        standings: Vec<Standing>,
    },
    /// Turn cap reached with several players tied for the lead.
    MaxTurnsDraw {
        winners: Vec<Player>,
        standings: Vec<Standing>,
    },
    /// Every fleet was sunk.
    AllEliminated {},
}

impl GameResult {
    pub fn winners(&self) -> Vec<&Player> {
        match self {
            GameResult::LastSurvivor { winner, .. } | GameResult::MaxTurns { winner, .. } => {
                vec![winner]
            }
            GameResult::MaxTurnsDraw { winners, .. } => winners.iter().collect(),
            GameResult::AllEliminated {} => Vec::new(),
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            GameResult::MaxTurnsDraw { .. } | GameResult::AllEliminated {}
        )
    }
}

/// A locally initiated action after it has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub action: Action,
    /// Message for every other peer.
    pub sync: PeerMessage,
    pub result: Option<GameResult>,
}

/// What a remote message did to the local state.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Started,
    Action(Action),
    Turn { current_player: Player, turn_count: u32 },
    /// Echo of a local action, or a message with nothing to do.
    Ignored,
}

pub struct GameEngine {
    local_id: PlayerId,
    config: GameConfig,
    phase: GamePhase,
    players: Vec<Player>,
    board: Board,
    current_player: Option<Player>,
    turn_count: u32,
    max_turns: Option<u32>,
    turn_phase: TurnPhase,
    selected_ship: Option<ShipId>,
    last_attack: Option<AttackRecord>,
    action_taken: bool,
    history: Vec<Action>,
    result: Option<GameResult>,
}

impl GameEngine {
    pub fn new(local_id: impl Into<PlayerId>, config: GameConfig) -> Self {
        Self {
            local_id: local_id.into(),
            config,
            phase: GamePhase::Lobby,
            players: Vec::new(),
            board: Board::new(0),
            current_player: None,
            turn_count: 0,
            max_turns: None,
            turn_phase: TurnPhase::ChooseAction,
            selected_ship: None,
            last_attack: None,
            action_taken: false,
            history: Vec::new(),
            result: None,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current_player.as_ref()
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn max_turns(&self) -> Option<u32> {
        self.max_turns
    }

    pub fn turn_phase(&self) -> TurnPhase {
        self.turn_phase
    }

    pub fn selected_ship(&self) -> Option<&Ship> {
        self.selected_ship
            .as_deref()
            .and_then(|id| self.board.ship(id))
    }

    pub fn last_attack(&self) -> Option<&AttackRecord> {
        self.last_attack.as_ref()
    }

    pub fn action_taken(&self) -> bool {
        self.action_taken
    }

    pub fn history(&self) -> &[Action] {
        &self.history
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    /// `true` while the game runs and the local player holds the turn.
    pub fn is_local_turn(&self) -> bool {
        self.phase == GamePhase::Playing
            && self
                .current_player
                .as_ref()
                .is_some_and(|p| p.id == self.local_id)
    }

    pub fn is_host(&self) -> bool {
        self.players
            .iter()
            .any(|p| p.id == self.local_id && p.is_host)
    }

    /// Set the turn cap used by the next game. `Some(0)` disables the cap.
    pub fn set_max_turns(&mut self, max_turns: Option<u32>) {
        self.max_turns = max_turns;
    }

    /// Adopt the roster broadcast by the relay.
    ///
    /// Outside a running game the roster is replaced wholesale. During a game
    /// players who left are removed, host flags are refreshed and newcomers
    /// are not added.
    pub fn set_roster(&mut self, roster: &[Player]) {
        if self.phase != GamePhase::Playing {
            self.players = roster.to_vec();
            return;
        }
        let departed: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| !roster.iter().any(|r| r.id == p.id))
            .map(|p| p.id.clone())
            .collect();
        let mut gone = Vec::new();
        for id in departed {
            if let Some(p) = self.players.iter().find(|p| p.id == id).cloned() {
                gone.push(p);
            }
            self.remove_player(&id);
        }
        if self.phase == GamePhase::Playing && self.players.len() == 1 && !gone.is_empty() {
            let result = GameResult::LastSurvivor {
                winner: self.players[0].clone(),
                eliminated: gone,
            };
            info!(?result, "every opponent left, game over");
            self.phase = GamePhase::GameOver;
            self.result = Some(result);
        }
        for p in &mut self.players {
            if let Some(r) = roster.iter().find(|r| r.id == p.id) {
                p.is_host = r.is_host;
            }
        }
        for r in roster {
            if !self.players.iter().any(|p| p.id == r.id) {
                debug!(player = %r.id, "player joined a running game, not adding to turn order");
            }
        }
    }

    /// Drop `id` from the turn order. When the departed player held the turn
    /// the turn passes to whoever followed them; every client computes this
    /// locally, so nothing is broadcast.
    pub fn remove_player(&mut self, id: &str) {
        let Some(pos) = self.players.iter().position(|p| p.id == id) else {
            return;
        };
        let was_current = self.current_player.as_ref().is_some_and(|p| p.id == id);
        self.players.remove(pos);
        if self.phase != GamePhase::Playing || !was_current {
            return;
        }
        self.current_player = if self.players.is_empty() {
            None
        } else {
            Some(self.players[pos % self.players.len()].clone())
        };
        self.turn_count += 1;
        self.clear_turn_state();
        info!(
            departed = id,
            current = ?self.current_player.as_ref().map(|p| &p.id),
            "current player left, turn passed on"
        );
    }

    /// Host-only: place every fleet, install the board and return the
    /// authoritative snapshot for the other peers.
    pub fn start_game<R: Rng>(&mut self, rng: &mut R) -> Result<PeerMessage, GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        if !self.is_host() {
            return Err(GameError::NotHost);
        }
        if self.players.len() < MIN_GAME_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                required: MIN_GAME_PLAYERS,
                found: self.players.len(),
            });
        }
        let size = board_size_for(self.players.len());
        let ships: Vec<Ship> = self
            .players
            .iter()
            .flat_map(|p| random_fleet(rng, size, &p.id, &FLEET, self.config.placement_attempts))
            .collect();
        let board = Board::with_ships(size, ships)?;
        let snapshot = GameSnapshot {
            board: board.snapshot(),
            ships: board.ships().to_vec(),
            current_player: self.players[0].clone(),
            max_turns: self.max_turns,
            players: self.players.clone(),
        };
        self.install(board, snapshot.current_player.clone(), snapshot.max_turns, Vec::new());
        Ok(PeerMessage::GameStarted(snapshot))
    }

    /// Replace local state with the host's snapshot.
    pub fn apply_game_started(&mut self, snapshot: GameSnapshot) -> Result<(), GameError> {
        let board = Board::with_ships(snapshot.board.size, snapshot.ships)?;
        if self.phase == GamePhase::Playing {
            warn!("received a new game snapshot while playing, replacing local state");
        }
        self.install(
            board,
            snapshot.current_player,
            snapshot.max_turns,
            snapshot.players,
        );
        Ok(())
    }

    fn install(
        &mut self,
        board: Board,
        current: Player,
        max_turns: Option<u32>,
        players: Vec<Player>,
    ) {
        if !players.is_empty() {
            self.players = players;
        }
        info!(
            board_size = board.size(),
            ships = board.ships().len(),
            first = %current.id,
            "game started"
        );
        self.board = board;
        self.current_player = Some(current);
        self.max_turns = max_turns;
        self.turn_count = 0;
        self.history.clear();
        self.result = None;
        self.phase = GamePhase::Playing;
        self.clear_turn_state();
    }

    fn ensure_playing(&self) -> Result<(), GameError> {
        if self.phase == GamePhase::Playing {
            Ok(())
        } else {
            Err(GameError::NotPlaying(self.phase))
        }
    }

    fn ensure_local_turn(&self) -> Result<(), GameError> {
        self.ensure_playing()?;
        if self.is_local_turn() {
            Ok(())
        } else {
            Err(GameError::NotYourTurn(self.local_id.clone()))
        }
    }

    fn own_live_ship(&self, id: &str) -> Result<&Ship, GameError> {
        let ship = self
            .board
            .ship(id)
            .ok_or_else(|| GameError::UnknownShip(id.to_string()))?;
        if ship.owner != self.local_id {
            return Err(GameError::NotShipOwner(id.to_string()));
        }
        if ship.is_sunk() {
            return Err(GameError::ShipSunk(id.to_string()));
        }
        Ok(ship)
    }

    /// Pick movement or attack for this turn.
    pub fn choose_action(&mut self, phase: TurnPhase) -> Result<(), GameError> {
        self.ensure_local_turn()?;
        if self.action_taken {
            return Err(GameError::ActionAlreadyTaken);
        }
        self.turn_phase = phase;
        Ok(())
    }

    /// Select one of the local player's ships to act with.
    pub fn select_ship(&mut self, id: &str) -> Result<(), GameError> {
        self.ensure_local_turn()?;
        if self.turn_phase == TurnPhase::ChooseAction {
            return Err(GameError::ActionNotChosen);
        }
        self.own_live_ship(id)?;
        self.selected_ship = Some(id.to_string());
        Ok(())
    }

    /// Attack `target` with the selected ship.
    pub fn attack(&mut self, target: Coord) -> Result<Resolved, GameError> {
        self.ensure_local_turn()?;
        if self.action_taken {
            return Err(GameError::ActionAlreadyTaken);
        }
        if self.turn_phase != TurnPhase::Attack {
            return Err(GameError::WrongTurnPhase {
                expected: TurnPhase::Attack,
                actual: self.turn_phase,
            });
        }
        let ship_id = self.selected_ship.clone().ok_or(GameError::NoShipSelected)?;
        let origin = self
            .own_live_ship(&ship_id)?
            .position()
            .ok_or_else(|| GameError::UnknownShip(ship_id.clone()))?;
        if !self.board.contains(target) {
            return Err(GameError::OutOfBounds(target));
        }
        if !self.in_attack_range(origin, target) {
            return Err(GameError::OutOfRange(target));
        }
        let attacker = self.local_id.clone();
        let turn = self.turn_count;
        let record = self.resolve_attack(&attacker, &ship_id, target)?;
        let result = self.evaluate_outcome();
        Ok(Resolved {
            action: Action::Attack(record),
            sync: PeerMessage::AttackSync {
                coordinates: target,
                attacker,
                attacking_ship_id: ship_id,
                turn,
            },
            result,
        })
    }

    /// Move the selected ship to `to`.
    pub fn move_ship(&mut self, to: Coord) -> Result<Resolved, GameError> {
        self.ensure_local_turn()?;
        if self.action_taken {
            return Err(GameError::ActionAlreadyTaken);
        }
        if self.turn_phase != TurnPhase::Movement {
            return Err(GameError::WrongTurnPhase {
                expected: TurnPhase::Movement,
                actual: self.turn_phase,
            });
        }
        let ship_id = self.selected_ship.clone().ok_or(GameError::NoShipSelected)?;
        self.own_live_ship(&ship_id)?;
        let player = self.local_id.clone();
        let turn = self.turn_count;
        let record = self.resolve_move(&player, &ship_id, to)?;
        Ok(Resolved {
            action: Action::Move(record),
            sync: PeerMessage::MoveSync {
                ship_id,
                coordinates: to,
                player,
                turn,
            },
            result: None,
        })
    }

    fn resolve_attack(
        &mut self,
        attacker: &str,
        ship_id: &str,
        target: Coord,
    ) -> Result<AttackRecord, GameError> {
        if self.board.has_afloat_ship_of(target, attacker) {
            return Err(GameError::OwnShipTargeted(target));
        }
        let strike = self.board.strike(target, attacker, self.turn_count)?;
        let record = AttackRecord {
            attacker: attacker.to_string(),
            attacking_ship_id: ship_id.to_string(),
            coordinates: target,
            result: if strike.hit {
                AttackResult::Hit
            } else {
                AttackResult::Miss
            },
            ships_hit: strike.ships_hit,
            ships_sunk: strike.ships_sunk,
            affected_players: strike.affected_players,
            splash_cells: strike.splash_cells,
            splash_ships: strike.splash_ships,
            turn: self.turn_count,
        };
        debug!(
            attacker,
            target = %target,
            result = ?record.result,
            sunk = ?record.ships_sunk,
            "attack resolved"
        );
        if !record.splash_ships.is_empty() {
            info!(
                attacker,
                target = %target,
                ships = ?record.splash_ships.iter().map(|s| &s.ship_id).collect::<Vec<_>>(),
                "splash"
            );
        }
        self.history.push(Action::Attack(record.clone()));
        self.last_attack = Some(record.clone());
        self.action_taken = true;
        Ok(record)
    }

    /// Whether a ship at `origin` can reach `target` under the configured range.
    pub fn in_attack_range(&self, origin: Coord, target: Coord) -> bool {
        self.config
            .attack_range
            .map_or(true, |range| origin.chebyshev(target) <= range)
    }

    /// Check that `player` may move `ship_id` to `to`: orthogonal, non-zero,
    /// in bounds and not onto one of their own ships.
    pub fn check_move(&self, player: &str, ship_id: &str, to: Coord) -> Result<Coord, GameError> {
        let ship = self
            .board
            .ship(ship_id)
            .ok_or_else(|| GameError::UnknownShip(ship_id.to_string()))?;
        if ship.owner != player {
            return Err(GameError::NotShipOwner(ship_id.to_string()));
        }
        if ship.is_sunk() {
            return Err(GameError::ShipSunk(ship_id.to_string()));
        }
        let from = ship
            .position()
            .ok_or_else(|| GameError::UnknownShip(ship_id.to_string()))?;
        if !self.board.contains(to) {
            return Err(GameError::OutOfBounds(to));
        }
        if from == to {
            return Err(GameError::ZeroDistanceMove);
        }
        if from.x != to.x && from.y != to.y {
            return Err(GameError::DiagonalMove);
        }
        if self.board.cell(to).is_some_and(|c| c.has_ship_of(player)) {
            return Err(GameError::OwnShipAtDestination(to));
        }
        Ok(from)
    }

    fn resolve_move(
        &mut self,
        player: &str,
        ship_id: &str,
        to: Coord,
    ) -> Result<MoveRecord, GameError> {
        let from = self.check_move(player, ship_id, to)?;
        let direction = Direction::between(from, to).ok_or(GameError::DiagonalMove)?;
        self.board.relocate(ship_id, to)?;
        let ship_type = self
            .board
            .ship(ship_id)
            .map(|s| s.kind.clone())
            .unwrap_or_default();
        let record = MoveRecord {
            player: player.to_string(),
            ship_id: ship_id.to_string(),
            ship_type,
            old_coordinates: from,
            new_coordinates: to,
            direction,
            distance: from.manhattan(to),
            turn: self.turn_count,
        };
        debug!(player, ship = ship_id, from = %from, to = %to, "ship moved");
        self.history.push(Action::Move(record.clone()));
        self.selected_ship = None;
        self.action_taken = true;
        Ok(record)
    }

    /// The player who follows the current one in roster order.
    pub fn next_player(&self) -> Option<&Player> {
        if self.players.is_empty() {
            return None;
        }
        let idx = self
            .current_player
            .as_ref()
            .and_then(|c| self.players.iter().position(|p| p.id == c.id));
        match idx {
            Some(i) => self.players.get((i + 1) % self.players.len()),
            None => self.players.first(),
        }
    }

    /// Rotate to the next player and clear per-turn state.
    pub fn next_turn(&mut self) {
        let Some(next) = self.next_player().cloned() else {
            warn!("no players left, cannot change turn");
            return;
        };
        self.turn_count += 1;
        self.current_player = Some(next);
        self.clear_turn_state();
    }

    fn clear_turn_state(&mut self) {
        self.turn_phase = TurnPhase::ChooseAction;
        self.selected_ship = None;
        self.last_attack = None;
        self.action_taken = false;
    }

    /// End the local player's turn and build the `turn_sync` for the peers.
    pub fn end_turn(&mut self) -> Result<PeerMessage, GameError> {
        self.ensure_local_turn()?;
        self.next_turn();
        let current_player = self
            .current_player
            .clone()
            .ok_or(GameError::NotPlaying(self.phase))?;
        let msg = PeerMessage::TurnSync {
            current_player,
            turn_count: self.turn_count,
            from_player: self.local_id.clone(),
        };
        self.evaluate_outcome();
        Ok(msg)
    }

    /// Apply a message received from peer `from`.
    pub fn apply_peer_message(
        &mut self,
        from: &str,
        message: PeerMessage,
    ) -> Result<Applied, GameError> {
        match message {
            PeerMessage::GameStarted(snapshot) => {
                debug!(from, "applying game snapshot");
                self.apply_game_started(snapshot)?;
                Ok(Applied::Started)
            }
            PeerMessage::AttackSync {
                coordinates,
                attacker,
                attacking_ship_id,
                turn,
            } => {
                if attacker == self.local_id {
                    return Ok(Applied::Ignored);
                }
                self.ensure_playing()?;
                if turn != self.turn_count {
                    debug!(from, turn, local_turn = self.turn_count, "attack for another turn");
                }
                let record = self.resolve_attack(&attacker, &attacking_ship_id, coordinates)?;
                self.evaluate_outcome();
                Ok(Applied::Action(Action::Attack(record)))
            }
            PeerMessage::MoveSync {
                ship_id,
                coordinates,
                player,
                turn,
            } => {
                if player == self.local_id {
                    return Ok(Applied::Ignored);
                }
                self.ensure_playing()?;
                if turn != self.turn_count {
                    debug!(from, turn, local_turn = self.turn_count, "move for another turn");
                }
                let record = self.resolve_move(&player, &ship_id, coordinates)?;
                Ok(Applied::Action(Action::Move(record)))
            }
            PeerMessage::TurnSync {
                current_player,
                turn_count,
                from_player,
            } => {
                if from_player == self.local_id {
                    return Ok(Applied::Ignored);
                }
                self.ensure_playing()?;
                self.apply_turn_sync(current_player.clone(), turn_count);
                Ok(Applied::Turn {
                    current_player,
                    turn_count,
                })
            }
        }
    }

    fn apply_turn_sync(&mut self, current: Player, turn_count: u32) {
        let current = self
            .players
            .iter()
            .find(|p| p.id == current.id)
            .cloned()
            .unwrap_or(current);
        self.current_player = Some(current);
        self.turn_count = turn_count;
        self.clear_turn_state();
        self.evaluate_outcome();
    }

    /// Remaining ship counts in roster order.
    pub fn standings(&self) -> Vec<Standing> {
        self.players
            .iter()
            .map(|p| Standing {
                player: p.clone(),
                remaining_ships: self.board.remaining_ships(&p.id),
            })
            .collect()
    }

    /// Decide whether the game is over. Moves to [`GamePhase::GameOver`] and
    /// returns the result when it is.
    pub fn evaluate_outcome(&mut self) -> Option<GameResult> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        if self.players.is_empty() || self.board.ships().is_empty() {
            return None;
        }
        if self
            .players
            .iter()
            .any(|p| self.board.ships_of(&p.id).next().is_none())
        {
            return None;
        }
        if self.turn_count < self.config.min_turns_before_result {
            return None;
        }

        let standings = self.standings();
        let result = match self.max_turns {
            Some(cap) if cap > 0 && self.turn_count >= cap => {
                let best = standings
                    .iter()
                    .map(|s| s.remaining_ships)
                    .max()
                    .unwrap_or(0);
                let mut winners: Vec<Player> = standings
                    .iter()
                    .filter(|s| s.remaining_ships == best)
                    .map(|s| s.player.clone())
                    .collect();
                if winners.len() == 1 {
                    Some(GameResult::MaxTurns {
                        winner: winners.remove(0),
                        standings,
                    })
                } else {
                    Some(GameResult::MaxTurnsDraw { winners, standings })
                }
            }
            _ => {
                let active: Vec<&Standing> =
                    standings.iter().filter(|s| s.remaining_ships > 0).collect();
                match active.as_slice() {
                    [survivor] if self.players.len() > 1 => Some(GameResult::LastSurvivor {
                        winner: survivor.player.clone(),
                        eliminated: self
                            .players
                            .iter()
                            .filter(|p| p.id != survivor.player.id)
                            .cloned()
                            .collect(),
                    }),
                    [] if self.players.len() > 1 => Some(GameResult::AllEliminated {}),
                    _ => None,
                }
            }
        };

        if let Some(result) = &result {
            info!(turn = self.turn_count, ?result, "game over");
            self.phase = GamePhase::GameOver;
            self.result = Some(result.clone());
        }
        result
    }

    /// `true` when `coord` can still be attacked.
    pub fn is_attackable(&self, coord: Coord) -> bool {
        self.board.state_at(coord).is_some_and(CellState::is_open)
    }

    /// Return to the lobby, clearing every piece of game state.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Lobby;
        self.players.clear();
        self.board = Board::new(0);
        self.current_player = None;
        self.turn_count = 0;
        self.max_turns = None;
        self.history.clear();
        self.result = None;
        self.clear_turn_state();
    }
}
