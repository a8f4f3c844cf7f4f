//! Client session: one player's view of a room and its game.
//!
//! A [`Session`] owns the replicated [`GameEngine`], the [`PeerMesh`] and the
//! relay connection, and runs them in a single cooperative loop. Consumers
//! drive it through a [`SessionHandle`]: they push [`Intent`]s and receive
//! [`SessionEvent`]s. An optional [`Commander`] plays the local player's turns.

use rand::rngs::SmallRng;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::board::Coord;
use crate::common::GameError;
use crate::config::SessionConfig;
use crate::game::{Applied, GameEngine, GamePhase, GameResult, Resolved, TurnPhase};
use crate::mesh::{Connector, ConnectorEvent, MeshEvent, MeshState, PeerMesh};
use crate::player::{Commander, Plan, Player, PlayerId};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::ship::ShipId;
use crate::signaling::SignalingChannel;

/// Requests from the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateRoom { max_turns: Option<u32> },
    JoinRoom { code: String },
    LeaveRoom,
    StartGame,
    ChooseAction(TurnPhase),
    SelectShip(ShipId),
    Attack(Coord),
    Move(Coord),
    /// Return to the lobby of the current room.
    Reset,
    Quit,
}

/// Notifications to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RoomEntered {
        room_code: String,
        players: Vec<Player>,
        is_host: bool,
    },
    RosterChanged {
        players: Vec<Player>,
    },
    MeshChanged(MeshState),
    PeerUnreachable {
        peer: PlayerId,
        reason: String,
    },
    GameStarted {
        players: Vec<Player>,
        board_size: usize,
        first: Player,
    },
    ActionResolved(Action),
    TurnChanged {
        current_player: Player,
        turn_count: u32,
    },
    GameOver(GameResult),
    Rejected {
        intent: String,
        error: GameError,
    },
    RelayError(String),
}

/// Work deferred to a later point of the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Host starts the game.
    StartGame,
    /// End the local player's turn, if turn `n` is still running.
    AdvanceTurn(u32),
    /// Leave the session.
    Quit,
}

/// At most one pending deferred action with its deadline.
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Option<(Instant, Deferred)>,
}

impl Scheduler {
    /// Replace whatever is pending with `action`, due `after` from now.
    pub fn schedule(&mut self, after: Duration, action: Deferred) {
        self.pending = Some((Instant::now() + after, action));
    }

    pub fn cancel(&mut self) -> Option<Deferred> {
        self.pending.take().map(|(_, action)| action)
    }

    pub fn pending(&self) -> Option<Deferred> {
        self.pending.map(|(_, action)| action)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(at, _)| at)
    }

    /// Take the pending action if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<Deferred> {
        match self.pending {
            Some((at, action)) if at <= now => {
                self.pending = None;
                Some(action)
            }
            _ => None,
        }
    }
}

/// Consumer side of a running session.
pub struct SessionHandle {
    intents: UnboundedSender<Intent>,
    events: UnboundedReceiver<SessionEvent>,
}

impl SessionHandle {
    pub fn send(&self, intent: Intent) -> anyhow::Result<()> {
        self.intents
            .send(intent)
            .map_err(|_| anyhow::anyhow!("Session has ended"))
    }

    /// Next event; `None` once the session loop has exited.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn intents(&self) -> UnboundedSender<Intent> {
        self.intents.clone()
    }
}

/// Final state reported when the session loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub player: Player,
    pub room_code: Option<String>,
    pub phase: GamePhase,
    pub result: Option<GameResult>,
    pub turn_count: u32,
    pub actions: usize,
}

pub struct Session {
    me: Player,
    config: SessionConfig,
    engine: GameEngine,
    mesh: PeerMesh,
    relay_tx: UnboundedSender<ClientMessage>,
    relay_rx: UnboundedReceiver<ServerMessage>,
    intents: UnboundedReceiver<Intent>,
    intents_open: bool,
    events: UnboundedSender<SessionEvent>,
    commander: Option<Box<dyn Commander>>,
    rng: SmallRng,
    scheduler: Scheduler,
    room_code: Option<String>,
    roster: Vec<Player>,
    max_turns: Option<u32>,
    mesh_state: MeshState,
    game_over_reported: bool,
}

impl Session {
    pub fn new(
        me: Player,
        signaling: SignalingChannel,
        connector: Box<dyn Connector>,
        connector_rx: UnboundedReceiver<ConnectorEvent>,
        config: SessionConfig,
        rng: SmallRng,
    ) -> (Self, SessionHandle) {
        let (relay_tx, relay_rx) = signaling.into_parts();
        let (intent_tx, intent_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        let mesh = PeerMesh::new(me.id.clone(), connector, connector_rx, relay_tx.clone());
        let engine = GameEngine::new(me.id.clone(), config.game.clone());
        let session = Self {
            me,
            config,
            engine,
            mesh,
            relay_tx,
            relay_rx,
            intents: intent_rx,
            intents_open: true,
            events: event_tx,
            commander: None,
            rng,
            scheduler: Scheduler::default(),
            room_code: None,
            roster: Vec::new(),
            max_turns: None,
            mesh_state: MeshState::Disconnected,
            game_over_reported: false,
        };
        let handle = SessionHandle {
            intents: intent_tx,
            events: event_rx,
        };
        (session, handle)
    }

    /// Let `commander` play the local player's turns.
    pub fn with_commander(mut self, commander: Box<dyn Commander>) -> Self {
        self.commander = Some(commander);
        self
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn mesh(&self) -> &PeerMesh {
        &self.mesh
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn to_relay(&self, msg: ClientMessage) {
        if self.relay_tx.send(msg).is_err() {
            warn!(player = %self.me.id, "relay connection closed, message dropped");
        }
    }

    fn reject(&self, intent: &str, error: GameError) {
        debug!(player = %self.me.id, intent, error = %error, "intent rejected");
        self.emit(SessionEvent::Rejected {
            intent: intent.to_string(),
            error,
        });
    }

    /// Run until the consumer quits or the relay connection is lost.
    pub async fn run(mut self) -> anyhow::Result<SessionSummary> {
        info!(player = %self.me.id, "session started");
        loop {
            let deadline = self.scheduler.deadline();
            let quit = tokio::select! {
                intent = self.intents.recv(), if self.intents_open => match intent {
                    Some(Intent::Quit) => true,
                    Some(intent) => {
                        self.on_intent(intent).await;
                        false
                    }
                    None => {
                        self.intents_open = false;
                        false
                    }
                },
                msg = self.relay_rx.recv() => match msg {
                    Some(msg) => {
                        self.on_server_message(msg).await;
                        false
                    }
                    None => {
                        warn!(player = %self.me.id, "relay connection lost");
                        true
                    }
                },
                Some(event) = self.mesh.next_event() => {
                    self.on_mesh_event(event);
                    false
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline()
                }
            };
            if quit {
                break;
            }
            self.drive_commander();
            self.maybe_auto_start();
            self.report_mesh_state();
        }
        let summary = self.summary();
        self.leave();
        info!(player = %self.me.id, "session ended");
        Ok(summary)
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            player: self.me.clone(),
            room_code: self.room_code.clone(),
            phase: self.engine.phase(),
            result: self.engine.result().cloned(),
            turn_count: self.engine.turn_count(),
            actions: self.engine.history().len(),
        }
    }

    fn leave(&mut self) {
        if self.room_code.take().is_some() {
            self.to_relay(ClientMessage::LeaveRoom {});
        }
        self.scheduler.cancel();
        self.mesh.shutdown();
        self.engine.reset();
        self.roster.clear();
        self.game_over_reported = false;
    }

    async fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::CreateRoom { max_turns } => {
                self.max_turns = max_turns;
                self.to_relay(ClientMessage::CreateRoom {
                    player_id: self.me.id.clone(),
                    player_name: self.me.name.clone(),
                    max_turns,
                });
            }
            Intent::JoinRoom { code } => {
                self.to_relay(ClientMessage::JoinRoom {
                    room_code: code,
                    player_id: self.me.id.clone(),
                    player_name: self.me.name.clone(),
                });
            }
            Intent::LeaveRoom => self.leave(),
            Intent::StartGame => self.request_start(),
            Intent::ChooseAction(phase) => {
                if let Err(e) = self.engine.choose_action(phase) {
                    self.reject("choose_action", e);
                }
            }
            Intent::SelectShip(id) => {
                if let Err(e) = self.engine.select_ship(&id) {
                    self.reject("select_ship", e);
                }
            }
            Intent::Attack(target) => match self.engine.attack(target) {
                Ok(resolved) => self.after_local_action(resolved),
                Err(e) => self.reject("attack", e),
            },
            Intent::Move(to) => match self.engine.move_ship(to) {
                Ok(resolved) => self.after_local_action(resolved),
                Err(e) => self.reject("move", e),
            },
            Intent::Reset => {
                self.scheduler.cancel();
                self.engine.reset();
                self.engine.set_roster(&self.roster);
                self.engine.set_max_turns(self.max_turns);
                self.game_over_reported = false;
            }
            Intent::Quit => {}
        }
    }

    fn request_start(&mut self) {
        let check = if self.engine.phase() != GamePhase::Lobby {
            Err(GameError::AlreadyStarted)
        } else if !self.engine.is_host() {
            Err(GameError::NotHost)
        } else if self.engine.players().len() < crate::config::MIN_GAME_PLAYERS {
            Err(GameError::NotEnoughPlayers {
                required: crate::config::MIN_GAME_PLAYERS,
                found: self.engine.players().len(),
            })
        } else {
            Ok(())
        };
        match check {
            Ok(()) => {
                debug!(grace = ?self.config.peer_ready_grace, "game start scheduled");
                self.scheduler
                    .schedule(self.config.peer_ready_grace, Deferred::StartGame);
            }
            Err(e) => self.reject("start_game", e),
        }
    }

    fn maybe_auto_start(&mut self) {
        let Some(wanted) = self.config.auto_start_players else {
            return;
        };
        if self.engine.phase() != GamePhase::Lobby
            || !self.engine.is_host()
            || self.scheduler.pending().is_some()
            || self.roster.len() < wanted
            || self.mesh.open_peers().len() + 1 < wanted
        {
            return;
        }
        info!(players = self.roster.len(), "room full enough, starting");
        self.request_start();
    }

    fn after_local_action(&mut self, resolved: Resolved) {
        let Resolved {
            action,
            sync,
            result,
        } = resolved;
        let peers = self.mesh.broadcast(&sync);
        debug!(peers, "action broadcast");
        self.emit(SessionEvent::ActionResolved(action));
        if result.is_some() {
            self.check_game_over();
        } else {
            self.scheduler.schedule(
                self.config.game.turn_advance_delay,
                Deferred::AdvanceTurn(self.engine.turn_count()),
            );
        }
    }

    fn check_game_over(&mut self) {
        if self.game_over_reported {
            return;
        }
        let Some(result) = self.engine.result().cloned() else {
            return;
        };
        self.game_over_reported = true;
        self.scheduler.cancel();
        if self.config.exit_on_game_over {
            self.scheduler
                .schedule(self.config.peer_ready_grace, Deferred::Quit);
        }
        self.emit(SessionEvent::GameOver(result));
    }

    /// Returns `true` when the session should end.
    fn on_deadline(&mut self) -> bool {
        let Some(action) = self.scheduler.take_due(Instant::now()) else {
            return false;
        };
        match action {
            Deferred::StartGame => self.start_game(),
            Deferred::AdvanceTurn(turn) => self.advance_turn(turn),
            Deferred::Quit => return true,
        }
        false
    }

    fn start_game(&mut self) {
        match self.engine.start_game(&mut self.rng) {
            Ok(snapshot) => {
                let peers = self.mesh.broadcast(&snapshot);
                info!(peers, "game snapshot broadcast");
                self.game_over_reported = false;
                self.game_started();
            }
            Err(e) => self.reject("start_game", e),
        }
    }

    fn game_started(&mut self) {
        if let Some(commander) = self.commander.as_mut() {
            commander.game_started(&self.engine);
        }
        if let Some(first) = self.engine.current_player().cloned() {
            self.emit(SessionEvent::GameStarted {
                players: self.engine.players().to_vec(),
                board_size: self.engine.board().size(),
                first,
            });
        }
    }

    fn advance_turn(&mut self, turn: u32) {
        if self.engine.phase() != GamePhase::Playing
            || self.engine.turn_count() != turn
            || !self.engine.is_local_turn()
        {
            debug!(turn, "stale turn advance dropped");
            return;
        }
        self.end_turn();
    }

    fn end_turn(&mut self) {
        match self.engine.end_turn() {
            Ok(sync) => {
                self.mesh.broadcast(&sync);
                self.turn_changed();
                self.check_game_over();
            }
            Err(e) => self.reject("end_turn", e),
        }
    }

    fn turn_changed(&self) {
        if let Some(current) = self.engine.current_player() {
            self.emit(SessionEvent::TurnChanged {
                current_player: current.clone(),
                turn_count: self.engine.turn_count(),
            });
        }
    }

    async fn on_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::RoomCreated {
                room_code, players, ..
            } => self.enter_room(room_code, players, true).await,
            ServerMessage::RoomJoined {
                room_code, players, ..
            } => self.enter_room(room_code, players, false).await,
            ServerMessage::PlayerJoined { player, players } => {
                self.roster = players;
                self.engine.set_roster(&self.roster);
                self.mesh.on_player_joined(&player).await;
                self.emit(SessionEvent::RosterChanged {
                    players: self.roster.clone(),
                });
            }
            ServerMessage::PlayerLeft { player_id, players } => {
                let before = (
                    self.engine.current_player().map(|p| p.id.clone()),
                    self.engine.turn_count(),
                );
                self.roster = players;
                self.mesh.on_player_left(&player_id);
                self.mesh
                    .set_host(self.roster.iter().any(|p| p.id == self.me.id && p.is_host));
                self.engine.set_roster(&self.roster);
                self.emit(SessionEvent::RosterChanged {
                    players: self.roster.clone(),
                });
                let after = (
                    self.engine.current_player().map(|p| p.id.clone()),
                    self.engine.turn_count(),
                );
                if self.engine.phase() == GamePhase::Playing && before != after {
                    self.turn_changed();
                }
                self.check_game_over();
            }
            ServerMessage::WebrtcOffer(signal) => {
                let _ = self.mesh.on_offer(&signal.from, signal.data).await;
            }
            ServerMessage::WebrtcAnswer(signal) => {
                let _ = self.mesh.on_answer(&signal.from, signal.data).await;
            }
            ServerMessage::WebrtcIceCandidate(signal) => {
                let _ = self.mesh.on_candidate(&signal.from, signal.data).await;
            }
            ServerMessage::Error { message } => {
                warn!(player = %self.me.id, %message, "relay reported an error");
                self.emit(SessionEvent::RelayError(message));
            }
        }
    }

    async fn enter_room(&mut self, room_code: String, players: Vec<Player>, created: bool) {
        self.scheduler.cancel();
        self.mesh.shutdown();
        self.engine.reset();
        self.game_over_reported = false;
        self.engine.set_roster(&players);
        if created {
            self.engine.set_max_turns(self.max_turns);
        } else {
            self.max_turns = None;
        }
        self.room_code = Some(room_code.clone());
        self.roster = players;
        self.mesh.on_room_entered(&self.roster).await;
        let is_host = self.engine.is_host();
        info!(player = %self.me.id, room = %room_code, is_host, "entered room");
        self.emit(SessionEvent::RoomEntered {
            room_code,
            players: self.roster.clone(),
            is_host,
        });
    }

    fn on_mesh_event(&mut self, event: MeshEvent) {
        match event {
            MeshEvent::Opened { peer } => debug!(peer = %peer, "peer ready"),
            MeshEvent::Closed { peer } => debug!(peer = %peer, "peer gone"),
            MeshEvent::Failed { peer, error } => self.emit(SessionEvent::PeerUnreachable {
                peer,
                reason: error.to_string(),
            }),
            MeshEvent::Message { from, message } => {
                match self.engine.apply_peer_message(&from, message) {
                    Ok(Applied::Started) => {
                        self.scheduler.cancel();
                        self.game_over_reported = false;
                        self.game_started();
                    }
                    Ok(Applied::Action(action)) => {
                        self.emit(SessionEvent::ActionResolved(action));
                        self.check_game_over();
                    }
                    Ok(Applied::Turn { .. }) => {
                        self.scheduler.cancel();
                        self.turn_changed();
                        self.check_game_over();
                    }
                    Ok(Applied::Ignored) => {}
                    Err(e) => warn!(from = %from, error = %e, "ignoring peer message"),
                }
            }
        }
    }

    fn report_mesh_state(&mut self) {
        let state = self.mesh.state();
        if state != self.mesh_state {
            self.mesh_state = state;
            self.emit(SessionEvent::MeshChanged(state));
        }
    }

    /// Let the commander take the local player's turn. A commander with no
    /// usable plan passes the turn.
    fn drive_commander(&mut self) {
        if self.commander.is_none()
            || !self.engine.is_local_turn()
            || self.engine.action_taken()
            || self.scheduler.pending().is_some()
        {
            return;
        }
        let plan = match self.commander.as_mut() {
            Some(commander) => commander.plan(&mut self.rng, &self.engine),
            None => return,
        };
        let outcome = match plan {
            Some(Plan::Attack { ship, target }) => self
                .engine
                .choose_action(TurnPhase::Attack)
                .and_then(|_| self.engine.select_ship(&ship))
                .and_then(|_| self.engine.attack(target)),
            Some(Plan::Move { ship, to }) => self
                .engine
                .choose_action(TurnPhase::Movement)
                .and_then(|_| self.engine.select_ship(&ship))
                .and_then(|_| self.engine.move_ship(to)),
            None => {
                debug!(player = %self.me.id, "commander has no plan, passing");
                self.end_turn();
                return;
            }
        };
        match outcome {
            Ok(resolved) => self.after_local_action(resolved),
            Err(e) => {
                warn!(player = %self.me.id, error = %e, "commander plan rejected, passing");
                self.end_turn();
            }
        }
    }
}
