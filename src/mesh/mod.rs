//! Peer mesh: one direct channel per room member.
//!
//! The mesh turns roster changes and relayed setup payloads into connector
//! calls, keeps per-peer link state, and fans peer messages in and out. All
//! setup traffic leaves through the relay sender; game traffic never does.

pub mod connector;
pub mod in_memory;
pub mod tcp;

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::common::MeshError;
use crate::player::{Player, PlayerId};
use crate::protocol::{ClientMessage, PeerMessage, SignalKind};
use crate::transport::PeerChannel;
pub use connector::{Connector, ConnectorEvent};
pub use in_memory::{InMemoryConnector, InMemoryNetwork};
pub use tcp::TcpConnector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Negotiating,
    Open,
    Closed,
}

/// Aggregate view over every known peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshState {
    /// No channel is open.
    Disconnected,
    /// Some channels are open, others are not.
    Connecting,
    /// Every known peer has an open channel.
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    Opened { peer: PlayerId },
    Message { from: PlayerId, message: PeerMessage },
    Closed { peer: PlayerId },
    Failed { peer: PlayerId, error: MeshError },
}

enum LinkEvent {
    Message {
        peer: PlayerId,
        generation: u64,
        message: PeerMessage,
    },
    Closed {
        peer: PlayerId,
        generation: u64,
    },
}

struct Link {
    state: LinkState,
    initiator: bool,
    generation: u64,
    tx: Option<UnboundedSender<PeerMessage>>,
    reader: Option<JoinHandle<()>>,
}

impl Link {
    fn negotiating(initiator: bool, generation: u64) -> Self {
        Self {
            state: LinkState::Negotiating,
            initiator,
            generation,
            tx: None,
            reader: None,
        }
    }

    fn teardown(&mut self) {
        self.state = LinkState::Closed;
        self.tx = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

pub struct PeerMesh {
    local_id: PlayerId,
    is_host: bool,
    connector: Box<dyn Connector>,
    connector_rx: UnboundedReceiver<ConnectorEvent>,
    signals: UnboundedSender<ClientMessage>,
    links: HashMap<PlayerId, Link>,
    next_generation: u64,
    link_tx: UnboundedSender<LinkEvent>,
    link_rx: UnboundedReceiver<LinkEvent>,
}

impl PeerMesh {
    /// `signals` is the relay sender used for offers, answers and candidates.
    pub fn new(
        local_id: impl Into<PlayerId>,
        connector: Box<dyn Connector>,
        connector_rx: UnboundedReceiver<ConnectorEvent>,
        signals: UnboundedSender<ClientMessage>,
    ) -> Self {
        let (link_tx, link_rx) = unbounded_channel();
        Self {
            local_id: local_id.into(),
            is_host: false,
            connector,
            connector_rx,
            signals,
            links: HashMap::new(),
            next_generation: 0,
            link_tx,
            link_rx,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn set_host(&mut self, is_host: bool) {
        self.is_host = is_host;
    }

    pub fn link_state(&self, peer: &str) -> Option<LinkState> {
        self.links.get(peer).map(|l| l.state)
    }

    /// Peers with an open channel.
    pub fn open_peers(&self) -> Vec<PlayerId> {
        let mut peers: Vec<PlayerId> = self
            .links
            .iter()
            .filter(|(_, l)| l.state == LinkState::Open)
            .map(|(p, _)| p.clone())
            .collect();
        peers.sort();
        peers
    }

    pub fn state(&self) -> MeshState {
        let open = self
            .links
            .values()
            .filter(|l| l.state == LinkState::Open)
            .count();
        if open == 0 {
            MeshState::Disconnected
        } else if open == self.links.len() {
            MeshState::Connected
        } else {
            MeshState::Connecting
        }
    }

    fn signal(&self, kind: SignalKind, peer: &str, data: Value) {
        if self
            .signals
            .send(ClientMessage::signal(kind, peer, data))
            .is_err()
        {
            warn!(peer, ?kind, "relay connection closed, setup payload dropped");
        }
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Apply our own room entry. A member joining an existing room initiates
    /// toward every other non-host member; the host initiates toward us.
    pub async fn on_room_entered(&mut self, players: &[Player]) {
        self.is_host = players
            .iter()
            .any(|p| p.id == self.local_id && p.is_host);
        if self.is_host {
            return;
        }
        for p in players {
            if p.id == self.local_id || p.is_host {
                continue;
            }
            if let Err(e) = self.connect_to(&p.id).await {
                warn!(peer = %p.id, error = %e, "could not start negotiation");
            }
        }
    }

    /// A member joined. Only the host initiates toward newcomers.
    pub async fn on_player_joined(&mut self, player: &Player) {
        if !self.is_host || player.id == self.local_id {
            return;
        }
        if let Err(e) = self.connect_to(&player.id).await {
            warn!(peer = %player.id, error = %e, "could not start negotiation");
        }
    }

    /// Start negotiating with `peer` as the initiator. A peer that already
    /// has a negotiating or open link is left alone.
    pub async fn connect_to(&mut self, peer: &str) -> Result<(), MeshError> {
        if peer == self.local_id {
            return Ok(());
        }
        if matches!(
            self.link_state(peer),
            Some(LinkState::Negotiating | LinkState::Open)
        ) {
            return Ok(());
        }
        let generation = self.generation();
        self.links
            .insert(peer.to_string(), Link::negotiating(true, generation));
        match self.connector.offer(peer).await {
            Ok(offer) => {
                debug!(peer, "sending offer");
                self.signal(SignalKind::Offer, peer, offer);
                Ok(())
            }
            Err(e) => {
                if let Some(link) = self.links.get_mut(peer) {
                    link.teardown();
                }
                Err(e)
            }
        }
    }

    /// Handle a relayed offer from `from`.
    pub async fn on_offer(&mut self, from: &str, data: Value) -> Result<(), MeshError> {
        if let Some(link) = self.links.get(from) {
            if link.state == LinkState::Negotiating && link.initiator {
                if self.local_id.as_str() < from {
                    debug!(peer = from, "offer glare, keeping our offer");
                    return Ok(());
                }
                debug!(peer = from, "offer glare, yielding to the peer's offer");
                self.connector.close(from);
            } else if link.state == LinkState::Open {
                info!(peer = from, "peer renegotiating, replacing open link");
            }
        }
        let generation = self.generation();
        self.links
            .insert(from.to_string(), Link::negotiating(false, generation));
        match self.connector.answer(from, data).await {
            Ok(answer) => {
                self.signal(SignalKind::Answer, from, answer);
                Ok(())
            }
            Err(e) => {
                if let Some(link) = self.links.get_mut(from) {
                    link.teardown();
                }
                warn!(peer = from, error = %e, "peer negotiation failed");
                Err(e)
            }
        }
    }

    pub async fn on_answer(&mut self, from: &str, data: Value) -> Result<(), MeshError> {
        let result = self.connector.accept(from, data).await;
        if let Err(e) = &result {
            warn!(peer = from, error = %e, "could not apply answer");
        }
        result
    }

    pub async fn on_candidate(&mut self, from: &str, data: Value) -> Result<(), MeshError> {
        let result = self.connector.candidate(from, data).await;
        if let Err(e) = &result {
            warn!(peer = from, error = %e, "could not apply candidate");
        }
        result
    }

    /// Tear down everything we hold for a departed member.
    pub fn on_player_left(&mut self, peer: &str) {
        self.connector.close(peer);
        if self.links.remove(peer).is_some() {
            info!(peer, "peer link removed");
        }
    }

    /// Apply an event produced by the connector.
    fn on_connector_event(&mut self, event: ConnectorEvent) -> Option<MeshEvent> {
        match event {
            ConnectorEvent::LocalCandidate { peer, candidate } => {
                if self.links.contains_key(&peer) {
                    self.signal(SignalKind::IceCandidate, &peer, candidate);
                }
                None
            }
            ConnectorEvent::ChannelOpen { peer, channel } => {
                let Some(link) = self.links.get_mut(&peer) else {
                    debug!(peer = %peer, "channel opened for a peer no longer tracked");
                    return None;
                };
                let (tx, mut rx) = channel.into_parts();
                let generation = link.generation;
                let events = self.link_tx.clone();
                let reader_peer = peer.clone();
                let reader = tokio::spawn(async move {
                    while let Some(message) = rx.recv().await {
                        let event = LinkEvent::Message {
                            peer: reader_peer.clone(),
                            generation,
                            message,
                        };
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    let _ = events.send(LinkEvent::Closed {
                        peer: reader_peer,
                        generation,
                    });
                });
                if let Some(old) = link.reader.replace(reader) {
                    old.abort();
                }
                link.tx = Some(tx);
                link.state = LinkState::Open;
                info!(peer = %peer, "peer channel open");
                Some(MeshEvent::Opened { peer })
            }
            ConnectorEvent::Failed { peer, error } => {
                warn!(peer = %peer, error = %error, "peer negotiation failed");
                if let Some(link) = self.links.get_mut(&peer) {
                    if link.state != LinkState::Open {
                        link.teardown();
                    }
                }
                Some(MeshEvent::Failed { peer, error })
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) -> Option<MeshEvent> {
        match event {
            LinkEvent::Message {
                peer,
                generation,
                message,
            } => {
                let current = self
                    .links
                    .get(&peer)
                    .is_some_and(|l| l.generation == generation);
                if !current {
                    return None;
                }
                Some(MeshEvent::Message {
                    from: peer,
                    message,
                })
            }
            LinkEvent::Closed { peer, generation } => {
                let link = self.links.get_mut(&peer)?;
                if link.generation != generation {
                    return None;
                }
                link.teardown();
                self.connector.close(&peer);
                info!(peer = %peer, "peer channel closed");
                Some(MeshEvent::Closed { peer })
            }
        }
    }

    /// Wait for the next mesh event. Cancel safe.
    pub async fn next_event(&mut self) -> Option<MeshEvent> {
        loop {
            tokio::select! {
                Some(event) = self.connector_rx.recv() => {
                    if let Some(out) = self.on_connector_event(event) {
                        return Some(out);
                    }
                }
                Some(event) = self.link_rx.recv() => {
                    if let Some(out) = self.on_link_event(event) {
                        return Some(out);
                    }
                }
                else => return None,
            }
        }
    }

    /// Send `message` on every open channel. Returns how many peers it went to.
    pub fn broadcast(&self, message: &PeerMessage) -> usize {
        self.links
            .iter()
            .filter(|(_, l)| l.state == LinkState::Open)
            .filter(|(peer, l)| {
                let sent = l
                    .tx
                    .as_ref()
                    .is_some_and(|tx| tx.send(message.clone()).is_ok());
                if !sent {
                    debug!(peer = %peer, "dropping message for closed channel");
                }
                sent
            })
            .count()
    }

    /// Send `message` to one peer. Returns `false` if its channel is not open.
    pub fn unicast(&self, peer: &str, message: &PeerMessage) -> bool {
        match self.links.get(peer) {
            Some(link) if link.state == LinkState::Open => link
                .tx
                .as_ref()
                .is_some_and(|tx| tx.send(message.clone()).is_ok()),
            _ => {
                debug!(peer, "dropping message for a peer without an open channel");
                false
            }
        }
    }

    /// Close every link and abandon every negotiation.
    pub fn shutdown(&mut self) {
        let peers: Vec<PlayerId> = self.links.keys().cloned().collect();
        for peer in peers {
            self.connector.close(&peer);
        }
        self.links.clear();
        self.is_host = false;
    }
}
