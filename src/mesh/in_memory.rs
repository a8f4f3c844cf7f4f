use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::connector::{Connector, ConnectorEvent};
use crate::common::MeshError;
use crate::player::PlayerId;
use crate::transport::PeerChannel;

/// Process-local rendezvous shared by every [`InMemoryConnector`] of a test
/// or simulation. The offering side parks the far end of a channel pair
/// under a token; the answering side claims it.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    parked: Arc<Mutex<HashMap<String, PeerChannel>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn park(&self, token: String, channel: PeerChannel) {
        self.parked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, channel);
    }

    fn claim(&self, token: &str) -> Option<PeerChannel> {
        self.parked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
    }

    /// Channels offered but not yet claimed.
    pub fn parked(&self) -> usize {
        self.parked.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub struct InMemoryConnector {
    network: InMemoryNetwork,
    events: UnboundedSender<ConnectorEvent>,
    /// Our end of each offered pair, opened once the answer arrives.
    offered: HashMap<PlayerId, (String, PeerChannel)>,
}

impl InMemoryConnector {
    pub fn new(network: InMemoryNetwork) -> (Self, UnboundedReceiver<ConnectorEvent>) {
        let (events, rx) = unbounded_channel();
        (
            Self {
                network,
                events,
                offered: HashMap::new(),
            },
            rx,
        )
    }

    fn token_of(peer: &str, value: &Value) -> Result<String, MeshError> {
        value
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MeshError::negotiation(peer, "payload carries no token"))
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn offer(&mut self, peer: &str) -> Result<Value, MeshError> {
        self.close(peer);
        let token = Uuid::new_v4().to_string();
        let (ours, theirs) = PeerChannel::pair();
        self.network.park(token.clone(), theirs);
        self.offered.insert(peer.to_string(), (token.clone(), ours));
        Ok(json!({ "token": token }))
    }

    async fn answer(&mut self, peer: &str, offer: Value) -> Result<Value, MeshError> {
        let token = Self::token_of(peer, &offer)?;
        let channel = self
            .network
            .claim(&token)
            .ok_or_else(|| MeshError::negotiation(peer, "offer token is unknown or already used"))?;
        let _ = self.events.send(ConnectorEvent::ChannelOpen {
            peer: peer.to_string(),
            channel,
        });
        Ok(json!({ "token": token }))
    }

    async fn accept(&mut self, peer: &str, answer: Value) -> Result<(), MeshError> {
        let token = Self::token_of(peer, &answer)?;
        match self.offered.remove(peer) {
            Some((expected, channel)) if expected == token => {
                let _ = self.events.send(ConnectorEvent::ChannelOpen {
                    peer: peer.to_string(),
                    channel,
                });
                Ok(())
            }
            Some(entry) => {
                self.offered.insert(peer.to_string(), entry);
                Err(MeshError::negotiation(peer, "answer does not match our offer"))
            }
            None => Err(MeshError::NoPendingNegotiation(peer.to_string())),
        }
    }

    async fn candidate(&mut self, _peer: &str, _candidate: Value) -> Result<(), MeshError> {
        Ok(())
    }

    fn close(&mut self, peer: &str) {
        if let Some((token, _)) = self.offered.remove(peer) {
            self.network.claim(&token);
        }
    }
}
