//! Direct TCP links negotiated through the relay.
//!
//! The initiator listens on an ephemeral port, puts a one-time token in its
//! offer and publishes the listen address as a candidate. The answerer dials
//! that address and proves the token in a hello frame, after which both ends
//! exchange length-prefixed JSON frames.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connector::{Connector, ConnectorEvent};
use crate::common::MeshError;
use crate::config::MeshConfig;
use crate::player::PlayerId;
use crate::transport::tcp::TcpTransport;

#[derive(Debug, Serialize, Deserialize)]
struct Offer {
    token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Candidate {
    address: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    token: String,
    from: PlayerId,
}

enum Pending {
    /// We offered and are listening.
    Offered { task: JoinHandle<()> },
    /// We answered and wait for the initiator's address.
    Answered { token: String },
    /// We are dialing the initiator.
    Dialing { task: JoinHandle<()> },
}

impl Pending {
    fn abort(&self) {
        match self {
            Pending::Offered { task } | Pending::Dialing { task } => task.abort(),
            Pending::Answered { .. } => {}
        }
    }
}

pub struct TcpConnector {
    local_id: PlayerId,
    config: MeshConfig,
    events: UnboundedSender<ConnectorEvent>,
    pending: HashMap<PlayerId, Pending>,
}

impl TcpConnector {
    pub fn new(
        local_id: impl Into<PlayerId>,
        config: MeshConfig,
    ) -> (Self, UnboundedReceiver<ConnectorEvent>) {
        let (events, rx) = unbounded_channel();
        (
            Self {
                local_id: local_id.into(),
                config,
                events,
                pending: HashMap::new(),
            },
            rx,
        )
    }

    fn forget(&mut self, peer: &str) {
        if let Some(p) = self.pending.remove(peer) {
            p.abort();
        }
    }
}

async fn accept_peer(
    listener: TcpListener,
    peer: PlayerId,
    token: String,
    config: MeshConfig,
    events: UnboundedSender<ConnectorEvent>,
) {
    let wait = async {
        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .map_err(|e| MeshError::negotiation(&peer, e.to_string()))?;
            let mut transport = TcpTransport::with_timeout(stream, config.negotiation_timeout);
            let hello = match transport.recv_text().await {
                Ok(text) => serde_json::from_str::<Hello>(&text).ok(),
                Err(e) => {
                    debug!(%addr, error = %e, "dropping connection without hello");
                    continue;
                }
            };
            match hello {
                Some(h) if h.token == token => {
                    debug!(%addr, from = %h.from, "peer proved its token");
                    return Ok::<TcpTransport, MeshError>(transport);
                }
                _ => warn!(%addr, peer = %peer, "rejecting connection with a bad token"),
            }
        }
    };
    let outcome = match timeout(config.negotiation_timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(MeshError::negotiation(&peer, "timed out waiting for the peer to connect")),
    };
    let event = match outcome {
        Ok(transport) => ConnectorEvent::ChannelOpen {
            peer,
            channel: transport.into_channel(),
        },
        Err(error) => ConnectorEvent::Failed { peer, error },
    };
    let _ = events.send(event);
}

async fn dial_peer(
    address: SocketAddr,
    peer: PlayerId,
    hello: Hello,
    config: MeshConfig,
    events: UnboundedSender<ConnectorEvent>,
) {
    let dial = async {
        let mut transport = TcpTransport::connect(address).await?;
        let text = serde_json::to_string(&hello)?;
        transport.send_text(&text).await?;
        anyhow::Ok(transport)
    };
    let event = match timeout(config.negotiation_timeout, dial).await {
        Ok(Ok(transport)) => ConnectorEvent::ChannelOpen {
            peer,
            channel: transport.into_channel(),
        },
        Ok(Err(e)) => ConnectorEvent::Failed {
            error: MeshError::negotiation(&peer, e.to_string()),
            peer,
        },
        Err(_) => ConnectorEvent::Failed {
            error: MeshError::negotiation(&peer, format!("timed out dialing {}", address)),
            peer,
        },
    };
    let _ = events.send(event);
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn offer(&mut self, peer: &str) -> Result<Value, MeshError> {
        self.forget(peer);
        let listener = TcpListener::bind((self.config.bind_ip, 0))
            .await
            .map_err(|e| MeshError::negotiation(peer, e.to_string()))?;
        let address = listener
            .local_addr()
            .map_err(|e| MeshError::negotiation(peer, e.to_string()))?;
        let token = Uuid::new_v4().to_string();
        let task = tokio::spawn(accept_peer(
            listener,
            peer.to_string(),
            token.clone(),
            self.config.clone(),
            self.events.clone(),
        ));
        self.pending
            .insert(peer.to_string(), Pending::Offered { task });
        debug!(peer, %address, "listening for peer");
        let candidate = serde_json::to_value(Candidate { address })
            .map_err(|e| MeshError::negotiation(peer, e.to_string()))?;
        let _ = self.events.send(ConnectorEvent::LocalCandidate {
            peer: peer.to_string(),
            candidate,
        });
        serde_json::to_value(Offer { token }).map_err(|e| MeshError::negotiation(peer, e.to_string()))
    }

    async fn answer(&mut self, peer: &str, offer: Value) -> Result<Value, MeshError> {
        let offer: Offer = serde_json::from_value(offer)
            .map_err(|e| MeshError::negotiation(peer, format!("bad offer: {}", e)))?;
        self.forget(peer);
        self.pending.insert(
            peer.to_string(),
            Pending::Answered { token: offer.token },
        );
        Ok(json!({ "accepted": true }))
    }

    async fn accept(&mut self, peer: &str, _answer: Value) -> Result<(), MeshError> {
        match self.pending.get(peer) {
            Some(Pending::Offered { .. }) => Ok(()),
            _ => Err(MeshError::NoPendingNegotiation(peer.to_string())),
        }
    }

    async fn candidate(&mut self, peer: &str, candidate: Value) -> Result<(), MeshError> {
        let token = match self.pending.get(peer) {
            Some(Pending::Answered { token }) => token.clone(),
            Some(_) => {
                debug!(peer, "ignoring extra candidate");
                return Ok(());
            }
            None => return Err(MeshError::NoPendingNegotiation(peer.to_string())),
        };
        let Candidate { address } = serde_json::from_value(candidate)
            .map_err(|e| MeshError::negotiation(peer, format!("bad candidate: {}", e)))?;
        info!(peer, %address, "dialing peer");
        let task = tokio::spawn(dial_peer(
            address,
            peer.to_string(),
            Hello {
                token,
                from: self.local_id.clone(),
            },
            self.config.clone(),
            self.events.clone(),
        ));
        self.pending
            .insert(peer.to_string(), Pending::Dialing { task });
        Ok(())
    }

    fn close(&mut self, peer: &str) {
        self.forget(peer);
    }
}
