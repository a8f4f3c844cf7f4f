use serde_json::Value;

use crate::common::MeshError;
use crate::player::PlayerId;
use crate::transport::PeerChannel;

/// Progress reported by a connector outside of its method calls.
pub enum ConnectorEvent {
    /// Network path for `peer`, to be relayed as an ICE candidate.
    LocalCandidate { peer: PlayerId, candidate: Value },
    ChannelOpen { peer: PlayerId, channel: PeerChannel },
    Failed { peer: PlayerId, error: MeshError },
}

impl std::fmt::Debug for ConnectorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorEvent::LocalCandidate { peer, candidate } => f
                .debug_struct("LocalCandidate")
                .field("peer", peer)
                .field("candidate", candidate)
                .finish(),
            ConnectorEvent::ChannelOpen { peer, .. } => {
                f.debug_struct("ChannelOpen").field("peer", peer).finish()
            }
            ConnectorEvent::Failed { peer, error } => f
                .debug_struct("Failed")
                .field("peer", peer)
                .field("error", error)
                .finish(),
        }
    }
}

/// Backend that turns offer/answer/candidate payloads into open channels.
///
/// Payloads are opaque JSON values carried by the relay. An implementation
/// reports candidates it discovers, opened channels and asynchronous failures
/// through the event queue it was created with.
#[async_trait::async_trait]
pub trait Connector: Send {
    /// Begin negotiating with `peer` as initiator and return the offer.
    async fn offer(&mut self, peer: &str) -> Result<Value, MeshError>;

    /// Respond to an offer from `peer` and return the answer.
    async fn answer(&mut self, peer: &str, offer: Value) -> Result<Value, MeshError>;

    /// Apply the answer `peer` returned for our offer.
    async fn accept(&mut self, peer: &str, answer: Value) -> Result<(), MeshError>;

    /// Apply a network path candidate sent by `peer`.
    async fn candidate(&mut self, peer: &str, candidate: Value) -> Result<(), MeshError>;

    /// Abandon any negotiation with `peer`.
    fn close(&mut self, peer: &str);
}
