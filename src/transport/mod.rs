use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::protocol::PeerMessage;

/// Ordered, reliable message channel to one peer.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, msg: PeerMessage) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<PeerMessage>;
}

/// Open data channel to one peer, backed by a pair of queues.
///
/// Whatever carries the bytes (an in-process queue, a TCP stream) runs in
/// background tasks that feed these queues; dropping the channel closes it.
pub struct PeerChannel {
    tx: UnboundedSender<PeerMessage>,
    rx: UnboundedReceiver<PeerMessage>,
}

impl PeerChannel {
    pub fn new(tx: UnboundedSender<PeerMessage>, rx: UnboundedReceiver<PeerMessage>) -> Self {
        Self { tx, rx }
    }

    /// Split into the sending and receiving halves.
    pub fn into_parts(self) -> (UnboundedSender<PeerMessage>, UnboundedReceiver<PeerMessage>) {
        (self.tx, self.rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait::async_trait]
impl Transport for PeerChannel {
    async fn send(&mut self, msg: PeerMessage) -> anyhow::Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow::anyhow!("Channel closed"))
    }

    async fn recv(&mut self) -> anyhow::Result<PeerMessage> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Channel closed"))
    }
}

pub mod in_memory;
pub mod tcp;
