//! Client side of the relay control channel.
//!
//! [`SignalingChannel`] is a thin handle over a pair of queues. A background
//! task moves frames between the queues and the actual connection, which is
//! either a websocket to a relay server or an in-process attachment
//! (see `Relay::attach`).

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::protocol::{ClientMessage, ServerMessage};

pub struct SignalingChannel {
    tx: UnboundedSender<ClientMessage>,
    rx: UnboundedReceiver<ServerMessage>,
}

impl SignalingChannel {
    pub fn new(tx: UnboundedSender<ClientMessage>, rx: UnboundedReceiver<ServerMessage>) -> Self {
        Self { tx, rx }
    }

    /// Open a websocket to the relay at `url` (e.g. `ws://127.0.0.1:8080/ws`).
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("Relay connection to {} failed: {}", url, e))?;
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = unbounded_channel::<ClientMessage>();
        let (in_tx, in_rx) = unbounded_channel::<ServerMessage>();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to encode relay message");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "ignoring undecodable relay message"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "relay connection error");
                        break;
                    }
                }
            }
        });

        Ok(Self::new(out_tx, in_rx))
    }

    pub fn send(&self, msg: ClientMessage) -> anyhow::Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow::anyhow!("Relay connection closed"))
    }

    /// Next message from the relay; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> UnboundedSender<ClientMessage> {
        self.tx.clone()
    }

    pub fn into_parts(self) -> (UnboundedSender<ClientMessage>, UnboundedReceiver<ServerMessage>) {
        (self.tx, self.rx)
    }
}
