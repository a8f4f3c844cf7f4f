use tokio::sync::mpsc::unbounded_channel;

use crate::transport::PeerChannel;

impl PeerChannel {
    /// Two connected in-process channels: whatever one end sends the other
    /// receives, in order.
    pub fn pair() -> (Self, Self) {
        let (tx1, rx1) = unbounded_channel();
        let (tx2, rx2) = unbounded_channel();
        (PeerChannel::new(tx1, rx2), PeerChannel::new(tx2, rx1))
    }
}
