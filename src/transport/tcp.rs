use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::config::MAX_FRAME_SIZE;
use crate::protocol::PeerMessage;
use crate::transport::{PeerChannel, Transport};

/// Default timeout for a single send or handshake read (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn map_write_error(e: std::io::Error) -> anyhow::Error {
    if e.kind() == ErrorKind::BrokenPipe || e.kind() == ErrorKind::ConnectionReset {
        anyhow::anyhow!("Connection closed by peer")
    } else {
        anyhow::anyhow!("Write error: {}", e)
    }
}

fn map_read_error(e: std::io::Error) -> anyhow::Error {
    match e.kind() {
        ErrorKind::UnexpectedEof => anyhow::anyhow!("Connection closed by peer"),
        ErrorKind::ConnectionReset => anyhow::anyhow!("Connection reset by peer"),
        _ => anyhow::anyhow!("Read error: {}", e),
    }
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
    max_frame_size: u32,
) -> anyhow::Result<()> {
    let len = u32::try_from(data.len())
        .ok()
        .filter(|len| *len <= max_frame_size)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Message too large: {} bytes (max: {})",
                data.len(),
                max_frame_size
            )
        })?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(map_write_error)?;
    writer.write_all(data).await.map_err(map_write_error)?;
    writer.flush().await.map_err(map_write_error)?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_size: u32,
) -> anyhow::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(map_read_error)?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_size {
        return Err(anyhow::anyhow!(
            "Message too large: {} bytes (max: {})",
            len,
            max_frame_size
        ));
    }
    if len == 0 {
        return Err(anyhow::anyhow!("Invalid message length: 0"));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await.map_err(map_read_error)?;
    Ok(buf)
}

/// Peer link over a TCP stream carrying length-prefixed JSON frames.
pub struct TcpTransport {
    stream: TcpStream,
    timeout_duration: Duration,
    max_frame_size: u32,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_config(stream, DEFAULT_TIMEOUT, MAX_FRAME_SIZE)
    }

    pub fn with_timeout(stream: TcpStream, timeout_duration: Duration) -> Self {
        Self::with_config(stream, timeout_duration, MAX_FRAME_SIZE)
    }

    pub fn with_config(stream: TcpStream, timeout_duration: Duration, max_frame_size: u32) -> Self {
        // Frames are small and latency matters more than throughput.
        let _ = stream.set_nodelay(true);
        Self {
            stream,
            timeout_duration,
            max_frame_size,
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Send one raw text frame.
    pub async fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        timeout(
            self.timeout_duration,
            write_frame(&mut self.stream, text.as_bytes(), self.max_frame_size),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Send timeout after {:?}", self.timeout_duration))?
    }

    /// Receive one raw text frame.
    pub async fn recv_text(&mut self) -> anyhow::Result<String> {
        let buf = timeout(
            self.timeout_duration,
            read_frame(&mut self.stream, self.max_frame_size),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Receive timeout after {:?}", self.timeout_duration))??;
        String::from_utf8(buf).map_err(|e| anyhow::anyhow!("Invalid UTF-8 frame: {}", e))
    }

    /// Hand the stream to background reader and writer tasks and return the
    /// queue-backed channel they serve. Reads carry no timeout: an idle peer
    /// is normal between turns.
    pub fn into_channel(self) -> PeerChannel {
        let (in_tx, in_rx) = unbounded_channel::<PeerMessage>();
        let (out_tx, mut out_rx) = unbounded_channel::<PeerMessage>();
        let (mut reader, mut writer) = self.stream.into_split();
        let max = self.max_frame_size;
        let send_timeout = self.timeout_duration;

        tokio::spawn(async move {
            loop {
                let buf = match read_frame(&mut reader, max).await {
                    Ok(buf) => buf,
                    Err(e) => {
                        debug!(error = %e, "peer stream closed");
                        break;
                    }
                };
                match serde_json::from_slice::<PeerMessage>(&buf) {
                    Ok(msg) => {
                        if in_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping undecodable peer frame"),
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let data = match serde_json::to_vec(&msg) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "failed to encode peer message");
                        continue;
                    }
                };
                match timeout(send_timeout, write_frame(&mut writer, &data, max)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "peer stream write failed");
                        break;
                    }
                    Err(_) => {
                        warn!("peer stream write timed out after {:?}", send_timeout);
                        break;
                    }
                }
            }
            let _ = writer.shutdown().await;
        });

        PeerChannel::new(out_tx, in_rx)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, msg: PeerMessage) -> anyhow::Result<()> {
        let text = serde_json::to_string(&msg)
            .map_err(|e| anyhow::anyhow!("Serialization error: {}", e))?;
        self.send_text(&text).await
    }

    async fn recv(&mut self) -> anyhow::Result<PeerMessage> {
        let text = self.recv_text().await?;
        serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))
    }
}
