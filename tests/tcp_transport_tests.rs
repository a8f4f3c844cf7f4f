use armada::transport::tcp::{read_frame, write_frame};
use armada::{Coord, PeerMessage, TcpTransport, Transport, MAX_FRAME_SIZE};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};

fn attack(turn: u32) -> PeerMessage {
    PeerMessage::AttackSync {
        coordinates: Coord::new(0, 0),
        attacker: "p1".into(),
        attacking_ship_id: "p1-Carrier-0".into(),
        turn,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tcp_round_trip() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await?;
        let mut transport = TcpTransport::new(socket);
        let msg = transport.recv().await?;
        transport.send(msg).await?;
        anyhow::Ok(())
    });

    let mut client = TcpTransport::connect(addr).await?;
    client.send(attack(3)).await?;
    assert_eq!(client.recv().await?, attack(3));
    server.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_oversized_length_prefix_is_rejected() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        socket.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await?;
        socket.flush().await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        anyhow::Ok(())
    });

    let mut client = TcpTransport::connect(addr).await?;
    let err = client.recv().await.unwrap_err();
    assert!(err.to_string().contains("too large"), "{err}");
    server.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zero_length_frame_is_rejected() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        socket.write_all(&[0, 0, 0, 0]).await?;
        socket.flush().await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        anyhow::Ok(())
    });

    let mut client = TcpTransport::connect(addr).await?;
    let err = client.recv().await.unwrap_err();
    assert!(err.to_string().contains("length: 0"), "{err}");
    server.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_peer_closing_is_reported() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await?;
        drop(socket);
        anyhow::Ok(())
    });

    let mut client = TcpTransport::connect(addr).await?;
    server.await??;
    let err = client.recv().await.unwrap_err();
    assert!(err.to_string().contains("closed") || err.to_string().contains("reset"), "{err}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_receive_times_out() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(socket);
        anyhow::Ok(())
    });

    let stream = tokio::net::TcpStream::connect(addr).await?;
    let mut client = TcpTransport::with_timeout(stream, Duration::from_millis(50));
    let err = client.recv().await.unwrap_err();
    assert!(err.to_string().contains("timeout"), "{err}");
    server.await??;
    Ok(())
}

#[tokio::test]
async fn test_frames_over_any_stream() -> anyhow::Result<()> {
    let (mut a, mut b) = tokio::io::duplex(64);
    write_frame(&mut a, b"hello", MAX_FRAME_SIZE).await?;
    assert_eq!(read_frame(&mut b, MAX_FRAME_SIZE).await?, b"hello");
    assert!(write_frame(&mut a, &[0u8; 16], 8).await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_channel_over_tcp() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await?;
        let mut channel = TcpTransport::new(socket).into_channel();
        for _ in 0..3 {
            let msg = channel.recv().await?;
            channel.send(msg).await?;
        }
        anyhow::Ok(())
    });

    let mut channel = TcpTransport::connect(addr).await?.into_channel();
    for turn in 0..3 {
        channel.send(attack(turn)).await?;
    }
    for turn in 0..3 {
        let msg = timeout(Duration::from_secs(5), channel.recv()).await??;
        assert_eq!(msg, attack(turn));
    }
    server.await??;
    Ok(())
}
