use armada::mesh::{InMemoryConnector, InMemoryNetwork};
use armada::{
    AiCommander, Coord, GameError, GamePhase, Intent, Player, Relay, RelayConfig, Session,
    SessionConfig, SessionEvent, SessionHandle, SessionSummary, SharedRelay, Ship, TurnPhase,
    FLEET,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

struct Client {
    handle: SessionHandle,
    task: JoinHandle<anyhow::Result<SessionSummary>>,
}

fn test_config() -> SessionConfig {
    let mut config = SessionConfig {
        peer_ready_grace: Duration::from_millis(200),
        ..SessionConfig::default()
    };
    config.game.turn_advance_delay = Duration::from_millis(10);
    config
}

fn spawn_client(
    id: &str,
    relay: &SharedRelay,
    network: &InMemoryNetwork,
    config: SessionConfig,
    seed: u64,
    ai: bool,
) -> Client {
    let (connector, connector_rx) = InMemoryConnector::new(network.clone());
    let (session, handle) = Session::new(
        Player::new(id, id.to_uppercase()),
        Relay::attach(relay),
        Box::new(connector),
        connector_rx,
        config,
        SmallRng::seed_from_u64(seed),
    );
    let session = if ai {
        session.with_commander(Box::new(AiCommander::new()))
    } else {
        session
    };
    Client {
        handle,
        task: tokio::spawn(session.run()),
    }
}

async fn wait_for<F>(handle: &mut SessionHandle, mut wanted: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    timeout(Duration::from_secs(20), async {
        loop {
            let event = handle.next_event().await.expect("session ended early");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event did not arrive in time")
}

async fn create_room(client: &mut Client) -> String {
    client
        .handle
        .send(Intent::CreateRoom { max_turns: Some(50) })
        .unwrap();
    match wait_for(&mut client.handle, |e| {
        matches!(e, SessionEvent::RoomEntered { .. })
    })
    .await
    {
        SessionEvent::RoomEntered {
            room_code, is_host, ..
        } => {
            assert!(is_host);
            room_code
        }
        _ => unreachable!(),
    }
}

async fn quit(client: Client) -> SessionSummary {
    client.handle.send(Intent::Quit).unwrap();
    client.task.await.unwrap().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ai_players_finish_with_the_same_result() -> anyhow::Result<()> {
    let relay = Relay::with_rng(RelayConfig::default(), SmallRng::seed_from_u64(11)).shared();
    let network = InMemoryNetwork::new();
    let mut config = test_config();
    config.auto_start_players = Some(3);
    config.game.turn_advance_delay = Duration::from_millis(1);

    let mut clients: Vec<Client> = ["p1", "p2", "p3"]
        .iter()
        .enumerate()
        .map(|(i, id)| spawn_client(id, &relay, &network, config.clone(), i as u64, true))
        .collect();

    let code = create_room(&mut clients[0]).await;
    for client in &clients[1..] {
        client.handle.send(Intent::JoinRoom { code: code.clone() })?;
    }

    let mut results = Vec::new();
    for client in clients.iter_mut() {
        match wait_for(&mut client.handle, |e| matches!(e, SessionEvent::GameOver(_))).await {
            SessionEvent::GameOver(result) => results.push(result),
            _ => unreachable!(),
        }
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]), "{results:?}");

    let mut summaries = Vec::new();
    for client in clients {
        summaries.push(quit(client).await);
    }
    assert!(summaries.iter().all(|s| s.phase == GamePhase::GameOver));
    assert!(summaries.iter().all(|s| s.room_code.as_deref() == Some(code.as_str())));
    let actions = summaries[0].actions;
    assert!(actions > 0);
    assert!(summaries.iter().all(|s| s.actions == actions));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_manual_turn_is_replicated() -> anyhow::Result<()> {
    let relay = Relay::new(RelayConfig::default()).shared();
    let network = InMemoryNetwork::new();
    let mut host = spawn_client("host", &relay, &network, test_config(), 1, false);
    let mut guest = spawn_client("guest", &relay, &network, test_config(), 2, false);

    let code = create_room(&mut host).await;
    guest.handle.send(Intent::JoinRoom { code })?;
    wait_for(&mut host.handle, |e| {
        matches!(e, SessionEvent::RosterChanged { players } if players.len() == 2)
    })
    .await;

    guest.handle.send(Intent::StartGame)?;
    match wait_for(&mut guest.handle, |e| matches!(e, SessionEvent::Rejected { .. })).await {
        SessionEvent::Rejected { intent, error } => {
            assert_eq!(intent, "start_game");
            assert_eq!(error, GameError::NotHost);
        }
        _ => unreachable!(),
    }

    host.handle.send(Intent::StartGame)?;
    for client in [&mut host, &mut guest] {
        match wait_for(&mut client.handle, |e| {
            matches!(e, SessionEvent::GameStarted { .. })
        })
        .await
        {
            SessionEvent::GameStarted {
                players,
                board_size,
                first,
            } => {
                assert_eq!(players.len(), 2);
                assert_eq!(board_size, 5);
                assert_eq!(first.id, "host");
            }
            _ => unreachable!(),
        }
    }

    host.handle.send(Intent::ChooseAction(TurnPhase::Attack))?;
    host.handle
        .send(Intent::SelectShip(Ship::make_id("host", FLEET[0], 0)))?;
    // Placement is random, so walk the board until a cell is in range and
    // free of the host's own ships.
    let mut landed = None;
    'cells: for x in 0..5 {
        for y in 0..5 {
            host.handle.send(Intent::Attack(Coord::new(x, y)))?;
            match wait_for(&mut host.handle, |e| {
                matches!(
                    e,
                    SessionEvent::ActionResolved(_) | SessionEvent::Rejected { .. }
                )
            })
            .await
            {
                SessionEvent::ActionResolved(action) => {
                    landed = Some(action);
                    break 'cells;
                }
                SessionEvent::Rejected { error, .. } => assert!(
                    matches!(
                        error,
                        GameError::OutOfRange(_) | GameError::OwnShipTargeted(_)
                    ),
                    "{error:?}"
                ),
                _ => unreachable!(),
            }
        }
    }
    let landed = landed.expect("some cell is attackable");
    match wait_for(&mut guest.handle, |e| {
        matches!(e, SessionEvent::ActionResolved(_))
    })
    .await
    {
        SessionEvent::ActionResolved(action) => assert_eq!(action, landed),
        _ => unreachable!(),
    }
    assert_eq!(landed.actor(), "host");

    for client in [&mut host, &mut guest] {
        match wait_for(&mut client.handle, |e| {
            matches!(e, SessionEvent::TurnChanged { .. })
        })
        .await
        {
            SessionEvent::TurnChanged {
                current_player,
                turn_count,
            } => {
                assert_eq!(current_player.id, "guest");
                assert_eq!(turn_count, 1);
            }
            _ => unreachable!(),
        }
    }

    host.handle.send(Intent::ChooseAction(TurnPhase::Movement))?;
    match wait_for(&mut host.handle, |e| matches!(e, SessionEvent::Rejected { .. })).await {
        SessionEvent::Rejected { error, .. } => {
            assert_eq!(error, GameError::NotYourTurn("host".into()));
        }
        _ => unreachable!(),
    }

    let guest_summary = quit(guest).await;
    assert_eq!(guest_summary.turn_count, 1);
    assert_eq!(guest_summary.actions, 1);
    quit(host).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_host_leaving_hands_over_the_room() -> anyhow::Result<()> {
    let relay = Relay::new(RelayConfig::default()).shared();
    let network = InMemoryNetwork::new();
    let mut host = spawn_client("host", &relay, &network, test_config(), 1, false);
    let mut guest = spawn_client("guest", &relay, &network, test_config(), 2, false);

    let code = create_room(&mut host).await;
    guest.handle.send(Intent::JoinRoom { code: code.clone() })?;
    match wait_for(&mut guest.handle, |e| {
        matches!(e, SessionEvent::RoomEntered { .. })
    })
    .await
    {
        SessionEvent::RoomEntered {
            room_code,
            players,
            is_host,
        } => {
            assert_eq!(room_code, code);
            assert_eq!(players.len(), 2);
            assert!(!is_host);
        }
        _ => unreachable!(),
    }

    host.handle.send(Intent::LeaveRoom)?;
    match wait_for(&mut guest.handle, |e| {
        matches!(e, SessionEvent::RosterChanged { .. })
    })
    .await
    {
        SessionEvent::RosterChanged { players } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id, "guest");
            assert!(players[0].is_host);
        }
        _ => unreachable!(),
    }

    // The new host can start a game once someone else is in the room.
    guest.handle.send(Intent::StartGame)?;
    match wait_for(&mut guest.handle, |e| matches!(e, SessionEvent::Rejected { .. })).await {
        SessionEvent::Rejected { error, .. } => assert!(matches!(
            error,
            GameError::NotEnoughPlayers { found: 1, .. }
        )),
        _ => unreachable!(),
    }

    let summary = quit(host).await;
    assert_eq!(summary.room_code, None);
    quit(guest).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_joining_a_missing_room_reports_an_error() -> anyhow::Result<()> {
    let relay = Relay::new(RelayConfig::default()).shared();
    let network = InMemoryNetwork::new();
    let mut client = spawn_client("lost", &relay, &network, test_config(), 1, false);

    client.handle.send(Intent::JoinRoom {
        code: "XXXXXX".into(),
    })?;
    match wait_for(&mut client.handle, |e| matches!(e, SessionEvent::RelayError(_))).await {
        SessionEvent::RelayError(message) => assert!(message.contains("not found")),
        _ => unreachable!(),
    }
    quit(client).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_last_opponent_leaving_ends_the_game() -> anyhow::Result<()> {
    let relay = Relay::new(RelayConfig::default()).shared();
    let network = InMemoryNetwork::new();
    let mut host = spawn_client("host", &relay, &network, test_config(), 1, false);
    let mut guest = spawn_client("guest", &relay, &network, test_config(), 2, false);

    let code = create_room(&mut host).await;
    guest.handle.send(Intent::JoinRoom { code })?;
    wait_for(&mut host.handle, |e| {
        matches!(e, SessionEvent::RosterChanged { players } if players.len() == 2)
    })
    .await;
    host.handle.send(Intent::StartGame)?;
    wait_for(&mut guest.handle, |e| {
        matches!(e, SessionEvent::GameStarted { .. })
    })
    .await;

    quit(guest).await;
    match wait_for(&mut host.handle, |e| matches!(e, SessionEvent::GameOver(_))).await {
        SessionEvent::GameOver(result) => {
            let winners = result.winners();
            assert_eq!(winners.len(), 1);
            assert_eq!(winners[0].id, "host");
        }
        _ => unreachable!(),
    }
    quit(host).await;
    Ok(())
}
