use armada::mesh::{InMemoryConnector, InMemoryNetwork};
use armada::{
    AiCommander, GameResult, Intent, Player, Relay, RelayConfig, Session, SessionConfig,
    SessionEvent,
};
use rand::{rngs::SmallRng, SeedableRng};
use serde_json::json;
use tokio::time::{timeout, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <players> <seed>", args[0]);
        std::process::exit(1);
    }
    let players: usize = args[1].parse()?;
    let seed: u64 = args[2].parse()?;
    if !(2..=armada::MAX_ROOM_PLAYERS).contains(&players) {
        eprintln!("players must be between 2 and {}", armada::MAX_ROOM_PLAYERS);
        std::process::exit(1);
    }

    let relay = Relay::with_rng(RelayConfig::default(), SmallRng::seed_from_u64(seed)).shared();
    let network = InMemoryNetwork::new();
    let mut config = SessionConfig {
        peer_ready_grace: Duration::from_millis(200),
        auto_start_players: Some(players),
        ..SessionConfig::default()
    };
    config.game.turn_advance_delay = Duration::from_millis(1);

    let mut handles = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..players {
        let me = Player::new(format!("p{}", i + 1), format!("Player {}", i + 1));
        let (connector, connector_rx) = InMemoryConnector::new(network.clone());
        let (session, handle) = Session::new(
            me,
            Relay::attach(&relay),
            Box::new(connector),
            connector_rx,
            config.clone(),
            SmallRng::seed_from_u64(seed.wrapping_add(i as u64)),
        );
        let session = session.with_commander(Box::new(AiCommander::new()));
        tasks.push(tokio::spawn(session.run()));
        handles.push(handle);
    }

    handles[0].send(Intent::CreateRoom {
        max_turns: config.max_turns,
    })?;
    let code = loop {
        match handles[0].next_event().await {
            Some(SessionEvent::RoomEntered { room_code, .. }) => break room_code,
            Some(_) => continue,
            None => anyhow::bail!("host session ended before creating a room"),
        }
    };
    for handle in &handles[1..] {
        handle.send(Intent::JoinRoom { code: code.clone() })?;
    }

    let mut results: Vec<Option<GameResult>> = Vec::new();
    for handle in handles.iter_mut() {
        let waited = timeout(Duration::from_secs(60), async {
            while let Some(event) = handle.next_event().await {
                if let SessionEvent::GameOver(result) = event {
                    return Some(result);
                }
            }
            None
        })
        .await;
        results.push(waited.unwrap_or(None));
    }
    for handle in &handles {
        handle.send(Intent::Quit)?;
    }
    let mut summaries = Vec::new();
    for task in tasks {
        summaries.push(task.await??);
    }

    let result = results.first().cloned().flatten();
    let consistent = results.iter().all(|r| *r == result);
    let turns = summaries.iter().map(|s| s.turn_count).max().unwrap_or(0);
    let winners: Vec<String> = result
        .as_ref()
        .map(|r| r.winners().into_iter().map(|p| p.id.clone()).collect())
        .unwrap_or_default();

    let summary = json!({
        "room": code,
        "players": players,
        "result": result,
        "winners": winners,
        "turns": turns,
        "consistent": consistent,
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
