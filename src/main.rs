use std::net::IpAddr;

use armada::mesh::TcpConnector;
use armada::{
    init_logging, AiCommander, Intent, MeshConfig, Player, Relay, RelayConfig, Session,
    SessionConfig, SessionEvent, SignalingChannel, DEFAULT_MAX_TURNS,
};
use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, env = "ARMADA_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Play as an automated commander, hosting a room or joining one.
    Play {
        #[arg(long, env = "ARMADA_RELAY", default_value = "ws://127.0.0.1:8080/ws")]
        relay: String,
        #[arg(long, default_value = "Admiral")]
        name: String,
        /// Room code to join. Without it a new room is created.
        #[arg(long)]
        code: Option<String>,
        /// Start once this many players are in the room (host only).
        #[arg(long, default_value_t = 2)]
        players: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
        max_turns: u32,
        /// Address peers use to reach this player.
        #[arg(long, default_value = "127.0.0.1")]
        advertise: IpAddr,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Relay { bind } => {
            let listener = TcpListener::bind(&bind).await?;
            let relay = Relay::new(RelayConfig::default()).shared();
            armada::relay::server::serve(listener, relay).await?;
        }
        Commands::Play {
            relay,
            name,
            code,
            players,
            max_turns,
            advertise,
            seed,
        } => {
            let rng = match seed {
                Some(s) => SmallRng::seed_from_u64(s),
                None => SmallRng::from_rng(&mut rand::rng()),
            };
            let me = Player::new(Uuid::new_v4().to_string(), name);
            let config = SessionConfig {
                mesh: MeshConfig {
                    bind_ip: advertise,
                    ..MeshConfig::default()
                },
                auto_start_players: Some(players),
                max_turns: Some(max_turns),
                exit_on_game_over: true,
                ..SessionConfig::default()
            };
            let signaling = SignalingChannel::connect(&relay).await?;
            let (connector, connector_rx) = TcpConnector::new(me.id.clone(), config.mesh.clone());
            let max_turns = config.max_turns;
            let (session, mut handle) = Session::new(
                me,
                signaling,
                Box::new(connector),
                connector_rx,
                config,
                rng,
            );
            let session = session.with_commander(Box::new(AiCommander::new()));
            match code {
                Some(code) => handle.send(Intent::JoinRoom { code })?,
                None => handle.send(Intent::CreateRoom { max_turns })?,
            }

            let running = tokio::spawn(session.run());
            while let Some(event) = handle.next_event().await {
                match event {
                    SessionEvent::RoomEntered { room_code, .. } => {
                        println!("Room code: {}", room_code);
                    }
                    SessionEvent::RelayError(message) => {
                        eprintln!("Relay error: {}", message);
                        handle.send(Intent::Quit)?;
                    }
                    SessionEvent::GameOver(result) => {
                        println!("{}", serde_json::to_string(&result)?);
                    }
                    other => info!(?other, "session event"),
                }
            }
            let summary = running.await??;
            info!(turns = summary.turn_count, actions = summary.actions, "done");
        }
    }
    Ok(())
}
