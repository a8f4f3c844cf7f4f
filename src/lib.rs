mod action;
mod ai;
mod board;
mod common;
mod config;
mod game;
mod player;
pub mod protocol;
pub mod relay;
mod ship;
#[cfg(feature = "net")]
mod logging;
#[cfg(feature = "net")]
pub mod mesh;
#[cfg(feature = "net")]
pub mod prelude;
#[cfg(feature = "net")]
pub mod session;
#[cfg(feature = "net")]
pub mod signaling;
#[cfg(feature = "net")]
pub mod transport;

pub use action::*;
pub use ai::*;
pub use board::*;
pub use common::*;
pub use config::*;
pub use game::*;
pub use player::*;
pub use protocol::*;
pub use relay::registry::RoomRegistry;
pub use ship::*;
#[cfg(feature = "net")]
pub use logging::init_logging;
#[cfg(feature = "net")]
pub use mesh::{MeshEvent, MeshState, PeerMesh};
#[cfg(feature = "net")]
pub use relay::{Relay, SharedRelay};
#[cfg(feature = "net")]
pub use session::{Intent, Session, SessionEvent, SessionHandle, SessionSummary};
#[cfg(feature = "net")]
pub use signaling::SignalingChannel;
#[cfg(feature = "net")]
pub use transport::{tcp::TcpTransport, PeerChannel, Transport};
