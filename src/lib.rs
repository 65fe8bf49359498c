//! # packetbag
//!
//! Server-side packet interception and rewriting core for a binary game
//! protocol.
//!
//! The crate speaks a small length-framed protocol over TCP, walks every
//! session through `Handshake -> Login -> Configuration -> Play`, and runs
//! all traffic in both directions through an ordered interceptor pipeline
//! that can rewrite packets, cancel them, or inject synthetic ones. The
//! built-in handlers keep clients in permanent darkness and show each one a
//! private ring of fake border blocks.
//!
//! ## Layers
//! - [`core`]: wire primitives, frame codec, raw packets
//! - [`protocol`]: typed packets, phases, pipeline, dispatcher
//! - [`game`]: chunk/section/block coordinates, light arrays, shapes
//! - [`session`]: per-connection loop and the live-session registry
//! - [`service`]: the TCP server and its periodic tasks
//! - [`config`], [`error`], [`utils`]: the ambient plumbing
//!
//! ## Quick start
//! ```no_run
//! use packetbag::config::NetworkConfig;
//! use packetbag::service::Server;
//!
//! # async fn run() -> packetbag::Result<()> {
//! let config = NetworkConfig::default();
//! let server = Server::new(config)?;
//! server.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod protocol;
pub mod service;
pub mod session;
pub mod utils;

pub use config::NetworkConfig;
pub use error::{ProtocolError, Result};

/// Commonly used types for consumers of the crate
pub mod prelude {
    pub use crate::config::NetworkConfig;
    pub use crate::core::codec::FrameCodec;
    pub use crate::core::packet::RawPacket;
    pub use crate::error::{ProtocolError, Result};
    pub use crate::game::block::{BlockPos, BlockState};
    pub use crate::game::chunk::{ChunkPos, SectionPos};
    pub use crate::game::light::LightData;
    pub use crate::protocol::dispatcher::Dispatcher;
    pub use crate::protocol::message::Packet;
    pub use crate::protocol::phase::{Direction, Phase};
    pub use crate::protocol::pipeline::{Interceptor, InterceptorPipeline, PacketEvent, SessionView};
    pub use crate::service::Server;
    pub use crate::session::{Session, SessionRegistry};
}
