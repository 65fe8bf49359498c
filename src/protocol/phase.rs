//! Protocol phases and packet direction.
//!
//! A session walks `Handshake -> Login -> Configuration -> Play`; which
//! packet an id refers to depends on the current phase and the direction the
//! packet travels in, so both tag every decode.

use serde::{Deserialize, Serialize};

/// Which way a packet travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server
    Serverbound,
    /// Server to client
    Clientbound,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Serverbound => "serverbound",
            Direction::Clientbound => "clientbound",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-session protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Initial hello exchange; nothing about the peer is known yet
    Handshake,
    /// Identity exchange and mode negotiation
    Login,
    /// Client capabilities and settings before the world streams
    Configuration,
    /// Steady state: world and interaction traffic
    Play,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Handshake => "handshake",
            Phase::Login => "login",
            Phase::Configuration => "configuration",
            Phase::Play => "play",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
