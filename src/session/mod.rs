//! # Session Layer
//!
//! One session per TCP connection: the connection loop that frames, decodes,
//! and pipelines traffic, and the registry that tracks live sessions.
//!
//! ## Components
//! - **Registry**: concurrent map of live sessions with a capacity cap
//! - **Connection**: the per-socket task driving the protocol state machine

pub mod connection;
pub mod registry;

pub use connection::run_session;
pub use registry::{Session, SessionRegistry};
