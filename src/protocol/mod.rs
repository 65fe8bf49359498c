//! # Protocol Layer
//!
//! Typed packets, phase tracking, the interception pipeline, and the
//! dispatcher.
//!
//! ## Components
//! - **Phase**: the per-session protocol state machine
//! - **Message**: typed packet definitions and their wire codecs
//! - **Pipeline**: ordered interceptor chain with mutate/cancel/inject
//! - **Interceptors**: the built-in rewriting handlers
//! - **Dispatcher**: opcode-keyed routing for protocol-driven replies

pub mod dispatcher;
pub mod interceptors;
pub mod message;
pub mod phase;
pub mod pipeline;

pub use message::Packet;
pub use phase::{Direction, Phase};
