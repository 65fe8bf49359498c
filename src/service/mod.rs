//! # Service Layer
//!
//! The TCP server: accept loop, graceful shutdown, and the periodic tasks
//! that run against every live session.

pub mod server;

pub use server::Server;
