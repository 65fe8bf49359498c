//! Opcode-keyed packet dispatch for protocol-driven replies.
//!
//! The session loop uses a dispatcher to answer serverbound packets that have
//! a fixed protocol response (hello, login, keep-alive echoes) without
//! hard-coding the exchange into the loop itself.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Packet;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(&Packet) -> Result<Option<Packet>> + Send + Sync + 'static;

/// Packet dispatcher with zero-copy opcode routing.
///
/// Opcodes are the stable strings from [`Packet::kind`], so lookups on the
/// hot path borrow statics and never allocate. A handler returns the reply
/// to send, or `None` when the packet needs no response.
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Box<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(&self, opcode: &'static str, handler: F) -> Result<()>
    where
        F: Fn(&Packet) -> Result<Option<Packet>> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        handlers.insert(Cow::Borrowed(opcode), Box::new(handler));
        Ok(())
    }

    /// Route a packet to its handler.
    ///
    /// # Errors
    /// Returns `ProtocolError::UnexpectedPacket` when no handler is
    /// registered for the packet's opcode.
    pub fn dispatch(&self, packet: &Packet) -> Result<Option<Packet>> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;

        handlers
            .get(packet.kind())
            .ok_or(ProtocolError::UnexpectedPacket)
            .and_then(|handler| handler(packet))
    }

    /// Whether a handler exists for the given opcode
    pub fn handles(&self, opcode: &str) -> bool {
        self.handlers
            .read()
            .map(|handlers| handlers.contains_key(opcode))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_routes_to_handler() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register("KEEP_ALIVE", |packet| match packet {
                Packet::KeepAlive { id } => Ok(Some(Packet::KeepAlive { id: *id })),
                _ => Ok(None),
            })
            .expect("register");

        let reply = dispatcher
            .dispatch(&Packet::KeepAlive { id: 7 })
            .expect("dispatch");
        assert_eq!(reply, Some(Packet::KeepAlive { id: 7 }));
    }

    #[test]
    fn test_dispatch_without_handler_is_unexpected() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .dispatch(&Packet::KeepAlive { id: 1 })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedPacket));
    }

    #[test]
    fn test_handler_may_return_no_reply() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register("PLAYER_POSITION", |_| Ok(None))
            .expect("register");
        let reply = dispatcher
            .dispatch(&Packet::PlayerPosition {
                x: 0.0,
                y: 64.0,
                z: 0.0,
            })
            .expect("dispatch");
        assert!(reply.is_none());
    }

    #[test]
    fn test_handles_reports_registration() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.handles("HELLO"));
        dispatcher.register("HELLO", |_| Ok(None)).expect("register");
        assert!(dispatcher.handles("HELLO"));
    }
}
