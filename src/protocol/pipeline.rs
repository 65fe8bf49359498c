//! Ordered interceptor chain over decoded packets.
//!
//! Every decoded packet flows through the pipeline before it is forwarded.
//! Handlers run in ascending priority order and may rewrite the packet,
//! cancel it, or queue additional clientbound packets. A cancelled event is
//! still shown to the remaining handlers so they can keep their own state
//! consistent; a handler error is logged and skipped, never fatal to the
//! session.

use crate::error::Result;
use crate::game::block::BlockOverlay;
use crate::game::chunk::ChunkPos;
use crate::protocol::message::Packet;
use crate::protocol::phase::Direction;
use crate::utils::metrics::global_metrics;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Mutable per-session view state shared by the interceptors.
///
/// This is everything the rewriting layer learns about one client by
/// watching its traffic: identity, reported settings, last known position,
/// which chunks the server has streamed to it, and the overlay of fake
/// blocks currently shown to it.
#[derive(Debug)]
pub struct SessionView {
    pub session_id: u64,
    pub name: Option<String>,
    /// Client-reported view distance in chunks
    pub view_distance: u8,
    pub position: Option<(f64, f64, f64)>,
    /// Chunks the client currently has loaded, derived from traffic
    pub loaded_chunks: HashSet<ChunkPos>,
    /// Fake blocks shown to this client, with originals snapshotted
    pub overlay: BlockOverlay,
    /// Center of the active border ring, `None` while the border is off
    pub border_center: Option<crate::game::block::BlockPos>,
}

impl SessionView {
    pub fn new(session_id: u64, default_view_distance: u8) -> Self {
        Self {
            session_id,
            name: None,
            view_distance: default_view_distance,
            position: None,
            loaded_chunks: HashSet::new(),
            overlay: BlockOverlay::new(),
            border_center: None,
        }
    }

    /// Chunk containing the last reported position, if any
    pub fn chunk(&self) -> Option<ChunkPos> {
        self.position.map(|(x, _, z)| {
            ChunkPos::containing(crate::game::block::BlockPos::new(
                x.floor() as i32,
                0,
                z.floor() as i32,
            ))
        })
    }
}

/// A packet queued by an interceptor for delivery to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub packet: Packet,
    /// Silent injections bypass the pipeline on the way out
    pub silent: bool,
}

/// A packet travelling through the pipeline.
#[derive(Debug)]
pub struct PacketEvent {
    packet: Packet,
    direction: Direction,
    modified: bool,
    cancelled: bool,
    injections: Vec<Injection>,
}

impl PacketEvent {
    pub fn new(packet: Packet, direction: Direction) -> Self {
        Self {
            packet,
            direction,
            modified: false,
            cancelled: false,
            injections: Vec::new(),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Replace the packet; the rewritten form is what gets forwarded.
    pub fn set_packet(&mut self, packet: Packet) {
        self.packet = packet;
        self.modified = true;
    }

    /// Drop the packet instead of forwarding it. Later handlers still see
    /// the event.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Queue a clientbound packet that will itself run through the pipeline.
    pub fn inject(&mut self, packet: Packet) {
        self.injections.push(Injection {
            packet,
            silent: false,
        });
    }

    /// Queue a clientbound packet that skips the pipeline on delivery.
    pub fn inject_silent(&mut self, packet: Packet) {
        self.injections.push(Injection {
            packet,
            silent: true,
        });
    }
}

/// What the pipeline decided about one packet.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// The packet to forward, or `None` if a handler cancelled it
    pub packet: Option<Packet>,
    /// Packets queued for the client, in arrival order
    pub injections: Vec<Injection>,
}

/// A traffic-rewriting handler.
///
/// Implementations must be cheap to call; they run inline on the session's
/// read path. Default method bodies pass traffic through untouched so a
/// handler only overrides the direction it cares about.
pub trait Interceptor: Send + Sync {
    /// Stable name used in logs
    fn name(&self) -> &'static str;

    /// Handlers run in ascending priority order; ties keep registration
    /// order.
    fn priority(&self) -> i32 {
        0
    }

    fn on_serverbound(&self, state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        let _ = (state, event);
        Ok(())
    }

    fn on_clientbound(&self, state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        let _ = (state, event);
        Ok(())
    }
}

/// Priority-ordered interceptor chain.
pub struct InterceptorPipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Register a handler, keeping the chain sorted by priority. Sorting is
    /// stable, so equal priorities run in registration order.
    pub fn register(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
        self.interceptors.sort_by_key(|i| i.priority());
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run one packet through the chain and report what to do with it.
    pub fn process(
        &self,
        state: &mut SessionView,
        direction: Direction,
        packet: Packet,
    ) -> PipelineOutcome {
        let mut event = PacketEvent::new(packet, direction);
        for interceptor in &self.interceptors {
            let result = match direction {
                Direction::Serverbound => interceptor.on_serverbound(state, &mut event),
                Direction::Clientbound => interceptor.on_clientbound(state, &mut event),
            };
            if let Err(e) = result {
                global_metrics().interceptor_error();
                warn!(
                    session_id = state.session_id,
                    interceptor = interceptor.name(),
                    error = %e,
                    "interceptor failed, continuing chain"
                );
            }
        }

        let metrics = global_metrics();
        if event.modified {
            metrics.packet_rewritten();
        }
        if event.cancelled {
            metrics.packet_cancelled();
        }
        for _ in &event.injections {
            metrics.packet_injected();
        }

        PipelineOutcome {
            packet: if event.cancelled {
                None
            } else {
                Some(event.packet)
            },
            injections: event.injections,
        }
    }
}

impl Default for InterceptorPipeline {
    fn default() -> Self {
        Self::new()
    }
}
