//! # Session Registry
//!
//! Tracks every live session and its rewriting state.
//!
//! ## Features
//! - **Thread-safe**: shared map behind a mutex, handles are cheap clones
//! - **Capacity-bounded**: configurable session cap, rejects at the limit
//! - **Send paths**: pipelined and silent delivery per session

use crate::error::{constants, ProtocolError, Result};
use crate::game::block::{BlockPos, BlockState};
use crate::game::shape::ShapeKind;
use crate::protocol::interceptors::BorderOverlay;
use crate::protocol::message::Packet;
use crate::protocol::phase::Direction;
use crate::protocol::pipeline::{Injection, InterceptorPipeline, PipelineOutcome, SessionView};
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Handle to one live session.
///
/// Cloning is cheap; all clones share the same view state and outbound
/// queue. The connection task owns the socket; everyone else talks to the
/// session through this handle.
#[derive(Clone)]
pub struct Session {
    id: u64,
    peer: String,
    view: Arc<Mutex<SessionView>>,
    outbound: mpsc::Sender<Bytes>,
    pipeline: Arc<InterceptorPipeline>,
}

impl Session {
    pub fn new(
        id: u64,
        peer: String,
        view: SessionView,
        outbound: mpsc::Sender<Bytes>,
        pipeline: Arc<InterceptorPipeline>,
    ) -> Self {
        Self {
            id,
            peer,
            view: Arc::new(Mutex::new(view)),
            outbound,
            pipeline,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Run a closure against the session's view state under its lock.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut SessionView) -> R) -> Result<R> {
        let mut view = self
            .view
            .lock()
            .map_err(|_| ProtocolError::Custom(constants::ERR_SESSION_VIEW_POISONED.to_string()))?;
        Ok(f(&mut view))
    }

    /// Queue a packet for delivery without running the pipeline.
    pub fn send_silent(&self, packet: &Packet) -> Result<()> {
        let frame = packet.encode().to_frame();
        self.outbound
            .try_send(frame)
            .map_err(|_| ProtocolError::Custom(constants::ERR_SESSION_QUEUE_CLOSED.to_string()))
    }

    /// Queue a packet for delivery, running it through the clientbound
    /// pipeline first. Packets the handlers inject are delivered too; a
    /// non-silent injection takes one more pass through the pipeline.
    pub fn send(&self, packet: Packet) -> Result<()> {
        let mut queue: VecDeque<Injection> = VecDeque::new();
        queue.push_back(Injection {
            packet,
            silent: false,
        });
        while let Some(next) = queue.pop_front() {
            if next.silent {
                self.send_silent(&next.packet)?;
                continue;
            }
            let outcome = self.with_view(|view| {
                self.pipeline
                    .process(view, Direction::Clientbound, next.packet)
            })?;
            if let Some(forwarded) = outcome.packet {
                self.send_silent(&forwarded)?;
            }
            queue.extend(outcome.injections);
        }
        Ok(())
    }

    /// Run a serverbound packet through the pipeline under the view lock.
    pub fn process_serverbound(&self, packet: Packet) -> Result<PipelineOutcome> {
        self.with_view(|view| self.pipeline.process(view, Direction::Serverbound, packet))
    }

    /// Deliver a serverbound pipeline outcome's injections to the client.
    pub fn deliver_injections(&self, injections: Vec<Injection>) -> Result<()> {
        for injection in injections {
            if injection.silent {
                self.send_silent(&injection.packet)?;
            } else {
                self.send(injection.packet)?;
            }
        }
        Ok(())
    }

    /// Show a shape blueprint to this client as fake blocks.
    pub fn show_shape(
        &self,
        kind: ShapeKind,
        center: BlockPos,
        size: i32,
        state: BlockState,
    ) -> Result<()> {
        self.show_blocks(kind.generate(center, size, state))
    }

    /// Show arbitrary fake blocks to this client, recording them in the
    /// overlay so unloads and [`Session::clear_overlay`] can undo them.
    /// The authoritative world is not consulted, so restores present air.
    pub fn show_blocks(&self, blocks: HashMap<BlockPos, BlockState>) -> Result<()> {
        self.with_view(|view| {
            view.overlay
                .apply(blocks.keys().map(|&pos| (pos, BlockState::AIR)));
        })?;
        for packet in Packet::block_batches(&blocks) {
            self.send_silent(&packet)?;
        }
        Ok(())
    }

    /// Turn the fake border ring on around `center`, showing it in every
    /// chunk this client already has; the border handler extends the ring
    /// into chunks that stream in afterwards.
    pub fn enable_border(&self, border: &BorderOverlay, center: BlockPos) -> Result<()> {
        let batches = self.with_view(|view| border.enable(view, center))?;
        for packet in batches {
            self.send_silent(&packet)?;
        }
        Ok(())
    }

    /// Turn the border ring off, re-sending the snapshotted states.
    pub fn disable_border(&self, border: &BorderOverlay) -> Result<()> {
        let batches = self.with_view(|view| border.disable(view))?;
        for packet in batches {
            self.send_silent(&packet)?;
        }
        Ok(())
    }

    /// Tear down every fake block this client sees, including the border
    /// ring, by re-sending the snapshotted states.
    pub fn clear_overlay(&self) -> Result<()> {
        let restored = self.with_view(|view| view.overlay.restore_all())?;
        for packet in Packet::block_batches(&restored) {
            self.send_silent(&packet)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Thread-safe registry of live sessions
///
/// Caps concurrent sessions and hands out handle snapshots for the periodic
/// tasks that touch every session.
#[derive(Clone)]
pub struct SessionRegistry {
    max_sessions: usize,
    inner: Arc<Mutex<HashMap<u64, Session>>>,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a session, rejecting it when the cap is reached.
    ///
    /// # Errors
    /// Returns `ProtocolError::SessionLimit` at capacity.
    pub fn register(&self, session: Session) -> Result<()> {
        let mut sessions = self
            .inner
            .lock()
            .map_err(|_| ProtocolError::Custom("Registry lock poisoned".to_string()))?;
        if sessions.len() >= self.max_sessions {
            global_metrics().session_rejected();
            return Err(ProtocolError::SessionLimit);
        }
        trace!(session_id = session.id(), peer = session.peer(), "session registered");
        sessions.insert(session.id(), session);
        global_metrics().session_opened();
        Ok(())
    }

    /// Remove a session, returning its handle if it was present.
    pub fn remove(&self, id: u64) -> Option<Session> {
        let mut sessions = self.inner.lock().ok()?;
        let removed = sessions.remove(&id);
        if removed.is_some() {
            global_metrics().session_closed();
            debug!(session_id = id, "session removed");
        }
        removed
    }

    pub fn get(&self, id: u64) -> Option<Session> {
        self.inner.lock().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Snapshot of every live session handle
    pub fn sessions(&self) -> Vec<Session> {
        self.inner
            .lock()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }
}
