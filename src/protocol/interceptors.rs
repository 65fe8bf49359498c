//! Built-in traffic-rewriting handlers.
//!
//! Five handlers cover the rewriting this core exists for: tracking what the
//! client reports about itself, tracking which chunks the server has streamed
//! to it, erasing sky light, following block changes with darkness updates,
//! and overlaying a ring of fake border blocks around the player.
//!
//! Priorities keep the state-tracking handlers ahead of the rewriting ones so
//! rewrites always see current session state.

use crate::error::Result;
use crate::game::block::{border_columns_in_chunk, BlockPos, BlockState};
use crate::game::chunk::{chunk_sections, ChunkPos};
use crate::game::light::LightData;
use crate::protocol::message::Packet;
use crate::protocol::pipeline::{Interceptor, PacketEvent, SessionView};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// Records client-reported identity and settings into the session view.
///
/// View distances above the server cap are clamped when recorded; the packet
/// itself is forwarded untouched.
pub struct ClientSettingsMonitor {
    max_view_distance: u8,
}

impl ClientSettingsMonitor {
    pub fn new(max_view_distance: u8) -> Self {
        Self { max_view_distance }
    }
}

impl Interceptor for ClientSettingsMonitor {
    fn name(&self) -> &'static str {
        "client_settings_monitor"
    }

    fn priority(&self) -> i32 {
        -20
    }

    fn on_serverbound(&self, state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        match event.packet() {
            Packet::LoginStart { name } => {
                state.name = Some(name.clone());
            }
            Packet::ClientSettings { view_distance, .. } => {
                let clamped = (*view_distance).min(self.max_view_distance);
                if clamped != state.view_distance {
                    debug!(
                        session_id = state.session_id,
                        requested = view_distance,
                        effective = clamped,
                        "view distance updated"
                    );
                }
                state.view_distance = clamped;
            }
            Packet::PlayerPosition { x, y, z } => {
                state.position = Some((*x, *y, *z));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Maintains the per-session loaded-chunk set from the clientbound stream.
///
/// Load state is derived from `ChunkData`/`UnloadChunk` traffic rather than
/// host callbacks, so the set reflects exactly what reached the wire. Unloads
/// also drop any overlay state for the chunk; the client discards the chunk
/// anyway, so no restore batch is needed.
pub struct ChunkTracker;

impl Interceptor for ChunkTracker {
    fn name(&self) -> &'static str {
        "chunk_tracker"
    }

    fn priority(&self) -> i32 {
        -10
    }

    fn on_clientbound(&self, state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        if event.is_cancelled() {
            return Ok(());
        }
        match event.packet() {
            Packet::ChunkData { chunk, .. } => {
                if state.loaded_chunks.insert(*chunk) {
                    trace!(session_id = state.session_id, chunk = %chunk, "chunk loaded");
                }
            }
            Packet::UnloadChunk { chunk } => {
                state.loaded_chunks.remove(chunk);
                state.overlay.restore_chunk(*chunk);
                trace!(session_id = state.session_id, chunk = %chunk, "chunk unloaded");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Zeroes every sky-light section in `ChunkData` and `UpdateLight` payloads.
///
/// Packets whose sky light is already dark pass through without a rewrite.
pub struct SkyLightEraser;

impl Interceptor for SkyLightEraser {
    fn name(&self) -> &'static str {
        "sky_light_eraser"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn on_clientbound(&self, _state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        match event.packet() {
            Packet::UpdateLight { chunk, light } => {
                let mut light = light.clone();
                if light.erase_sky_light() {
                    let chunk = *chunk;
                    event.set_packet(Packet::UpdateLight { chunk, light });
                }
            }
            Packet::ChunkData {
                chunk,
                sections,
                light,
            } => {
                let mut light = light.clone();
                if light.erase_sky_light() {
                    let chunk = *chunk;
                    let sections = sections.clone();
                    event.set_packet(Packet::ChunkData {
                        chunk,
                        sections,
                        light,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Follows forwarded block changes with a silent light update that blacks out
/// the touched sections, so the server's own relight never leaks through.
pub struct DarkLightFollower {
    min_section: i32,
}

impl DarkLightFollower {
    pub fn new(min_section: i32) -> Self {
        Self { min_section }
    }

    fn dark_update(&self, chunk: ChunkPos, sections: BTreeSet<i32>) -> Packet {
        Packet::UpdateLight {
            chunk,
            light: LightData::dark(&sections, self.min_section, true, true),
        }
    }
}

impl Interceptor for DarkLightFollower {
    fn name(&self) -> &'static str {
        "dark_light_follower"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn on_clientbound(&self, _state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        if event.is_cancelled() {
            return Ok(());
        }
        match event.packet() {
            Packet::BlockChange { pos, .. } => {
                for (chunk, sections) in chunk_sections([*pos]) {
                    event.inject_silent(self.dark_update(chunk, sections));
                }
            }
            Packet::MultiBlockChange { section, .. } => {
                let sections: BTreeSet<i32> = [section.y].into_iter().collect();
                event.inject_silent(self.dark_update(section.chunk(), sections));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Shows each session a ring of fake border blocks at a fixed radius around
/// an anchor point, clamped to a Y band.
///
/// The ring is materialized lazily: enabling it covers the chunks already
/// loaded, and every later `ChunkData` gets its slice of the ring injected as
/// it streams in. Originals are snapshotted so disabling restores the world
/// the client actually has. The core never decodes section blobs, so the
/// snapshot records air; restores therefore clear the ring rather than
/// reproduce terrain.
pub struct BorderOverlay {
    radius: i32,
    block_state: BlockState,
    y_min: i32,
    y_max: i32,
}

impl BorderOverlay {
    pub fn new(radius: i32, block_state: BlockState, y_min: i32, y_max: i32) -> Self {
        Self {
            radius,
            block_state,
            y_min,
            y_max,
        }
    }

    fn ring_in_chunk(&self, center: BlockPos, chunk: ChunkPos) -> Vec<BlockPos> {
        border_columns_in_chunk(center, chunk, self.radius, self.y_min, self.y_max)
    }

    fn fake_blocks(&self, columns: &[BlockPos]) -> HashMap<BlockPos, BlockState> {
        columns.iter().map(|&pos| (pos, self.block_state)).collect()
    }

    /// Turn the border on around `center`, returning the block batches that
    /// show the ring in every currently loaded chunk.
    pub fn enable(&self, state: &mut SessionView, center: BlockPos) -> Vec<Packet> {
        state.border_center = Some(center);
        let mut fake = HashMap::new();
        for &chunk in &state.loaded_chunks {
            let columns = self.ring_in_chunk(center, chunk);
            state
                .overlay
                .apply(columns.iter().map(|&pos| (pos, BlockState::AIR)));
            state.overlay.mark_chunk(chunk);
            fake.extend(self.fake_blocks(&columns));
        }
        debug!(
            session_id = state.session_id,
            center = %center,
            radius = self.radius,
            blocks = fake.len(),
            "border enabled"
        );
        Packet::block_batches(&fake)
    }

    /// Turn the border off, returning the batches that restore the
    /// snapshotted states.
    pub fn disable(&self, state: &mut SessionView) -> Vec<Packet> {
        state.border_center = None;
        let restored = state.overlay.restore_all();
        debug!(
            session_id = state.session_id,
            blocks = restored.len(),
            "border disabled"
        );
        Packet::block_batches(&restored)
    }
}

impl Interceptor for BorderOverlay {
    fn name(&self) -> &'static str {
        "border_overlay"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn on_clientbound(&self, state: &mut SessionView, event: &mut PacketEvent) -> Result<()> {
        if event.is_cancelled() {
            return Ok(());
        }
        let Some(center) = state.border_center else {
            return Ok(());
        };
        if let Packet::ChunkData { chunk, .. } = event.packet() {
            let chunk = *chunk;
            if state.overlay.covers_chunk(chunk) {
                return Ok(());
            }
            let columns = self.ring_in_chunk(center, chunk);
            state
                .overlay
                .apply(columns.iter().map(|&pos| (pos, BlockState::AIR)));
            state.overlay.mark_chunk(chunk);
            if !columns.is_empty() {
                for packet in Packet::block_batches(&self.fake_blocks(&columns)) {
                    event.inject(packet);
                }
            }
        }
        Ok(())
    }
}

/// A dark light update covering the given chunks of a session, used by the
/// periodic relight task to keep re-lit chunks black.
pub fn relight_updates(
    chunks: &std::collections::HashSet<ChunkPos>,
    min_section: i32,
    section_count: i32,
) -> Vec<Packet> {
    let sections: BTreeSet<i32> = (min_section..min_section + section_count).collect();
    chunks
        .iter()
        .map(|&chunk| Packet::UpdateLight {
            chunk,
            light: LightData::dark(&sections, min_section, true, true),
        })
        .collect()
}
