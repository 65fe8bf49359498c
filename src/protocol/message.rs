//! Typed packet definitions and their wire codecs.
//!
//! Packet ids are only meaningful relative to a `(phase, direction)` pair;
//! the decode table below is the single source of truth for that mapping.
//! Every decode consumes the whole body; trailing bytes mean the sender and
//! receiver disagree about the layout and kill the session.

use crate::core::packet::RawPacket;
use crate::core::wire;
use crate::error::{ProtocolError, Result};
use crate::game::block::{BlockPos, BlockState};
use crate::game::chunk::{ChunkPos, SectionPos};
use crate::game::light::LightData;
use crate::protocol::phase::{Direction, Phase};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Protocol version this core speaks
pub const PROTOCOL_VERSION: i32 = 3;

const MAX_NAME_LEN: usize = 16;
const MAX_LOCALE_LEN: usize = 16;
const MAX_REASON_LEN: usize = 32 * 1024;
const MAX_SECTION_BLOB_LEN: usize = 1024 * 1024;
/// A section holds at most 4096 blocks, so no batch can legally exceed it
const MAX_BATCH_CHANGES: usize = 4096;

/// One entry of a multi-block batch: absolute position plus new state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChangeEntry {
    pub pos: BlockPos,
    pub state: BlockState,
}

/// A fully decoded packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // --- serverbound ---
    /// Handshake: protocol version announcement
    Hello { protocol_version: i32 },
    /// Login: requested identity
    LoginStart { name: String },
    /// Configuration/Play: client capabilities, notably the view distance
    ClientSettings { locale: String, view_distance: u8 },
    /// Configuration: client finished applying settings
    AckFinishConfiguration,
    /// Play: client position update
    PlayerPosition { x: f64, y: f64, z: f64 },

    // --- either direction ---
    /// Liveness probe and its echo
    KeepAlive { id: i64 },

    // --- clientbound ---
    /// Terminal rejection with a human-readable reason
    Disconnect { reason: String },
    /// Login accepted; assigned session identity
    LoginSuccess { id: u128, name: String },
    /// Server finished the configuration exchange
    FinishConfiguration,
    /// Single block update
    BlockChange { pos: BlockPos, state: BlockState },
    /// Batched block updates within one section
    MultiBlockChange {
        section: SectionPos,
        changes: Vec<BlockChangeEntry>,
    },
    /// Full chunk payload: opaque section blob plus initial light
    ChunkData {
        chunk: ChunkPos,
        sections: Bytes,
        light: LightData,
    },
    /// Chunk left the client's view
    UnloadChunk { chunk: ChunkPos },
    /// Incremental light update for one chunk
    UpdateLight { chunk: ChunkPos, light: LightData },
}

impl Packet {
    /// Wire id for this packet within its `(phase, direction)` table
    pub fn id(&self) -> i32 {
        match self {
            Packet::Hello { .. } => 0x00,
            Packet::LoginStart { .. } => 0x00,
            Packet::ClientSettings { .. } => 0x00,
            Packet::AckFinishConfiguration => 0x03,
            Packet::PlayerPosition { .. } => 0x02,
            Packet::KeepAlive { .. } => 0x01,
            Packet::Disconnect { .. } => 0x00,
            Packet::LoginSuccess { .. } => 0x02,
            Packet::FinishConfiguration => 0x03,
            Packet::BlockChange { .. } => 0x02,
            Packet::MultiBlockChange { .. } => 0x03,
            Packet::ChunkData { .. } => 0x04,
            Packet::UnloadChunk { .. } => 0x05,
            Packet::UpdateLight { .. } => 0x06,
        }
    }

    /// Stable opcode string for dispatcher routing (zero-copy statics)
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Hello { .. } => "HELLO",
            Packet::LoginStart { .. } => "LOGIN_START",
            Packet::ClientSettings { .. } => "CLIENT_SETTINGS",
            Packet::AckFinishConfiguration => "ACK_FINISH_CONFIGURATION",
            Packet::PlayerPosition { .. } => "PLAYER_POSITION",
            Packet::KeepAlive { .. } => "KEEP_ALIVE",
            Packet::Disconnect { .. } => "DISCONNECT",
            Packet::LoginSuccess { .. } => "LOGIN_SUCCESS",
            Packet::FinishConfiguration => "FINISH_CONFIGURATION",
            Packet::BlockChange { .. } => "BLOCK_CHANGE",
            Packet::MultiBlockChange { .. } => "MULTI_BLOCK_CHANGE",
            Packet::ChunkData { .. } => "CHUNK_DATA",
            Packet::UnloadChunk { .. } => "UNLOAD_CHUNK",
            Packet::UpdateLight { .. } => "UPDATE_LIGHT",
        }
    }

    /// Decode a raw packet according to the session's phase and the
    /// direction it was captured in.
    pub fn decode(phase: Phase, direction: Direction, raw: &RawPacket) -> Result<Self> {
        let mut buf = raw.body.clone();
        let packet = match (phase, direction, raw.id) {
            (Phase::Handshake, Direction::Serverbound, 0x00) => Packet::Hello {
                protocol_version: wire::read_varint(&mut buf)?,
            },
            (Phase::Login, Direction::Serverbound, 0x00) => Packet::LoginStart {
                name: wire::read_string(&mut buf, MAX_NAME_LEN)?,
            },
            // Rejections can arrive in any phase, including handshake.
            (_, Direction::Clientbound, 0x00) => Packet::Disconnect {
                reason: wire::read_string(&mut buf, MAX_REASON_LEN)?,
            },
            (Phase::Login, Direction::Clientbound, 0x02) => Packet::LoginSuccess {
                id: wire::read_uuid(&mut buf)?,
                name: wire::read_string(&mut buf, MAX_NAME_LEN)?,
            },
            (Phase::Configuration | Phase::Play, Direction::Serverbound, 0x00) => {
                Packet::ClientSettings {
                    locale: wire::read_string(&mut buf, MAX_LOCALE_LEN)?,
                    view_distance: read_u8(&mut buf)?,
                }
            }
            (Phase::Configuration | Phase::Play, _, 0x01) => Packet::KeepAlive {
                id: read_i64(&mut buf)?,
            },
            (Phase::Configuration, Direction::Serverbound, 0x03) => {
                Packet::AckFinishConfiguration
            }
            (Phase::Configuration, Direction::Clientbound, 0x03) => Packet::FinishConfiguration,
            (Phase::Play, Direction::Serverbound, 0x02) => Packet::PlayerPosition {
                x: read_f64(&mut buf)?,
                y: read_f64(&mut buf)?,
                z: read_f64(&mut buf)?,
            },
            (Phase::Play, Direction::Clientbound, 0x02) => Packet::BlockChange {
                pos: BlockPos::from_long(read_i64(&mut buf)?),
                state: BlockState(wire::read_varint(&mut buf)?),
            },
            (Phase::Play, Direction::Clientbound, 0x03) => {
                let section = SectionPos::from_long(read_i64(&mut buf)?);
                let count = wire::read_varint(&mut buf)?;
                if count < 0 || count as usize > MAX_BATCH_CHANGES {
                    return Err(ProtocolError::InvalidFrame);
                }
                let mut changes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    changes.push(decode_batch_entry(&mut buf, section)?);
                }
                Packet::MultiBlockChange { section, changes }
            }
            (Phase::Play, Direction::Clientbound, 0x04) => {
                let chunk = ChunkPos::new(read_i32(&mut buf)?, read_i32(&mut buf)?);
                let sections =
                    Bytes::from(wire::read_byte_array(&mut buf, MAX_SECTION_BLOB_LEN)?);
                let light = LightData::decode(&mut buf)?;
                Packet::ChunkData {
                    chunk,
                    sections,
                    light,
                }
            }
            (Phase::Play, Direction::Clientbound, 0x05) => Packet::UnloadChunk {
                chunk: ChunkPos::new(read_i32(&mut buf)?, read_i32(&mut buf)?),
            },
            (Phase::Play, Direction::Clientbound, 0x06) => {
                let chunk = ChunkPos::new(wire::read_varint(&mut buf)?, wire::read_varint(&mut buf)?);
                let light = LightData::decode(&mut buf)?;
                Packet::UpdateLight { chunk, light }
            }
            _ => {
                return Err(ProtocolError::UnknownPacket {
                    phase: phase.name(),
                    direction: direction.name(),
                    id: raw.id,
                })
            }
        };
        if buf.has_remaining() {
            return Err(ProtocolError::TrailingBytes(buf.remaining()));
        }
        Ok(packet)
    }

    /// Encode back to a raw packet
    pub fn encode(&self) -> RawPacket {
        let mut buf = BytesMut::new();
        match self {
            Packet::Hello { protocol_version } => {
                wire::write_varint(&mut buf, *protocol_version);
            }
            Packet::LoginStart { name } => {
                wire::write_string(&mut buf, name);
            }
            Packet::ClientSettings {
                locale,
                view_distance,
            } => {
                wire::write_string(&mut buf, locale);
                buf.put_u8(*view_distance);
            }
            Packet::AckFinishConfiguration | Packet::FinishConfiguration => {}
            Packet::PlayerPosition { x, y, z } => {
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*z);
            }
            Packet::KeepAlive { id } => {
                buf.put_i64(*id);
            }
            Packet::Disconnect { reason } => {
                wire::write_string(&mut buf, reason);
            }
            Packet::LoginSuccess { id, name } => {
                wire::write_uuid(&mut buf, *id);
                wire::write_string(&mut buf, name);
            }
            Packet::BlockChange { pos, state } => {
                buf.put_i64(pos.as_long());
                wire::write_varint(&mut buf, state.id());
            }
            Packet::MultiBlockChange { section, changes } => {
                buf.put_i64(section.as_long());
                wire::write_varint(&mut buf, changes.len() as i32);
                for change in changes {
                    wire::write_varlong(&mut buf, encode_batch_entry(change));
                }
            }
            Packet::ChunkData {
                chunk,
                sections,
                light,
            } => {
                buf.put_i32(chunk.x);
                buf.put_i32(chunk.z);
                wire::write_byte_array(&mut buf, sections);
                light.encode(&mut buf);
            }
            Packet::UnloadChunk { chunk } => {
                buf.put_i32(chunk.x);
                buf.put_i32(chunk.z);
            }
            Packet::UpdateLight { chunk, light } => {
                wire::write_varint(&mut buf, chunk.x);
                wire::write_varint(&mut buf, chunk.z);
                light.encode(&mut buf);
            }
        }
        RawPacket::new(self.id(), buf.freeze())
    }

    /// Build the multi-block batches for a set of fake blocks, one packet
    /// per touched section.
    pub fn block_batches(
        blocks: &std::collections::HashMap<BlockPos, BlockState>,
    ) -> Vec<Packet> {
        crate::game::block::group_by_section(blocks)
            .into_iter()
            .map(|(section, entries)| Packet::MultiBlockChange {
                section,
                changes: entries
                    .into_iter()
                    .map(|(pos, state)| BlockChangeEntry { pos, state })
                    .collect(),
            })
            .collect()
    }
}

/// Batch entries pack the state id above 12 bits of section-local coordinates
fn encode_batch_entry(entry: &BlockChangeEntry) -> i64 {
    let (x, y, z) = entry.pos.section_local();
    (i64::from(entry.state.id()) << 12)
        | (i64::from(x) << 8)
        | (i64::from(z) << 4)
        | i64::from(y)
}

fn decode_batch_entry<B: Buf>(buf: &mut B, section: SectionPos) -> Result<BlockChangeEntry> {
    let value = wire::read_varlong(buf)?;
    let state = BlockState((value >> 12) as i32);
    let x = ((value >> 8) & 0xF) as i32;
    let z = ((value >> 4) & 0xF) as i32;
    let y = (value & 0xF) as i32;
    Ok(BlockChangeEntry {
        pos: BlockPos::new(
            (section.x << 4) + x,
            (section.y << 4) + y,
            (section.z << 4) + z,
        ),
        state,
    })
}

fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    if !buf.has_remaining() {
        return Err(ProtocolError::InvalidFrame);
    }
    Ok(buf.get_u8())
}

fn read_i32<B: Buf>(buf: &mut B) -> Result<i32> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::InvalidFrame);
    }
    Ok(buf.get_i32())
}

fn read_i64<B: Buf>(buf: &mut B) -> Result<i64> {
    if buf.remaining() < 8 {
        return Err(ProtocolError::InvalidFrame);
    }
    Ok(buf.get_i64())
}

fn read_f64<B: Buf>(buf: &mut B) -> Result<f64> {
    if buf.remaining() < 8 {
        return Err(ProtocolError::InvalidFrame);
    }
    Ok(buf.get_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    fn roundtrip(phase: Phase, direction: Direction, packet: Packet) -> Packet {
        let raw = packet.encode();
        Packet::decode(phase, direction, &raw).expect("roundtrip")
    }

    #[test]
    fn test_hello_roundtrip() {
        let packet = Packet::Hello {
            protocol_version: PROTOCOL_VERSION,
        };
        assert_eq!(
            roundtrip(Phase::Handshake, Direction::Serverbound, packet.clone()),
            packet
        );
    }

    #[test]
    fn test_client_settings_roundtrip_in_both_phases() {
        let packet = Packet::ClientSettings {
            locale: "en_us".to_string(),
            view_distance: 12,
        };
        for phase in [Phase::Configuration, Phase::Play] {
            assert_eq!(
                roundtrip(phase, Direction::Serverbound, packet.clone()),
                packet
            );
        }
    }

    #[test]
    fn test_keep_alive_both_directions() {
        let packet = Packet::KeepAlive { id: -77 };
        for direction in [Direction::Serverbound, Direction::Clientbound] {
            assert_eq!(roundtrip(Phase::Play, direction, packet.clone()), packet);
        }
    }

    #[test]
    fn test_multi_block_change_roundtrip() {
        let section = SectionPos::new(2, -1, -3);
        let packet = Packet::MultiBlockChange {
            section,
            changes: vec![
                BlockChangeEntry {
                    pos: BlockPos::new(32, -16, -48),
                    state: BlockState(100),
                },
                BlockChangeEntry {
                    pos: BlockPos::new(47, -1, -33),
                    state: BlockState(0),
                },
            ],
        };
        assert_eq!(
            roundtrip(Phase::Play, Direction::Clientbound, packet.clone()),
            packet
        );
    }

    #[test]
    fn test_update_light_roundtrip() {
        let sections: BTreeSet<i32> = [0, 3].into_iter().collect();
        let packet = Packet::UpdateLight {
            chunk: ChunkPos::new(-7, 12),
            light: LightData::dark(&sections, -4, true, true),
        };
        assert_eq!(
            roundtrip(Phase::Play, Direction::Clientbound, packet.clone()),
            packet
        );
    }

    #[test]
    fn test_chunk_data_roundtrip() {
        let sections: BTreeSet<i32> = [1].into_iter().collect();
        let packet = Packet::ChunkData {
            chunk: ChunkPos::new(4, -9),
            sections: Bytes::from_static(&[1, 2, 3, 4, 5]),
            light: LightData::dark(&sections, -4, true, false),
        };
        assert_eq!(
            roundtrip(Phase::Play, Direction::Clientbound, packet.clone()),
            packet
        );
    }

    #[test]
    fn test_unknown_id_for_phase() {
        let raw = RawPacket::new(0x30, Bytes::new());
        let err = Packet::decode(Phase::Play, Direction::Serverbound, &raw).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacket { id: 0x30, .. }));
    }

    #[test]
    fn test_play_packet_rejected_in_handshake() {
        let packet = Packet::BlockChange {
            pos: BlockPos::new(0, 0, 0),
            state: BlockState(1),
        };
        let raw = packet.encode();
        assert!(Packet::decode(Phase::Handshake, Direction::Clientbound, &raw).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let packet = Packet::KeepAlive { id: 9 };
        let mut raw = packet.encode();
        let mut body = BytesMut::from(&raw.body[..]);
        body.put_u8(0xFF);
        raw.body = body.freeze();
        let err = Packet::decode(Phase::Play, Direction::Serverbound, &raw).unwrap_err();
        assert!(matches!(err, ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn test_oversized_name_rejected() {
        let packet = Packet::LoginStart {
            name: "x".repeat(40),
        };
        let raw = packet.encode();
        assert!(Packet::decode(Phase::Login, Direction::Serverbound, &raw).is_err());
    }

    #[test]
    fn test_block_batches_split_by_section() {
        let mut blocks = HashMap::new();
        blocks.insert(BlockPos::new(0, 0, 0), BlockState(5));
        blocks.insert(BlockPos::new(1, 0, 0), BlockState(5));
        blocks.insert(BlockPos::new(0, 40, 0), BlockState(5));
        let batches = Packet::block_batches(&blocks);
        assert_eq!(batches.len(), 2);
        let total: usize = batches
            .iter()
            .map(|p| match p {
                Packet::MultiBlockChange { changes, .. } => changes.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(total, 3);
    }
}
