//! Nibble-packed light sections and light update payloads.
//!
//! Each 16x16x16 section stores 4096 light values of 4 bits each, packed two
//! per byte into a 2048-byte array ordered by Y, then Z, then X. A light
//! update addresses sections through bitmasks: bit 0 is the section below the
//! world floor, so a world section index maps to mask bit
//! `section - min_section + 1`.

use crate::core::wire;
use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};
use std::collections::BTreeSet;

/// Bytes in one packed light section
pub const SECTION_LIGHT_BYTES: usize = 2048;

/// Light values in one section
pub const SECTION_VOLUME: usize = 4096;

/// Upper bound on mask words accepted off the wire
const MAX_MASK_WORDS: usize = 64;

/// Upper bound on light sections accepted off the wire
const MAX_LIGHT_SECTIONS: usize = 1024;

/// Index into the 4096-value section for local coordinates (each 0..16)
pub fn light_index(x: u8, y: u8, z: u8) -> usize {
    usize::from(y) * 256 + usize::from(z) * 16 + usize::from(x)
}

/// Inverse of [`light_index`]
pub fn coords_from_index(index: usize) -> (u8, u8, u8) {
    let y = index / 256;
    let rem = index % 256;
    ((rem % 16) as u8, y as u8, (rem / 16) as u8)
}

/// Light value (0-15) at the given local coordinates, 0 if out of bounds
pub fn get_light(data: &[u8], x: u8, y: u8, z: u8) -> u8 {
    let index = light_index(x, y, z);
    let Some(&byte) = data.get(index / 2) else {
        return 0;
    };
    if index % 2 == 1 {
        (byte >> 4) & 0x0F
    } else {
        byte & 0x0F
    }
}

/// Set the light value at the given local coordinates, clamping to 0-15.
/// Out-of-bounds positions are ignored.
pub fn set_light(data: &mut [u8], x: u8, y: u8, z: u8, level: u8) {
    let index = light_index(x, y, z);
    let Some(byte) = data.get_mut(index / 2) else {
        return;
    };
    let level = level.min(15);
    if index % 2 == 1 {
        *byte = (*byte & 0x0F) | (level << 4);
    } else {
        *byte = (*byte & 0xF0) | level;
    }
}

fn mask_set(words: &mut Vec<i64>, bit: usize) {
    let word = bit / 64;
    if words.len() <= word {
        words.resize(word + 1, 0);
    }
    words[word] |= 1 << (bit % 64);
}

fn mask_bits(words: &[i64]) -> usize {
    words.iter().map(|w| w.count_ones() as usize).sum()
}

/// Wire structure of a light update: section bitmasks plus the packed
/// sections they select, for sky and block light independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightData {
    pub sky_mask: Vec<i64>,
    pub block_mask: Vec<i64>,
    pub empty_sky_mask: Vec<i64>,
    pub empty_block_mask: Vec<i64>,
    pub sky_sections: Vec<Vec<u8>>,
    pub block_sections: Vec<Vec<u8>>,
}

impl LightData {
    /// An update that blacks out the given world sections of one chunk.
    ///
    /// `min_section` is the world floor section; mask bit 0 addresses the
    /// layer below it, so every section shifts up by one.
    pub fn dark(
        sections: &BTreeSet<i32>,
        min_section: i32,
        sky: bool,
        block: bool,
    ) -> Self {
        let mut data = Self::default();
        for &section in sections {
            let bit = (section - min_section + 1).max(0) as usize;
            if sky {
                mask_set(&mut data.sky_mask, bit);
                data.sky_sections.push(vec![0u8; SECTION_LIGHT_BYTES]);
            }
            if block {
                mask_set(&mut data.block_mask, bit);
                data.block_sections.push(vec![0u8; SECTION_LIGHT_BYTES]);
            }
        }
        data
    }

    /// Zero every sky-light section in place. Returns true if any section
    /// actually changed, so callers can skip a re-encode.
    pub fn erase_sky_light(&mut self) -> bool {
        let mut changed = false;
        for section in &mut self.sky_sections {
            if section.iter().any(|&b| b != 0) {
                section.fill(0);
                changed = true;
            }
        }
        changed
    }

    /// Validate that each mask selects exactly as many sections as provided
    pub fn is_consistent(&self) -> bool {
        mask_bits(&self.sky_mask) == self.sky_sections.len()
            && mask_bits(&self.block_mask) == self.block_sections.len()
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let sky_mask = wire::read_long_array(buf, MAX_MASK_WORDS)?;
        let block_mask = wire::read_long_array(buf, MAX_MASK_WORDS)?;
        let empty_sky_mask = wire::read_long_array(buf, MAX_MASK_WORDS)?;
        let empty_block_mask = wire::read_long_array(buf, MAX_MASK_WORDS)?;

        let sky_sections = Self::decode_sections(buf)?;
        let block_sections = Self::decode_sections(buf)?;

        let data = Self {
            sky_mask,
            block_mask,
            empty_sky_mask,
            empty_block_mask,
            sky_sections,
            block_sections,
        };
        if !data.is_consistent() {
            return Err(ProtocolError::InvalidFrame);
        }
        Ok(data)
    }

    fn decode_sections<B: Buf>(buf: &mut B) -> Result<Vec<Vec<u8>>> {
        let count = wire::read_varint(buf)?;
        if count < 0 || count as usize > MAX_LIGHT_SECTIONS {
            return Err(ProtocolError::InvalidFrame);
        }
        let mut sections = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let section = wire::read_byte_array(buf, SECTION_LIGHT_BYTES)?;
            if section.len() != SECTION_LIGHT_BYTES {
                return Err(ProtocolError::InvalidFrame);
            }
            sections.push(section);
        }
        Ok(sections)
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        wire::write_long_array(buf, &self.sky_mask);
        wire::write_long_array(buf, &self.block_mask);
        wire::write_long_array(buf, &self.empty_sky_mask);
        wire::write_long_array(buf, &self.empty_block_mask);

        wire::write_varint(buf, self.sky_sections.len() as i32);
        for section in &self.sky_sections {
            wire::write_byte_array(buf, section);
        }
        wire::write_varint(buf, self.block_sections.len() as i32);
        for section in &self.block_sections {
            wire::write_byte_array(buf, section);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_light_index_ordering() {
        assert_eq!(light_index(0, 0, 0), 0);
        assert_eq!(light_index(15, 0, 0), 15);
        assert_eq!(light_index(0, 0, 1), 16);
        assert_eq!(light_index(0, 1, 0), 256);
        assert_eq!(light_index(15, 15, 15), SECTION_VOLUME - 1);
    }

    #[test]
    fn test_coords_index_roundtrip() {
        for index in [0usize, 1, 255, 256, 4095] {
            let (x, y, z) = coords_from_index(index);
            assert_eq!(light_index(x, y, z), index);
        }
    }

    #[test]
    fn test_get_set_light_nibbles() {
        let mut data = vec![0u8; SECTION_LIGHT_BYTES];
        set_light(&mut data, 3, 7, 9, 12);
        assert_eq!(get_light(&data, 3, 7, 9), 12);
        // Neighbouring value in the same byte is untouched.
        let index = light_index(3, 7, 9);
        let (nx, ny, nz) = coords_from_index(index ^ 1);
        assert_eq!(get_light(&data, nx, ny, nz), 0);
    }

    #[test]
    fn test_set_light_clamps() {
        let mut data = vec![0u8; SECTION_LIGHT_BYTES];
        set_light(&mut data, 0, 0, 0, 200);
        assert_eq!(get_light(&data, 0, 0, 0), 15);
    }

    #[test]
    fn test_out_of_bounds_access_is_noop() {
        let mut short = vec![0u8; 4];
        set_light(&mut short, 15, 15, 15, 9);
        assert_eq!(get_light(&short, 15, 15, 15), 0);
    }

    #[test]
    fn test_dark_update_masks() {
        let sections: BTreeSet<i32> = [0, 1, 2].into_iter().collect();
        // World floor at section -4: section 0 maps to bit 5.
        let data = LightData::dark(&sections, -4, true, false);
        assert!(data.is_consistent());
        assert_eq!(data.sky_sections.len(), 3);
        assert!(data.block_sections.is_empty());
        assert_eq!(data.sky_mask[0], 0b111 << 5);
    }

    #[test]
    fn test_erase_sky_light_reports_changes() {
        let mut data = LightData::default();
        data.sky_mask = vec![1];
        data.sky_sections = vec![vec![0xFF; SECTION_LIGHT_BYTES]];
        assert!(data.erase_sky_light());
        assert!(data.sky_sections[0].iter().all(|&b| b == 0));
        // Second pass has nothing to change.
        assert!(!data.erase_sky_light());
    }

    #[test]
    fn test_light_data_wire_roundtrip() {
        let sections: BTreeSet<i32> = [3, 5].into_iter().collect();
        let data = LightData::dark(&sections, 0, true, true);

        let mut buf = BytesMut::new();
        data.encode(&mut buf);
        let decoded = LightData::decode(&mut buf).expect("decode");
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_inconsistent_mask_rejected() {
        let data = LightData {
            sky_mask: vec![0b11],
            sky_sections: vec![vec![0u8; SECTION_LIGHT_BYTES]],
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        data.encode(&mut buf);
        assert!(LightData::decode(&mut buf).is_err());
    }
}
