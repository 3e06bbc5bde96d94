//! Consensus-format serialization.
//!
//! Decoding runs through [`ByteCursor`], a bounds-checked cursor over the
//! raw block bytes that tracks its position so parse errors can name the
//! failing field and offset, and so the block parser can record the byte
//! span of every transaction it walks.
//!
//! Encoding runs through [`FluxSerialize`], used where the indexer must
//! reproduce daemon serializations exactly: the signature-excluded hashing
//! of fluxnode operations, and test-vector construction.

mod cursor;
mod error;

pub mod sha256d;

use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

pub use cursor::{ByteCursor, MAX_COMPACT_SIZE};
pub use error::ParseError;

/// Serialization in the Flux consensus byte format.
pub trait FluxSerialize {
    fn flux_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error>;

    fn flux_serialize_to_vec(&self) -> Vec<u8> {
        let mut data = Vec::new();
        self.flux_serialize(&mut data)
            .expect("writes to a Vec never fail");
        data
    }
}

impl FluxSerialize for u8 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_u8(*self)
    }
}

impl FluxSerialize for u16 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_u16::<LittleEndian>(*self)
    }
}

impl FluxSerialize for u32 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_u32::<LittleEndian>(*self)
    }
}

impl FluxSerialize for u64 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_u64::<LittleEndian>(*self)
    }
}

impl FluxSerialize for i8 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_i8(*self)
    }
}

impl FluxSerialize for i32 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_i32::<LittleEndian>(*self)
    }
}

impl FluxSerialize for i64 {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_i64::<LittleEndian>(*self)
    }
}

impl<const N: usize> FluxSerialize for [u8; N] {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(self)
    }
}

/// Byte vectors serialize with a compact-size length prefix.
impl FluxSerialize for Vec<u8> {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        write_compact_size(&mut writer, self.len() as u64)?;
        writer.write_all(self)
    }
}

/// Strings serialize as length-prefixed UTF-8 bytes.
impl FluxSerialize for String {
    fn flux_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        write_compact_size(&mut writer, self.len() as u64)?;
        writer.write_all(self.as_bytes())
    }
}

/// Write a compact-size integer.
pub fn write_compact_size<W: io::Write>(mut writer: W, value: u64) -> Result<(), io::Error> {
    if value < 0xFD {
        writer.write_u8(value as u8)
    } else if value <= u16::MAX as u64 {
        writer.write_u8(0xFD)?;
        writer.write_u16::<LittleEndian>(value as u16)
    } else if value <= u32::MAX as u64 {
        writer.write_u8(0xFE)?;
        writer.write_u32::<LittleEndian>(value as u32)
    } else {
        writer.write_u8(0xFF)?;
        writer.write_u64::<LittleEndian>(value)
    }
}

/// The serialized length of a compact-size integer.
pub const fn compact_size_len(value: u64) -> usize {
    if value < 0xFD {
        1
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Hex-encode a 32-byte internal-order hash in canonical display order.
///
/// Stored hashes are little-endian; the display convention reverses the
/// bytes, following the u256 convention set by Bitcoin and zcashd.
pub fn hex_display(bytes: &[u8; 32]) -> String {
    let mut reversed = *bytes;
    reversed.reverse();
    hex::encode(reversed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_size_roundtrip() {
        for value in [0u64, 1, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, 0x1_0000_0000] {
            let mut data = Vec::new();
            write_compact_size(&mut data, value).unwrap();
            assert_eq!(data.len(), compact_size_len(value));

            let mut cursor = ByteCursor::new(&data);
            assert_eq!(cursor.read_compact_size("value").unwrap(), value);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn hex_display_reverses_byte_order() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        bytes[31] = 0x01;

        let display = hex_display(&bytes);
        assert!(display.starts_with("01"));
        assert!(display.ends_with("ab"));
    }
}
