//! UAVCAN v0 scalar encoding
//!
//! UAVCAN v0 packs fields back to back without alignment. Multi-byte values keep the
//! little-endian byte order, while bits are packed MSB-first within each byte. A field that
//! does not end on a byte boundary has its last (most significant) byte left-aligned before
//! packing. This layout matches the reference implementation's `canardEncodeScalar` and
//! `canardDecodeScalar` and is not compatible with Cyphal v1 serialization.
//!
//! Users should not depend on this crate directly. Use the `uavnode::encoding` reexport.

#![no_std]

/// Data type identity
pub trait DataType {
    /// Fixed data type ID
    const ID: u16;
    /// Data type signature, seeds the multi-frame transfer CRC
    const SIGNATURE: u64;
}

pub trait Serialize {
    fn size_bits(&self) -> usize;
    fn serialize(&self, cursor: &mut WriteCursor<'_>);

    fn size_bytes(&self) -> usize {
        self.size_bits().div_ceil(8)
    }

    /// Serializes into `buffer` and returns the used prefix
    fn serialize_to_slice<'a>(&self, buffer: &'a mut [u8]) -> Option<&'a [u8]> {
        let length = self.size_bytes();
        let used = buffer.get_mut(..length)?;
        used.fill(0);
        self.serialize(&mut WriteCursor::new(used));
        Some(used)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeserializeError {
    /// The payload is shorter than the fixed part of the type
    Truncated,
    /// A length or enumeration value is outside of its declared range
    Range,
}

pub trait Deserialize: Sized {
    fn deserialize(cursor: &mut ReadCursor<'_>) -> Result<Self, DeserializeError>;

    fn deserialize_from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        Self::deserialize(&mut ReadCursor::new(bytes))
    }
}

fn get_bit(bytes: &[u8], index: usize) -> bool {
    bytes
        .get(index / 8)
        .is_some_and(|byte| (byte >> (7 - index % 8)) & 0x1 != 0)
}

fn put_bit(bytes: &mut [u8], index: usize, value: bool) {
    if let Some(byte) = bytes.get_mut(index / 8) {
        let mask = 1u8 << (7 - index % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

fn copy_bits(src: &[u8], src_offset: usize, length: usize, dst: &mut [u8], dst_offset: usize) {
    for i in 0..length {
        put_bit(dst, dst_offset + i, get_bit(src, src_offset + i));
    }
}

/// Bit-level writer over a zero-initialized byte buffer
///
/// Bits beyond the end of the buffer are dropped. Size the buffer with
/// [`Serialize::size_bytes`].
pub struct WriteCursor<'a> {
    bytes: &'a mut [u8],
    offset: usize,
}

impl<'a> WriteCursor<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn bit_offset(&self) -> usize {
        self.offset
    }

    pub fn write_scalar(&mut self, value: u64, bit_length: usize) {
        assert!(bit_length <= 64);
        let mut storage = value.to_le_bytes();
        if bit_length % 8 != 0 {
            let last = bit_length / 8;
            storage[last] <<= 8 - bit_length % 8;
        }
        copy_bits(&storage, 0, bit_length, self.bytes, self.offset);
        self.offset += bit_length;
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_scalar(value.into(), 1);
    }

    pub fn write_u2(&mut self, value: u8) {
        self.write_scalar(value.into(), 2);
    }

    pub fn write_u3(&mut self, value: u8) {
        self.write_scalar(value.into(), 3);
    }

    pub fn write_u7(&mut self, value: u8) {
        self.write_scalar(value.into(), 7);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_scalar(value.into(), 8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_scalar(value.into(), 16);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_scalar(value.into(), 32);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_scalar(value, 64);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|&byte| self.write_u8(byte));
    }

    /// Leaves `bit_length` zero bits (void fields, skipped optional data)
    pub fn skip(&mut self, bit_length: usize) {
        self.offset += bit_length;
    }
}

/// Bit-level reader
///
/// Bits beyond the end of the buffer read as zero. Use [`ReadCursor::remaining_bits`] to
/// detect truncation.
pub struct ReadCursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ReadCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining_bits(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.offset)
    }

    pub fn remaining_bytes(&self) -> usize {
        self.remaining_bits() / 8
    }

    pub fn read_scalar(&mut self, bit_length: usize) -> u64 {
        assert!(bit_length <= 64);
        let mut storage = [0u8; 8];
        copy_bits(self.bytes, self.offset, bit_length, &mut storage, 0);
        if bit_length % 8 != 0 {
            let last = bit_length / 8;
            storage[last] >>= 8 - bit_length % 8;
        }
        self.offset += bit_length;
        u64::from_le_bytes(storage)
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_scalar(1) != 0
    }

    pub fn read_u2(&mut self) -> u8 {
        self.read_scalar(2) as u8
    }

    pub fn read_u3(&mut self) -> u8 {
        self.read_scalar(3) as u8
    }

    pub fn read_u7(&mut self) -> u8 {
        self.read_scalar(7) as u8
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_scalar(8) as u8
    }

    pub fn read_u16(&mut self) -> u16 {
        self.read_scalar(16) as u16
    }

    pub fn read_u32(&mut self) -> u32 {
        self.read_scalar(32) as u32
    }

    pub fn read_bytes(&mut self, bytes: &mut [u8]) {
        bytes.iter_mut().for_each(|byte| *byte = self.read_u8());
    }

    pub fn skip(&mut self, bit_length: usize) {
        self.offset += bit_length;
    }
}
