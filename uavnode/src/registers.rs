//! Addressable configuration and status storage
//!
//! The store is an array of 32-bit cells. Byte `k` of a cell covers bits `[8k, 8k + 8)`, so
//! the persisted image is the little-endian dump of the leading cells. Fields are addressed
//! through descriptors validated at construction; the constants in [`map`] are checked at
//! compile time.

use crate::core::NodeId;
use crate::driver::NonVolatile;

pub const REGISTER_COUNT: usize = 10;
/// Leading registers mirrored in non-volatile memory
pub const PERSISTED_COUNT: usize = 6;
pub const PERSISTED_BYTES: usize = PERSISTED_COUNT * CELL_BYTES;
pub const UNIQUE_ID_LENGTH: usize = 16;

const CELL_BYTES: usize = 4;
const _: () = core::assert!(PERSISTED_COUNT <= REGISTER_COUNT);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterIndex(u8);

impl RegisterIndex {
    pub const fn new(index: usize) -> Option<Self> {
        if index < REGISTER_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub const fn into_usize(self) -> usize {
        self.0 as usize
    }
}

/// Single byte at `offset` within a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ByteField {
    register: RegisterIndex,
    offset: u8,
}

impl ByteField {
    pub const fn new(register: usize, offset: usize) -> Option<Self> {
        match RegisterIndex::new(register) {
            Some(register) if offset < CELL_BYTES => Some(Self {
                register,
                offset: offset as u8,
            }),
            _ => None,
        }
    }

    fn shift(self) -> u32 {
        8 * u32::from(self.offset)
    }
}

/// 16-bit field starting at byte `offset` within a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HalfWordField {
    register: RegisterIndex,
    offset: u8,
}

impl HalfWordField {
    pub const fn new(register: usize, offset: usize) -> Option<Self> {
        match RegisterIndex::new(register) {
            Some(register) if offset + 2 <= CELL_BYTES => Some(Self {
                register,
                offset: offset as u8,
            }),
            _ => None,
        }
    }

    fn shift(self) -> u32 {
        8 * u32::from(self.offset)
    }
}

const fn valid<T: Copy>(field: Option<T>) -> T {
    match field {
        Some(field) => field,
        None => panic!("register field out of range"),
    }
}

/// Register map of the compass node
pub mod map {
    use super::{ByteField, RegisterIndex, valid};

    /// Node ID, 0 requests dynamic allocation
    pub const NODE_ID: ByteField = valid(ByteField::new(0, 0));
    pub const MAGNETOMETER_SENSOR_ID: ByteField = valid(ByteField::new(0, 1));
    /// CAN bit rate, bit/s
    pub const BUS_SPEED: RegisterIndex = valid(RegisterIndex::new(1));
    pub const UNIQUE_ID: [RegisterIndex; 4] = [
        valid(RegisterIndex::new(2)),
        valid(RegisterIndex::new(3)),
        valid(RegisterIndex::new(4)),
        valid(RegisterIndex::new(5)),
    ];
    /// Operating mode, `node_status::Mode` wire value
    pub const MODE: ByteField = valid(ByteField::new(6, 0));
    /// `node_status::Health` wire value
    pub const HEALTH: ByteField = valid(ByteField::new(6, 1));
    pub const MAGNETOMETER_ENABLED: ByteField = valid(ByteField::new(6, 2));
    pub const RAW_MAGNETOMETER_X: RegisterIndex = valid(RegisterIndex::new(7));
    pub const RAW_MAGNETOMETER_Y: RegisterIndex = valid(RegisterIndex::new(8));
    pub const RAW_MAGNETOMETER_Z: RegisterIndex = valid(RegisterIndex::new(9));
}

/// Image of a freshly programmed board: dynamic node ID, 250 kbit/s, sequential unique ID
#[rustfmt::skip]
pub const FACTORY_IMAGE: [u8; PERSISTED_BYTES] = [
    0x00, 0x00, 0x00, 0x00,
    0x90, 0xd0, 0x03, 0x00,
    0x00, 0x01, 0x02, 0x03,
    0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0a, 0x0b,
    0x0c, 0x0d, 0x0e, 0x0f,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterStore {
    cells: [u32; REGISTER_COUNT],
}

impl RegisterStore {
    /// All registers zeroed
    pub const fn new() -> Self {
        Self {
            cells: [0; REGISTER_COUNT],
        }
    }

    /// Persisted registers from `image`, the rest zeroed
    pub fn from_image(image: &[u8; PERSISTED_BYTES]) -> Self {
        let mut store = Self::new();
        for (cell, bytes) in store.cells.iter_mut().zip(image.chunks_exact(CELL_BYTES)) {
            *cell = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        store
    }

    pub fn load<S: NonVolatile>(storage: &mut S) -> Result<Self, StorageError> {
        let mut image = [0; PERSISTED_BYTES];
        storage.read(0, &mut image).map_err(|_| StorageError)?;
        Ok(Self::from_image(&image))
    }

    pub fn image(&self) -> [u8; PERSISTED_BYTES] {
        let mut image = [0; PERSISTED_BYTES];
        for (bytes, cell) in image.chunks_exact_mut(CELL_BYTES).zip(&self.cells) {
            bytes.copy_from_slice(&cell.to_le_bytes());
        }
        image
    }

    /// Writes the persisted registers back to non-volatile memory
    pub fn persist<S: NonVolatile>(&self, storage: &mut S) -> Result<(), StorageError> {
        storage.write(0, &self.image()).map_err(|_| StorageError)
    }

    pub fn dump(&self) {
        info!("Contents of registers:");
        for (index, cell) in self.cells.iter().enumerate() {
            let bytes = cell.to_le_bytes();
            info!(
                "reg[{}]: {:02x},{:02x},{:02x},{:02x}",
                index, bytes[0], bytes[1], bytes[2], bytes[3]
            );
        }
    }

    pub fn get(&self, field: ByteField) -> u8 {
        (self.cells[field.register.into_usize()] >> field.shift()) as u8
    }

    pub fn set(&mut self, field: ByteField, value: u8) {
        let cell = &mut self.cells[field.register.into_usize()];
        *cell = (*cell & !(0xff << field.shift())) | u32::from(value) << field.shift();
    }

    pub fn get_i16(&self, field: HalfWordField) -> i16 {
        (self.cells[field.register.into_usize()] >> field.shift()) as u16 as i16
    }

    pub fn set_i16(&mut self, field: HalfWordField, value: i16) {
        let cell = &mut self.cells[field.register.into_usize()];
        *cell = (*cell & !(0xffff << field.shift())) | u32::from(value as u16) << field.shift();
    }

    pub fn get_u32(&self, register: RegisterIndex) -> u32 {
        self.cells[register.into_usize()]
    }

    pub fn set_u32(&mut self, register: RegisterIndex, value: u32) {
        self.cells[register.into_usize()] = value;
    }

    /// Converts the stored integer to the nearest float
    pub fn get_f32_numeric(&self, register: RegisterIndex) -> f32 {
        self.get_u32(register) as f32
    }

    /// Stores the value cast to an unsigned integer (fraction dropped, saturated to the
    /// `u32` range, NaN stored as 0)
    ///
    /// Not the inverse of [`Self::get_f32_numeric`] for fractional or negative values.
    pub fn set_f32_truncating(&mut self, register: RegisterIndex, value: f32) {
        self.set_u32(register, value as u32);
    }

    pub fn unique_id(&self) -> [u8; UNIQUE_ID_LENGTH] {
        let mut unique_id = [0; UNIQUE_ID_LENGTH];
        for (bytes, register) in unique_id.chunks_exact_mut(CELL_BYTES).zip(map::UNIQUE_ID) {
            bytes.copy_from_slice(&self.get_u32(register).to_le_bytes());
        }
        unique_id
    }

    /// Statically configured node ID, `None` when dynamic allocation is requested
    pub fn node_id(&self) -> Option<NodeId> {
        NodeId::new(self.get(map::NODE_ID))
    }

    pub fn bus_speed(&self) -> u32 {
        self.get_u32(map::BUS_SPEED)
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}
