//! CAN frame object

use embedded_can::{ExtendedId, Id};

/// Classic CAN maximum transmission unit
pub const MTU: usize = 8;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidLength;

/// Classic CAN data vector, up to 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    length: u8,
    bytes: [u8; MTU],
}

impl Data {
    /// Creates a new vector from a slice of compatible length.
    pub fn new(data: &[u8]) -> Result<Self, InvalidLength> {
        if data.len() > MTU {
            return Err(InvalidLength);
        }
        let mut bytes = [0; MTU];
        bytes[..data.len()].copy_from_slice(data);

        Ok(Self {
            length: data.len() as u8,
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        usize::from(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl core::ops::Deref for Data {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..usize::from(self.length)]
    }
}

impl core::ops::DerefMut for Data {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes[..usize::from(self.length)]
    }
}

/// Extended (29-bit) data frame
///
/// UAVCAN uses extended data frames only, so standard and remote frames are not
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    id: u32,
    pub data: Data,
}

impl Frame {
    pub fn new_extended(id: u32, data: &[u8]) -> Option<Self> {
        let id = ExtendedId::new(id)?;
        let data = Data::new(data).ok()?;
        Some(Self {
            id: id.as_raw(),
            data,
        })
    }

    /// Raw 29-bit CAN ID
    pub fn raw_id(&self) -> u32 {
        self.id
    }

    /// Converts any `embedded_can` frame, rejecting standard and remote frames
    pub fn from_can<F: embedded_can::Frame>(frame: &F) -> Option<Self> {
        if frame.is_remote_frame() {
            return None;
        }
        match frame.id() {
            Id::Extended(id) => Self::new_extended(id.as_raw(), frame.data()),
            Id::Standard(_) => None,
        }
    }

    /// Converts into a driver-specific `embedded_can` frame
    pub fn to_can<F: embedded_can::Frame>(&self) -> Option<F> {
        let id = ExtendedId::new(self.id)?;
        F::new(id, &self.data)
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Extended(id) => Self::new_extended(id.as_raw(), data),
            Id::Standard(_) => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        // The constructor validated the range
        Id::Extended(ExtendedId::new(self.id).unwrap_or(ExtendedId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
