use crate::encoding as enc;

/// `uavcan.protocol.NodeStatus`
///
/// Fixed size 7 bytes
///
/// Abstract node status information. Every node with a node ID publishes this message
/// periodically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeStatus {
    /// \[second\]
    ///
    /// `uint32`
    pub uptime_sec: u32,
    /// `uint2`
    pub health: Health,
    /// `uint3`
    pub mode: Mode,
    /// `uint3`, reserved, zero
    pub sub_mode: u8,
    /// `uint16`
    pub vendor_specific_status_code: u16,
}

impl NodeStatus {
    pub const SIZE_BYTES: usize = 7;

    /// \[second\]
    pub const MAX_BROADCASTING_PERIOD: u16 = 1;
}

impl enc::DataType for NodeStatus {
    const ID: u16 = 341;
    const SIGNATURE: u64 = 0x0f08_68d0_c1a7_c6f1;
}

impl enc::Serialize for NodeStatus {
    fn size_bits(&self) -> usize {
        56
    }

    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u32(self.uptime_sec);
        cursor.write_u2(self.health.into_u8());
        cursor.write_u3(self.mode.into_u8());
        cursor.write_u3(self.sub_mode);
        cursor.write_u16(self.vendor_specific_status_code);
    }
}

impl enc::Deserialize for NodeStatus {
    fn deserialize(cursor: &mut enc::ReadCursor<'_>) -> Result<Self, enc::DeserializeError> {
        if cursor.remaining_bytes() < Self::SIZE_BYTES {
            return Err(enc::DeserializeError::Truncated);
        }
        Ok(Self {
            uptime_sec: cursor.read_u32(),
            health: Health::from_u8_truncating(cursor.read_u2()),
            mode: Mode::new(cursor.read_u3()).ok_or(enc::DeserializeError::Range)?,
            sub_mode: cursor.read_u3(),
            vendor_specific_status_code: cursor.read_u16(),
        })
    }
}

/// Abstract node health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Health {
    /// The node is functioning properly
    Ok,
    /// A critical parameter went out of range or the node encountered a minor failure
    Warning,
    /// The node encountered a major failure
    Error,
    /// The node suffered a fatal malfunction
    Critical,
}

impl Health {
    pub const fn from_u8_truncating(value: u8) -> Self {
        match value & 0x3 {
            0 => Health::Ok,
            1 => Health::Warning,
            2 => Health::Error,
            _ => Health::Critical,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

/// Operating mode of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Operational = 0,
    /// Entered immediately after startup
    Initialization = 1,
    /// Calibration, self-test, etc.
    Maintenance = 2,
    SoftwareUpdate = 3,
    Offline = 7,
}

impl Mode {
    pub const fn new(value: u8) -> Option<Self> {
        match value {
            0 => Some(Mode::Operational),
            1 => Some(Mode::Initialization),
            2 => Some(Mode::Maintenance),
            3 => Some(Mode::SoftwareUpdate),
            7 => Some(Mode::Offline),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}
