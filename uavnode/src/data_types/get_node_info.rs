use super::node_status::NodeStatus;
use crate::encoding as enc;
use crate::registers::UNIQUE_ID_LENGTH;

/// `uavcan.protocol.GetNodeInfo` service marker
///
/// The request is empty.
pub struct GetNodeInfo;

impl enc::DataType for GetNodeInfo {
    const ID: u16 = 1;
    const SIGNATURE: u64 = 0xee46_8a81_21c4_6a9e;
}

/// `uavcan.protocol.SoftwareVersion`
///
/// Fixed size 15 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftwareVersion {
    pub major: u8,
    pub minor: u8,
    /// Validity flags of `vcs_commit` and `image_crc`
    pub optional_field_flags: u8,
    pub vcs_commit: u32,
    pub image_crc: u64,
}

impl SoftwareVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self {
            major,
            minor,
            optional_field_flags: 0,
            vcs_commit: 0,
            image_crc: 0,
        }
    }
}

impl enc::Serialize for SoftwareVersion {
    fn size_bits(&self) -> usize {
        120
    }

    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u8(self.major);
        cursor.write_u8(self.minor);
        cursor.write_u8(self.optional_field_flags);
        cursor.write_u32(self.vcs_commit);
        cursor.write_u64(self.image_crc);
    }
}

/// `uavcan.protocol.HardwareVersion`
///
/// Variable size 19 bytes and more, the certificate of authenticity is always empty here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareVersion {
    pub major: u8,
    pub minor: u8,
    pub unique_id: [u8; UNIQUE_ID_LENGTH],
}

impl enc::Serialize for HardwareVersion {
    fn size_bits(&self) -> usize {
        8 * (2 + UNIQUE_ID_LENGTH + 1)
    }

    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u8(self.major);
        cursor.write_u8(self.minor);
        cursor.write_bytes(&self.unique_id);
        // certificate_of_authenticity length
        cursor.write_u8(0);
    }
}

/// `uavcan.protocol.GetNodeInfo` response
///
/// Layout: status `[0, 7)`, software version `[7, 22)`, hardware version `[22, 41)` with the
/// unique ID at `[24, 40)`, name from byte 41 to the end of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetNodeInfoResponse<'a> {
    pub status: NodeStatus,
    pub software_version: SoftwareVersion,
    pub hardware_version: HardwareVersion,
    /// `uint8[<=80]`, tail array
    pub name: &'a str,
}

impl GetNodeInfoResponse<'_> {
    pub const MAX_NAME_LENGTH: usize = 80;
    pub const NAME_OFFSET: usize = 41;
    pub const UNIQUE_ID_OFFSET: usize = 24;
    pub const MAX_SIZE_BYTES: usize = Self::NAME_OFFSET + Self::MAX_NAME_LENGTH;
}

impl enc::Serialize for GetNodeInfoResponse<'_> {
    fn size_bits(&self) -> usize {
        self.status.size_bits()
            + self.software_version.size_bits()
            + self.hardware_version.size_bits()
            + 8 * self.name.len()
    }

    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        self.status.serialize(cursor);
        self.software_version.serialize(cursor);
        self.hardware_version.serialize(cursor);
        cursor.write_bytes(self.name.as_bytes());
    }
}
