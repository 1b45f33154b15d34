use crate::encoding as enc;
use crate::registers::UNIQUE_ID_LENGTH;

/// `uavcan.protocol.dynamic_node_id.Allocation`
///
/// Variable size 1 to 17 bytes
///
/// Dynamic node ID allocation exchange. Allocatees broadcast requests anonymously with up to
/// [`Self::MAX_LENGTH_OF_UNIQUE_ID_IN_REQUEST`] unique ID bytes per request; the allocator
/// answers with the unique ID prefix confirmed so far and, once the whole unique ID is
/// confirmed, the assigned node ID.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Allocation {
    /// Requested node ID in requests, allocated node ID in the final response.
    /// 0 means "any".
    ///
    /// `uint7`
    pub node_id: u8,
    /// Set in the first request of an allocation round
    ///
    /// `bool`
    pub first_part_of_unique_id: bool,
    /// `uint8[<=16]`, tail array
    pub unique_id: heapless::Vec<u8, UNIQUE_ID_LENGTH>,
}

impl Allocation {
    pub const MAX_LENGTH_OF_UNIQUE_ID_IN_REQUEST: usize = 6;
    pub const MAX_SIZE_BYTES: usize = 1 + UNIQUE_ID_LENGTH;
}

impl enc::DataType for Allocation {
    const ID: u16 = 1;
    const SIGNATURE: u64 = 0x0b2a_8126_20a1_1d40;
}

impl enc::Serialize for Allocation {
    fn size_bits(&self) -> usize {
        8 + 8 * self.unique_id.len()
    }

    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_u7(self.node_id);
        cursor.write_bool(self.first_part_of_unique_id);
        cursor.write_bytes(&self.unique_id);
    }
}

impl enc::Deserialize for Allocation {
    fn deserialize(cursor: &mut enc::ReadCursor<'_>) -> Result<Self, enc::DeserializeError> {
        if cursor.remaining_bytes() == 0 {
            return Err(enc::DeserializeError::Truncated);
        }
        let node_id = cursor.read_u7();
        let first_part_of_unique_id = cursor.read_bool();

        let length = cursor.remaining_bytes();
        if length > UNIQUE_ID_LENGTH {
            return Err(enc::DeserializeError::Range);
        }
        let mut unique_id = heapless::Vec::new();
        unwrap!(unique_id.resize_default(length));
        cursor.read_bytes(&mut unique_id);

        Ok(Self {
            node_id,
            first_part_of_unique_id,
            unique_id,
        })
    }
}
