use crate::core::{DataTypeId, NodeId, Priority, TransferId, TransferKind};

/// CRC-16/CCITT-FALSE used for multi-frame transfers and anonymous discriminators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCrc(u16);

impl Default for TransferCrc {
    fn default() -> Self {
        Self(Self::INIT_VALUE)
    }
}

impl TransferCrc {
    pub const LENGTH: usize = 2;
    const INIT_VALUE: u16 = 0xffff;
    const POLYNOMIAL: u16 = 0x1021;

    /// Multi-frame transfer CRC is seeded with the data type signature
    pub fn with_signature(signature: u64) -> Self {
        let mut crc = Self::default();
        crc.add_bytes(&signature.to_le_bytes());
        crc
    }

    pub fn add(&mut self, byte: u8) {
        self.0 ^= u16::from(byte) << 8;
        for _bit in 0..8 {
            if (self.0 & 0x8000) != 0 {
                self.0 = (self.0 << 1) ^ Self::POLYNOMIAL;
            } else {
                self.0 <<= 1;
            }
        }
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|&byte| self.add(byte));
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl From<u16> for TransferCrc {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailByte(u8);

impl TailByte {
    const START_OF_TRANSFER: u8 = 7;
    const END_OF_TRANSFER: u8 = 6;
    const TOGGLE_BIT: u8 = 5;
    const TRANSFER_ID: u8 = 0;

    pub fn new(sot: bool, eot: bool, toggle: bool, transfer_id: TransferId) -> Self {
        Self(
            (sot as u8) << Self::START_OF_TRANSFER
                | (eot as u8) << Self::END_OF_TRANSFER
                | (toggle as u8) << Self::TOGGLE_BIT
                | u8::from(transfer_id) << Self::TRANSFER_ID,
        )
    }

    pub fn sot(&self) -> bool {
        (self.0 >> Self::START_OF_TRANSFER) & 0x1 != 0
    }

    pub fn eot(&self) -> bool {
        (self.0 >> Self::END_OF_TRANSFER) & 0x1 != 0
    }

    pub fn toggle(&self) -> bool {
        (self.0 >> Self::TOGGLE_BIT) & 0x1 != 0
    }

    pub fn transfer_id(&self) -> TransferId {
        TransferId::from_u8_truncating(self.0 >> Self::TRANSFER_ID)
    }
}

impl From<TailByte> for u8 {
    fn from(value: TailByte) -> Self {
        value.0
    }
}

impl From<u8> for TailByte {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Toggle bit value for start-of-transfer frame
pub const SOT_TOGGLE_BIT: bool = false;

pub const PAD_VALUE: u8 = 0;

/// Payload bytes per frame after the tail byte
pub const FRAME_PAYLOAD: usize = crate::frame::MTU - 1;

/// Decoded 29-bit CAN ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanId {
    pub priority: Priority,
    pub kind: TransferKind,
    pub data_type: DataTypeId,
    pub source: Option<NodeId>,
    pub destination: Option<NodeId>,
}

impl CanId {
    const PRIORITY_SHIFT: u32 = 24;
    const MESSAGE_TYPE_SHIFT: u32 = 8;
    const SERVICE_TYPE_SHIFT: u32 = 16;
    const REQUEST_BIT: u32 = 15;
    const DESTINATION_SHIFT: u32 = 8;
    const SERVICE_BIT: u32 = 7;
    /// Bits 23..10 carry CRC bits 14..1
    const DISCRIMINATOR_SHIFT: u32 = 9;
    const DISCRIMINATOR_MASK: u16 = 0x7ffe;
    /// Anonymous messages carry only the two lowest bits of the type ID
    pub const ANONYMOUS_TYPE_MASK: u16 = 0x3;

    /// Encodes the ID. `payload` is hashed into the discriminator of anonymous messages.
    pub fn encode(&self, payload: &[u8]) -> u32 {
        let priority = u32::from(self.priority.into_u8()) << Self::PRIORITY_SHIFT;
        let source = u32::from(NodeId::to_wire(self.source));
        let type_id = u32::from(self.data_type.into_u16());
        let id = match self.kind {
            TransferKind::Broadcast if self.source.is_some() => {
                priority | type_id << Self::MESSAGE_TYPE_SHIFT
            }
            TransferKind::Broadcast => {
                let mut crc = TransferCrc::default();
                crc.add_bytes(payload);
                let discriminator = u32::from(crc.get() & Self::DISCRIMINATOR_MASK);
                let type_id = type_id & u32::from(Self::ANONYMOUS_TYPE_MASK);
                priority
                    | discriminator << Self::DISCRIMINATOR_SHIFT
                    | type_id << Self::MESSAGE_TYPE_SHIFT
            }
            TransferKind::Request | TransferKind::Response => {
                let request = matches!(self.kind, TransferKind::Request) as u32;
                let destination = u32::from(NodeId::to_wire(self.destination));
                priority
                    | (type_id & 0xff) << Self::SERVICE_TYPE_SHIFT
                    | request << Self::REQUEST_BIT
                    | destination << Self::DESTINATION_SHIFT
                    | 1 << Self::SERVICE_BIT
            }
        };
        id | source
    }

    pub fn decode(raw: u32) -> Self {
        let priority = Priority::from_u8_truncating((raw >> Self::PRIORITY_SHIFT) as u8);
        let source = NodeId::from_wire(raw as u8);
        if (raw >> Self::SERVICE_BIT) & 0x1 == 0 {
            let type_id = (raw >> Self::MESSAGE_TYPE_SHIFT) as u16;
            let type_id = match source {
                Some(_) => type_id,
                None => type_id & Self::ANONYMOUS_TYPE_MASK,
            };
            Self {
                priority,
                kind: TransferKind::Broadcast,
                data_type: DataTypeId::new(type_id),
                source,
                destination: None,
            }
        } else {
            let kind = if (raw >> Self::REQUEST_BIT) & 0x1 != 0 {
                TransferKind::Request
            } else {
                TransferKind::Response
            };
            Self {
                priority,
                kind,
                data_type: DataTypeId::new(((raw >> Self::SERVICE_TYPE_SHIFT) & 0xff) as u16),
                source,
                destination: NodeId::from_wire((raw >> Self::DESTINATION_SHIFT) as u8),
            }
        }
    }
}
