//! UAVCAN protocol core data types
//!
//! This crate provides the basic scalar definitions shared by the uavnode crates.
//! Users should not depend on this crate directly. Use the `uavnode::core` reexport instead.
#![no_std]

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Transfer priority
///
/// UAVCAN v0 encodes the priority as a 5-bit field at the top of the CAN ID, so the ordering
/// follows bus arbitration: a lower numerical value wins and is ordered first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(u8);

impl Priority {
    const MAX_VALUE: u8 = 0x1f;

    pub const HIGHEST: Priority = Priority(0);
    pub const HIGH: Priority = Priority(8);
    /// Default for regular traffic.
    pub const MEDIUM: Priority = Priority(16);
    /// Used by the dynamic node ID allocation requests.
    pub const LOW: Priority = Priority(24);
    /// Used by the periodic node status broadcast.
    pub const LOWEST: Priority = Priority(Self::MAX_VALUE);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for Priority {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Address of a node on the bus
///
/// Only unicast addresses 1..=127 are representable. The broadcast address (0 on the wire)
/// means "no address" and is modelled as `Option::<NodeId>::None`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(u8);

impl NodeId {
    /// Wire value of the broadcast (unset) address
    pub const BROADCAST_VALUE: u8 = 0;
    const MIN_VALUE: u8 = 1;
    const MAX_VALUE: u8 = 0x7f;
    pub const MIN: NodeId = NodeId(Self::MIN_VALUE);
    pub const MAX: NodeId = NodeId(Self::MAX_VALUE);

    pub const fn new(value: u8) -> Option<Self> {
        if value >= Self::MIN_VALUE && value <= Self::MAX_VALUE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }

    /// Wire encoding of an optional address
    pub const fn to_wire(node: Option<NodeId>) -> u8 {
        match node {
            Some(node) => node.0,
            None => Self::BROADCAST_VALUE,
        }
    }

    /// Decodes a 7-bit wire address, mapping the broadcast value to `None`
    pub const fn from_wire(value: u8) -> Option<NodeId> {
        Self::new(value & Self::MAX_VALUE)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.into_u8()
    }
}

impl From<NodeId> for usize {
    fn from(value: NodeId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for NodeId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

/// Data type identifier
///
/// Message types use the full 16-bit range, service types are limited to 8 bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataTypeId(u16);

impl DataTypeId {
    pub const MAX_SERVICE: DataTypeId = DataTypeId(0xff);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn into_u16(self) -> u16 {
        self.0
    }

    pub const fn is_valid_service(self) -> bool {
        self.0 <= Self::MAX_SERVICE.0
    }
}

impl From<DataTypeId> for u16 {
    fn from(value: DataTypeId) -> Self {
        value.into_u16()
    }
}

impl From<u16> for DataTypeId {
    fn from(value: u16) -> Self {
        Self::new(value)
    }
}

/// Kind of a transfer, encoded in the CAN ID
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferKind {
    Broadcast,
    Request,
    Response,
}

impl TransferKind {
    pub const fn is_service(self) -> bool {
        !matches!(self, TransferKind::Broadcast)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferId(u8);

impl TransferId {
    const MAX_VALUE: u8 = 0x1f;
    pub const MAX: TransferId = TransferId(Self::MAX_VALUE);

    /// TransferId of the first transfer in the session
    pub const SESSION_START: TransferId = TransferId(0);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Self {
        Self((self.0 + 1) & Self::MAX.0)
    }

    /// Number of increments needed to get from `self` to `other`
    pub fn forward_distance(self, other: TransferId) -> u8 {
        other.0.wrapping_sub(self.0) & Self::MAX_VALUE
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::SESSION_START
    }
}

impl From<TransferId> for u8 {
    fn from(value: TransferId) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for TransferId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::HIGHEST < Priority::HIGH);
        assert!(Priority::LOW < Priority::LOWEST);
        assert_eq!(Priority::LOWEST.into_u8(), 31);
        assert!(Priority::new(32).is_none());
    }

    #[test]
    fn test_node_id_range() {
        assert!(NodeId::new(0).is_none());
        assert_eq!(NodeId::new(1), Some(NodeId::MIN));
        assert_eq!(NodeId::new(127), Some(NodeId::MAX));
        assert!(NodeId::new(128).is_none());
    }

    #[test]
    fn test_node_id_wire() {
        assert_eq!(NodeId::to_wire(None), 0);
        assert_eq!(NodeId::to_wire(NodeId::new(42)), 42);
        assert_eq!(NodeId::from_wire(0), None);
        assert_eq!(NodeId::from_wire(0x80 | 5), NodeId::new(5));
    }

    #[test]
    fn test_transfer_id_wraps() {
        assert_eq!(TransferId::MAX.next(), TransferId::SESSION_START);
        let tid = TransferId::from_u8_truncating(30);
        assert_eq!(tid.forward_distance(TransferId::from_u8_truncating(1)), 3);
        assert_eq!(tid.forward_distance(tid), 0);
    }

    #[test]
    fn test_service_type_range() {
        assert!(DataTypeId::new(1).is_valid_service());
        assert!(!DataTypeId::new(341).is_valid_service());
    }
}
