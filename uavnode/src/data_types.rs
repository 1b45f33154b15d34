//! (De)serializable Rust representations of the UAVCAN v0 data types used by the node
//!
//! Only the message and service set of a sensor node is covered: node status broadcast,
//! dynamic node ID allocation and node info query.

pub mod allocation;
pub mod get_node_info;
pub mod node_status;

pub use allocation::Allocation;
pub use get_node_info::{GetNodeInfo, GetNodeInfoResponse, HardwareVersion, SoftwareVersion};
pub use node_status::{Health, Mode, NodeStatus};
