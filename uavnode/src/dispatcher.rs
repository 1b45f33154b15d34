//! Transfer acceptance and routing
//!
//! Until the node has an ID it listens to allocation messages only. Afterwards it serves
//! GetNodeInfo requests only. Everything else is rejected before reassembly.

use crate::allocator::NodeIdentityAllocator;
use crate::context::Context;
use crate::core::{NodeId, TransferKind};
use crate::data_types::{Allocation, GetNodeInfo, GetNodeInfoResponse, HardwareVersion};
use crate::encoding::{DataType, Serialize};
use crate::fault::Fault;
use crate::format::CanId;
use crate::time::Instant;
use crate::transport::Transfer;

/// What a handled transfer resulted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handled {
    /// Allocation message processed, no ID yet
    Allocation,
    /// Allocation completed and the ID committed
    Allocated(NodeId),
    /// GetNodeInfo response queued (or dropped on queue failure)
    NodeInfo,
    Ignored,
}

/// Acceptance filter, returns the data type signature of wanted transfers
pub fn accept(local: Option<NodeId>, id: &CanId) -> Option<u64> {
    let data_type = id.data_type.into_u16();
    match (local, id.kind) {
        (None, TransferKind::Broadcast) if data_type == Allocation::ID => {
            Some(Allocation::SIGNATURE)
        }
        (Some(_), TransferKind::Request) if data_type == GetNodeInfo::ID => {
            Some(GetNodeInfo::SIGNATURE)
        }
        _ => None,
    }
}

/// Routes a completed transfer
///
/// `allocator` is `None` once the node has an ID.
pub fn handle<const N: usize>(
    context: &mut Context<N>,
    allocator: Option<&mut NodeIdentityAllocator>,
    transfer: &Transfer,
    now: Instant,
) -> Result<Handled, Fault> {
    let data_type = transfer.data_type.into_u16();
    match (context.local_node_id(), transfer.kind) {
        (None, TransferKind::Broadcast) if data_type == Allocation::ID => {
            let Some(allocator) = allocator else {
                return Ok(Handled::Ignored);
            };
            match allocator.handle_response(transfer, now)? {
                Some(node_id) => {
                    context.commit_node_id(node_id);
                    Ok(Handled::Allocated(node_id))
                }
                None => Ok(Handled::Allocation),
            }
        }
        (Some(local), TransferKind::Request) if data_type == GetNodeInfo::ID => {
            respond_node_info(context, local, transfer, now);
            Ok(Handled::NodeInfo)
        }
        _ => Ok(Handled::Ignored),
    }
}

fn respond_node_info<const N: usize>(
    context: &mut Context<N>,
    local: NodeId,
    request: &Transfer,
    now: Instant,
) {
    let response = GetNodeInfoResponse {
        status: context.node_status(now),
        software_version: context.config.software_version,
        hardware_version: HardwareVersion {
            major: 0,
            minor: 0,
            unique_id: context.registers.unique_id(),
        },
        name: context.config.node_name,
    };

    let mut buffer = [0; GetNodeInfoResponse::MAX_SIZE_BYTES];
    let Some(payload) = response.serialize_to_slice(&mut buffer) else {
        error!("Node name exceeds {} bytes", GetNodeInfoResponse::MAX_NAME_LENGTH);
        return;
    };
    match context
        .transport
        .respond(local, request, GetNodeInfo::SIGNATURE, payload)
    {
        Ok(frames) => trace!("GetNodeInfo response queued, {} frames", frames),
        Err(err) => warn!("Could not respond to GetNodeInfo; error {:?}", err),
    }
}
