//! UAVCAN v0 transfer layer
//!
//! The transport owns the block pool and shares it between inbound reassembly sessions and
//! the outbound frame queue. Pool statistics therefore reflect both directions.

pub mod rx;
pub mod tx;

use crate::core::{DataTypeId, NodeId, Priority, TransferId, TransferKind};
use crate::format::CanId;
use crate::frame::Frame;
use crate::pool::{DEFAULT_BLOCK_COUNT, Pool, PoolStatistics};
use crate::time::{Duration, Instant};

pub use rx::{RxError, Transfer};
pub use tx::TxError;

pub struct Transport<const N: usize = DEFAULT_BLOCK_COUNT> {
    pool: Pool<N>,
    rx: rx::RxSessions,
    tx: tx::TxQueue<N>,
}

impl<const N: usize> Transport<N> {
    pub fn new(transfer_timeout: Duration) -> Self {
        Self {
            pool: Pool::new(),
            rx: rx::RxSessions::new(transfer_timeout),
            tx: tx::TxQueue::new(),
        }
    }

    /// Queues a message transfer; `source == None` sends it anonymously
    pub fn broadcast(
        &mut self,
        source: Option<NodeId>,
        priority: Priority,
        data_type: DataTypeId,
        signature: u64,
        transfer_id: TransferId,
        payload: &[u8],
    ) -> Result<usize, TxError> {
        let id = CanId {
            priority,
            kind: TransferKind::Broadcast,
            data_type,
            source,
            destination: None,
        };
        self.tx
            .push(&mut self.pool, &id, transfer_id, signature, payload)
    }

    /// Queues a service response to `request`
    pub fn respond(
        &mut self,
        source: NodeId,
        request: &Transfer,
        signature: u64,
        payload: &[u8],
    ) -> Result<usize, TxError> {
        let id = CanId {
            priority: request.priority,
            kind: TransferKind::Response,
            data_type: request.data_type,
            source: Some(source),
            destination: request.source,
        };
        self.tx
            .push(&mut self.pool, &id, request.transfer_id, signature, payload)
    }

    /// Head of the outbound queue
    pub fn peek_tx(&self) -> Option<Frame> {
        self.tx.peek(&self.pool)
    }

    pub fn pop_tx(&mut self) {
        self.tx.pop(&mut self.pool);
    }

    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    pub fn push_rx_frame(
        &mut self,
        frame: &Frame,
        timestamp: Instant,
        local: Option<NodeId>,
        accept: impl FnOnce(&CanId) -> Option<u64>,
    ) -> Result<Option<Transfer>, RxError> {
        self.rx
            .push_frame(&mut self.pool, frame, timestamp, local, accept)
    }

    /// Purges reassembly sessions idle for longer than the transfer timeout
    pub fn cleanup_stale(&mut self, now: Instant) -> usize {
        self.rx.cleanup_stale(&mut self.pool, now)
    }

    pub fn rx_sessions(&self) -> usize {
        self.rx.len()
    }

    pub fn pool_statistics(&self) -> PoolStatistics {
        self.pool.statistics()
    }

    pub fn reset_pool_peak(&mut self) {
        self.pool.reset_peak();
    }
}
