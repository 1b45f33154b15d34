use crate::core::{DataTypeId, NodeId, Priority, TransferId, TransferKind};
use crate::format::{CanId, SOT_TOGGLE_BIT, TailByte, TransferCrc};
use crate::frame::Frame;
use crate::pool::{BLOCK_SIZE, BlockIndex, Pool};
use crate::time::{Duration, Instant};

/// Largest payload a reassembly session accepts
pub const MAX_TRANSFER_PAYLOAD: usize = 4 * BLOCK_SIZE;

/// Concurrent reassembly sessions
pub const MAX_SESSIONS: usize = 16;

const BLOCKS_PER_SESSION: usize = MAX_TRANSFER_PAYLOAD / BLOCK_SIZE;

/// Completed inbound transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub kind: TransferKind,
    pub data_type: DataTypeId,
    pub priority: Priority,
    /// `None` for anonymous messages
    pub source: Option<NodeId>,
    pub destination: Option<NodeId>,
    pub transfer_id: TransferId,
    /// Reception time of the first frame
    pub timestamp: Instant,
    pub payload: heapless::Vec<u8, MAX_TRANSFER_PAYLOAD>,
}

impl Transfer {
    fn new(
        id: &CanId,
        transfer_id: TransferId,
        timestamp: Instant,
        payload: &[u8],
    ) -> Result<Self, RxError> {
        Ok(Self {
            kind: id.kind,
            data_type: id.data_type,
            priority: id.priority,
            source: id.source,
            destination: id.destination,
            transfer_id,
            timestamp,
            payload: heapless::Vec::from_slice(payload).map_err(|_| RxError::PayloadTooLong)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError {
    /// Frame without a tail byte
    EmptyFrame,
    AnonymousMultiFrame,
    /// Continuation frame without a running reassembly
    MissedStart,
    WrongTransferId,
    WrongToggle,
    /// First frame of a multi-frame transfer too short to hold the CRC
    ShortFirstFrame,
    CrcMismatch,
    PayloadTooLong,
    PoolExhausted,
    SessionsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionKey {
    kind: TransferKind,
    data_type: DataTypeId,
    source: NodeId,
}

struct Session {
    key: SessionKey,
    /// Expected transfer ID
    transfer_id: TransferId,
    next_toggle: bool,
    last_frame: Instant,
    sot_timestamp: Instant,
    crc: TransferCrc,
    expected_crc: u16,
    length: usize,
    /// Head block is held for the session lifetime
    blocks: heapless::Vec<BlockIndex, BLOCKS_PER_SESSION>,
}

impl Session {
    fn new(key: SessionKey, head: BlockIndex, transfer_id: TransferId, timestamp: Instant) -> Self {
        let mut blocks = heapless::Vec::new();
        unwrap!(blocks.push(head));
        Self {
            key,
            transfer_id,
            next_toggle: SOT_TOGGLE_BIT,
            last_frame: timestamp,
            sot_timestamp: timestamp,
            crc: TransferCrc::default(),
            expected_crc: 0,
            length: 0,
            blocks,
        }
    }

    fn accept_frame<const N: usize>(
        &mut self,
        pool: &mut Pool<N>,
        id: &CanId,
        tail: TailByte,
        payload: &[u8],
        timestamp: Instant,
        signature: u64,
        timeout: Duration,
    ) -> Result<Option<Transfer>, RxError> {
        let received = tail.transfer_id();
        let timed_out = timestamp.saturating_duration_since(self.last_frame) > timeout;
        // A start frame with the previous transfer ID is a duplicate, anything further away
        // begins a new transfer
        let not_previous = received.forward_distance(self.transfer_id) > 1;
        if timed_out || (tail.sot() && not_previous) {
            self.restart(pool, received);
            if !tail.sot() {
                self.transfer_id = self.transfer_id.next();
                return Err(RxError::MissedStart);
            }
        }

        if received != self.transfer_id {
            return Err(RxError::WrongTransferId);
        }
        if tail.toggle() != self.next_toggle {
            return Err(RxError::WrongToggle);
        }
        self.last_frame = timestamp;

        if tail.sot() && tail.eot() {
            let transfer = Transfer::new(id, received, timestamp, payload);
            self.finish(pool);
            return transfer.map(Some);
        }

        let data = if tail.sot() {
            let Some((crc, data)) = payload.split_first_chunk::<{ TransferCrc::LENGTH }>() else {
                self.finish(pool);
                return Err(RxError::ShortFirstFrame);
            };
            self.sot_timestamp = timestamp;
            self.expected_crc = u16::from_le_bytes(*crc);
            self.crc = TransferCrc::with_signature(signature);
            self.length = 0;
            data
        } else {
            payload
        };

        if let Err(err) = self.append(pool, data) {
            self.finish(pool);
            return Err(err);
        }
        self.next_toggle = !self.next_toggle;
        if !tail.eot() {
            return Ok(None);
        }

        let result = if self.crc.get() == self.expected_crc {
            Ok(Some(self.assemble(pool, id)))
        } else {
            Err(RxError::CrcMismatch)
        };
        self.finish(pool);
        result
    }

    fn append<const N: usize>(&mut self, pool: &mut Pool<N>, data: &[u8]) -> Result<(), RxError> {
        for &byte in data {
            if self.length >= MAX_TRANSFER_PAYLOAD {
                return Err(RxError::PayloadTooLong);
            }
            let block_number = self.length / BLOCK_SIZE;
            if block_number == self.blocks.len() {
                let block = pool.allocate().map_err(|_| RxError::PoolExhausted)?;
                unwrap!(self.blocks.push(block));
            }
            pool.block_mut(self.blocks[block_number])[self.length % BLOCK_SIZE] = byte;
            self.crc.add(byte);
            self.length += 1;
        }
        Ok(())
    }

    fn assemble<const N: usize>(&self, pool: &Pool<N>, id: &CanId) -> Transfer {
        let mut payload = heapless::Vec::new();
        for (number, block) in self.blocks.iter().enumerate() {
            let start = number * BLOCK_SIZE;
            if start >= self.length {
                break;
            }
            let end = core::cmp::min(self.length - start, BLOCK_SIZE);
            unwrap!(payload.extend_from_slice(&pool.block(*block)[..end]));
        }
        Transfer {
            kind: id.kind,
            data_type: id.data_type,
            priority: id.priority,
            source: id.source,
            destination: id.destination,
            transfer_id: self.transfer_id,
            timestamp: self.sot_timestamp,
            payload,
        }
    }

    fn release_tail<const N: usize>(&mut self, pool: &mut Pool<N>) {
        while self.blocks.len() > 1 {
            if let Some(block) = self.blocks.pop() {
                pool.release(block);
            }
        }
        self.length = 0;
        self.next_toggle = SOT_TOGGLE_BIT;
    }

    fn restart<const N: usize>(&mut self, pool: &mut Pool<N>, transfer_id: TransferId) {
        self.release_tail(pool);
        self.transfer_id = transfer_id;
    }

    /// Prepares for the next transfer of the session
    fn finish<const N: usize>(&mut self, pool: &mut Pool<N>) {
        self.release_tail(pool);
        self.transfer_id = self.transfer_id.next();
    }
}

/// Inbound reassembly sessions, one per (kind, data type, source)
pub struct RxSessions {
    sessions: heapless::Vec<Session, MAX_SESSIONS>,
    timeout: Duration,
}

impl RxSessions {
    pub const fn new(timeout: Duration) -> Self {
        Self {
            sessions: heapless::Vec::new(),
            timeout,
        }
    }

    /// Feeds one inbound frame
    ///
    /// Service frames addressed to another node and frames rejected by `accept` are dropped
    /// before any memory is taken. `accept` returns the data type signature of wanted
    /// transfers.
    pub fn push_frame<const N: usize>(
        &mut self,
        pool: &mut Pool<N>,
        frame: &Frame,
        timestamp: Instant,
        local: Option<NodeId>,
        accept: impl FnOnce(&CanId) -> Option<u64>,
    ) -> Result<Option<Transfer>, RxError> {
        let id = CanId::decode(frame.raw_id());
        let Some((&tail, payload)) = frame.data.split_last() else {
            return Err(RxError::EmptyFrame);
        };
        let tail = TailByte::from(tail);

        if id.kind.is_service() && (local.is_none() || id.destination != local) {
            return Ok(None);
        }
        let Some(signature) = accept(&id) else {
            return Ok(None);
        };

        let Some(source) = id.source else {
            if id.kind.is_service() {
                return Ok(None);
            }
            if !(tail.sot() && tail.eot()) {
                return Err(RxError::AnonymousMultiFrame);
            }
            return Transfer::new(&id, tail.transfer_id(), timestamp, payload).map(Some);
        };

        let key = SessionKey {
            kind: id.kind,
            data_type: id.data_type,
            source,
        };
        let index = match self.sessions.iter().position(|session| session.key == key) {
            Some(index) => index,
            None => {
                if !tail.sot() {
                    return Err(RxError::MissedStart);
                }
                let head = pool.allocate().map_err(|_| RxError::PoolExhausted)?;
                let session = Session::new(key, head, tail.transfer_id(), timestamp);
                if self.sessions.push(session).is_err() {
                    pool.release(head);
                    return Err(RxError::SessionsExhausted);
                }
                self.sessions.len() - 1
            }
        };

        self.sessions[index].accept_frame(
            pool,
            &id,
            tail,
            payload,
            timestamp,
            signature,
            self.timeout,
        )
    }

    /// Drops sessions idle for longer than the timeout, returns the number dropped
    pub fn cleanup_stale<const N: usize>(&mut self, pool: &mut Pool<N>, now: Instant) -> usize {
        let before = self.sessions.len();
        let timeout = self.timeout;
        self.sessions.retain(|session| {
            let stale = now.saturating_duration_since(session.last_frame) > timeout;
            if stale {
                session.blocks.iter().for_each(|&block| pool.release(block));
            }
            !stale
        });
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
