use core::cmp::{max, min};

use crate::core::TransferId;
use crate::format::{CanId, FRAME_PAYLOAD, PAD_VALUE, SOT_TOGGLE_BIT, TailByte, TransferCrc};
use crate::frame::{Data, Frame, MTU};
use crate::pool::{Block, BlockIndex, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// Not enough free blocks for every frame of the transfer
    PoolExhausted,
    /// Anonymous transfers must fit a single frame
    AnonymousMultiFrame,
    /// Service type IDs are limited to 8 bits
    InvalidDataType,
}

/// Splits a transfer payload into frame data vectors
///
/// Multi-frame transfers are prefixed with the transfer CRC (little-endian), the stream is
/// cut into `FRAME_PAYLOAD` chunks, each followed by the tail byte. The last frame is not
/// padded.
pub struct Scatter<'a> {
    payload: &'a [u8],
    transfer_id: TransferId,
    toggle_bit: bool,
    crc: Option<[u8; TransferCrc::LENGTH]>,
    offset: usize,
    started: bool,
}

impl<'a> Scatter<'a> {
    pub fn new(transfer_id: TransferId, payload: &'a [u8], signature: u64) -> Self {
        let crc = (payload.len() > FRAME_PAYLOAD).then(|| {
            let mut crc = TransferCrc::with_signature(signature);
            crc.add_bytes(payload);
            crc.get().to_le_bytes()
        });
        Self {
            payload,
            transfer_id,
            toggle_bit: SOT_TOGGLE_BIT,
            crc,
            offset: 0,
            started: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        max(1, self.stream_length().div_ceil(FRAME_PAYLOAD))
    }

    fn stream_length(&self) -> usize {
        self.payload.len() + self.crc.map_or(0, |crc| crc.len())
    }

    fn stream_byte(&self, index: usize) -> u8 {
        match self.crc {
            Some(crc) if index < crc.len() => crc[index],
            Some(crc) => self.payload[index - crc.len()],
            None => self.payload[index],
        }
    }
}

impl Iterator for Scatter<'_> {
    type Item = Data;

    fn next(&mut self) -> Option<Data> {
        let stream_length = self.stream_length();
        if self.started && self.offset >= stream_length {
            return None;
        }

        let sot = !self.started;
        let chunk = min(FRAME_PAYLOAD, stream_length - self.offset);
        let mut bytes = [PAD_VALUE; MTU];
        for (i, byte) in bytes[..chunk].iter_mut().enumerate() {
            *byte = self.stream_byte(self.offset + i);
        }
        self.offset += chunk;

        let eot = self.offset == stream_length;
        bytes[chunk] = TailByte::new(sot, eot, self.toggle_bit, self.transfer_id).into();
        self.toggle_bit = !self.toggle_bit;
        self.started = true;

        Data::new(&bytes[..chunk + 1]).ok()
    }
}

const ID_LENGTH: usize = 4;

fn store_frame(block: &mut Block, id: u32, data: &[u8]) {
    let (id_bytes, rest) = block.split_at_mut(ID_LENGTH);
    id_bytes.copy_from_slice(&id.to_le_bytes());
    rest[0] = data.len() as u8;
    rest[1..1 + data.len()].copy_from_slice(data);
}

fn load_frame(block: &Block) -> Option<Frame> {
    let id = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
    let length = usize::from(block[ID_LENGTH]);
    let data = block.get(ID_LENGTH + 1..ID_LENGTH + 1 + length)?;
    Frame::new_extended(id, data)
}

/// Outbound frame FIFO
///
/// Every queued frame occupies one pool block. Frames leave the queue in submission
/// order; there is no priority reordering.
pub struct TxQueue<const N: usize> {
    frames: heapless::Deque<BlockIndex, N>,
}

impl<const N: usize> TxQueue<N> {
    pub const fn new() -> Self {
        Self {
            frames: heapless::Deque::new(),
        }
    }

    /// Enqueues every frame of a transfer or none of them
    pub fn push(
        &mut self,
        pool: &mut Pool<N>,
        id: &CanId,
        transfer_id: TransferId,
        signature: u64,
        payload: &[u8],
    ) -> Result<usize, TxError> {
        if id.source.is_none() && payload.len() > FRAME_PAYLOAD {
            return Err(TxError::AnonymousMultiFrame);
        }
        if id.kind.is_service() && !id.data_type.is_valid_service() {
            return Err(TxError::InvalidDataType);
        }

        let raw_id = id.encode(payload);
        let scatter = Scatter::new(transfer_id, payload, signature);
        let frame_count = scatter.frame_count();
        let queue_room = self.frames.capacity() - self.frames.len();
        if frame_count > pool.available() || frame_count > queue_room {
            return Err(TxError::PoolExhausted);
        }

        for data in scatter {
            let block = unwrap!(pool.allocate());
            store_frame(pool.block_mut(block), raw_id, &data);
            unwrap!(self.frames.push_back(block));
        }
        Ok(frame_count)
    }

    pub fn peek(&self, pool: &Pool<N>) -> Option<Frame> {
        let block = *self.frames.front()?;
        load_frame(pool.block(block))
    }

    /// Removes the head frame and returns its block to the pool
    pub fn pop(&mut self, pool: &mut Pool<N>) {
        if let Some(block) = self.frames.pop_front() {
            pool.release(block);
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<const N: usize> Default for TxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
