#![allow(dead_code)]

use embedded_can::ErrorKind;
use embedded_can::nb::Can;
use std::collections::VecDeque;
use std::vec::Vec;
use uavnode::core::{DataTypeId, NodeId, Priority, TransferId};
use uavnode::driver::{Indicator, NonVolatile};
use uavnode::frame::Frame;
use uavnode::registers::{FACTORY_IMAGE, PERSISTED_BYTES};
use uavnode::time::{Duration, Instant};
use uavnode::transport::{Transfer, Transport};

/// CAN controller double: records transmitted frames and serves queued inbound ones
#[derive(Debug, Default)]
pub struct MockBus {
    /// Transmit results in call order, `Ok` once exhausted
    pub tx_script: VecDeque<nb::Result<(), ErrorKind>>,
    pub sent: Vec<Frame>,
    pub inbox: VecDeque<Frame>,
}

impl Can for MockBus {
    type Frame = Frame;
    type Error = ErrorKind;

    fn transmit(&mut self, frame: &Frame) -> nb::Result<Option<Frame>, ErrorKind> {
        self.tx_script.pop_front().unwrap_or(Ok(()))?;
        self.sent.push(*frame);
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<Frame, ErrorKind> {
        self.inbox.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Lamp recording every state it was set to
#[derive(Debug, Default)]
pub struct Lamp(pub Vec<bool>);

impl Indicator for Lamp {
    fn set(&mut self, on: bool) {
        self.0.push(on);
    }
}

/// EEPROM double holding the persisted register image
#[derive(Debug)]
pub struct MemoryStorage {
    pub bytes: [u8; PERSISTED_BYTES],
    pub broken: bool,
}

impl MemoryStorage {
    pub fn new(bytes: [u8; PERSISTED_BYTES]) -> Self {
        Self {
            bytes,
            broken: false,
        }
    }

    pub fn factory() -> Self {
        Self::new(FACTORY_IMAGE)
    }
}

#[derive(Debug)]
pub struct StorageFailure;

impl NonVolatile for MemoryStorage {
    type Error = StorageFailure;

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageFailure> {
        if self.broken {
            return Err(StorageFailure);
        }
        let source = self.bytes.get(offset..offset + buffer.len()).ok_or(StorageFailure)?;
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageFailure> {
        if self.broken {
            return Err(StorageFailure);
        }
        let target = self
            .bytes
            .get_mut(offset..offset + data.len())
            .ok_or(StorageFailure)?;
        target.copy_from_slice(data);
        Ok(())
    }
}

/// Segments a message transfer from another node into frames
pub fn message_frames(
    source: Option<u8>,
    data_type: u16,
    signature: u64,
    transfer_id: u8,
    payload: &[u8],
) -> Vec<Frame> {
    let mut transport = Transport::<16>::new(Duration::from_secs(2));
    transport
        .broadcast(
            source.and_then(NodeId::new),
            Priority::LOW,
            DataTypeId::new(data_type),
            signature,
            TransferId::new(transfer_id).unwrap(),
            payload,
        )
        .unwrap();
    let mut frames = Vec::new();
    while let Some(frame) = transport.peek_tx() {
        frames.push(frame);
        transport.pop_tx();
    }
    frames
}

/// Reassembles frames sent by the node as seen by `observer`
pub fn reassemble(frames: &[Frame], observer: Option<u8>, signature: u64) -> Vec<Transfer> {
    let mut transport = Transport::<16>::new(Duration::from_secs(2));
    let observer = observer.and_then(NodeId::new);
    frames
        .iter()
        .filter_map(|frame| {
            transport
                .push_rx_frame(frame, Instant::from_millis(0), observer, |_| Some(signature))
                .unwrap()
        })
        .collect()
}
