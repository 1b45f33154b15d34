mod common;

use common::{Lamp, MemoryStorage, MockBus, message_frames};
use std::vec::Vec;
use uavnode::config::Config;
use uavnode::core::{DataTypeId, NodeId, Priority, TransferKind};
use uavnode::data_types::Allocation;
use uavnode::driver::NoIndicator;
use uavnode::encoding::DataType;
use uavnode::fault::Fault;
use uavnode::format::CanId;
use uavnode::frame::Frame;
use uavnode::node::{Node, Phase};
use uavnode::pump::FramePump;
use uavnode::registers::map;
use uavnode::scheduler::Ticks;
use uavnode::time::Instant;

const ALLOCATOR: u8 = 10;
// Unique ID of the factory register image
const UNIQUE_ID: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

type TestNode = Node<MockBus, Lamp, NoIndicator>;

fn boot(storage: &mut MemoryStorage) -> TestNode {
    let pump = FramePump::with_indicators(MockBus::default(), Lamp::default(), NoIndicator);
    Node::boot(Config::default(), storage, pump, Instant::from_millis(0))
}

fn take_sent(node: &mut TestNode) -> Vec<Frame> {
    std::mem::take(&mut node.pump_mut().can_mut().sent)
}

fn at(millis: u64) -> Instant {
    Instant::from_millis(millis)
}

/// Allocator message confirming `length` bytes of the unique ID
fn response(transfer_id: u8, node_id: u8, length: usize) -> Vec<Frame> {
    let mut payload = std::vec![node_id << 1];
    payload.extend_from_slice(&UNIQUE_ID[..length]);
    message_frames(
        Some(ALLOCATOR),
        Allocation::ID,
        Allocation::SIGNATURE,
        transfer_id,
        &payload,
    )
}

/// Polls until every inbound frame is consumed
fn deliver(node: &mut TestNode, frames: Vec<Frame>, now: Instant) -> Phase {
    let count = frames.len();
    node.pump_mut().can_mut().inbox.extend(frames);
    let mut phase = node.phase();
    for _ in 0..count {
        phase = node.poll(Ticks::NONE, now);
    }
    phase
}

fn assert_request(frame: &Frame, data: &[u8]) {
    let id = CanId::decode(frame.raw_id());
    assert_eq!(id.kind, TransferKind::Broadcast);
    assert_eq!(id.source, None);
    assert_eq!(id.priority, Priority::LOW);
    assert_eq!(id.data_type, DataTypeId::new(Allocation::ID));
    assert_eq!(&frame.data[..], data);
}

#[test]
fn test_dynamic_allocation() {
    let mut storage = MemoryStorage::factory();
    let mut node = boot(&mut storage);
    assert_eq!(node.poll(Ticks::NONE, at(0)), Phase::Allocating);
    assert!(take_sent(&mut node).is_empty());

    node.poll(Ticks::NONE, at(1000));
    let sent = take_sent(&mut node);
    assert_eq!(sent.len(), 1);
    assert_request(&sent[0], &[0x01, 0, 1, 2, 3, 4, 5, 0xc0]);

    // First six bytes confirmed, the next request follows within the random range
    deliver(&mut node, response(0, 0, 6), at(1010));
    node.poll(Ticks::NONE, at(1410));
    let sent = take_sent(&mut node);
    assert_eq!(sent.len(), 1);
    assert_request(&sent[0], &[0x00, 6, 7, 8, 9, 10, 11, 0xc1]);

    deliver(&mut node, response(1, 0, 12), at(1420));
    node.poll(Ticks::NONE, at(1820));
    let sent = take_sent(&mut node);
    assert_eq!(sent.len(), 1);
    assert_request(&sent[0], &[0x00, 12, 13, 14, 15, 0xc2]);

    let phase = deliver(&mut node, response(2, 42, 16), at(1830));
    let node_id = NodeId::new(42).unwrap();
    assert_eq!(phase, Phase::Operational(node_id));
    assert_eq!(node.local_node_id(), Some(node_id));
    assert_eq!(node.registers().get(map::NODE_ID), 42);

    // No allocation traffic after the commit
    for second in 2..10 {
        node.poll(Ticks::NONE, Instant::from_secs(second));
    }
    assert!(take_sent(&mut node).is_empty());

    node.persist(&mut storage).unwrap();
    assert_eq!(storage.bytes[0], 42);
}

#[test]
fn test_mismatch_restarts_from_first_chunk() {
    let mut storage = MemoryStorage::factory();
    let mut node = boot(&mut storage);
    node.poll(Ticks::NONE, at(0));
    node.poll(Ticks::NONE, at(1000));
    assert_eq!(take_sent(&mut node).len(), 1);

    let payload = [0x00, 0, 1, 2, 9, 9, 9];
    let frames = message_frames(
        Some(ALLOCATOR),
        Allocation::ID,
        Allocation::SIGNATURE,
        0,
        &payload,
    );
    deliver(&mut node, frames, at(1010));

    // Full delay applies again
    node.poll(Ticks::NONE, at(1600));
    assert!(take_sent(&mut node).is_empty());
    node.poll(Ticks::NONE, at(2010));
    let sent = take_sent(&mut node);
    assert_eq!(sent.len(), 1);
    assert_request(&sent[0], &[0x01, 0, 1, 2, 3, 4, 5, 0xc1]);
}

#[test]
fn test_preferred_node_id_is_requested() {
    let mut storage = MemoryStorage::factory();
    let pump = FramePump::with_indicators(MockBus::default(), Lamp::default(), NoIndicator);
    let mut config = Config::default();
    config.preferred_node_id = NodeId::new(100);
    let mut node: TestNode = Node::boot(config, &mut storage, pump, at(0));

    node.poll(Ticks::NONE, at(0));
    node.poll(Ticks::NONE, at(1000));
    let sent = take_sent(&mut node);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data[0], 100 << 1 | 1);
}

#[test]
fn test_malformed_allocation_halts() {
    let mut storage = MemoryStorage::factory();
    let mut node = boot(&mut storage);
    node.poll(Ticks::NONE, at(0));

    let id = CanId {
        priority: Priority::LOW,
        kind: TransferKind::Broadcast,
        data_type: DataTypeId::new(Allocation::ID),
        source: NodeId::new(ALLOCATOR),
        destination: None,
    };
    let empty = Frame::new_extended(id.encode(&[]), &[0xc0]).unwrap();
    let phase = deliver(&mut node, std::vec![empty], at(10));
    assert_eq!(phase, Phase::Halted(Fault::MalformedAllocation));

    // The lamp blinks the error code, nothing else happens
    let ticks = Ticks {
        tick_10hz: true,
        tick_1hz: true,
    };
    node.pump_mut().can_mut().inbox.extend(response(0, 42, 16));
    for tick in 0..13 {
        let phase = node.poll(ticks, at(100 + 100 * tick));
        assert_eq!(phase, Phase::Halted(Fault::MalformedAllocation));
    }
    let (on, off) = (true, false);
    #[rustfmt::skip]
    let expected = [
        on, off, on, off, on, off, on, off,
        off, off, off, off, off,
    ];
    assert_eq!(node.pump_mut().tx_indicator_mut().0, expected);
    assert!(take_sent(&mut node).is_empty());
    assert_eq!(node.local_node_id(), None);
}

#[test]
fn test_zero_node_id_halts() {
    let mut storage = MemoryStorage::factory();
    let mut node = boot(&mut storage);
    node.poll(Ticks::NONE, at(0));

    let phase = deliver(&mut node, response(0, 0, 16), at(10));
    assert_eq!(phase, Phase::Halted(Fault::InvalidAllocatedNodeId));
    assert_eq!(node.local_node_id(), None);
}

#[test]
fn test_storage_failure_halts() {
    let mut storage = MemoryStorage::factory();
    storage.broken = true;
    let mut node = boot(&mut storage);
    assert_eq!(node.phase(), Phase::Halted(Fault::Storage));
    assert_eq!(node.poll(Ticks::NONE, at(5000)), Phase::Halted(Fault::Storage));
    assert!(take_sent(&mut node).is_empty());
}

#[test]
fn test_static_node_id_skips_allocation() {
    let mut storage = MemoryStorage::factory();
    storage.bytes[0] = 42;
    let mut node = boot(&mut storage);
    let node_id = NodeId::new(42).unwrap();
    assert_eq!(node.phase(), Phase::Operational(node_id));

    let ticks = Ticks {
        tick_10hz: true,
        tick_1hz: true,
    };
    node.poll(ticks, Instant::from_secs(1));
    let sent = take_sent(&mut node);
    assert_eq!(sent.len(), 1);
    let id = CanId::decode(sent[0].raw_id());
    assert_eq!(id.source, Some(node_id));
    assert_eq!(id.data_type, DataTypeId::new(341));
}
