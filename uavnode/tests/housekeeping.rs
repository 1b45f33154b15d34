mod common;

use common::message_frames;
use uavnode::config::Config;
use uavnode::context::Context;
use uavnode::core::{DataTypeId, NodeId, Priority, TransferId};
use uavnode::data_types::{Mode, NodeStatus};
use uavnode::encoding::DataType;
use uavnode::housekeeping::PeriodicHousekeeping;
use uavnode::registers::{FACTORY_IMAGE, RegisterStore, map};
use uavnode::time::{Duration, Instant};

const LOCAL: u8 = 42;

fn context<const N: usize>() -> Context<N> {
    let registers = RegisterStore::from_image(&FACTORY_IMAGE);
    let mut context = Context::new(Config::default(), registers, Instant::from_secs(0));
    context.commit_node_id(NodeId::new(LOCAL).unwrap());
    context
}

/// Queues `count` single-frame transfers
fn queue<const N: usize>(context: &mut Context<N>, count: usize) {
    for index in 0..count {
        context
            .transport
            .broadcast(
                NodeId::new(LOCAL),
                Priority::LOW,
                DataTypeId::new(20000),
                0,
                TransferId::from_u8_truncating(index as u8),
                &[index as u8],
            )
            .unwrap();
    }
}

fn drain<const N: usize>(context: &mut Context<N>, count: usize) {
    for _ in 0..count {
        assert!(context.transport.peek_tx().is_some());
        context.transport.pop_tx();
    }
}

#[test]
fn test_peak_usage_warning() {
    let mut context = context::<100>();
    let mut housekeeping = PeriodicHousekeeping::new();
    queue(&mut context, 73);

    let report = housekeeping.run(&mut context, Instant::from_secs(1));
    assert_eq!(report.statistics.peak_usage_blocks, 73);
    assert_eq!(report.statistics.peak_percent(), 73);
    assert!(report.pool_warning);
    assert_eq!(report.status_broadcast, Ok(()));

    // 73 frames plus the status broadcast, drained to 60
    drain(&mut context, 14);
    let report = housekeeping.run(&mut context, Instant::from_secs(2));
    assert_eq!(report.statistics.peak_percent(), 60);
    assert!(!report.pool_warning);
}

#[test]
fn test_threshold_is_exclusive() {
    let mut context = context::<100>();
    let mut housekeeping = PeriodicHousekeeping::new();
    queue(&mut context, 70);
    let report = housekeeping.run(&mut context, Instant::from_secs(1));
    assert_eq!(report.statistics.peak_percent(), 70);
    assert!(!report.pool_warning);
}

#[test]
fn test_idle_pool_reports_zero() {
    let mut context = context::<32>();
    let mut housekeeping = PeriodicHousekeeping::new();
    for second in 1..4 {
        let report = housekeeping.run(&mut context, Instant::from_secs(second));
        assert_eq!(report.statistics.current_usage_blocks, 0);
        assert_eq!(report.statistics.peak_usage_blocks, 0);
        assert!(!report.pool_warning);
        assert_eq!(report.status_broadcast, Ok(()));
        drain(&mut context, 1);
    }
}

#[test]
fn test_stale_transfers_are_purged() {
    let mut context = context::<32>();
    let mut housekeeping = PeriodicHousekeeping::new();
    let frames = message_frames(Some(10), 20000, 0x1234, 0, &[0x55; 20]);
    assert!(frames.len() > 1);
    let result = context.transport.push_rx_frame(
        &frames[0],
        Instant::from_millis(500),
        NodeId::new(LOCAL),
        |_| Some(0x1234),
    );
    assert_eq!(result, Ok(None));
    assert_eq!(context.transport.rx_sessions(), 1);

    let report = housekeeping.run(&mut context, Instant::from_millis(2000));
    assert_eq!(report.purged_sessions, 0);
    drain(&mut context, 1);

    let stale = Instant::from_millis(500) + Duration::from_millis(2001);
    let report = housekeeping.run(&mut context, stale);
    assert_eq!(report.purged_sessions, 1);
    assert_eq!(context.transport.rx_sessions(), 0);
    // Only the status broadcast remains
    assert_eq!(context.transport.pool_statistics().current_usage_blocks, 1);
}

#[test]
fn test_status_broadcast_and_mode() {
    let mut context = context::<32>();
    let mut housekeeping = PeriodicHousekeeping::new();
    assert_eq!(context.registers.get(map::MODE), Mode::Initialization.into_u8());

    housekeeping.run(&mut context, Instant::from_secs(5));
    assert_eq!(context.registers.get(map::MODE), Mode::Operational.into_u8());

    let frame = context.transport.peek_tx().unwrap();
    assert_eq!(frame.data.len(), NodeStatus::SIZE_BYTES + 1);
    let id = uavnode::format::CanId::decode(frame.raw_id());
    assert_eq!(id.priority, Priority::LOWEST);
    assert_eq!(id.data_type, DataTypeId::new(NodeStatus::ID));
    assert_eq!(&frame.data[..4], &[5, 0, 0, 0]);
}
