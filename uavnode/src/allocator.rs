//! Dynamic node ID allocation, allocatee side
//!
//! The allocatee broadcasts anonymous allocation requests carrying its unique ID in chunks
//! of up to six bytes. Allocators answer with the unique ID prefix they have seen so far;
//! once the whole unique ID is confirmed the response carries the assigned node ID.
//!
//! Timing rules:
//! * a request is sent when the deadline expires, then the deadline is rescheduled to
//!   `now + request_delay_offset + uniform(0, random_timeout_range)`;
//! * every received allocation message reschedules the deadline the same way;
//! * a confirmed partial prefix pulls the deadline in by `request_delay_offset`;
//! * any mismatch or request from another allocatee restarts from the first chunk.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::core::{DataTypeId, NodeId, Priority, TransferId};
use crate::data_types::Allocation;
use crate::encoding::{DataType, Deserialize, Serialize};
use crate::fault::Fault;
use crate::registers::UNIQUE_ID_LENGTH;
use crate::time::{Duration, Instant};
use crate::transport::{Transfer, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// No node ID yet, the next request is due at the given instant
    Waiting(Instant),
    Allocated(NodeId),
}

pub struct NodeIdentityAllocator {
    unique_id: [u8; UNIQUE_ID_LENGTH],
    preferred_node_id: Option<NodeId>,
    request_delay_offset: Duration,
    random_timeout_range: Duration,
    confirmed_prefix_length: usize,
    deadline: Option<Instant>,
    transfer_id: TransferId,
    allocated: Option<NodeId>,
    rng: Option<SmallRng>,
}

impl NodeIdentityAllocator {
    pub fn new(unique_id: [u8; UNIQUE_ID_LENGTH], config: &Config) -> Self {
        Self {
            unique_id,
            preferred_node_id: config.preferred_node_id,
            request_delay_offset: config.request_delay_offset,
            random_timeout_range: config.random_timeout_range,
            confirmed_prefix_length: 0,
            deadline: None,
            transfer_id: TransferId::default(),
            allocated: None,
            rng: None,
        }
    }

    pub fn confirmed_prefix_length(&self) -> usize {
        self.confirmed_prefix_length
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sends the next request once the deadline has passed
    pub fn poll<const N: usize>(&mut self, now: Instant, transport: &mut Transport<N>) -> Outcome {
        if let Some(node_id) = self.allocated {
            return Outcome::Allocated(node_id);
        }
        let Some(deadline) = self.deadline else {
            debug!("Waiting for dynamic node ID allocation");
            return Outcome::Waiting(self.reschedule(now));
        };
        if now < deadline {
            return Outcome::Waiting(deadline);
        }

        self.send_request(transport);
        self.confirmed_prefix_length = 0;
        Outcome::Waiting(self.reschedule(now))
    }

    /// Processes an allocation message from the bus
    ///
    /// Returns the node ID once the allocation completes.
    pub fn handle_response(
        &mut self,
        transfer: &Transfer,
        now: Instant,
    ) -> Result<Option<NodeId>, Fault> {
        if self.allocated.is_some() {
            return Ok(None);
        }
        self.reschedule(now);

        let Some(source) = transfer.source else {
            debug!("Allocation request from another allocatee");
            self.confirmed_prefix_length = 0;
            return Ok(None);
        };

        let response = Allocation::deserialize_from_bytes(&transfer.payload).map_err(|err| {
            error!("Malformed allocation response: {:?}", err);
            Fault::MalformedAllocation
        })?;
        let received = &response.unique_id[..];
        if received != &self.unique_id[..received.len()] {
            info!(
                "Mismatching allocation response from {}",
                source.into_u8()
            );
            self.confirmed_prefix_length = 0;
            return Ok(None);
        }

        if received.len() < UNIQUE_ID_LENGTH {
            self.confirmed_prefix_length = received.len();
            if let Some(deadline) = self.deadline {
                self.deadline = Some(deadline - self.request_delay_offset);
            }
            info!(
                "Matching allocation response from {} offset {}",
                source.into_u8(),
                self.confirmed_prefix_length
            );
            return Ok(None);
        }

        let node_id = NodeId::new(response.node_id).ok_or_else(|| {
            error!("Allocated node ID {} is out of range", response.node_id);
            Fault::InvalidAllocatedNodeId
        })?;
        info!(
            "Node ID {} allocated by {}",
            node_id.into_u8(),
            source.into_u8()
        );
        self.allocated = Some(node_id);
        Ok(Some(node_id))
    }

    fn send_request<const N: usize>(&mut self, transport: &mut Transport<N>) {
        let offset = self.confirmed_prefix_length;
        let end = core::cmp::min(
            offset + Allocation::MAX_LENGTH_OF_UNIQUE_ID_IN_REQUEST,
            UNIQUE_ID_LENGTH,
        );
        let request = Allocation {
            node_id: NodeId::to_wire(self.preferred_node_id),
            first_part_of_unique_id: offset == 0,
            unique_id: unwrap!(heapless::Vec::from_slice(&self.unique_id[offset..end])),
        };

        let mut buffer = [0; Allocation::MAX_SIZE_BYTES];
        let payload = unwrap!(request.serialize_to_slice(&mut buffer));
        let result = transport.broadcast(
            None,
            Priority::LOW,
            DataTypeId::new(Allocation::ID),
            Allocation::SIGNATURE,
            self.transfer_id,
            payload,
        );
        match result {
            Ok(_) => {
                trace!("Allocation request sent, unique ID offset {}", offset);
                self.transfer_id = self.transfer_id.next();
            }
            Err(err) => warn!("Could not send allocation request: {:?}", err),
        }
    }

    fn reschedule(&mut self, now: Instant) -> Instant {
        let range = self.random_timeout_range.as_ticks();
        let rng = self
            .rng
            .get_or_insert_with(|| SmallRng::seed_from_u64(rng_seed(&self.unique_id, now)));
        let jitter = Duration::from_ticks(rng.gen_range(0..=range));
        let deadline = now + self.request_delay_offset + jitter;
        self.deadline = Some(deadline);
        deadline
    }
}

/// Boot time with the unique ID folded in, so nodes powered up together diverge
fn rng_seed(unique_id: &[u8; UNIQUE_ID_LENGTH], now: Instant) -> u64 {
    unique_id.chunks(8).fold(now.as_ticks(), |seed, chunk| {
        let mut word = [0; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        seed ^ u64::from_le_bytes(word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransferKind;
    use crate::format::CanId;

    const UNIQUE_ID: [u8; UNIQUE_ID_LENGTH] = [
        0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
        0x1e, 0x1f,
    ];

    fn response(source: Option<u8>, payload: &[u8]) -> Transfer {
        Transfer {
            kind: TransferKind::Broadcast,
            data_type: DataTypeId::new(Allocation::ID),
            priority: Priority::LOW,
            source: source.and_then(NodeId::new),
            destination: None,
            transfer_id: TransferId::default(),
            timestamp: Instant::from_millis(0),
            payload: heapless::Vec::from_slice(payload).unwrap(),
        }
    }

    fn prefix(node_id: u8, length: usize) -> heapless::Vec<u8, 17> {
        let mut payload = heapless::Vec::new();
        payload.push(node_id << 1).unwrap();
        payload.extend_from_slice(&UNIQUE_ID[..length]).unwrap();
        payload
    }

    type Frames = heapless::Vec<heapless::Vec<u8, 8>, 8>;

    fn drain<const N: usize>(transport: &mut Transport<N>) -> Frames {
        let mut frames = heapless::Vec::new();
        while let Some(frame) = transport.peek_tx() {
            frames
                .push(heapless::Vec::from_slice(&frame.data).unwrap())
                .unwrap();
            let id = CanId::decode(frame.raw_id());
            assert_eq!(id.source, None);
            assert_eq!(id.priority, Priority::LOW);
            transport.pop_tx();
        }
        frames
    }

    #[test]
    fn test_first_deadline_is_randomized_within_range() {
        let mut allocator = NodeIdentityAllocator::new(UNIQUE_ID, &Config::default());
        let mut transport = Transport::<8>::new(Duration::from_secs(2));
        let now = Instant::from_millis(1000);

        let Outcome::Waiting(deadline) = allocator.poll(now, &mut transport) else {
            panic!("unexpected allocation");
        };
        assert!(deadline >= now + Duration::from_millis(600));
        assert!(deadline <= now + Duration::from_millis(1000));
        assert_eq!(allocator.poll(now, &mut transport), Outcome::Waiting(deadline));
        assert_eq!(transport.tx_len(), 0);
    }

    #[test]
    fn test_request_chunks_follow_confirmed_prefix() {
        let mut allocator = NodeIdentityAllocator::new(UNIQUE_ID, &Config::default());
        let mut transport = Transport::<8>::new(Duration::from_secs(2));

        let Outcome::Waiting(deadline) = allocator.poll(Instant::from_millis(0), &mut transport)
        else {
            panic!("unexpected allocation");
        };
        allocator.poll(deadline, &mut transport);
        let frames = drain(&mut transport);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..7], &[1, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15]);

        let now = deadline + Duration::from_millis(10);
        assert_eq!(allocator.handle_response(&response(Some(10), &prefix(0, 6)), now), Ok(None));
        assert_eq!(allocator.confirmed_prefix_length(), 6);
        // The confirmed prefix pulls the next request in
        let next = allocator.deadline().unwrap();
        assert!(next <= now + Duration::from_millis(400));

        allocator.poll(next, &mut transport);
        let frames = drain(&mut transport);
        assert_eq!(&frames[0][..7], &[0, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b]);
        assert_eq!(allocator.confirmed_prefix_length(), 0);
    }

    #[test]
    fn test_mismatch_resets_progress() {
        let mut allocator = NodeIdentityAllocator::new(UNIQUE_ID, &Config::default());
        let now = Instant::from_millis(0);
        allocator
            .handle_response(&response(Some(10), &prefix(0, 12)), now)
            .unwrap();
        assert_eq!(allocator.confirmed_prefix_length(), 12);

        let mut payload = prefix(0, 12);
        payload[3] ^= 0x01;
        assert_eq!(allocator.handle_response(&response(Some(10), &payload), now), Ok(None));
        assert_eq!(allocator.confirmed_prefix_length(), 0);
    }

    #[test]
    fn test_other_allocatee_resets_progress() {
        let mut allocator = NodeIdentityAllocator::new(UNIQUE_ID, &Config::default());
        let now = Instant::from_millis(0);
        allocator
            .handle_response(&response(Some(10), &prefix(0, 6)), now)
            .unwrap();
        assert_eq!(allocator.handle_response(&response(None, &[1, 0, 0]), now), Ok(None));
        assert_eq!(allocator.confirmed_prefix_length(), 0);
    }

    #[test]
    fn test_full_match_commits() {
        let mut allocator = NodeIdentityAllocator::new(UNIQUE_ID, &Config::default());
        let mut transport = Transport::<8>::new(Duration::from_secs(2));
        let now = Instant::from_millis(0);
        let node_id = NodeId::new(125);
        assert_eq!(
            allocator.handle_response(&response(Some(10), &prefix(125, 16)), now),
            Ok(node_id)
        );

        let later = now + Duration::from_secs(10);
        assert_eq!(
            allocator.poll(later, &mut transport),
            Outcome::Allocated(NodeId::new(125).unwrap())
        );
        assert_eq!(transport.tx_len(), 0);
    }

    #[test]
    fn test_invalid_payloads_are_faults() {
        let now = Instant::from_millis(0);
        let mut allocator = NodeIdentityAllocator::new(UNIQUE_ID, &Config::default());
        assert_eq!(
            allocator.handle_response(&response(Some(10), &[]), now),
            Err(Fault::MalformedAllocation)
        );
        assert_eq!(
            allocator.handle_response(&response(Some(10), &[0; 18]), now),
            Err(Fault::MalformedAllocation)
        );
        assert_eq!(
            allocator.handle_response(&response(Some(10), &prefix(0, 16)), now),
            Err(Fault::InvalidAllocatedNodeId)
        );
    }

    #[test]
    fn test_seed_depends_on_unique_id() {
        let now = Instant::from_millis(1000);
        let mut other = UNIQUE_ID;
        other[15] ^= 0x01;
        assert_ne!(rng_seed(&UNIQUE_ID, now), rng_seed(&other, now));
        assert_eq!(rng_seed(&UNIQUE_ID, now), rng_seed(&UNIQUE_ID, now));
        assert_ne!(
            rng_seed(&UNIQUE_ID, now),
            rng_seed(&UNIQUE_ID, Instant::from_millis(1001))
        );
    }

    #[test]
    fn test_boards_booted_together_draw_different_deadlines() {
        let mut other = UNIQUE_ID;
        other[0] ^= 0xff;
        let config = Config::default();
        let mut first = NodeIdentityAllocator::new(UNIQUE_ID, &config);
        let mut second = NodeIdentityAllocator::new(other, &config);
        let mut transport = Transport::<8>::new(Duration::from_secs(2));
        let now = Instant::from_millis(0);

        assert_ne!(first.poll(now, &mut transport), second.poll(now, &mut transport));
    }
}
