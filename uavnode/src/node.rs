//! Node composition root
//!
//! [`Node`] owns every piece of engine state and advances it from the main loop. Tick events
//! come from a [`TickSource`] fed by the 10 Hz timer interrupt.
//!
//! ## Examples
//!
//! ```ignore
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex as Mutex;
//! use uavnode::config::Config;
//! use uavnode::node::{Node, Runner};
//! use uavnode::pump::FramePump;
//! use uavnode::scheduler::TickSource;
//!
//! static TICKS: TickSource<Mutex> = TickSource::new();
//!
//! // From the timer interrupt: TICKS.on_timer_interrupt();
//!
//! let pump = FramePump::with_indicators(can, tx_lamp, rx_lamp);
//! let mut node: Node<_, _, _> = Node::boot(Config::default(), &mut eeprom, pump, Instant::now());
//! Runner::new(&mut node, &TICKS).run();
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_can::nb::Can;

use crate::allocator::{NodeIdentityAllocator, Outcome};
use crate::config::Config;
use crate::context::Context;
use crate::core::NodeId;
use crate::dispatcher::{self, Handled};
use crate::driver::{Indicator, NoIndicator, NonVolatile};
use crate::fault::{Fault, FaultSignal};
use crate::housekeeping::{HousekeepingReport, PeriodicHousekeeping};
use crate::pool::DEFAULT_BLOCK_COUNT;
use crate::pump::FramePump;
use crate::registers::{FACTORY_IMAGE, RegisterStore, StorageError};
use crate::scheduler::{TickSource, Ticks};
use crate::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Waiting for a dynamically allocated node ID
    Allocating,
    Operational(NodeId),
    /// Stopped after an invariant violation, only the fault lamp is driven
    Halted(Fault),
}

pub struct Node<
    C: Can,
    T: Indicator = NoIndicator,
    R: Indicator = NoIndicator,
    const N: usize = DEFAULT_BLOCK_COUNT,
> {
    context: Context<N>,
    allocator: Option<NodeIdentityAllocator>,
    housekeeping: PeriodicHousekeeping,
    pump: FramePump<C, T, R>,
    fault: Option<FaultSignal>,
    last_housekeeping: Option<HousekeepingReport>,
}

impl<C: Can, T: Indicator, R: Indicator, const N: usize> Node<C, T, R, N> {
    /// A node ID held in the registers is committed at once, otherwise allocation starts
    pub fn new(
        config: Config,
        registers: RegisterStore,
        pump: FramePump<C, T, R>,
        now: Instant,
    ) -> Self {
        registers.dump();
        let static_node_id = registers.node_id();
        let allocator = match static_node_id {
            Some(_) => None,
            None => Some(NodeIdentityAllocator::new(registers.unique_id(), &config)),
        };
        let mut context = Context::new(config, registers, now);
        if let Some(node_id) = static_node_id {
            info!("Static node ID {}", node_id.into_u8());
            context.commit_node_id(node_id);
        }
        Self {
            context,
            allocator,
            housekeeping: PeriodicHousekeeping::new(),
            pump,
            fault: None,
            last_housekeeping: None,
        }
    }

    /// Loads the registers from `storage`; a read failure halts the node
    pub fn boot<S: NonVolatile>(
        config: Config,
        storage: &mut S,
        pump: FramePump<C, T, R>,
        now: Instant,
    ) -> Self {
        match RegisterStore::load(storage) {
            Ok(registers) => Self::new(config, registers, pump, now),
            Err(StorageError) => {
                let registers = RegisterStore::from_image(&FACTORY_IMAGE);
                let mut node = Self::new(config, registers, pump, now);
                node.halt(Fault::Storage);
                node
            }
        }
    }

    /// One main loop iteration
    pub fn poll(&mut self, ticks: Ticks, now: Instant) -> Phase {
        if let Some(signal) = &mut self.fault {
            if ticks.tick_10hz {
                let on = signal.tick();
                self.pump.tx_indicator_mut().set(on);
            }
            return Phase::Halted(signal.fault());
        }

        match &mut self.allocator {
            Some(allocator) => {
                let outcome = allocator.poll(now, &mut self.context.transport);
                if let Outcome::Allocated(node_id) = outcome {
                    self.finish_allocation(node_id);
                }
            }
            None => {
                if ticks.tick_1hz {
                    let report = self.housekeeping.run(&mut self.context, now);
                    self.last_housekeeping = Some(report);
                }
            }
        }

        let local = self.context.local_node_id();
        if let Some(transfer) = self.pump.run(&mut self.context.transport, local, now) {
            let handled =
                dispatcher::handle(&mut self.context, self.allocator.as_mut(), &transfer, now);
            match handled {
                Ok(Handled::Allocated(node_id)) => self.finish_allocation(node_id),
                Ok(_) => {}
                Err(fault) => self.halt(fault),
            }
        }
        self.phase()
    }

    pub fn phase(&self) -> Phase {
        if let Some(signal) = &self.fault {
            return Phase::Halted(signal.fault());
        }
        match self.context.local_node_id() {
            Some(node_id) => Phase::Operational(node_id),
            None => Phase::Allocating,
        }
    }

    pub fn context(&self) -> &Context<N> {
        &self.context
    }

    pub fn registers(&self) -> &RegisterStore {
        &self.context.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterStore {
        &mut self.context.registers
    }

    pub fn local_node_id(&self) -> Option<NodeId> {
        self.context.local_node_id()
    }

    pub fn pump_mut(&mut self) -> &mut FramePump<C, T, R> {
        &mut self.pump
    }

    pub fn last_housekeeping(&self) -> Option<&HousekeepingReport> {
        self.last_housekeeping.as_ref()
    }

    /// Writes the persisted registers, including a committed node ID, to `storage`
    pub fn persist<S: NonVolatile>(&self, storage: &mut S) -> Result<(), StorageError> {
        self.context.registers.persist(storage)
    }

    fn finish_allocation(&mut self, node_id: NodeId) {
        if self.context.local_node_id().is_none() {
            self.context.commit_node_id(node_id);
        }
        self.allocator = None;
    }

    fn halt(&mut self, fault: Fault) {
        error!("Node halted; fault {:?}, error code {}", fault, fault.error_code());
        self.allocator = None;
        self.fault = Some(FaultSignal::new(fault));
    }
}

/// Main loop driver
pub struct Runner<
    'a,
    M: RawMutex,
    C: Can,
    T: Indicator = NoIndicator,
    R: Indicator = NoIndicator,
    const N: usize = DEFAULT_BLOCK_COUNT,
> {
    node: &'a mut Node<C, T, R, N>,
    ticks: &'a TickSource<M>,
}

impl<'a, M: RawMutex, C: Can, T: Indicator, R: Indicator, const N: usize>
    Runner<'a, M, C, T, R, N>
{
    pub fn new(node: &'a mut Node<C, T, R, N>, ticks: &'a TickSource<M>) -> Self {
        Self { node, ticks }
    }

    /// Takes the pending tick events and polls the node once
    pub fn run_once(&mut self) -> Phase {
        let ticks = self.ticks.take();
        self.node.poll(ticks, Instant::now())
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.run_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::registers::map;

    struct SilentCan;

    impl Can for SilentCan {
        type Frame = Frame;
        type Error = embedded_can::ErrorKind;

        fn transmit(&mut self, _frame: &Frame) -> nb::Result<Option<Frame>, Self::Error> {
            Err(nb::Error::WouldBlock)
        }

        fn receive(&mut self) -> nb::Result<Frame, Self::Error> {
            Err(nb::Error::WouldBlock)
        }
    }

    fn node(node_id: u8) -> Node<SilentCan> {
        let mut registers = RegisterStore::from_image(&FACTORY_IMAGE);
        registers.set(map::NODE_ID, node_id);
        let pump = FramePump::new(SilentCan);
        Node::new(Config::default(), registers, pump, Instant::from_secs(0))
    }

    #[test]
    fn test_static_node_id_skips_allocation() {
        let mut node = node(42);
        assert_eq!(node.phase(), Phase::Operational(NodeId::new(42).unwrap()));
        assert!(node.allocator.is_none());

        let ticks = Ticks {
            tick_10hz: true,
            tick_1hz: true,
        };
        node.poll(ticks, Instant::from_secs(1));
        assert!(node.last_housekeeping().is_some());
    }

    #[test]
    fn test_allocation_blocks_housekeeping() {
        let mut node = node(0);
        assert_eq!(node.phase(), Phase::Allocating);

        let ticks = Ticks {
            tick_10hz: true,
            tick_1hz: true,
        };
        assert_eq!(node.poll(ticks, Instant::from_secs(1)), Phase::Allocating);
        assert!(node.last_housekeeping().is_none());
        assert_eq!(node.context().transport.tx_len(), 0);
    }

    #[test]
    fn test_halted_node_stays_halted() {
        let mut node = node(42);
        node.halt(Fault::InvalidAllocatedNodeId);

        let ticks = Ticks {
            tick_10hz: true,
            tick_1hz: true,
        };
        for second in 1..5 {
            let phase = node.poll(ticks, Instant::from_secs(second));
            assert_eq!(phase, Phase::Halted(Fault::InvalidAllocatedNodeId));
        }
        assert!(node.last_housekeeping().is_none());
    }
}
