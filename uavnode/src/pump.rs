//! Moves frames between the transport queues and the CAN controller
//!
//! Called from the main loop on every iteration. Transmission drains the outbound queue in
//! FIFO order until the controller reports it is busy. Reception takes at most one frame per
//! call.

use embedded_can::nb::Can;
use embedded_can::{Error as _, ErrorKind};

use crate::core::NodeId;
use crate::dispatcher;
use crate::driver::{Indicator, NoIndicator};
use crate::format::CanId;
use crate::frame::Frame;
use crate::time::Instant;
use crate::transport::{Transfer, Transport};

pub struct FramePump<C: Can, T: Indicator = NoIndicator, R: Indicator = NoIndicator> {
    can: C,
    tx_indicator: T,
    rx_indicator: R,
    /// Frame evicted from a controller mailbox, waiting to be resubmitted
    replaced: Option<C::Frame>,
    tx_on: bool,
    rx_on: bool,
}

impl<C: Can> FramePump<C> {
    pub fn new(can: C) -> Self {
        Self::with_indicators(can, NoIndicator, NoIndicator)
    }
}

impl<C: Can, T: Indicator, R: Indicator> FramePump<C, T, R> {
    /// The indicators toggle on every transmitted and received frame
    pub fn with_indicators(can: C, tx_indicator: T, rx_indicator: R) -> Self {
        Self {
            can,
            tx_indicator,
            rx_indicator,
            replaced: None,
            tx_on: false,
            rx_on: false,
        }
    }

    pub fn can_mut(&mut self) -> &mut C {
        &mut self.can
    }

    /// The transmit lamp doubles as the fault lamp once the node halts
    pub fn tx_indicator_mut(&mut self) -> &mut T {
        &mut self.tx_indicator
    }

    /// Transmits queued frames until the queue is empty or the controller is busy
    ///
    /// Returns the number of frames handed to the controller. A frame the controller fails on
    /// is dropped so it does not block the queue. A pending frame the controller hands back as
    /// replaced is held and offered first on the next call.
    pub fn transmit<const N: usize>(&mut self, transport: &mut Transport<N>) -> usize {
        let mut sent = 0;
        loop {
            let (can_frame, queued) = if let Some(frame) = self.replaced.take() {
                (frame, false)
            } else if let Some(frame) = transport.peek_tx() {
                let Some(can_frame) = frame.to_can::<C::Frame>() else {
                    error!("Controller rejected frame {:?}", frame);
                    transport.pop_tx();
                    continue;
                };
                (can_frame, true)
            } else {
                break;
            };
            match self.can.transmit(&can_frame) {
                Ok(replaced) => {
                    if queued {
                        transport.pop_tx();
                    }
                    sent += 1;
                    self.tx_on = !self.tx_on;
                    self.tx_indicator.set(self.tx_on);
                    if let Some(frame) = replaced {
                        debug!("Pending frame replaced by controller");
                        self.replaced = Some(frame);
                        break;
                    }
                }
                Err(nb::Error::WouldBlock) => {
                    if !queued {
                        self.replaced = Some(can_frame);
                    }
                    break;
                }
                Err(nb::Error::Other(err)) => {
                    warn!("Transmission failed; error {}", kind_name(err.kind()));
                    if queued {
                        transport.pop_tx();
                    }
                }
            }
        }
        sent
    }

    /// Receives at most one frame and feeds it to reassembly
    ///
    /// Returns a transfer when the frame completed one.
    pub fn receive<const N: usize>(
        &mut self,
        transport: &mut Transport<N>,
        local: Option<NodeId>,
        now: Instant,
    ) -> Option<Transfer> {
        let can_frame = match self.can.receive() {
            Ok(frame) => frame,
            Err(nb::Error::WouldBlock) => return None,
            Err(nb::Error::Other(err)) => {
                warn!("Reception failed; error {}", kind_name(err.kind()));
                return None;
            }
        };
        self.rx_on = !self.rx_on;
        self.rx_indicator.set(self.rx_on);

        let frame = Frame::from_can(&can_frame)?;
        let accept = |id: &CanId| dispatcher::accept(local, id);
        match transport.push_rx_frame(&frame, now, local, accept) {
            Ok(transfer) => transfer,
            Err(err) => {
                debug!("Frame dropped; error {:?}", err);
                None
            }
        }
    }

    /// One transmit pass followed by one receive attempt
    pub fn run<const N: usize>(
        &mut self,
        transport: &mut Transport<N>,
        local: Option<NodeId>,
        now: Instant,
    ) -> Option<Transfer> {
        self.transmit(transport);
        self.receive(transport, local, now)
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Overrun => "overrun",
        ErrorKind::Bit => "bit",
        ErrorKind::Stuff => "stuff",
        ErrorKind::Crc => "crc",
        ErrorKind::Form => "form",
        ErrorKind::Acknowledge => "acknowledge",
        _ => "other",
    }
}
