//! Timer interrupt to main loop tick events
//!
//! The timer interrupt runs at 10 Hz and calls [`TickSource::on_timer_interrupt`]. Every
//! tenth call also raises the 1 Hz event. The main loop takes and clears all pending events
//! at once with [`TickSource::take`]. Events raised twice before being taken collapse into
//! one.

use core::cell::Cell;
use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};

use crate::data_types::NodeStatus;

pub const TICK_HZ: u8 = 10;
/// Timer interrupts between housekeeping events, one NodeStatus broadcasting period
pub const TICKS_PER_HOUSEKEEPING: u8 = TICK_HZ * NodeStatus::MAX_BROADCASTING_PERIOD as u8;

/// Pending tick events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticks {
    pub tick_10hz: bool,
    pub tick_1hz: bool,
}

impl Ticks {
    pub const NONE: Ticks = Ticks {
        tick_10hz: false,
        tick_1hz: false,
    };
}

#[derive(Debug, Clone, Copy)]
struct State {
    pending: Ticks,
    count: u8,
}

pub struct TickSource<M: RawMutex> {
    state: Mutex<M, Cell<State>>,
}

impl<M: RawMutex> TickSource<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(State {
                pending: Ticks::NONE,
                count: 0,
            })),
        }
    }

    /// Call from the 10 Hz timer interrupt
    pub fn on_timer_interrupt(&self) {
        self.state.lock(|state| {
            let mut value = state.get();
            value.pending.tick_10hz = true;
            value.count += 1;
            if value.count == TICKS_PER_HOUSEKEEPING {
                value.count = 0;
                value.pending.tick_1hz = true;
            }
            state.set(value);
        });
    }

    pub fn take(&self) -> Ticks {
        self.state.lock(|state| {
            let value = state.get();
            state.set(State {
                pending: Ticks::NONE,
                ..value
            });
            value.pending
        })
    }
}

impl<M: RawMutex> Default for TickSource<M> {
    fn default() -> Self {
        Self::new()
    }
}
