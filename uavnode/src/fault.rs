//! Invariant violations and the error-code blink pattern
//!
//! A fault halts the node. The status lamp then blinks the fault's error code forever:
//! `code` flashes at the 10 Hz tick rate followed by a pause of [`FaultSignal::PAUSE_TICKS`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Allocation response without payload or with an over-long unique ID
    MalformedAllocation,
    /// Allocation completed with node ID 0
    InvalidAllocatedNodeId,
    /// Persisted registers could not be read at boot
    Storage,
}

impl Fault {
    /// Number of flashes in the blink pattern
    pub const fn error_code(self) -> u8 {
        match self {
            Fault::MalformedAllocation => 4,
            Fault::InvalidAllocatedNodeId => 5,
            Fault::Storage => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultSignal {
    fault: Fault,
    count: u8,
    pause: u8,
}

impl FaultSignal {
    pub const PAUSE_TICKS: u8 = 5;

    pub const fn new(fault: Fault) -> Self {
        Self {
            fault,
            count: 0,
            pause: 0,
        }
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    /// Advances the pattern by one 10 Hz tick and returns the lamp state
    pub fn tick(&mut self) -> bool {
        if self.pause > 0 {
            self.pause -= 1;
            return false;
        }
        let on = self.count % 2 == 0;
        self.count += 1;
        if self.count == 2 * self.fault.error_code() {
            self.pause = Self::PAUSE_TICKS;
            self.count = 0;
        }
        on
    }
}
