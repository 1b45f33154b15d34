//! uavnode driver interface
//!
//! The crate defines the boundary between board support code and the uavnode engine.
//! Limited scope facilitates compatibility across versions.
//! Board crates should depend on this crate. Engine users should depend on the `uavnode`
//! crate instead.
//!
//! The boundary consists of:
//! * a CAN controller implementing [`embedded_can::nb::Can`]; the engine converts its frames
//!   to and from [`frame::Frame`]
//! * activity and status lamps implementing [`Indicator`]
//! * a byte-addressed non-volatile memory implementing [`NonVolatile`] (EEPROM, flash page)
//!
//! All calls are non-blocking and made from the main loop only. Interrupt handlers should
//! not touch any of these objects.

#![no_std]

pub mod frame;

pub mod time {
    pub use embassy_time::{Duration, Instant};
}

/// On/off lamp driven by the engine
///
/// The engine flips activity lamps on every transmitted and received frame and uses the
/// status lamp to blink fault codes.
pub trait Indicator {
    fn set(&mut self, on: bool);
}

/// Indicator for boards without a lamp
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}

/// Byte-addressed non-volatile memory holding the persisted registers
pub trait NonVolatile {
    type Error: core::fmt::Debug;

    /// Fills `buffer` starting at `offset`. Waits for any pending write to finish.
    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), Self::Error>;

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
}
