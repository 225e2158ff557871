//! Mock implementations for testing
//!
//! This module provides host-side stand-ins for the hardware the capture
//! driver talks to, for use in unit and integration tests.
//!
//! - [`MockBus`]: async I²C bus backed by TAA3040-shaped register files, with
//!   fault injection and a transaction log
//! - [`MockPin`]: output pin that records every level it was driven to

#![cfg(any(test, feature = "std"))]

mod bus;

pub use bus::{BusEvent, Fault, FaultKind, FaultTarget, MockBus, MockBusError};

use embedded_hal::digital::{ErrorType, OutputPin};

/// Mock output pin
#[derive(Debug, Default)]
pub struct MockPin {
    high: bool,
    history: heapless::Vec<bool, 32>,
}

impl MockPin {
    /// Create a new pin, initially low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level.
    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Every level the pin was driven to, oldest first (first 32 only).
    pub fn history(&self) -> &[bool] {
        &self.history
    }

    fn drive(&mut self, high: bool) {
        self.high = high;
        let _ = self.history.push(high);
    }
}

impl ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}
