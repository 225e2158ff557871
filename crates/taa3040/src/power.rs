//! SHDNZ hardware shutdown pin.
//!
//! The TAA3040 is held in hardware shutdown while SHDNZ is low; every
//! register returns to its default when the pin is released. Uses
//! `embedded_hal::digital::OutputPin` (v1.0) since the toggle itself is
//! instantaneous; only the settle time after release is awaited.

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;

/// Time from SHDNZ rising to the first I²C access.
pub const RELEASE_SETTLE: Duration = Duration::from_millis(1);

/// Active-low shutdown pin of the ADC.
pub struct Shdnz<P: OutputPin> {
    pin: P,
    enabled: bool,
}

impl<P: OutputPin> Shdnz<P> {
    /// Take ownership of the pin and drive it low, holding the part in
    /// shutdown.
    pub fn new(mut pin: P) -> Self {
        // If the pin is broken the first enable() call will surface it.
        let _ = pin.set_low();
        Self {
            pin,
            enabled: false,
        }
    }

    /// Release shutdown and wait until the control port is usable.
    pub async fn enable(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.enabled = true;
        Timer::after(RELEASE_SETTLE).await;
        Ok(())
    }

    /// Enter hardware shutdown. Register contents are lost; follow with
    /// [`Taa3040::reset`](crate::Taa3040::reset) after the next enable.
    pub fn disable(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.enabled = false;
        Ok(())
    }

    /// `true` while the part is out of shutdown.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Give the pin back.
    pub fn release(self) -> P {
        self.pin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::MockPin;

    #[test]
    fn construction_holds_part_in_shutdown() {
        let shdnz = Shdnz::new(MockPin::new());
        assert!(!shdnz.is_enabled());
        assert_eq!(shdnz.release().history(), &[false]);
    }

    #[tokio::test]
    async fn enable_then_disable_toggles_pin() {
        let mut shdnz = Shdnz::new(MockPin::new());
        shdnz.enable().await.unwrap();
        assert!(shdnz.is_enabled());
        shdnz.disable().unwrap();
        assert!(!shdnz.is_enabled());
        assert_eq!(shdnz.release().history(), &[false, true, false]);
    }
}
