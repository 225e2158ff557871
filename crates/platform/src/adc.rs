//! Audio capture device abstraction

/// Multi-channel audio ADC with a configure → start → read → stop lifecycle.
///
/// Application code targets this trait so it can run against the hardware
/// driver or a host mock. Drivers validate the lifecycle themselves; callers
/// only see the associated error type.
pub trait CaptureDevice {
    /// Error type
    type Error: core::fmt::Debug;

    /// One sampling instant across every enabled channel.
    type Frame;

    /// Apply the staged configuration to the device.
    fn configure(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Power the converters and begin delivering frames.
    fn start(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Stop delivering frames and power the converters down.
    fn stop(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Wait for the next captured frame.
    fn read_frame(&mut self) -> impl core::future::Future<Output = Result<Self::Frame, Self::Error>>;
}
