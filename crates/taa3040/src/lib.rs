//! Async `no_std` driver for the TAA3040 four-channel audio ADC
//!
//! The TAA3040 is controlled over I²C (paged 8-bit registers) and delivers
//! audio over a TDM / I²S / left-justified serial interface. This crate owns
//! the control side and a bounded queue the serial-interface task feeds.
//!
//! # Layers
//!
//! ```text
//! Taa3040 (lifecycle, staged/committed channel config, fault handling)
//!     ├── StateMachine      Reset → Configured → Streaming, Fault
//!     ├── ChannelBank       staged copy, committed copy, register image
//!     ├── RegisterTransport paging, retries, timeouts, shadow
//!     └── &FrameQueue       drop-oldest frames shared with the ASI task
//! ```
//!
//! # Example
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embedded_hal_async::i2c::I2c;
//! use platform::{GainDb, I2cAddr, SampleFormat};
//! use taa3040::{ChannelConfig, FrameQueue, Taa3040};
//!
//! static FRAMES: FrameQueue<CriticalSectionRawMutex, 64> = FrameQueue::new();
//!
//! async fn run<I: I2c>(i2c: I) -> Result<(), taa3040::Error> {
//!     let mut adc = Taa3040::new(i2c, I2cAddr::new(0x4C), &FRAMES);
//!     adc.reset().await?;
//!     adc.stage_channel(0, ChannelConfig::microphone(GainDb::new(24), SampleFormat::Bits24))?;
//!     adc.configure().await?;
//!     adc.start_stream().await?;
//!     while let Ok(frame) = adc.read_frame().await {
//!         let _ = frame.samples;
//!     }
//!     adc.stop_stream().await
//! }
//! ```
//!
//! # Features
//!
//! - `defmt`: log through `defmt` and derive `defmt::Format`
//! - `tracing`: log through `tracing` (host builds)
//! - `serde`: `Serialize`/`Deserialize` on configuration types
//! - `std`: host mocks from `platform`

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Must come first so the logging macros are visible in every module.
mod fmt;

pub mod channels;
pub mod config;
pub mod device;
pub mod dsp;
pub mod error;
pub mod power;
pub mod registers;
pub mod state;
pub mod stream;
pub mod transport;

pub use channels::{ChannelBank, ChannelConfig, InputKind, InputSource, RegisterImage};
pub use config::{DriverConfig, RetryPolicy};
pub use device::{DeviceStatus, PowerMode, Taa3040};
pub use dsp::{BiquadCoefficients, IirCoefficients};
pub use error::{
    BusFault, Error, ErrorKind, Operation, StreamClosed, TransportError, ValidationError,
};
pub use power::Shdnz;
pub use registers::Register;
pub use state::{DeviceState, Event, StateMachine};
pub use stream::{FrameQueue, Overflow, PushError, SampleFrame, StreamStats};
pub use transport::{RegisterTransport, TransportStats};
