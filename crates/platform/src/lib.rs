//! Platform types for multi-channel audio capture
//!
//! This crate holds the hardware-independent vocabulary shared by the ADC
//! driver and the code that consumes its frames.
//!
//! # Layers
//!
//! ```text
//! Application (capture pipeline, host tools)
//!         ↓
//! ADC driver (taa3040 crate)
//!         ↓
//! Platform types (this crate: newtypes, ASI config, CaptureDevice)
//!         ↓
//! embedded-hal / embedded-hal-async bus traits
//! ```
//!
//! # Contents
//!
//! - [`CaptureDevice`] - configure / start / read / stop lifecycle
//! - [`audio_types`] - validated newtypes (`GainDb`, `DigitalVolume`, ...)
//! - [`audio_config`] - serial audio interface and clocking configuration
//! - [`mocks`] - register-backed I²C bus and recording pin (feature `std`)
//!
//! # Features
//!
//! - `std`: host mocks for tests and demos
//! - `serde`: `Serialize`/`Deserialize` on configuration types
//! - `defmt`: `defmt::Format` on every public type
//!
//! # Example
//!
//! ```no_run
//! use platform::CaptureDevice;
//!
//! async fn capture<D: CaptureDevice>(adc: &mut D) -> Result<(), D::Error> {
//!     adc.configure().await?;
//!     adc.start().await?;
//!     let _frame = adc.read_frame().await?;
//!     adc.stop().await
//! }
//! ```

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
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod adc;
pub mod audio_config;
pub mod audio_types;
pub mod mocks;

pub use adc::CaptureDevice;
pub use audio_config::{AsiConfig, AsiFormat, ClockRole, I2cAddresses, MclkFrequency, SampleRate};
pub use audio_types::{
    ChannelIndex, DigitalVolume, GainDb, I2cAddr, OutOfRangeError, SampleFormat, CHANNEL_COUNT,
};
