//! Exact bus traffic of the power-up sequence, checked transaction by
//! transaction with `embedded-hal-mock`.
//!
//! Run with: cargo test -p taa3040 --test register_sequence

// Integration test file: unwrap is an intentional test mechanism.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::use_debug)]

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use embedded_hal::i2c::ErrorKind as I2cErrorKind;
use platform::{GainDb, I2cAddr, SampleFormat};
use taa3040::{
    BusFault, ChannelConfig, DeviceState, DriverConfig, ErrorKind, FrameQueue, RetryPolicy, Shdnz,
    Taa3040,
};

const ADDR: u8 = 0x4C;

fn write(register: u8, value: u8) -> I2cTransaction {
    I2cTransaction::write(ADDR, vec![register, value])
}

fn config() -> DriverConfig {
    DriverConfig {
        retry: RetryPolicy::NONE,
        reset_settle_us: 10,
        wake_settle_us: 10,
        ..DriverConfig::default()
    }
}

/// SHDNZ release, reset, configure, start, stop: every byte on the bus.
#[tokio::test]
async fn test_power_up_sequence_is_exact() {
    let expectations = [
        // reset
        write(0x00, 0x00),
        write(0x01, 0x01),
        // configure: wake, then only the registers that differ from defaults
        write(0x02, 0x81),
        write(0x07, 0x20),
        write(0x3D, 0x30),
        write(0x73, 0x80),
        write(0x74, 0x80),
        // start_stream: ADC + PLL
        write(0x75, 0x60),
        // stop_stream
        write(0x75, 0x00),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let mut pin = PinMock::new(&[
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ]);

    let mut shdnz = Shdnz::new(pin.clone());
    shdnz.enable().await.unwrap();
    assert!(shdnz.is_enabled());

    let queue: FrameQueue<NoopRawMutex, 4> = FrameQueue::new();
    let mut adc = Taa3040::with_config(i2c.clone(), I2cAddr::new(ADDR), config(), &queue);
    adc.reset().await.unwrap();
    adc.stage_channel(0, ChannelConfig::line(GainDb::new(12), SampleFormat::Bits24))
        .unwrap();
    adc.configure().await.unwrap();
    adc.start_stream().await.unwrap();
    adc.stop_stream().await.unwrap();
    assert_eq!(adc.state(), DeviceState::Configured);

    i2c.done();
    pin.done();
}

/// Status registers are read with a repeated-start write_read.
#[tokio::test]
async fn test_status_uses_write_read() {
    let expectations = [
        write(0x00, 0x00),
        I2cTransaction::write_read(ADDR, vec![0x76], vec![0xC0]),
        I2cTransaction::write_read(ADDR, vec![0x77], vec![0xE0]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let queue: FrameQueue<NoopRawMutex, 4> = FrameQueue::new();
    let mut adc = Taa3040::with_config(i2c.clone(), I2cAddr::new(ADDR), config(), &queue);

    let status = adc.status().await.unwrap();
    assert!(status.is_recording());
    assert_eq!(status.powered, [true, true, false, false]);

    i2c.done();
}

/// A HAL error with no retries left surfaces as `BusFault::Other` and a fault.
#[tokio::test]
async fn test_hal_error_without_retry_faults() {
    let expectations = [
        write(0x00, 0x00),
        write(0x01, 0x01).with_error(I2cErrorKind::Other),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let queue: FrameQueue<NoopRawMutex, 4> = FrameQueue::new();
    let mut adc = Taa3040::with_config(i2c.clone(), I2cAddr::new(ADDR), config(), &queue);

    let err = adc.reset().await.unwrap_err();
    match err.kind {
        ErrorKind::DeviceFault(Some(cause)) => {
            assert_eq!(cause.kind, BusFault::Other);
            assert_eq!(cause.attempts, 1);
        }
        other => panic!("expected device fault, got {other:?}"),
    }

    i2c.done();
}
