//! Host demo: full capture lifecycle against the simulated register file.
//!
//! ```text
//! RUST_LOG=taa3040=debug cargo run -p taa3040 --example host_capture --features std,tracing
//! ```
//!
//! A producer task plays the part of the TDM receive DMA and pushes raw
//! slots into the frame queue; the consumer reads them through the driver.

#![allow(clippy::print_stdout, clippy::use_debug)]

use core::cell::Cell;

use embassy_futures::join::join;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Duration, Timer};
use platform::mocks::{Fault, FaultKind, FaultTarget, MockBus};
use platform::{GainDb, I2cAddresses, SampleFormat};
use taa3040::{BiquadCoefficients, ChannelConfig, DriverConfig, FrameQueue, Taa3040};
use tracing_subscriber::EnvFilter;

const FRAMES: u32 = 32;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), taa3040::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let address = I2cAddresses::taa3040(false, false);
    let mut bus = MockBus::new(address.get());
    // One flaky transaction to show the retry path.
    bus.inject(Fault::times(FaultTarget::AnyWrite, FaultKind::Nack, 1).after(4));

    let queue: FrameQueue<NoopRawMutex, 8> = FrameQueue::new();
    let mut adc = Taa3040::with_config(bus, address, DriverConfig::default(), &queue);

    adc.reset().await?;
    adc.stage_channel(0, ChannelConfig::microphone(GainDb::new(24), SampleFormat::Bits24))?;
    adc.stage_channel(1, ChannelConfig::line(GainDb::new(6), SampleFormat::Bits24))?;
    adc.set_biquad(0, &BiquadCoefficients::PASS_THROUGH).await?;
    adc.configure().await?;
    adc.start_stream().await?;

    let status = adc.status().await?;
    println!("status: {status:?}");

    let done = Cell::new(false);
    let producer = async {
        for n in 0..FRAMES {
            // 24-bit sample left-justified in a 32-bit slot
            let left = n.wrapping_mul(0x0001_0101).wrapping_shl(8);
            let _ = queue.push_slots(&[left, !left]);
            if n & 15 == 15 {
                Timer::after(Duration::from_micros(500)).await;
            }
        }
        done.set(true);
    };
    let consumer = async {
        let mut received = 0u32;
        loop {
            match adc.try_read_frame() {
                Ok(Some(frame)) => {
                    if let Some(gap) = frame.overflow {
                        println!("gap of {} frame(s) before #{}", gap.dropped, frame.sequence);
                    }
                    received = received.saturating_add(1);
                }
                Ok(None) if done.get() => break,
                Ok(None) => Timer::after(Duration::from_micros(200)).await,
                Err(_) => break,
            }
        }
        println!("received {received} of {FRAMES} frame(s)");
    };
    join(producer, consumer).await;

    println!("stream: {:?}", adc.stream_stats());
    adc.stop_stream().await?;
    println!("transport: {:?}", adc.transport().stats());
    println!("state: {}", adc.state());
    Ok(())
}
