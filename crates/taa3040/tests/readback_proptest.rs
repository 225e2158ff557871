//! Property: any supported channel configuration reads back unchanged after
//! a commit.
//!
//! Run with: cargo test -p taa3040 --test readback_proptest

#![allow(clippy::unwrap_used, clippy::expect_used)]

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use platform::mocks::MockBus;
use platform::{ChannelIndex, DigitalVolume, GainDb, I2cAddr, SampleFormat};
use proptest::prelude::*;
use taa3040::{ChannelConfig, DriverConfig, FrameQueue, InputKind, InputSource, Taa3040};

fn format() -> impl Strategy<Value = SampleFormat> {
    prop_oneof![
        Just(SampleFormat::Bits16),
        Just(SampleFormat::Bits20),
        Just(SampleFormat::Bits24),
        Just(SampleFormat::Bits32),
    ]
}

fn channel_config() -> impl Strategy<Value = ChannelConfig> {
    (
        any::<bool>(),
        prop_oneof![
            Just(InputSource::Differential),
            Just(InputSource::SingleEnded),
            Just(InputSource::Pdm),
        ],
        any::<bool>(),
        any::<bool>(),
        0u8..=42,
        any::<bool>(),
        any::<u8>(),
        format(),
    )
        .prop_map(
            |(enabled, input, mic, dc_coupled, gain, agc, volume, format)| ChannelConfig {
                enabled,
                input,
                kind: if mic {
                    InputKind::Microphone
                } else {
                    InputKind::Line
                },
                dc_coupled,
                // PDM inputs bypass the PGA.
                gain: if input == InputSource::Pdm {
                    GainDb::ZERO
                } else {
                    GainDb::new(gain)
                },
                agc,
                volume: DigitalVolume::from_code(volume),
                format,
            },
        )
}

/// Four channels where every enabled one uses `shared`; disabled channels
/// keep whatever format they were generated with.
fn bank() -> impl Strategy<Value = [ChannelConfig; 4]> {
    (format(), [channel_config(), channel_config(), channel_config(), channel_config()]).prop_map(
        |(shared, mut configs)| {
            for config in configs.iter_mut().filter(|c| c.enabled) {
                config.format = shared;
            }
            configs
        },
    )
}

fn driver_config() -> DriverConfig {
    DriverConfig {
        reset_settle_us: 0,
        wake_settle_us: 0,
        ..DriverConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_committed_channel_reads_back(index in 0u8..4, config in channel_config()) {
        let config = ChannelConfig { enabled: true, ..config };
        let queue: FrameQueue<NoopRawMutex, 2> = FrameQueue::new();
        let mut dev =
            Taa3040::with_config(MockBus::new(0x4C), I2cAddr::new(0x4C), driver_config(), &queue);

        let read = block_on(async {
            dev.stage_channel(index, config).unwrap();
            dev.configure().await.unwrap();
            dev.read_channel(index).await.unwrap()
        });

        prop_assert_eq!(read, config);
        let channel = ChannelIndex::try_new(index).unwrap();
        prop_assert_eq!(dev.committed(channel), Some(&config));
    }

    #[test]
    fn prop_every_channel_reads_back_as_committed(configs in bank()) {
        let queue: FrameQueue<NoopRawMutex, 2> = FrameQueue::new();
        let mut dev =
            Taa3040::with_config(MockBus::new(0x4C), I2cAddr::new(0x4C), driver_config(), &queue);

        let reads = block_on(async {
            for (index, config) in (0u8..).zip(configs) {
                dev.stage_channel(index, config).unwrap();
            }
            dev.configure().await.unwrap();
            let mut reads = Vec::new();
            for index in 0..4 {
                reads.push(dev.read_channel(index).await.unwrap());
            }
            reads
        });

        let word = dev.stream_format();
        for ((channel, config), read) in ChannelIndex::all().zip(configs).zip(reads) {
            let committed = *dev.committed(channel).unwrap();
            prop_assert_eq!(read, committed);
            // Only the word length is shared; everything else is per channel.
            prop_assert_eq!(committed, ChannelConfig { format: word, ..config });
            if config.enabled {
                prop_assert_eq!(committed, config);
            }
        }
    }
}
