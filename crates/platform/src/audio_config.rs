//! Serial audio interface (ASI) and clocking configuration for the TAA3040.
//!
//! The ADC streams samples to the host over its ASI port (TDM, I²S or
//! left-justified). Control happens over I²C; the ASI path never touches the
//! control bus.
//!
//! # Clock Chain
//!
//! In target mode the host drives BCLK and FSYNC and the device detects the
//! ratio on its own. In controller mode the device derives both from MCLK:
//!
//! ```text
//! MCLK (MCLK_FREQ_SEL) → PLL → BCLK = FS × FS_BCLK_RATIO
//!                            → FSYNC = FS (FS_RATE)
//! ```
//!
//! For 48 kHz, 4 × 24-bit TDM slots: BCLK = 48 000 × 96 = 4.608 MHz.
//!
//! # I2C Addresses
//!
//! | ADDR1 | ADDR0 | Address |
//! |-------|-------|---------|
//! | GND   | GND   | 0x4C    |
//! | GND   | IOVDD | 0x4D    |
//! | IOVDD | GND   | 0x4E    |
//! | IOVDD | IOVDD | 0x4F    |

use crate::audio_types::{I2cAddr, SampleFormat};

/// ASI frame format (ASI_CFG0 bits \[7:6\]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsiFormat {
    /// Time-division multiplexed: one slot per active channel. Power-on default.
    #[default]
    Tdm,
    /// Standard I²S: left/right halves of the frame.
    I2s,
    /// Left-justified: like I²S without the one-BCLK data delay.
    LeftJustified,
}

impl AsiFormat {
    /// Two-bit format code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Tdm => 0b00,
            Self::I2s => 0b01,
            Self::LeftJustified => 0b10,
        }
    }

    /// Decode a format code; the reserved code `0b11` yields `None`.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code & 0b11 {
            0b00 => Some(Self::Tdm),
            0b01 => Some(Self::I2s),
            0b10 => Some(Self::LeftJustified),
            _ => None,
        }
    }
}

/// Output sample rate in controller mode (MST_CFG1 FS_RATE).
///
/// Each code covers both the 48 kHz and the 44.1 kHz family; the family is
/// implied by the MCLK frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleRate {
    /// 8 kHz
    Khz8,
    /// 16 kHz
    Khz16,
    /// 24 kHz
    Khz24,
    /// 32 kHz
    Khz32,
    /// 48 kHz
    #[default]
    Khz48,
    /// 96 kHz
    Khz96,
    /// 192 kHz
    Khz192,
    /// 384 kHz
    Khz384,
    /// 768 kHz
    Khz768,
}

impl SampleRate {
    /// FS_RATE field code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Khz8 => 0,
            Self::Khz16 => 1,
            Self::Khz24 => 2,
            Self::Khz32 => 3,
            Self::Khz48 => 4,
            Self::Khz96 => 5,
            Self::Khz192 => 6,
            Self::Khz384 => 7,
            Self::Khz768 => 8,
        }
    }

    /// Frame rate in Hz (48 kHz family).
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Self::Khz8 => 8_000,
            Self::Khz16 => 16_000,
            Self::Khz24 => 24_000,
            Self::Khz32 => 32_000,
            Self::Khz48 => 48_000,
            Self::Khz96 => 96_000,
            Self::Khz192 => 192_000,
            Self::Khz384 => 384_000,
            Self::Khz768 => 768_000,
        }
    }
}

/// Reference MCLK frequency in controller mode (MST_CFG0 MCLK_FREQ_SEL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MclkFrequency {
    /// 12.000 MHz
    Mhz12_000,
    /// 12.288 MHz (256 × 48 kHz)
    #[default]
    Mhz12_288,
    /// 13.000 MHz
    Mhz13_000,
    /// 16.000 MHz
    Mhz16_000,
    /// 19.200 MHz
    Mhz19_200,
    /// 19.680 MHz
    Mhz19_680,
    /// 24.000 MHz
    Mhz24_000,
    /// 24.576 MHz (512 × 48 kHz)
    Mhz24_576,
}

impl MclkFrequency {
    /// MCLK_FREQ_SEL field code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Mhz12_000 => 0,
            Self::Mhz12_288 => 1,
            Self::Mhz13_000 => 2,
            Self::Mhz16_000 => 3,
            Self::Mhz19_200 => 4,
            Self::Mhz19_680 => 5,
            Self::Mhz24_000 => 6,
            Self::Mhz24_576 => 7,
        }
    }

    /// Frequency in Hz.
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Self::Mhz12_000 => 12_000_000,
            Self::Mhz12_288 => 12_288_000,
            Self::Mhz13_000 => 13_000_000,
            Self::Mhz16_000 => 16_000_000,
            Self::Mhz19_200 => 19_200_000,
            Self::Mhz19_680 => 19_680_000,
            Self::Mhz24_000 => 24_000_000,
            Self::Mhz24_576 => 24_576_000,
        }
    }
}

/// Who drives BCLK and FSYNC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClockRole {
    /// Host drives the clocks; the ADC auto-detects the ratio. Power-on default.
    #[default]
    Target,
    /// The ADC generates BCLK/FSYNC from MCLK.
    Controller {
        /// Reference clock on the MCLK pin.
        mclk: MclkFrequency,
        /// Generated frame rate.
        sample_rate: SampleRate,
    },
}

/// Serial audio interface configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsiConfig {
    /// Frame format.
    pub format: AsiFormat,
    /// Invert FSYNC polarity.
    pub fsync_inverted: bool,
    /// Invert BCLK polarity.
    pub bclk_inverted: bool,
    /// Transmit data on the opposite BCLK edge.
    pub transmit_edge_inverted: bool,
    /// Drive zeros into unused slots instead of Hi-Z.
    pub zero_fill: bool,
    /// Clock generation.
    pub clock: ClockRole,
}

impl AsiConfig {
    /// Slots per frame for `active_channels` enabled channels.
    ///
    /// TDM uses one slot per channel; I²S and left-justified split the frame
    /// into two equal halves.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: active_channels <= 4
    pub fn slots_per_frame(&self, active_channels: u8) -> u8 {
        let active = active_channels.max(1);
        match self.format {
            AsiFormat::Tdm => active,
            AsiFormat::I2s | AsiFormat::LeftJustified => active.div_ceil(2) * 2,
        }
    }

    /// BCLK cycles per frame (BCLK / FSYNC).
    #[must_use]
    pub fn bclk_ratio(&self, word: SampleFormat, active_channels: u8) -> u32 {
        u32::from(word.bits()).saturating_mul(u32::from(self.slots_per_frame(active_channels)))
    }

    /// BCLK frequency in Hz in controller mode, `None` in target mode.
    #[must_use]
    pub fn bclk_hz(&self, word: SampleFormat, active_channels: u8) -> Option<u32> {
        match self.clock {
            ClockRole::Target => None,
            ClockRole::Controller { sample_rate, .. } => Some(
                sample_rate
                    .hz()
                    .saturating_mul(self.bclk_ratio(word, active_channels)),
            ),
        }
    }
}

/// Encode a BCLK/FSYNC ratio as the MST_CFG1 FS_BCLK_RATIO code.
///
/// Returns `None` for ratios the clock generator cannot produce.
#[must_use]
pub const fn fs_bclk_ratio_code(ratio: u32) -> Option<u8> {
    match ratio {
        16 => Some(0),
        24 => Some(1),
        32 => Some(2),
        48 => Some(3),
        64 => Some(4),
        96 => Some(5),
        128 => Some(6),
        192 => Some(7),
        256 => Some(8),
        384 => Some(9),
        512 => Some(10),
        1024 => Some(11),
        2048 => Some(12),
        _ => None,
    }
}

/// I2C addresses of the TAA3040.
pub struct I2cAddresses;

impl I2cAddresses {
    /// Address with both ADDR pins tied low.
    pub const TAA3040_BASE: u8 = 0x4C;

    /// Address selected by the ADDR1/ADDR0 strap pins (`true` = IOVDD).
    #[must_use]
    pub const fn taa3040(addr1: bool, addr0: bool) -> I2cAddr {
        let offset = ((addr1 as u8) << 1) | (addr0 as u8);
        I2cAddr::new(Self::TAA3040_BASE | offset)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn tdm_uses_one_slot_per_channel() {
        let cfg = AsiConfig::default();
        assert_eq!(cfg.slots_per_frame(4), 4);
        assert_eq!(cfg.slots_per_frame(3), 3);
        // An empty frame still has one slot on the wire.
        assert_eq!(cfg.slots_per_frame(0), 1);
    }

    #[test]
    fn i2s_rounds_slots_up_to_pairs() {
        let cfg = AsiConfig {
            format: AsiFormat::I2s,
            ..AsiConfig::default()
        };
        assert_eq!(cfg.slots_per_frame(1), 2);
        assert_eq!(cfg.slots_per_frame(3), 4);
    }

    #[test]
    fn controller_bclk_for_48khz_four_24bit_slots() {
        let cfg = AsiConfig {
            clock: ClockRole::Controller {
                mclk: MclkFrequency::Mhz12_288,
                sample_rate: SampleRate::Khz48,
            },
            ..AsiConfig::default()
        };
        assert_eq!(cfg.bclk_ratio(SampleFormat::Bits24, 4), 96);
        assert_eq!(cfg.bclk_hz(SampleFormat::Bits24, 4), Some(4_608_000));
        assert_eq!(fs_bclk_ratio_code(96), Some(5));
    }

    #[test]
    fn target_mode_has_no_generated_bclk() {
        assert_eq!(AsiConfig::default().bclk_hz(SampleFormat::Bits32, 2), None);
    }

    #[test]
    fn three_24bit_tdm_slots_is_not_a_supported_ratio() {
        assert_eq!(fs_bclk_ratio_code(72), None);
    }

    #[test]
    fn mclk_12_288_is_256_fs() {
        assert_eq!(
            MclkFrequency::Mhz12_288.hz() / SampleRate::Khz48.hz(),
            256,
            "12.288 MHz must be 256 × 48 kHz"
        );
    }

    #[test]
    fn strap_pins_select_addresses_4c_to_4f() {
        assert_eq!(I2cAddresses::taa3040(false, false).get(), 0x4C);
        assert_eq!(I2cAddresses::taa3040(false, true).get(), 0x4D);
        assert_eq!(I2cAddresses::taa3040(true, false).get(), 0x4E);
        assert_eq!(I2cAddresses::taa3040(true, true).get(), 0x4F);
    }

    #[test]
    fn asi_format_codes_round_trip() {
        for f in [AsiFormat::Tdm, AsiFormat::I2s, AsiFormat::LeftJustified] {
            assert_eq!(AsiFormat::from_code(f.code()), Some(f));
        }
        assert_eq!(AsiFormat::from_code(0b11), None);
    }
}
