//! Capture domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `GainDb`: analog PGA gain, 0–42 dB in 1 dB steps
//! - `DigitalVolume`: CHx_CFG2 register code, 0.5 dB steps, 0 = mute
//! - `ChannelIndex`: rejects channels the ADC does not have
//! - `SampleFormat`: ASI word length and raw slot decoding
//! - `I2cAddr`: rejects I2C-reserved addresses

/// Number of analog input channels on the TAA3040.
pub const CHANNEL_COUNT: usize = 4;

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("value {value} outside {min}..={max}")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── GainDb ───────────────────────────────────────────────────────────────────

/// Analog programmable-gain-amplifier setting in whole decibels.
///
/// Wraps a `u8` with the invariant `0 <= value <= 42`. The TAA3040 PGA
/// offers discrete 1 dB levels over that range; the level is stored in
/// bits \[7:2\] of CHx_CFG1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct GainDb(u8);

impl GainDb {
    /// Highest gain level supported by the PGA.
    pub const MAX_DB: u8 = 42;

    /// 0 dB (PGA bypassed). Power-on default.
    pub const ZERO: Self = Self(0);

    /// Create a `GainDb`, clamping values above 42 dB to 42 dB.
    #[must_use]
    pub fn new(db: u8) -> Self {
        Self(db.min(Self::MAX_DB))
    }

    /// Create a `GainDb`, returning an error if `db > 42`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `db > 42`.
    pub fn try_new(db: u8) -> Result<Self, OutOfRangeError> {
        if db > Self::MAX_DB {
            Err(OutOfRangeError {
                value: u32::from(db),
                min: 0,
                max: u32::from(Self::MAX_DB),
            })
        } else {
            Ok(Self(db))
        }
    }

    /// Return the gain in dB.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Encode as the CHx_CFG1 register value (gain in bits \[7:2\]).
    #[must_use]
    pub fn register_bits(self) -> u8 {
        // self.0 <= 42, so 42 << 2 = 168 fits in u8
        self.0 << 2
    }

    /// Decode a CHx_CFG1 register value.
    ///
    /// Reserved codes above 42 dB are clamped.
    #[must_use]
    pub fn from_register_bits(value: u8) -> Self {
        Self::new(value >> 2)
    }
}

// ── DigitalVolume ────────────────────────────────────────────────────────────

/// Per-channel digital volume, stored as the CHx_CFG2 register code.
///
/// | Code | Level     |
/// |------|-----------|
/// | 0    | mute      |
/// | 1    | –100 dB   |
/// | 201  | 0 dB      |
/// | 255  | +27 dB    |
///
/// Each code step is 0.5 dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct DigitalVolume(u8);

impl DigitalVolume {
    /// Register code for muted output.
    pub const MUTE: Self = Self(0);

    /// Register code for 0 dB. Power-on default.
    pub const UNITY: Self = Self(201);

    /// Quietest non-muted level, in half-dB steps relative to 0 dB (–100 dB).
    pub const MIN_HALF_DB: i16 = -200;

    /// Loudest level, in half-dB steps relative to 0 dB (+27 dB).
    pub const MAX_HALF_DB: i16 = 54;

    /// Build from a level in half-dB steps relative to 0 dB, clamping to
    /// –100 dB … +27 dB.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: clamped to -200..=54, +201 stays in 1..=255
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Safety: result is 1..=255
    pub fn from_half_db(half_db: i16) -> Self {
        let clamped = half_db.clamp(Self::MIN_HALF_DB, Self::MAX_HALF_DB);
        Self((clamped + 201) as u8)
    }

    /// Wrap a raw register code.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    /// Raw register code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Level in half-dB steps relative to 0 dB, or `None` when muted.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: 1..=255 - 201 fits in i16
    pub fn half_db(self) -> Option<i16> {
        if self.0 == 0 {
            None
        } else {
            Some(i16::from(self.0) - 201)
        }
    }

    /// `true` when the channel output is muted.
    #[must_use]
    pub const fn is_muted(self) -> bool {
        self.0 == 0
    }
}

impl Default for DigitalVolume {
    fn default() -> Self {
        Self::UNITY
    }
}

// ── ChannelIndex ─────────────────────────────────────────────────────────────

/// Zero-based input channel index, validated against [`CHANNEL_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    /// Create a `ChannelIndex`, rejecting channels the device does not have.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `index >= CHANNEL_COUNT`.
    #[allow(clippy::cast_possible_truncation)] // CHANNEL_COUNT is 4
    pub fn try_new(index: u8) -> Result<Self, OutOfRangeError> {
        if usize::from(index) >= CHANNEL_COUNT {
            Err(OutOfRangeError {
                value: u32::from(index),
                min: 0,
                max: CHANNEL_COUNT.saturating_sub(1) as u32,
            })
        } else {
            Ok(Self(index))
        }
    }

    /// Return the raw index.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Return the index as `usize` for table lookups.
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// Iterate over every channel of the device in ascending order.
    #[allow(clippy::cast_possible_truncation)] // CHANNEL_COUNT is 4
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHANNEL_COUNT as u8).map(Self)
    }
}

// ── SampleFormat ─────────────────────────────────────────────────────────────

/// ASI word length of captured samples.
///
/// The word length field lives in ASI_CFG0 bits \[5:4\] and is shared by
/// every output slot, so all enabled channels must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleFormat {
    /// 16-bit two's complement.
    Bits16,
    /// 20-bit two's complement.
    Bits20,
    /// 24-bit two's complement.
    #[default]
    Bits24,
    /// 32-bit two's complement. Power-on default of the part.
    Bits32,
}

impl SampleFormat {
    /// Significant bits per sample.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits20 => 20,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
        }
    }

    /// Two-bit word length code for ASI_CFG0 \[5:4\].
    #[must_use]
    pub const fn word_length_code(self) -> u8 {
        match self {
            Self::Bits16 => 0b00,
            Self::Bits20 => 0b01,
            Self::Bits24 => 0b10,
            Self::Bits32 => 0b11,
        }
    }

    /// Inverse of [`word_length_code`][Self::word_length_code]; only the low
    /// two bits are considered.
    #[must_use]
    pub const fn from_word_length_code(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Self::Bits16,
            0b01 => Self::Bits20,
            0b10 => Self::Bits24,
            _ => Self::Bits32,
        }
    }

    /// Decode one left-justified 32-bit ASI slot into a sign-extended sample.
    ///
    /// The serial audio interface delivers the MSB first, so a 24-bit sample
    /// occupies bits \[31:8\] of the slot; the low bits are ignored.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: shift amount is 0..=16
    pub fn decode_slot(self, raw: u32) -> i32 {
        let signed = i32::from_ne_bytes(raw.to_ne_bytes());
        signed >> (32 - u32::from(self.bits()))
    }

    /// Display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bits16 => "16-bit",
            Self::Bits20 => "20-bit",
            Self::Bits24 => "24-bit",
            Self::Bits32 => "32-bit",
        }
    }
}

impl core::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── I2cAddr ──────────────────────────────────────────────────────────────────

/// I2C 7-bit device address.
///
/// ## Reserved I2C addresses (I2C specification):
/// - 0x00–0x07: reserved (general call, CBUS, etc.)
/// - 0x78–0x7F: reserved (10-bit address prefix, device ID, etc.)
///
/// ## Usage:
/// ```rust
/// use platform::audio_types::I2cAddr;
///
/// // TAA3040 with ADDR1 = ADDR0 = GND
/// let adc = I2cAddr::new(0x4C);
/// assert_eq!(adc.get(), 0x4C);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct I2cAddr(u8);

impl I2cAddr {
    /// Create an I2C address without checking reserved ranges.
    ///
    /// Prefer [`try_new`][Self::try_new] in generic code. Use this only when
    /// the address is a known hardware-fixed constant.
    #[must_use]
    pub const fn new(addr: u8) -> Self {
        Self(addr)
    }

    /// Create an I2C address, rejecting I2C-reserved ranges.
    ///
    /// Reserved: 0x00–0x07 (general call etc.) and 0x78–0x7F (10-bit prefix).
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `addr <= 0x07` or `addr >= 0x78`.
    pub fn try_new(addr: u8) -> Result<Self, OutOfRangeError> {
        if addr <= 0x07 || addr >= 0x78 {
            Err(OutOfRangeError {
                value: u32::from(addr),
                min: 0x08,
                max: 0x77,
            })
        } else {
            Ok(Self(addr))
        }
    }

    /// Return the 7-bit I2C address.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn gain_register_bits_round_trip_at_extremes() {
        assert_eq!(GainDb::ZERO.register_bits(), 0);
        assert_eq!(GainDb::new(42).register_bits(), 0xA8);
        assert_eq!(GainDb::from_register_bits(0xA8), GainDb::new(42));
        // Reserved codes (> 42 dB) clamp instead of wrapping.
        assert_eq!(GainDb::from_register_bits(0xFC).get(), 42);
    }

    #[test]
    fn digital_volume_unity_is_201() {
        assert_eq!(DigitalVolume::UNITY.code(), 201);
        assert_eq!(DigitalVolume::from_half_db(0), DigitalVolume::UNITY);
        assert_eq!(DigitalVolume::default(), DigitalVolume::UNITY);
    }

    #[test]
    fn digital_volume_clamps_and_never_mutes() {
        assert_eq!(DigitalVolume::from_half_db(i16::MIN).code(), 1);
        assert_eq!(DigitalVolume::from_half_db(i16::MAX).code(), 255);
        assert!(!DigitalVolume::from_half_db(-500).is_muted());
        assert_eq!(DigitalVolume::MUTE.half_db(), None);
        assert_eq!(DigitalVolume::from_code(255).half_db(), Some(54));
    }

    #[test]
    fn channel_index_rejects_fifth_channel() {
        assert!(ChannelIndex::try_new(3).is_ok());
        let err = ChannelIndex::try_new(4).unwrap_err();
        assert_eq!(err.max, 3);
        assert_eq!(ChannelIndex::all().count(), CHANNEL_COUNT);
    }

    #[test]
    fn word_length_codes_match_asi_cfg0() {
        for format in [
            SampleFormat::Bits16,
            SampleFormat::Bits20,
            SampleFormat::Bits24,
            SampleFormat::Bits32,
        ] {
            assert_eq!(
                SampleFormat::from_word_length_code(format.word_length_code()),
                format
            );
        }
        assert_eq!(SampleFormat::Bits24.word_length_code(), 0b10);
    }

    #[test]
    fn decode_slot_sign_extends_left_justified_samples() {
        // -1 in 24-bit, left-justified, garbage in the low byte
        assert_eq!(SampleFormat::Bits24.decode_slot(0xFFFF_FF7F), -1);
        // +0x123456 in 24-bit
        assert_eq!(SampleFormat::Bits24.decode_slot(0x1234_5600), 0x12_3456);
        // most negative 16-bit
        assert_eq!(SampleFormat::Bits16.decode_slot(0x8000_0000), -32768);
        // 32-bit passes through
        assert_eq!(SampleFormat::Bits32.decode_slot(0x7FFF_FFFF), i32::MAX);
    }

    #[test]
    fn i2c_addr_rejects_reserved_ranges() {
        assert!(I2cAddr::try_new(0x07).is_err());
        assert!(I2cAddr::try_new(0x78).is_err());
        assert_eq!(I2cAddr::try_new(0x4C).unwrap().get(), 0x4C);
    }
}
