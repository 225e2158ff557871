//! TAA3040 register map
//!
//! Source: TAA3040 datasheet register map (pages 0, 2, 3 and 4).
//!
//! # Paging
//!
//! The control interface exposes a 128-byte window. Offset 0x00 of every
//! page is PAGE_CFG; writing it selects the page that subsequent offsets
//! refer to. Page 0 holds all configuration and status registers, pages 2
//! and 3 hold the programmable biquad coefficients, page 4 the first-order
//! IIR coefficients.
//!
//! # Power-on state
//!
//! The part comes out of reset asleep (SLEEP_CFG.SLEEP_ENZ = 0) with all four
//! input channels enabled in IN_CH_EN but no ASI output slots enabled, so no
//! audio is produced until both ASI_OUT_CH_EN and PWR_CFG are written.
//!
//! # Read-only registers
//!
//! ASI_STS, DEV_STS0 and DEV_STS1 are status registers. Writes are ignored by
//! the part and rejected by the driver.

use platform::{ChannelIndex, CHANNEL_COUNT};

// ---------------------------------------------------------------------------
// Register addresses
// ---------------------------------------------------------------------------

/// Paged register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register {
    /// Page number (0, 2, 3 or 4 on this part).
    pub page: u8,
    /// Offset within the page, 0x00..=0x7F.
    pub offset: u8,
}

impl Register {
    /// Page 0 register.
    pub const fn page0(offset: u8) -> Self {
        Self { page: 0, offset }
    }

    /// Flat key used by the shadow map: `page << 8 | offset`.
    pub const fn key(self) -> u16 {
        ((self.page as u16) << 8) | self.offset as u16
    }

    /// Inverse of [`key`][Self::key].
    #[allow(clippy::cast_possible_truncation)] // Safety: both halves are masked to 8 bits
    pub const fn from_key(key: u16) -> Self {
        Self {
            page: (key >> 8) as u8,
            offset: (key & 0xFF) as u8,
        }
    }

    /// `true` for status registers the part never lets the host write.
    pub const fn is_read_only(self) -> bool {
        self.page == 0 && matches!(self.offset, ASI_STS | DEV_STS0 | DEV_STS1)
    }

    /// `true` for registers the driver manages itself and never exposes to
    /// raw writes: PAGE_CFG on every page, and SW_RESET.
    pub const fn is_reserved(self) -> bool {
        self.offset == PAGE_CFG || (self.page == 0 && self.offset == SW_RESET)
    }

    /// `true` for page 0 registers written by a commit.
    pub fn is_commit_managed(self) -> bool {
        self.page == 0 && COMMIT_REGISTERS.contains(&self.offset)
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "P{}:{:#04x}", self.page, self.offset)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Register {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "P{}:{=u8:#04x}", self.page, self.offset);
    }
}

/// Page select, present at offset 0 of every page.
pub const PAGE_CFG: u8 = 0x00;

/// Software reset: bit 0, self-clearing.
pub const SW_RESET: u8 = 0x01;

/// Sleep / regulator configuration.
pub const SLEEP_CFG: u8 = 0x02;

/// ASI format, word length, polarity and fill.
pub const ASI_CFG0: u8 = 0x07;

/// Controller-mode enable and MCLK frequency select.
pub const MST_CFG0: u8 = 0x13;

/// Sample rate and BCLK/FSYNC ratio in controller mode.
pub const MST_CFG1: u8 = 0x14;

/// ASI bus clock monitor status (read-only).
pub const ASI_STS: u8 = 0x15;

/// Channel 1 input configuration. Channel n lives at `+ 5 * n`.
pub const CH1_CFG0: u8 = 0x3C;

/// Channel 1 analog gain.
pub const CH1_CFG1: u8 = 0x3D;

/// Channel 1 digital volume.
pub const CH1_CFG2: u8 = 0x3E;

/// Stride between consecutive channel register blocks.
pub const CH_STRIDE: u8 = 5;

/// Input channel enable: bit (7 - n) for channel n.
pub const IN_CH_EN: u8 = 0x73;

/// ASI output slot enable: bit (7 - n) for channel n.
pub const ASI_OUT_CH_EN: u8 = 0x74;

/// Power-up control for mic bias, ADC and PLL.
pub const PWR_CFG: u8 = 0x75;

/// Per-channel power status (read-only).
pub const DEV_STS0: u8 = 0x76;

/// Device mode status (read-only).
pub const DEV_STS1: u8 = 0x77;

// ---------------------------------------------------------------------------
// Power-on defaults
// ---------------------------------------------------------------------------

/// ASI_CFG0 after reset: TDM, 32-bit words.
pub const ASI_CFG0_POR: u8 = 0x30;
/// MST_CFG0 after reset: target mode, 12.288 MHz MCLK select.
pub const MST_CFG0_POR: u8 = 0x02;
/// MST_CFG1 after reset: 48 kHz, BCLK ratio code 8.
pub const MST_CFG1_POR: u8 = 0x48;
/// CHx_CFG2 after reset: 0 dB digital volume.
pub const CH_CFG2_POR: u8 = 0xC9;
/// IN_CH_EN after reset: all four inputs enabled.
pub const IN_CH_EN_POR: u8 = 0xF0;

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// SW_RESET: trigger reset.
pub const SW_RESET_ASSERT: u8 = 0x01;

/// SLEEP_CFG: use the internal regulator.
pub const SLEEP_CFG_AREG_INTERNAL: u8 = 1 << 7;
/// SLEEP_CFG: leave sleep mode.
pub const SLEEP_CFG_SLEEP_ENZ: u8 = 1 << 0;
/// SLEEP_CFG value that wakes the part on the internal regulator.
pub const SLEEP_CFG_WAKE: u8 = SLEEP_CFG_AREG_INTERNAL | SLEEP_CFG_SLEEP_ENZ;

/// ASI_CFG0: invert FSYNC.
pub const ASI_CFG0_FSYNC_POL: u8 = 1 << 3;
/// ASI_CFG0: invert BCLK.
pub const ASI_CFG0_BCLK_POL: u8 = 1 << 2;
/// ASI_CFG0: transmit on the opposite edge.
pub const ASI_CFG0_TX_EDGE: u8 = 1 << 1;
/// ASI_CFG0: drive zeros in unused slots.
pub const ASI_CFG0_TX_FILL: u8 = 1 << 0;

/// MST_CFG0: the part drives BCLK/FSYNC.
pub const MST_CFG0_CONTROLLER: u8 = 1 << 7;
/// MST_CFG0: disable automatic clock configuration.
pub const MST_CFG0_AUTO_CLK_DIS: u8 = 1 << 6;

/// CHx_CFG0: microphone input (vs line).
pub const CH_CFG0_INTYP_MIC: u8 = 1 << 7;
/// CHx_CFG0: DC-coupled input.
pub const CH_CFG0_DC: u8 = 1 << 4;
/// CHx_CFG0: input source field shift.
pub const CH_CFG0_INSRC_SHIFT: u8 = 5;
/// CHx_CFG0: input source field mask.
pub const CH_CFG0_INSRC_MASK: u8 = 0b11 << CH_CFG0_INSRC_SHIFT;
/// CHx_CFG0: automatic gain control.
pub const CH_CFG0_AGC: u8 = 1 << 0;

/// PWR_CFG: power up mic bias.
pub const PWR_CFG_MICBIAS_PDZ: u8 = 1 << 7;
/// PWR_CFG: power up the ADC channels.
pub const PWR_CFG_ADC_PDZ: u8 = 1 << 6;
/// PWR_CFG: power up the PLL.
pub const PWR_CFG_PLL_PDZ: u8 = 1 << 5;

/// DEV_STS1 mode field shift.
pub const DEV_STS1_MODE_SHIFT: u8 = 5;
/// DEV_STS1 mode: sleep.
pub const MODE_SLEEP: u8 = 0b100;
/// DEV_STS1 mode: active, all channels off.
pub const MODE_ACTIVE_IDLE: u8 = 0b110;
/// DEV_STS1 mode: active, at least one channel recording.
pub const MODE_ACTIVE_RECORDING: u8 = 0b111;

// ---------------------------------------------------------------------------
// Biquad coefficients (pages 2 and 3)
// ---------------------------------------------------------------------------

/// Number of programmable biquads.
pub const BIQUAD_COUNT: u8 = 12;
/// Biquads per coefficient page.
pub const BIQUADS_PER_PAGE: u8 = 6;
/// Page holding biquads 0..=5.
pub const BIQUAD_FIRST_PAGE: u8 = 2;
/// First coefficient offset on a biquad page.
pub const BIQUAD_BASE: u8 = 0x08;
/// Bytes per biquad: five big-endian 32-bit coefficients.
pub const BIQUAD_SIZE: u8 = 20;

// ---------------------------------------------------------------------------
// First-order IIR coefficients (page 4)
// ---------------------------------------------------------------------------

/// Page holding the IIR coefficients.
pub const IIR_PAGE: u8 = 4;
/// First IIR coefficient register (N0, MSB).
pub const IIR_BASE: u8 = 0x48;
/// Bytes of IIR coefficients: three big-endian 32-bit values.
pub const IIR_SIZE: u8 = 12;
/// First IIR coefficient register.
pub const IIR_REGISTER: Register = Register {
    page: IIR_PAGE,
    offset: IIR_BASE,
};

// ---------------------------------------------------------------------------
// Address helpers
// ---------------------------------------------------------------------------

/// The three configuration registers of one channel, ascending.
#[allow(clippy::arithmetic_side_effects)] // Safety: index < 4, 0x3E + 15 < 0x80
pub const fn channel_registers(channel: ChannelIndex) -> [Register; 3] {
    let base = CH1_CFG0 + CH_STRIDE * channel.get();
    [
        Register::page0(base),
        Register::page0(base + 1),
        Register::page0(base + 2),
    ]
}

/// IN_CH_EN / ASI_OUT_CH_EN / DEV_STS0 bit for `channel`.
#[allow(clippy::arithmetic_side_effects)] // Safety: index < 4
pub const fn channel_bit(channel: ChannelIndex) -> u8 {
    0x80 >> channel.get()
}

/// First coefficient register of biquad `index`, or `None` past the last one.
#[allow(clippy::arithmetic_side_effects)] // Safety: index < 12, 0x08 + 20 * 5 < 0x80
pub const fn biquad_register(index: u8) -> Option<Register> {
    if index >= BIQUAD_COUNT {
        return None;
    }
    Some(Register {
        page: BIQUAD_FIRST_PAGE + index / BIQUADS_PER_PAGE,
        offset: BIQUAD_BASE + BIQUAD_SIZE * (index % BIQUADS_PER_PAGE),
    })
}

/// Every page 0 register a commit may write, ascending.
pub const COMMIT_REGISTERS: [u8; 3 + 3 * CHANNEL_COUNT + 2] = [
    ASI_CFG0,
    MST_CFG0,
    MST_CFG1,
    0x3C,
    0x3D,
    0x3E,
    0x41,
    0x42,
    0x43,
    0x46,
    0x47,
    0x48,
    0x4B,
    0x4C,
    0x4D,
    IN_CH_EN,
    ASI_OUT_CH_EN,
];
