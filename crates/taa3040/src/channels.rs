//! Channel configuration manager.
//!
//! Holds two copies of the per-channel and serial-interface configuration:
//! the *staged* copy the caller edits, and the *committed* copy that matches
//! the device. Alongside the committed copy sits a [`RegisterImage`], the
//! raw bytes of every register a commit may touch, so a commit writes only
//! what actually changes. The committed channel records are always decoded
//! from that image, so they read exactly like the device: a disabled channel
//! carries the shared ASI word length, whatever format was staged for it.
//!
//! The image starts at the part's power-on defaults, not at the encoding of
//! the default [`ChannelConfig`]: after reset all four inputs are enabled in
//! IN_CH_EN, and the first commit has to clear the ones the caller left off.

use platform::{
    audio_config::fs_bclk_ratio_code, AsiConfig, AsiFormat, ChannelIndex, ClockRole,
    DigitalVolume, GainDb, SampleFormat, CHANNEL_COUNT,
};

use crate::error::ValidationError;
use crate::registers::{
    self, channel_bit, Register, ASI_CFG0, ASI_CFG0_BCLK_POL, ASI_CFG0_FSYNC_POL, ASI_CFG0_POR,
    ASI_CFG0_TX_EDGE, ASI_CFG0_TX_FILL, ASI_OUT_CH_EN, CH_CFG0_DC, CH_CFG0_INSRC_MASK,
    CH_CFG0_INSRC_SHIFT, CH_CFG0_AGC, CH_CFG0_INTYP_MIC, CH_CFG2_POR, COMMIT_REGISTERS, IN_CH_EN, IN_CH_EN_POR,
    MST_CFG0, MST_CFG0_CONTROLLER, MST_CFG0_POR, MST_CFG1, MST_CFG1_POR,
};

// ── Channel records ──────────────────────────────────────────────────────────

/// Where a channel takes its signal from (CHx_CFG0.INSRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputSource {
    /// Analog differential input. Power-on default.
    #[default]
    Differential,
    /// Analog single-ended input.
    SingleEnded,
    /// Digital PDM microphone; bypasses the analog PGA.
    Pdm,
}

impl InputSource {
    const fn code(self) -> u8 {
        match self {
            Self::Differential => 0,
            Self::SingleEnded => 1,
            Self::Pdm => 2,
        }
    }

    const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::SingleEnded,
            2 => Self::Pdm,
            _ => Self::Differential,
        }
    }
}

/// Analog front-end impedance (CHx_CFG0.INTYP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputKind {
    /// Line input. Power-on default.
    #[default]
    Line,
    /// Microphone input; needs mic bias when streaming.
    Microphone,
}

/// Configuration of one input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelConfig {
    /// Channel converts and appears in the ASI output.
    pub enabled: bool,
    /// Signal source.
    pub input: InputSource,
    /// Line or microphone impedance.
    pub kind: InputKind,
    /// DC-coupled input.
    pub dc_coupled: bool,
    /// Analog PGA gain. Must be 0 dB for PDM inputs.
    pub gain: GainDb,
    /// Automatic gain control; `gain` is then the AGC's starting point.
    pub agc: bool,
    /// Digital volume.
    pub volume: DigitalVolume,
    /// ASI word length; shared by every enabled channel.
    pub format: SampleFormat,
}

impl ChannelConfig {
    /// Enabled analog line input with `gain` and `format`.
    pub fn line(gain: GainDb, format: SampleFormat) -> Self {
        Self {
            enabled: true,
            gain,
            format,
            ..Self::default()
        }
    }

    /// Enabled analog microphone input with `gain` and `format`.
    pub fn microphone(gain: GainDb, format: SampleFormat) -> Self {
        Self {
            kind: InputKind::Microphone,
            ..Self::line(gain, format)
        }
    }

    /// Enabled digital PDM microphone with `format`.
    pub fn pdm(format: SampleFormat) -> Self {
        Self {
            input: InputSource::Pdm,
            kind: InputKind::Microphone,
            ..Self::line(GainDb::ZERO, format)
        }
    }

    /// Same configuration with the source replaced.
    #[must_use]
    pub fn with_input(self, input: InputSource) -> Self {
        Self { input, ..self }
    }

    /// Same configuration with automatic gain control switched.
    #[must_use]
    pub fn with_agc(self, agc: bool) -> Self {
        Self { agc, ..self }
    }

    /// Same configuration with the digital volume replaced.
    #[must_use]
    pub fn with_volume(self, volume: DigitalVolume) -> Self {
        Self { volume, ..self }
    }

    /// Reject combinations the part cannot express.
    pub fn validate(&self, channel: ChannelIndex) -> Result<(), ValidationError> {
        if self.input == InputSource::Pdm && self.gain != GainDb::ZERO {
            return Err(ValidationError::PdmGainNotSupported(channel.get()));
        }
        Ok(())
    }

    /// `true` when streaming this channel needs mic bias.
    pub fn needs_mic_bias(&self) -> bool {
        self.enabled && self.kind == InputKind::Microphone && self.input != InputSource::Pdm
    }

    /// CHx_CFG0, CHx_CFG1, CHx_CFG2.
    #[allow(clippy::arithmetic_side_effects)] // Safety: INSRC code <= 2, shifted field fits bits [6:5]
    pub fn encode(&self) -> [u8; 3] {
        let mut cfg0 = (self.input.code() << CH_CFG0_INSRC_SHIFT) & CH_CFG0_INSRC_MASK;
        if self.kind == InputKind::Microphone {
            cfg0 |= CH_CFG0_INTYP_MIC;
        }
        if self.dc_coupled {
            cfg0 |= CH_CFG0_DC;
        }
        if self.agc {
            cfg0 |= CH_CFG0_AGC;
        }
        [cfg0, self.gain.register_bits(), self.volume.code()]
    }

    /// Rebuild a configuration from its channel registers, enable state and
    /// the global word length.
    #[allow(clippy::arithmetic_side_effects)] // Safety: masked field shifted right
    pub fn decode(regs: [u8; 3], enabled: bool, format: SampleFormat) -> Self {
        let [cfg0, cfg1, cfg2] = regs;
        Self {
            enabled,
            input: InputSource::from_code((cfg0 & CH_CFG0_INSRC_MASK) >> CH_CFG0_INSRC_SHIFT),
            kind: if cfg0 & CH_CFG0_INTYP_MIC != 0 {
                InputKind::Microphone
            } else {
                InputKind::Line
            },
            dc_coupled: cfg0 & CH_CFG0_DC != 0,
            gain: GainDb::from_register_bits(cfg1),
            agc: cfg0 & CH_CFG0_AGC != 0,
            volume: DigitalVolume::from_code(cfg2),
            format,
        }
    }
}

// ── Register image ───────────────────────────────────────────────────────────

/// Raw values of every register a commit may write, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterImage([u8; COMMIT_REGISTERS.len()]);

impl RegisterImage {
    /// Image of a freshly reset part.
    pub fn power_on() -> Self {
        let mut image = Self([0; COMMIT_REGISTERS.len()]);
        image.set(ASI_CFG0, ASI_CFG0_POR);
        image.set(MST_CFG0, MST_CFG0_POR);
        image.set(MST_CFG1, MST_CFG1_POR);
        for channel in ChannelIndex::all() {
            let [_, _, cfg2] = registers::channel_registers(channel);
            image.set(cfg2.offset, CH_CFG2_POR);
        }
        image.set(IN_CH_EN, IN_CH_EN_POR);
        image
    }

    /// Value of page 0 register `offset`, if the image covers it.
    pub fn get(&self, offset: u8) -> Option<u8> {
        COMMIT_REGISTERS
            .iter()
            .position(|&r| r == offset)
            .and_then(|i| self.0.get(i).copied())
    }

    fn set(&mut self, offset: u8, value: u8) {
        if let Some(slot) = COMMIT_REGISTERS
            .iter()
            .position(|&r| r == offset)
            .and_then(|i| self.0.get_mut(i))
        {
            *slot = value;
        }
    }

    /// Word length in ASI_CFG0.
    #[allow(clippy::arithmetic_side_effects)] // Safety: right shift of u8 by 4
    pub fn word_length(&self) -> SampleFormat {
        let code = self.get(ASI_CFG0).unwrap_or(ASI_CFG0_POR) >> 4;
        SampleFormat::from_word_length_code(code)
    }

    /// Channel record as the device would report it.
    ///
    /// A channel counts as enabled only when both its input and its ASI
    /// output slot are on.
    pub fn channel(&self, channel: ChannelIndex) -> ChannelConfig {
        let mut regs = [0u8; 3];
        for (value, register) in regs.iter_mut().zip(registers::channel_registers(channel)) {
            *value = self.get(register.offset).unwrap_or_default();
        }
        let bit = channel_bit(channel);
        let enabled = self.get(IN_CH_EN).unwrap_or_default() & bit != 0
            && self.get(ASI_OUT_CH_EN).unwrap_or_default() & bit != 0;
        ChannelConfig::decode(regs, enabled, self.word_length())
    }

    /// Every channel record, channel 0 first.
    pub fn channels(&self) -> [ChannelConfig; CHANNEL_COUNT] {
        let mut out = [ChannelConfig::default(); CHANNEL_COUNT];
        for (slot, channel) in out.iter_mut().zip(ChannelIndex::all()) {
            *slot = self.channel(channel);
        }
        out
    }

    /// Registers whose value in `target` differs from `self`, ascending.
    pub fn changes<'a>(&'a self, target: &'a Self) -> impl Iterator<Item = (Register, u8)> + 'a {
        COMMIT_REGISTERS
            .iter()
            .zip(self.0.iter().zip(target.0.iter()))
            .filter(|(_, (old, new))| old != new)
            .map(|(&offset, (_, &new))| (Register::page0(offset), new))
    }
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self::power_on()
    }
}

// ── Channel bank ─────────────────────────────────────────────────────────────

/// Staged and committed configuration of all four channels and the ASI.
#[derive(Debug, Clone)]
pub struct ChannelBank {
    staged: [ChannelConfig; CHANNEL_COUNT],
    staged_asi: AsiConfig,
    committed: [ChannelConfig; CHANNEL_COUNT],
    committed_asi: AsiConfig,
    image: RegisterImage,
}

impl ChannelBank {
    /// Bank matching a freshly reset part, nothing staged.
    pub fn new() -> Self {
        let image = RegisterImage::power_on();
        Self {
            staged: [ChannelConfig::default(); CHANNEL_COUNT],
            staged_asi: AsiConfig::default(),
            committed: image.channels(),
            committed_asi: AsiConfig::default(),
            image,
        }
    }

    /// Stage `config` for channel `index`.
    pub fn stage(&mut self, index: u8, config: ChannelConfig) -> Result<(), ValidationError> {
        let channel =
            ChannelIndex::try_new(index).map_err(|_| ValidationError::ChannelOutOfRange(index))?;
        config.validate(channel)?;
        if let Some(slot) = self.staged.get_mut(channel.as_usize()) {
            *slot = config;
        }
        Ok(())
    }

    /// Stage the serial interface configuration.
    pub fn stage_asi(&mut self, config: AsiConfig) {
        self.staged_asi = config;
    }

    /// Staged configuration of `channel`.
    pub fn staged(&self, channel: ChannelIndex) -> Option<&ChannelConfig> {
        self.staged.get(channel.as_usize())
    }

    /// Committed configuration of `channel`.
    pub fn committed(&self, channel: ChannelIndex) -> Option<&ChannelConfig> {
        self.committed.get(channel.as_usize())
    }

    /// Staged serial interface configuration.
    pub fn staged_asi(&self) -> &AsiConfig {
        &self.staged_asi
    }

    /// Committed serial interface configuration.
    pub fn committed_asi(&self) -> &AsiConfig {
        &self.committed_asi
    }

    /// Committed register image.
    pub fn image(&self) -> &RegisterImage {
        &self.image
    }

    /// `true` when a commit would write nothing.
    pub fn is_clean(&self) -> bool {
        self.staged_asi == self.committed_asi && self.encode_staged() == Ok(self.image)
    }

    /// Encode the staged copy, validating cross-channel constraints.
    ///
    /// No bus traffic; the returned image is what the device must hold after
    /// a successful commit.
    #[allow(clippy::arithmetic_side_effects)] // Safety: 2-bit and 4-bit field codes shifted into u8
    pub fn encode_staged(&self) -> Result<RegisterImage, ValidationError> {
        let mut image = self.image;
        let mut enable = 0u8;
        let mut active = 0u8;
        let mut word: Option<(u8, SampleFormat)> = None;

        for (channel, config) in ChannelIndex::all().zip(self.staged.iter()) {
            config.validate(channel)?;
            let [cfg0, cfg1, cfg2] = config.encode();
            let [r0, r1, r2] = registers::channel_registers(channel);
            image.set(r0.offset, cfg0);
            image.set(r1.offset, cfg1);
            image.set(r2.offset, cfg2);

            if !config.enabled {
                continue;
            }
            enable |= channel_bit(channel);
            active = active.saturating_add(1);
            match word {
                None => word = Some((channel.get(), config.format)),
                Some((first, format)) if format != config.format => {
                    return Err(ValidationError::FormatMismatch {
                        first,
                        channel: channel.get(),
                    });
                }
                Some(_) => {}
            }
        }

        let word_code = match word {
            Some((_, format)) => format.word_length_code(),
            None => (image.get(ASI_CFG0).unwrap_or(ASI_CFG0_POR) >> 4) & 0b11,
        };
        let asi = &self.staged_asi;
        let mut cfg0 = (asi.format.code() << 6) | (word_code << 4);
        for (set, bit) in [
            (asi.fsync_inverted, ASI_CFG0_FSYNC_POL),
            (asi.bclk_inverted, ASI_CFG0_BCLK_POL),
            (asi.transmit_edge_inverted, ASI_CFG0_TX_EDGE),
            (asi.zero_fill, ASI_CFG0_TX_FILL),
        ] {
            if set {
                cfg0 |= bit;
            }
        }
        image.set(ASI_CFG0, cfg0);

        let (mst0, mst1) = match asi.clock {
            ClockRole::Target => (MST_CFG0_POR, MST_CFG1_POR),
            ClockRole::Controller { mclk, sample_rate } => {
                let format = SampleFormat::from_word_length_code(word_code);
                let ratio = asi.bclk_ratio(format, active);
                let ratio_code =
                    fs_bclk_ratio_code(ratio).ok_or(ValidationError::UnsupportedBclkRatio(ratio))?;
                (
                    MST_CFG0_CONTROLLER | mclk.code(),
                    (sample_rate.code() << 4) | ratio_code,
                )
            }
        };
        image.set(MST_CFG0, mst0);
        image.set(MST_CFG1, mst1);
        image.set(IN_CH_EN, enable);
        image.set(ASI_OUT_CH_EN, enable);
        Ok(image)
    }

    /// Record a successful commit of `image`.
    pub fn mark_committed(&mut self, image: RegisterImage) {
        self.committed_asi = self.staged_asi;
        self.image = image;
        self.committed = image.channels();
    }

    /// Record a direct write to a page 0 register outside a commit.
    ///
    /// Registers the image does not cover are ignored. The committed
    /// channel records follow the new image.
    pub fn note_write(&mut self, offset: u8, value: u8) {
        if self.image.get(offset).is_some() {
            self.image.set(offset, value);
            self.committed = self.image.channels();
        }
    }

    /// Return the committed side to power-on defaults. The staged copy is
    /// kept so it can be re-applied after a reset.
    pub fn reset_committed(&mut self) {
        self.committed_asi = AsiConfig::default();
        self.image = RegisterImage::power_on();
        self.committed = self.image.channels();
    }

    /// Committed channels that are enabled, ascending.
    pub fn enabled(&self) -> impl Iterator<Item = (ChannelIndex, &ChannelConfig)> + '_ {
        ChannelIndex::all()
            .zip(self.committed.iter())
            .filter(|(_, c)| c.enabled)
    }

    /// Number of committed enabled channels.
    #[allow(clippy::cast_possible_truncation)] // Safety: at most CHANNEL_COUNT (4)
    pub fn enabled_count(&self) -> u8 {
        self.enabled().count() as u8
    }

    /// Committed word length.
    pub fn stream_format(&self) -> SampleFormat {
        self.image.word_length()
    }

    /// `true` when any committed enabled channel needs mic bias.
    pub fn needs_mic_bias(&self) -> bool {
        self.enabled().any(|(_, c)| c.needs_mic_bias())
    }

    /// Committed ASI frame format.
    pub fn asi_format(&self) -> AsiFormat {
        self.committed_asi.format
    }
}

impl Default for ChannelBank {
    fn default() -> Self {
        Self::new()
    }
}
