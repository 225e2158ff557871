//! TAA3040 device handle.
//!
//! [`Taa3040`] ties the register transport, lifecycle state machine, channel
//! bank and frame queue together. Every operation goes through this handle;
//! there is no global state.
//!
//! # Power-up sequence (datasheet order)
//!
//! 1. SHDNZ high, wait 1 ms ([`Shdnz::enable`](crate::Shdnz::enable))
//! 2. [`reset`](Taa3040::reset): SW_RESET, wait 1 ms
//! 3. [`configure`](Taa3040::configure): SLEEP_CFG wake, wait 1 ms, ASI and
//!    channel registers
//! 4. [`start_stream`](Taa3040::start_stream): PWR_CFG
//!
//! # Fault handling
//!
//! A register access that fails after every retry moves the device to
//! [`DeviceState::Fault`]. From then on every write-side operation returns
//! [`ErrorKind::DeviceFault`] without touching the bus, until
//! [`reset`](Taa3040::reset) succeeds. Register, channel and status reads
//! stay available for diagnosis.
//!
//! The one exception is [`commit`](Taa3040::commit) (and the channel part of
//! [`configure`](Taa3040::configure) when the part is already awake): if
//! the very first write fails, nothing on the device changed, so the error
//! is returned as [`ErrorKind::Transport`] and the state is kept.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;
use platform::{AsiConfig, CaptureDevice, ChannelIndex, I2cAddr, SampleFormat, CHANNEL_COUNT};

use crate::channels::{ChannelBank, ChannelConfig, RegisterImage};
use crate::config::DriverConfig;
use crate::dsp::{BiquadCoefficients, IirCoefficients};
use crate::error::{Error, ErrorKind, Operation, StreamClosed, TransportError, ValidationError};
use crate::registers::{
    biquad_register, channel_bit, channel_registers, Register, ASI_CFG0, ASI_OUT_CH_EN, DEV_STS0,
    DEV_STS1, DEV_STS1_MODE_SHIFT, IIR_REGISTER, IN_CH_EN, MODE_ACTIVE_IDLE, MODE_ACTIVE_RECORDING, MODE_SLEEP,
    PWR_CFG, PWR_CFG_ADC_PDZ, PWR_CFG_MICBIAS_PDZ, PWR_CFG_PLL_PDZ, SLEEP_CFG, SLEEP_CFG_WAKE,
    SW_RESET, SW_RESET_ASSERT,
};
use crate::state::{DeviceState, Event, StateMachine};
use crate::stream::{FrameQueue, SampleFrame, StreamStats};
use crate::transport::RegisterTransport;

// ── Status ───────────────────────────────────────────────────────────────────

/// Device mode reported by DEV_STS1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Asleep (or in hardware shutdown release).
    Sleep,
    /// Awake, all channels powered down.
    ActiveIdle,
    /// Awake, at least one channel recording.
    ActiveRecording,
    /// Mode code the datasheet does not define.
    Unknown(u8),
}

/// Decoded DEV_STS0 / DEV_STS1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStatus {
    /// Device mode.
    pub mode: PowerMode,
    /// Per-channel power state, channel 0 first.
    pub powered: [bool; CHANNEL_COUNT],
}

impl DeviceStatus {
    /// Decode the two status registers.
    #[allow(clippy::arithmetic_side_effects)] // Safety: right shift of u8 by 5
    pub fn decode(sts0: u8, sts1: u8) -> Self {
        let mode = match sts1 >> DEV_STS1_MODE_SHIFT {
            MODE_SLEEP => PowerMode::Sleep,
            MODE_ACTIVE_IDLE => PowerMode::ActiveIdle,
            MODE_ACTIVE_RECORDING => PowerMode::ActiveRecording,
            other => PowerMode::Unknown(other),
        };
        let mut powered = [false; CHANNEL_COUNT];
        for (slot, channel) in powered.iter_mut().zip(ChannelIndex::all()) {
            *slot = sts0 & channel_bit(channel) != 0;
        }
        Self { mode, powered }
    }

    /// `true` while the converters are running.
    pub fn is_recording(&self) -> bool {
        self.mode == PowerMode::ActiveRecording
    }
}

// ── Device ───────────────────────────────────────────────────────────────────

/// TAA3040 four-channel audio ADC.
///
/// `'q` is the lifetime of the frame queue shared with the capture task;
/// `M` and `N` are the queue's mutex and capacity.
pub struct Taa3040<'q, I, M: RawMutex, const N: usize> {
    transport: RegisterTransport<I>,
    state: StateMachine,
    channels: ChannelBank,
    queue: &'q FrameQueue<M, N>,
}

impl<'q, I: I2c, M: RawMutex, const N: usize> Taa3040<'q, I, M, N> {
    /// Create a driver with default timing.
    ///
    /// No bus traffic; the device is assumed fresh out of reset. Call
    /// [`reset`](Self::reset) first if that is not guaranteed.
    pub fn new(i2c: I, address: I2cAddr, queue: &'q FrameQueue<M, N>) -> Self {
        Self::with_config(i2c, address, DriverConfig::default(), queue)
    }

    /// Create a driver with explicit timing and retry configuration.
    pub fn with_config(
        i2c: I,
        address: I2cAddr,
        config: DriverConfig,
        queue: &'q FrameQueue<M, N>,
    ) -> Self {
        Self {
            transport: RegisterTransport::new(i2c, address, config),
            state: StateMachine::new(),
            channels: ChannelBank::new(),
            queue,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.state.state()
    }

    /// Number of transitions into Fault.
    pub fn fault_count(&self) -> u32 {
        self.state.fault_count()
    }

    /// Staged configuration of channel `index`.
    pub fn staged(&self, index: ChannelIndex) -> Option<&ChannelConfig> {
        self.channels.staged(index)
    }

    /// Committed configuration of channel `index`.
    pub fn committed(&self, index: ChannelIndex) -> Option<&ChannelConfig> {
        self.channels.committed(index)
    }

    /// Committed serial interface configuration.
    pub fn committed_asi(&self) -> &AsiConfig {
        self.channels.committed_asi()
    }

    /// Word length frames are decoded with.
    pub fn stream_format(&self) -> SampleFormat {
        self.channels.stream_format()
    }

    /// Register transport, for its shadow map and counters.
    pub fn transport(&self) -> &RegisterTransport<I> {
        &self.transport
    }

    /// Mutably borrow the transport (bus access in tests and bring-up).
    pub fn transport_mut(&mut self) -> &mut RegisterTransport<I> {
        &mut self.transport
    }

    /// Shared frame queue.
    pub fn queue(&self) -> &'q FrameQueue<M, N> {
        self.queue
    }

    /// Frame queue counters.
    pub fn stream_stats(&self) -> StreamStats {
        self.queue.stats()
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.transport.release()
    }

    // ── Configuration ────────────────────────────────────────────────────────

    /// Stage `config` for channel `index`. Takes effect on the next
    /// [`commit`](Self::commit) or [`configure`](Self::configure).
    pub fn stage_channel(&mut self, index: u8, config: ChannelConfig) -> Result<(), Error> {
        self.channels
            .stage(index, config)
            .map_err(|e| self.err(Operation::StageChannel, ErrorKind::Validation(e)))
    }

    /// Stage the serial interface configuration.
    pub fn stage_asi(&mut self, config: AsiConfig) {
        self.channels.stage_asi(config);
    }

    /// Wake the part and apply the staged configuration.
    ///
    /// Allowed from Reset and Configured; leaves the device Configured.
    pub async fn configure(&mut self) -> Result<(), Error> {
        let op = Operation::Configure;
        self.ensure_writable(op)?;
        if !self.state.permits(Event::Configured) {
            return Err(self.err(op, ErrorKind::InvalidState));
        }
        let target = self.encode(op)?;

        let mut written = 0u32;
        if self.state() == DeviceState::Reset {
            self.write(op, Register::page0(SLEEP_CFG), SLEEP_CFG_WAKE)
                .await?;
            written = 1;
            Timer::after(self.transport.config().wake_settle()).await;
        }
        self.apply(op, target, written).await?;

        let _ = self.state.on_event(Event::Configured);
        info!(
            "configured: {} channel(s), {}",
            self.channels.enabled_count(),
            self.channels.stream_format()
        );
        Ok(())
    }

    /// Write the staged configuration to the device as one logical unit.
    ///
    /// Validates first, then writes only the registers that change, in
    /// ascending order. Does not change the lifecycle state.
    pub async fn commit(&mut self) -> Result<(), Error> {
        let op = Operation::Commit;
        self.ensure_writable(op)?;
        if self.state() == DeviceState::Streaming {
            return Err(self.err(op, ErrorKind::InvalidState));
        }
        let target = self.encode(op)?;
        self.apply(op, target, 0).await?;
        debug!("commit done");
        Ok(())
    }

    // ── Streaming ────────────────────────────────────────────────────────────

    /// Power the converters and open the frame queue.
    ///
    /// Only allowed from Configured; any other state (Fault included) is an
    /// [`ErrorKind::InvalidState`] and leaves the state unchanged.
    pub async fn start_stream(&mut self) -> Result<(), Error> {
        let op = Operation::StartStream;
        if !self.state.permits(Event::StreamStarted) {
            return Err(self.err(op, ErrorKind::InvalidState));
        }
        let channels = self.channels.enabled_count();
        if channels == 0 {
            return Err(self.err(
                op,
                ErrorKind::Validation(ValidationError::NoChannelsEnabled),
            ));
        }

        let mut power = PWR_CFG_ADC_PDZ | PWR_CFG_PLL_PDZ;
        if self.channels.needs_mic_bias() {
            power |= PWR_CFG_MICBIAS_PDZ;
        }
        self.write(op, Register::page0(PWR_CFG), power).await?;

        self.queue.open(channels, self.channels.stream_format());
        let _ = self.state.on_event(Event::StreamStarted);
        info!("streaming {} channel(s)", channels);
        Ok(())
    }

    /// Close the frame queue and power the converters down.
    ///
    /// A no-op outside Streaming.
    pub async fn stop_stream(&mut self) -> Result<(), Error> {
        let op = Operation::StopStream;
        if self.state() != DeviceState::Streaming {
            return Ok(());
        }
        self.queue.close();
        self.write(op, Register::page0(PWR_CFG), 0x00).await?;
        let _ = self.state.on_event(Event::StreamStopped);
        info!("stream stopped");
        Ok(())
    }

    /// Next captured frame, without waiting.
    pub fn try_read_frame(&self) -> Result<Option<SampleFrame>, StreamClosed> {
        self.queue.try_read_frame()
    }

    /// Wait for the next captured frame.
    pub async fn read_frame(&self) -> Result<SampleFrame, StreamClosed> {
        self.queue.read_frame().await
    }

    // ── Reset ────────────────────────────────────────────────────────────────

    /// Software reset. Allowed from any state; the only way out of Fault.
    ///
    /// Keeps the staged configuration so [`configure`](Self::configure) can
    /// re-apply it.
    pub async fn reset(&mut self) -> Result<(), Error> {
        let op = Operation::Reset;
        self.queue.close();
        self.write(op, Register::page0(SW_RESET), SW_RESET_ASSERT)
            .await?;
        Timer::after(self.transport.config().reset_settle()).await;

        self.transport.invalidate();
        self.channels.reset_committed();
        let _ = self.state.on_event(Event::ResetDone);
        info!("reset");
        Ok(())
    }

    // ── Register access ──────────────────────────────────────────────────────

    /// Read any register. Allowed in every state.
    pub async fn read_register(&mut self, register: Register) -> Result<u8, Error> {
        self.read(Operation::ReadRegister, register).await
    }

    /// Write a configuration register directly.
    ///
    /// Status registers, PAGE_CFG and SW_RESET are rejected. While
    /// streaming, registers a commit manages and PWR_CFG are locked, since
    /// the open frame queue was sized from them.
    ///
    /// Writes to commit-managed registers update the committed image and
    /// the committed channel records; the next commit restores the staged
    /// values.
    pub async fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error> {
        let op = Operation::WriteRegister;
        if register.is_read_only() {
            return Err(self.err(
                op,
                ErrorKind::Validation(ValidationError::ReadOnlyRegister(register)),
            ));
        }
        if register.is_reserved() {
            return Err(self.err(
                op,
                ErrorKind::Validation(ValidationError::ReservedRegister(register)),
            ));
        }
        self.ensure_writable(op)?;
        let locked = register.is_commit_managed() || register == Register::page0(PWR_CFG);
        if locked && self.state() == DeviceState::Streaming {
            return Err(self.err(op, ErrorKind::InvalidState));
        }
        self.write(op, register, value).await?;
        if register.page == 0 {
            self.channels.note_write(register.offset, value);
        }
        Ok(())
    }

    /// Read channel `index` back from the device.
    pub async fn read_channel(&mut self, index: u8) -> Result<ChannelConfig, Error> {
        let op = Operation::ReadChannel;
        let channel = ChannelIndex::try_new(index).map_err(|_| {
            self.err(
                op,
                ErrorKind::Validation(ValidationError::ChannelOutOfRange(index)),
            )
        })?;

        let mut regs = [0u8; 3];
        for (value, register) in regs.iter_mut().zip(channel_registers(channel)) {
            *value = self.read(op, register).await?;
        }
        let inputs = self.read(op, Register::page0(IN_CH_EN)).await?;
        let outputs = self.read(op, Register::page0(ASI_OUT_CH_EN)).await?;
        let asi = self.read(op, Register::page0(ASI_CFG0)).await?;

        let bit = channel_bit(channel);
        let enabled = inputs & bit != 0 && outputs & bit != 0;
        #[allow(clippy::arithmetic_side_effects)] // Safety: right shift of u8 by 4
        let format = SampleFormat::from_word_length_code(asi >> 4);
        Ok(ChannelConfig::decode(regs, enabled, format))
    }

    /// Read and decode the device status registers.
    pub async fn status(&mut self) -> Result<DeviceStatus, Error> {
        let op = Operation::ReadStatus;
        let sts0 = self.read(op, Register::page0(DEV_STS0)).await?;
        let sts1 = self.read(op, Register::page0(DEV_STS1)).await?;
        Ok(DeviceStatus::decode(sts0, sts1))
    }

    /// Program biquad `index` (0..12). Not allowed while streaming.
    ///
    /// Leaves the part on page 0.
    pub async fn set_biquad(&mut self, index: u8, coeffs: &BiquadCoefficients) -> Result<(), Error> {
        let op = Operation::SetBiquad;
        let Some(base) = biquad_register(index) else {
            return Err(self.err(
                op,
                ErrorKind::Validation(ValidationError::BiquadOutOfRange(index)),
            ));
        };
        self.write_coefficients(op, base, &coeffs.to_bytes()).await?;
        debug!("biquad {} programmed", index);
        Ok(())
    }

    /// Program the first-order IIR (page 4). Not allowed while streaming.
    ///
    /// Takes effect on channels whose high-pass filter selects the custom
    /// IIR. Leaves the part on page 0.
    pub async fn set_iir(&mut self, coeffs: &IirCoefficients) -> Result<(), Error> {
        self.write_coefficients(Operation::SetIir, IIR_REGISTER, &coeffs.to_bytes())
            .await?;
        debug!("iir programmed");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Write a coefficient block starting at `base`, then return to page 0.
    async fn write_coefficients(
        &mut self,
        op: Operation,
        base: Register,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.ensure_writable(op)?;
        if self.state() == DeviceState::Streaming {
            return Err(self.err(op, ErrorKind::InvalidState));
        }

        let mut offset = base.offset;
        for &byte in bytes {
            let register = Register {
                page: base.page,
                offset,
            };
            self.write(op, register, byte).await?;
            offset = offset.saturating_add(1);
        }
        if let Err(err) = self.transport.select_page(0).await {
            return Err(self.fail(op, err));
        }
        Ok(())
    }

    fn err(&self, operation: Operation, kind: ErrorKind) -> Error {
        Error {
            operation,
            state: self.state.state(),
            kind,
        }
    }

    /// Enter Fault because `cause` survived every retry.
    fn fail(&mut self, op: Operation, cause: TransportError) -> Error {
        let already = self.state() == DeviceState::Fault;
        self.state.fault();
        self.queue.close();
        if !already {
            error!("{} failed, device fault: {}", op, cause);
        }
        self.err(op, ErrorKind::DeviceFault(Some(cause)))
    }

    /// Reject write-side operations while in Fault.
    fn ensure_writable(&self, op: Operation) -> Result<(), Error> {
        if self.state() == DeviceState::Fault {
            return Err(self.err(op, ErrorKind::DeviceFault(None)));
        }
        Ok(())
    }

    fn encode(&self, op: Operation) -> Result<RegisterImage, Error> {
        self.channels
            .encode_staged()
            .map_err(|e| self.err(op, ErrorKind::Validation(e)))
    }

    async fn read(&mut self, op: Operation, register: Register) -> Result<u8, Error> {
        match self.transport.read(register).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail(op, err)),
        }
    }

    async fn write(&mut self, op: Operation, register: Register, value: u8) -> Result<(), Error> {
        match self.transport.write(register, value).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(op, err)),
        }
    }

    /// Write every register where `target` differs from the committed image.
    ///
    /// `written` counts registers this operation already changed; while it is
    /// zero a failure leaves the device untouched and is not a fault.
    async fn apply(
        &mut self,
        op: Operation,
        target: RegisterImage,
        mut written: u32,
    ) -> Result<(), Error> {
        let current = *self.channels.image();
        for (register, value) in current.changes(&target) {
            match self.transport.write(register, value).await {
                Ok(()) => written = written.saturating_add(1),
                Err(err) if written == 0 => {
                    warn!("{} aborted before any write: {}", op, err);
                    return Err(self.err(op, ErrorKind::Transport(err)));
                }
                Err(err) => return Err(self.fail(op, err)),
            }
        }
        self.channels.mark_committed(target);
        Ok(())
    }
}

// ── CaptureDevice ────────────────────────────────────────────────────────────

impl<I: I2c, M: RawMutex, const N: usize> CaptureDevice for Taa3040<'_, I, M, N> {
    type Error = Error;
    type Frame = SampleFrame;

    async fn configure(&mut self) -> Result<(), Error> {
        Taa3040::configure(self).await
    }

    async fn start(&mut self) -> Result<(), Error> {
        self.start_stream().await
    }

    async fn stop(&mut self) -> Result<(), Error> {
        self.stop_stream().await
    }

    async fn read_frame(&mut self) -> Result<SampleFrame, Error> {
        match self.queue.read_frame().await {
            Ok(frame) => Ok(frame),
            Err(StreamClosed) => Err(self.err(Operation::ReadFrame, ErrorKind::InvalidState)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{Fault, FaultKind, FaultTarget, MockBus};
    use platform::{GainDb, I2cAddresses};

    const ADDR: u8 = I2cAddresses::TAA3040_BASE;

    type Queue = FrameQueue<NoopRawMutex, 8>;

    fn device(queue: &Queue) -> Taa3040<'_, MockBus, NoopRawMutex, 8> {
        let config = DriverConfig {
            reset_settle_us: 10,
            wake_settle_us: 10,
            ..DriverConfig::default()
        };
        Taa3040::with_config(MockBus::new(ADDR), I2cAddr::new(ADDR), config, queue)
    }

    #[test]
    fn status_decode_reads_mode_and_channel_bits() {
        let status = DeviceStatus::decode(0xA0, 0xE0);
        assert_eq!(status.mode, PowerMode::ActiveRecording);
        assert_eq!(status.powered, [true, false, true, false]);
        assert!(status.is_recording());
        assert_eq!(DeviceStatus::decode(0, 0x20).mode, PowerMode::Unknown(1));
    }

    #[tokio::test]
    async fn configure_wakes_only_from_reset() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(0, ChannelConfig::line(GainDb::new(12), SampleFormat::Bits24))
            .unwrap();
        dev.configure().await.unwrap();
        dev.configure().await.unwrap();

        let wakes: Vec<u8> = dev.transport().bus().writes_to(0, SLEEP_CFG).collect();
        assert_eq!(wakes, [SLEEP_CFG_WAKE]);
        assert_eq!(dev.state(), DeviceState::Configured);
    }

    #[tokio::test]
    async fn mic_channel_powers_mic_bias() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(1, ChannelConfig::microphone(GainDb::new(20), SampleFormat::Bits24))
            .unwrap();
        dev.configure().await.unwrap();
        dev.start_stream().await.unwrap();

        assert_eq!(
            dev.transport().bus().register(ADDR, 0, PWR_CFG),
            Some(PWR_CFG_MICBIAS_PDZ | PWR_CFG_ADC_PDZ | PWR_CFG_PLL_PDZ)
        );
    }

    #[tokio::test]
    async fn raw_writes_to_status_and_paging_are_rejected() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        for reg in [Register::page0(DEV_STS0), Register::page0(0x00), Register::page0(SW_RESET)] {
            let err = dev.write_register(reg, 0xFF).await.unwrap_err();
            assert!(matches!(err.kind, ErrorKind::Validation(_)));
        }
        assert_eq!(dev.transport().bus().transactions(), 0);
    }

    #[tokio::test]
    async fn raw_write_to_managed_register_is_undone_by_commit() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(0, ChannelConfig::line(GainDb::new(6), SampleFormat::Bits24))
            .unwrap();
        dev.configure().await.unwrap();

        dev.write_register(Register::page0(0x3D), 0x00).await.unwrap();
        dev.commit().await.unwrap();
        assert_eq!(dev.transport().bus().register(ADDR, 0, 0x3D), Some(0x18));
    }

    #[tokio::test]
    async fn raw_write_updates_committed_channel() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(0, ChannelConfig::line(GainDb::new(6), SampleFormat::Bits24))
            .unwrap();
        dev.configure().await.unwrap();

        dev.write_register(Register::page0(0x3C), 0x01).await.unwrap();
        let ch0 = ChannelIndex::try_new(0).unwrap();
        assert!(dev.committed(ch0).unwrap().agc);
        assert_eq!(dev.read_channel(0).await.unwrap(), *dev.committed(ch0).unwrap());
    }

    #[tokio::test]
    async fn stream_registers_are_locked_while_streaming() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(0, ChannelConfig::line(GainDb::ZERO, SampleFormat::Bits24))
            .unwrap();
        dev.configure().await.unwrap();
        dev.start_stream().await.unwrap();

        let before = dev.transport().bus().transactions();
        for reg in [IN_CH_EN, ASI_OUT_CH_EN, ASI_CFG0, 0x41, PWR_CFG] {
            let err = dev.write_register(Register::page0(reg), 0xF0).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidState);
        }
        assert_eq!(dev.transport().bus().transactions(), before);
        assert_eq!(dev.state(), DeviceState::Streaming);

        // Registers outside the stream setup stay writable.
        dev.write_register(Register::page0(SLEEP_CFG), SLEEP_CFG_WAKE)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn iir_is_written_on_page_4_then_page_0() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        let iir = IirCoefficients {
            n0: 0x7FF0_0000,
            n1: -0x7FF0_0000,
            d1: 0x7FE0_0000,
        };
        dev.set_iir(&iir).await.unwrap();

        let bus = dev.transport().bus();
        let written: Vec<u8> = (0x48..=0x53)
            .map(|r| bus.register(ADDR, 4, r).unwrap())
            .collect();
        assert_eq!(written, iir.to_bytes());
        assert_eq!(dev.transport().page(), Some(0));
    }

    #[tokio::test]
    async fn iir_is_rejected_while_streaming() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(0, ChannelConfig::line(GainDb::ZERO, SampleFormat::Bits24))
            .unwrap();
        dev.configure().await.unwrap();
        dev.start_stream().await.unwrap();

        let err = dev.set_iir(&IirCoefficients::PASS_THROUGH).await.unwrap_err();
        assert_eq!(err.operation, Operation::SetIir);
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn operations_in_fault_do_not_touch_the_bus() {
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.transport_mut()
            .bus_mut()
            .inject(Fault::always(FaultTarget::Any, FaultKind::Nack));
        dev.configure().await.unwrap_err();
        assert_eq!(dev.state(), DeviceState::Fault);

        let before = dev.transport().bus().transactions();
        let err = dev.commit().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeviceFault(None));
        let err = dev.set_biquad(0, &BiquadCoefficients::PASS_THROUGH).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeviceFault(None));
        assert_eq!(dev.transport().bus().transactions(), before);
        assert_eq!(dev.fault_count(), 1);
    }

    #[tokio::test]
    async fn capture_device_trait_drives_lifecycle() {
        async fn run<D: CaptureDevice>(dev: &mut D) -> Result<(), D::Error> {
            dev.configure().await?;
            dev.start().await?;
            dev.stop().await
        }
        let queue = Queue::new();
        let mut dev = device(&queue);
        dev.stage_channel(3, ChannelConfig::line(GainDb::ZERO, SampleFormat::Bits16))
            .unwrap();
        run(&mut dev).await.unwrap();
        assert_eq!(dev.state(), DeviceState::Configured);

        let err = CaptureDevice::read_frame(&mut dev).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
    }
}
