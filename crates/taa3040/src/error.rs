//! Error taxonomy.
//!
//! Every fallible device operation returns [`Error`], which records what was
//! being attempted ([`Operation`]), the [`DeviceState`] at the time, and the
//! [`ErrorKind`]:
//!
//! | Kind          | Cause                                   | Device side effect |
//! |---------------|-----------------------------------------|--------------------|
//! | `Transport`   | bus failure after all retries           | none (see commit)  |
//! | `Validation`  | caller input rejected before bus access | none               |
//! | `InvalidState`| operation not allowed in current state  | none               |
//! | `DeviceFault` | device entered, or is in, Fault         | Fault until reset  |

use platform::OutOfRangeError;

use crate::registers::Register;
use crate::state::DeviceState;

// ── Bus faults ───────────────────────────────────────────────────────────────

/// Classified control-bus failure of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// Address or data byte not acknowledged.
    #[error("not acknowledged")]
    Nack,
    /// Another controller won arbitration.
    #[error("arbitration lost")]
    ArbitrationLoss,
    /// Misplaced START/STOP or other bus-level error.
    #[error("bus error")]
    Bus,
    /// Controller FIFO overrun.
    #[error("overrun")]
    Overrun,
    /// Transaction did not complete within the configured timeout.
    #[error("timed out")]
    Timeout,
    /// Any other HAL-reported failure.
    #[error("bus failure")]
    Other,
}

impl BusFault {
    /// Classify an `embedded-hal` I²C error.
    pub fn from_kind(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::ErrorKind as K;
        match kind {
            K::NoAcknowledge(_) => Self::Nack,
            K::ArbitrationLoss => Self::ArbitrationLoss,
            K::Bus => Self::Bus,
            K::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }
}

/// Register transaction that failed after every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[error("{register}: {kind} after {attempts} attempt(s)")]
pub struct TransportError {
    /// Register being accessed (PAGE_CFG when the page switch failed).
    pub register: Register,
    /// Failure of the last try.
    pub kind: BusFault,
    /// Tries made, including the first.
    pub attempts: u8,
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "{}: {} after {} attempt(s)",
            self.register,
            self.kind,
            self.attempts
        );
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Caller input rejected before any bus traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    /// Channel index outside 0..4.
    #[error("channel {0} does not exist")]
    ChannelOutOfRange(u8),
    /// Digital microphone inputs bypass the analog PGA.
    #[error("PDM input on channel {0} cannot use analog gain")]
    PdmGainNotSupported(u8),
    /// Enabled channels disagree on the ASI word length.
    #[error("channel {channel} format differs from channel {first}")]
    FormatMismatch {
        /// Lowest enabled channel, whose format wins.
        first: u8,
        /// Channel that disagrees.
        channel: u8,
    },
    /// Controller clocking would need a BCLK/FSYNC ratio the part lacks.
    #[error("BCLK/FSYNC ratio {0} not supported")]
    UnsupportedBclkRatio(u32),
    /// Streaming needs at least one enabled channel.
    #[error("no channel enabled")]
    NoChannelsEnabled,
    /// Status register written.
    #[error("{0} is read-only")]
    ReadOnlyRegister(Register),
    /// Register managed by the driver (page select, reset).
    #[error("{0} is reserved")]
    ReservedRegister(Register),
    /// Biquad index outside 0..12.
    #[error("biquad {0} does not exist")]
    BiquadOutOfRange(u8),
    /// A newtype constructor rejected a value.
    #[error("value out of range")]
    OutOfRange(OutOfRangeError),
}

impl From<OutOfRangeError> for ValidationError {
    fn from(err: OutOfRangeError) -> Self {
        Self::OutOfRange(err)
    }
}

// ── Operation ────────────────────────────────────────────────────────────────

/// Device operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// [`configure`](crate::Taa3040::configure)
    Configure,
    /// [`stage_channel`](crate::Taa3040::stage_channel)
    StageChannel,
    /// [`commit`](crate::Taa3040::commit)
    Commit,
    /// [`start_stream`](crate::Taa3040::start_stream)
    StartStream,
    /// [`stop_stream`](crate::Taa3040::stop_stream)
    StopStream,
    /// [`reset`](crate::Taa3040::reset)
    Reset,
    /// [`read_register`](crate::Taa3040::read_register)
    ReadRegister,
    /// [`write_register`](crate::Taa3040::write_register)
    WriteRegister,
    /// [`read_channel`](crate::Taa3040::read_channel)
    ReadChannel,
    /// [`status`](crate::Taa3040::status)
    ReadStatus,
    /// [`set_biquad`](crate::Taa3040::set_biquad)
    SetBiquad,
    /// [`set_iir`](crate::Taa3040::set_iir)
    SetIir,
    /// [`read_frame`](crate::Taa3040::read_frame)
    ReadFrame,
}

impl Operation {
    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::StageChannel => "stage_channel",
            Self::Commit => "commit",
            Self::StartStream => "start_stream",
            Self::StopStream => "stop_stream",
            Self::Reset => "reset",
            Self::ReadRegister => "read_register",
            Self::WriteRegister => "write_register",
            Self::ReadChannel => "read_channel",
            Self::ReadStatus => "status",
            Self::SetBiquad => "set_biquad",
            Self::SetIir => "set_iir",
            Self::ReadFrame => "read_frame",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Error ────────────────────────────────────────────────────────────────────

/// Failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bus failure that survived every retry.
    Transport(TransportError),
    /// Caller input rejected.
    Validation(ValidationError),
    /// Operation not allowed in the current state.
    InvalidState,
    /// The device is in Fault and needs [`reset`](crate::Taa3040::reset).
    ///
    /// Carries the transport failure that caused the fault when this
    /// operation caused it.
    DeviceFault(Option<TransportError>),
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Validation(err) => write!(f, "invalid input: {err}"),
            Self::InvalidState => f.write_str("invalid state"),
            Self::DeviceFault(Some(err)) => write!(f, "device fault: {err}"),
            Self::DeviceFault(None) => f.write_str("device fault"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorKind {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Transport(err) => defmt::write!(f, "transport error: {}", err),
            Self::Validation(err) => defmt::write!(f, "invalid input: {}", err),
            Self::InvalidState => defmt::write!(f, "invalid state"),
            Self::DeviceFault(Some(err)) => defmt::write!(f, "device fault: {}", err),
            Self::DeviceFault(None) => defmt::write!(f, "device fault"),
        }
    }
}

/// Error returned by every [`Taa3040`](crate::Taa3040) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    /// What was being attempted.
    pub operation: Operation,
    /// Device state when the error was returned.
    pub state: DeviceState,
    /// What went wrong.
    pub kind: ErrorKind,
}

impl Error {
    /// `true` when the device needs a reset before further use.
    pub fn is_fault(&self) -> bool {
        matches!(self.kind, ErrorKind::DeviceFault(_))
    }

    /// The underlying transport failure, if any.
    pub fn transport(&self) -> Option<&TransportError> {
        match &self.kind {
            ErrorKind::Transport(err) | ErrorKind::DeviceFault(Some(err)) => Some(err),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} failed in {}: {}", self.operation, self.state, self.kind)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "{} failed in {}: {}",
            self.operation.as_str(),
            self.state.as_str(),
            self.kind
        );
    }
}

/// Frame read on a stream that is not open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("stream closed")]
pub struct StreamClosed;
