//! Device lifecycle state machine.
//!
//! ```text
//!            configure            start_stream
//!   Reset ───────────▶ Configured ───────────▶ Streaming
//!     ▲                 ▲    │ ▲                  │
//!     │                 │    │ └──── stop_stream ─┘
//!     │       configure │    │
//!     │                 └────┘
//!     │  reset (any state)
//!     └──────────────────────────────── Fault ◀── transport failure (any state)
//! ```
//!
//! [`StateMachine`] only validates and records transitions; the device facade
//! performs the register traffic and reports the outcome as an [`Event`].

/// Device lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// Power-on or post-reset: registers hold their defaults, part asleep.
    #[default]
    Reset,
    /// Awake with a committed configuration, converters powered down.
    Configured,
    /// Converters powered, frames flowing.
    Streaming,
    /// A transport failure left the register state unknown. Only
    /// [`reset`](crate::Taa3040::reset) leaves this state.
    Fault,
}

impl DeviceState {
    /// Display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Configured => "configured",
            Self::Streaming => "streaming",
            Self::Fault => "fault",
        }
    }
}

impl core::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Completed lifecycle step reported by the device facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// `configure` wrote the staged configuration.
    Configured,
    /// `start_stream` powered the converters.
    StreamStarted,
    /// `stop_stream` powered the converters down.
    StreamStopped,
    /// Software reset completed.
    ResetDone,
    /// A register transaction failed after every retry.
    TransportFailed,
}

/// Transition not allowed from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidTransition {
    /// State the machine was in.
    pub from: DeviceState,
    /// Rejected event.
    pub event: Event,
}

// ─── State machine ───────────────────────────────────────────────────────────

/// Lifecycle state plus fault accounting.
///
/// `fault_count` saturates at [`u32::MAX`] and counts entries into
/// [`DeviceState::Fault`], not failed operations: further failures while
/// already in Fault do not increment it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateMachine {
    state: DeviceState,
    fault_count: u32,
}

impl StateMachine {
    /// Start in [`DeviceState::Reset`].
    pub const fn new() -> Self {
        Self {
            state: DeviceState::Reset,
            fault_count: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// Number of transitions into Fault since construction.
    pub const fn fault_count(&self) -> u32 {
        self.fault_count
    }

    /// State `event` would lead to from the current state, if allowed.
    pub const fn next(&self, event: Event) -> Option<DeviceState> {
        use DeviceState as S;
        match (self.state, event) {
            (_, Event::TransportFailed) => Some(S::Fault),
            (_, Event::ResetDone) => Some(S::Reset),
            (S::Reset | S::Configured, Event::Configured) => Some(S::Configured),
            (S::Configured, Event::StreamStarted) => Some(S::Streaming),
            (S::Streaming, Event::StreamStopped) => Some(S::Configured),
            _ => None,
        }
    }

    /// Apply `event`, returning the new state.
    pub fn on_event(&mut self, event: Event) -> Result<DeviceState, InvalidTransition> {
        let Some(next) = self.next(event) else {
            return Err(InvalidTransition {
                from: self.state,
                event,
            });
        };
        if next == DeviceState::Fault && self.state != DeviceState::Fault {
            self.fault_count = self.fault_count.saturating_add(1);
        }
        if next != self.state {
            debug!("state {} -> {}", self.state.as_str(), next.as_str());
        }
        self.state = next;
        Ok(next)
    }

    /// Enter Fault. Always allowed.
    pub fn fault(&mut self) {
        let _ = self.on_event(Event::TransportFailed);
    }

    /// `true` when `event` is allowed from the current state.
    pub const fn permits(&self, event: Event) -> bool {
        self.next(event).is_some()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
