//! Sample stream controller.
//!
//! [`FrameQueue`] sits between the capture side (the SAI/TDM receive task,
//! which pushes decoded frames) and the consumer (which reads them). The
//! device opens the queue on `start_stream` and closes it on `stop_stream`
//! and `reset`.
//!
//! # Overflow
//!
//! The queue holds at most `N` frames. A push into a full queue evicts the
//! oldest frame. The next frame handed to the consumer carries
//! [`Overflow`] with the number of frames lost since the previous delivery,
//! so every gap is reported exactly once. Sequence numbers are assigned at
//! push time, so the gap is also visible as a jump in
//! [`SampleFrame::sequence`].
//!
//! # Underrun
//!
//! A read that finds the queue open but empty counts as an underrun.

mod ring;

pub use ring::{FrameRing, RawFrame};

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use platform::{SampleFormat, CHANNEL_COUNT};

use crate::error::StreamClosed;

#[allow(clippy::cast_possible_truncation)] // Safety: CHANNEL_COUNT is 4
const MAX_CHANNELS: u8 = CHANNEL_COUNT as u8;

/// Gap marker on the first frame delivered after frames were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overflow {
    /// Frames dropped immediately before this one.
    pub dropped: u32,
}

/// One sampling instant across every enabled channel, ascending channel
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFrame {
    /// Sign-extended samples.
    pub samples: heapless::Vec<i32, CHANNEL_COUNT>,
    /// Position in the stream, starting at 0 on every `start_stream`.
    pub sequence: u32,
    /// Set when frames were dropped just before this one.
    pub overflow: Option<Overflow>,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SampleFrame {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "SampleFrame {{ seq: {}, samples: {}, overflow: {} }}",
            self.sequence,
            self.samples.as_slice(),
            self.overflow
        );
    }
}

/// Stream counters, saturating. Kept across stop/start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamStats {
    /// Frames handed to the consumer.
    pub delivered: u32,
    /// Frames evicted by overflow.
    pub dropped: u32,
    /// Overflow batches (runs of drops between two deliveries).
    pub overflow_events: u32,
    /// Reads that found the open queue empty.
    pub underruns: u32,
}

/// Frame rejected by the capture side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PushError {
    /// The stream is not open.
    #[error("stream closed")]
    Closed,
    /// Fewer samples than enabled channels.
    #[error("frame has {got} samples, stream needs {expected}")]
    ShortFrame {
        /// Enabled channel count.
        expected: u8,
        /// Samples supplied.
        got: usize,
    },
}

struct StreamInner<const N: usize> {
    ring: FrameRing<N>,
    open: bool,
    channels: u8,
    format: SampleFormat,
    next_sequence: u32,
    /// Frames dropped since the last delivery.
    pending_dropped: u32,
    stats: StreamStats,
}

impl<const N: usize> StreamInner<N> {
    const fn new() -> Self {
        Self {
            ring: FrameRing::new(),
            open: false,
            channels: 0,
            format: SampleFormat::Bits24,
            next_sequence: 0,
            pending_dropped: 0,
            stats: StreamStats {
                delivered: 0,
                dropped: 0,
                overflow_events: 0,
                underruns: 0,
            },
        }
    }

    fn push(&mut self, samples: &[i32]) -> Result<(), PushError> {
        if !self.open {
            return Err(PushError::Closed);
        }
        let len = usize::from(self.channels);
        let Some(valid) = samples.get(..len) else {
            return Err(PushError::ShortFrame {
                expected: self.channels,
                got: samples.len(),
            });
        };
        let mut frame = RawFrame {
            samples: [0; CHANNEL_COUNT],
            len: self.channels,
            sequence: self.next_sequence,
        };
        for (slot, &sample) in frame.samples.iter_mut().zip(valid) {
            *slot = sample;
        }
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if self.ring.push_overwrite(frame).is_some() {
            if self.pending_dropped == 0 {
                self.stats.overflow_events = self.stats.overflow_events.saturating_add(1);
                warn!("frame queue full, dropping oldest");
            }
            self.pending_dropped = self.pending_dropped.saturating_add(1);
            self.stats.dropped = self.stats.dropped.saturating_add(1);
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<SampleFrame>, StreamClosed> {
        if !self.open {
            return Err(StreamClosed);
        }
        let Some(raw) = self.ring.pop() else {
            self.stats.underruns = self.stats.underruns.saturating_add(1);
            return Ok(None);
        };
        let overflow = (self.pending_dropped > 0).then_some(Overflow {
            dropped: self.pending_dropped,
        });
        self.pending_dropped = 0;
        self.stats.delivered = self.stats.delivered.saturating_add(1);

        let mut samples = heapless::Vec::new();
        for &sample in raw.samples() {
            let _ = samples.push(sample);
        }
        Ok(Some(SampleFrame {
            samples,
            sequence: raw.sequence,
            overflow,
        }))
    }
}

/// Bounded frame queue shared by the capture task, the consumer and the
/// device.
///
/// `M` selects the mutex: `NoopRawMutex` when everything runs on one
/// executor, `CriticalSectionRawMutex` when the capture side runs in an
/// interrupt or on another executor.
pub struct FrameQueue<M: RawMutex, const N: usize> {
    inner: Mutex<M, RefCell<StreamInner<N>>>,
    ready: Signal<M, ()>,
}

impl<M: RawMutex, const N: usize> FrameQueue<M, N> {
    /// Create a closed, empty queue.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(StreamInner::new())),
            ready: Signal::new(),
        }
    }

    /// Begin accepting frames of `channels` samples in `format`.
    ///
    /// Discards anything buffered and restarts sequence numbering at 0.
    pub fn open(&self, channels: u8, format: SampleFormat) {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            inner.ring.clear();
            inner.open = true;
            inner.channels = channels.min(MAX_CHANNELS);
            inner.format = format;
            inner.next_sequence = 0;
            inner.pending_dropped = 0;
        });
        self.ready.reset();
        debug!("stream open: {} channel(s), {}", channels, format);
    }

    /// Stop accepting frames, discard buffered ones and wake any reader.
    pub fn close(&self) {
        let was_open = self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let was_open = inner.open;
            inner.open = false;
            inner.ring.clear();
            inner.pending_dropped = 0;
            was_open
        });
        if was_open {
            debug!("stream closed");
        }
        self.ready.signal(());
    }

    /// `true` between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.inner.lock(|cell| cell.borrow().open)
    }

    /// Queue one frame of already sign-extended samples.
    ///
    /// Samples beyond the enabled channel count are ignored.
    pub fn push_frame(&self, samples: &[i32]) -> Result<(), PushError> {
        self.inner.lock(|cell| cell.borrow_mut().push(samples))?;
        self.ready.signal(());
        Ok(())
    }

    /// Queue one frame of raw left-justified ASI slots, decoding each with
    /// the stream's sample format.
    ///
    /// Slots beyond the enabled channel count (I²S padding) are ignored.
    pub fn push_slots(&self, slots: &[u32]) -> Result<(), PushError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let format = inner.format;
            let mut decoded = [0i32; CHANNEL_COUNT];
            for (out, &raw) in decoded.iter_mut().zip(slots) {
                *out = format.decode_slot(raw);
            }
            let len = slots.len().min(CHANNEL_COUNT);
            inner.push(decoded.get(..len).unwrap_or(&[]))
        })?;
        self.ready.signal(());
        Ok(())
    }

    /// Take the next frame without waiting.
    ///
    /// `Ok(None)` means the stream is open but empty (counted as underrun).
    pub fn try_read_frame(&self) -> Result<Option<SampleFrame>, StreamClosed> {
        self.inner.lock(|cell| cell.borrow_mut().pop())
    }

    /// Wait for the next frame.
    ///
    /// Returns [`StreamClosed`] if the stream is closed, or gets closed while
    /// waiting.
    pub async fn read_frame(&self) -> Result<SampleFrame, StreamClosed> {
        loop {
            if let Some(frame) = self.try_read_frame()? {
                return Ok(frame);
            }
            self.ready.wait().await;
        }
    }

    /// Frames currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock(|cell| cell.borrow().ring.len())
    }

    /// `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue capacity in frames.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Counters since construction.
    pub fn stats(&self) -> StreamStats {
        self.inner.lock(|cell| cell.borrow().stats)
    }
}

impl<M: RawMutex, const N: usize> Default for FrameQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    type Queue<const N: usize> = FrameQueue<NoopRawMutex, N>;

    #[test]
    fn closed_queue_rejects_both_ends() {
        let q = Queue::<4>::new();
        assert_eq!(q.push_frame(&[1]), Err(PushError::Closed));
        assert_eq!(q.try_read_frame(), Err(StreamClosed));
    }

    #[test]
    fn frames_keep_order_and_sequence() {
        let q = Queue::<4>::new();
        q.open(2, SampleFormat::Bits24);
        q.push_frame(&[1, 2]).unwrap();
        q.push_frame(&[3, 4]).unwrap();

        let a = q.try_read_frame().unwrap().unwrap();
        let b = q.try_read_frame().unwrap().unwrap();
        assert_eq!((a.sequence, a.samples.as_slice()), (0, &[1, 2][..]));
        assert_eq!((b.sequence, b.samples.as_slice()), (1, &[3, 4][..]));
        assert!(a.overflow.is_none() && b.overflow.is_none());
    }

    #[test]
    fn overflow_flags_first_frame_after_gap_once() {
        let q = Queue::<2>::new();
        q.open(1, SampleFormat::Bits16);
        for i in 0..5 {
            q.push_frame(&[i]).unwrap();
        }
        // 0, 1, 2 evicted; 3 and 4 remain
        let first = q.try_read_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 3);
        assert_eq!(first.overflow, Some(Overflow { dropped: 3 }));
        let second = q.try_read_frame().unwrap().unwrap();
        assert_eq!(second.overflow, None);

        let stats = q.stats();
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.overflow_events, 1);
        assert_eq!(stats.delivered, 2);
    }

    #[test]
    fn empty_read_counts_underrun() {
        let q = Queue::<2>::new();
        q.open(1, SampleFormat::Bits24);
        assert_eq!(q.try_read_frame(), Ok(None));
        assert_eq!(q.stats().underruns, 1);
    }

    #[test]
    fn short_frame_is_rejected() {
        let q = Queue::<2>::new();
        q.open(3, SampleFormat::Bits24);
        assert_eq!(
            q.push_frame(&[1, 2]),
            Err(PushError::ShortFrame { expected: 3, got: 2 })
        );
    }

    #[test]
    fn channel_count_is_clamped_to_the_part() {
        let q = Queue::<2>::new();
        q.open(9, SampleFormat::Bits32);
        q.push_frame(&[1, 2, 3, 4, 5, 6]).unwrap();
        let frame = q.try_read_frame().unwrap().unwrap();
        assert_eq!(frame.samples.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn slots_are_decoded_with_stream_format() {
        let q = Queue::<2>::new();
        q.open(2, SampleFormat::Bits24);
        q.push_slots(&[0xFFFF_FF00, 0x0000_0100, 0xDEAD_BEEF]).unwrap();
        let frame = q.try_read_frame().unwrap().unwrap();
        assert_eq!(frame.samples.as_slice(), &[-1, 1]);
    }

    #[test]
    fn reopen_restarts_sequence_and_discards() {
        let q = Queue::<4>::new();
        q.open(1, SampleFormat::Bits24);
        q.push_frame(&[10]).unwrap();
        q.push_frame(&[11]).unwrap();
        q.close();
        q.open(1, SampleFormat::Bits24);
        assert!(q.is_empty());
        q.push_frame(&[12]).unwrap();
        assert_eq!(q.try_read_frame().unwrap().unwrap().sequence, 0);
    }

    #[tokio::test]
    async fn close_wakes_waiting_reader() {
        let q = Queue::<4>::new();
        q.open(1, SampleFormat::Bits24);
        let (result, ()) = embassy_futures::join::join(q.read_frame(), async {
            embassy_time::Timer::after_millis(1).await;
            q.close();
        })
        .await;
        assert_eq!(result, Err(StreamClosed));
    }
}
