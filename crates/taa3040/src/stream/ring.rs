//! Const-generic, stack-allocated ring of captured frames.
//!
//! `FrameRing<N>` stores up to `N` frames without heap allocation. Unlike a
//! plain FIFO it never refuses a write: when full, the oldest frame is
//! evicted and handed back to the caller so the loss can be accounted for.
//!
//! This type is not synchronised; [`FrameQueue`](super::FrameQueue) wraps it
//! in a blocking mutex.

use platform::CHANNEL_COUNT;

/// One sampling instant as stored in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    /// Samples of the enabled channels; only the first `len` are valid.
    pub samples: [i32; CHANNEL_COUNT],
    /// Number of valid samples.
    pub len: u8,
    /// Sequence number assigned when the frame was queued.
    pub sequence: u32,
}

impl RawFrame {
    const EMPTY: Self = Self {
        samples: [0; CHANNEL_COUNT],
        len: 0,
        sequence: 0,
    };

    /// Valid samples.
    pub fn samples(&self) -> &[i32] {
        self.samples.get(..usize::from(self.len)).unwrap_or(&[])
    }
}

/// Fixed-capacity drop-oldest ring of [`RawFrame`]s.
pub struct FrameRing<const N: usize> {
    buf: [RawFrame; N],
    /// Index of the next slot to read from.
    read: usize,
    /// Index of the next slot to write to.
    write: usize,
    /// Number of frames currently held.
    count: usize,
}

impl<const N: usize> FrameRing<N> {
    /// Create a new, empty ring.
    ///
    /// `const` so queues can live in a `static`.
    pub const fn new() -> Self {
        Self {
            buf: [RawFrame::EMPTY; N],
            read: 0,
            write: 0,
            count: 0,
        }
    }

    /// Append `frame`, evicting and returning the oldest frame when full.
    ///
    /// A zero-capacity ring evicts `frame` itself.
    #[allow(clippy::indexing_slicing)] // Safety: read, write < N invariant; N > 0 checked
    #[allow(clippy::arithmetic_side_effects)] // Safety: wrap via % N with N > 0; count <= N
    pub fn push_overwrite(&mut self, frame: RawFrame) -> Option<RawFrame> {
        if N == 0 {
            return Some(frame);
        }
        let evicted = if self.count == N {
            let oldest = self.buf[self.read];
            self.read = (self.read + 1) % N;
            self.count -= 1;
            Some(oldest)
        } else {
            None
        };
        self.buf[self.write] = frame;
        self.write = (self.write + 1) % N;
        self.count += 1;
        evicted
    }

    /// Remove and return the oldest frame.
    #[allow(clippy::indexing_slicing)] // Safety: read < N invariant; count > 0 checked
    #[allow(clippy::arithmetic_side_effects)] // Safety: wrap via % N; count -= 1 where count > 0
    pub fn pop(&mut self) -> Option<RawFrame> {
        if self.count == 0 {
            return None;
        }
        let frame = self.buf[self.read];
        self.read = (self.read + 1) % N;
        self.count -= 1;
        Some(frame)
    }

    /// Discard every frame.
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.count = 0;
    }

    /// Number of frames available to read.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Maximum number of frames the ring can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// `true` when no frames are present.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` when the next push evicts.
    pub fn is_full(&self) -> bool {
        self.count == N
    }
}

impl<const N: usize> Default for FrameRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
