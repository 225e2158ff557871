//! Frame queue behaviour under a concurrent producer, plus a property test
//! of the overflow accounting.
//!
//! Run with: cargo test -p taa3040 --test frame_queue

// Integration test file: unwrap/arithmetic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use std::time::Duration;

use embassy_futures::join::join;
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use platform::SampleFormat;
use proptest::prelude::*;
use taa3040::{FrameQueue, PushError, SampleFrame};

// ── Producer / consumer ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_interleaved_producer_consumer_accounts_for_every_frame() {
    const TOTAL: u32 = 64;
    let queue: FrameQueue<NoopRawMutex, 8> = FrameQueue::new();
    queue.open(2, SampleFormat::Bits16);

    let producer = async {
        for n in 0..TOTAL {
            queue.push_frame(&[n as i32, -(n as i32)]).unwrap();
            // Bursts of twelve overflow the eight-frame queue.
            if n % 12 == 11 {
                yield_now().await;
            }
        }
        while !queue.is_empty() {
            yield_now().await;
        }
        queue.close();
    };
    let consumer = async {
        let mut frames: Vec<SampleFrame> = Vec::new();
        while let Ok(frame) = queue.read_frame().await {
            frames.push(frame);
        }
        frames
    };
    let ((), frames) = join(producer, consumer).await;

    let mut expected = 0u32;
    let mut reported_drops = 0u32;
    for frame in &frames {
        let gap = frame.overflow.map_or(0, |o| o.dropped);
        reported_drops += gap;
        expected += gap;
        assert_eq!(frame.sequence, expected, "gap must match overflow marker");
        assert_eq!(frame.samples[0], frame.sequence as i32);
        assert_eq!(frame.samples[1], -(frame.sequence as i32));
        expected += 1;
    }
    assert_eq!(frames.len() as u32 + reported_drops, TOTAL);

    let stats = queue.stats();
    assert_eq!(stats.delivered, frames.len() as u32);
    assert_eq!(stats.dropped, reported_drops);
}

static SHARED: FrameQueue<CriticalSectionRawMutex, 32> = FrameQueue::new();

#[tokio::test]
async fn test_producer_on_another_thread_wakes_reader() {
    SHARED.open(1, SampleFormat::Bits24);
    let producer = std::thread::spawn(|| {
        for n in 0..10u32 {
            std::thread::sleep(Duration::from_millis(1));
            SHARED.push_slots(&[n << 8]).unwrap();
        }
    });

    for n in 0..10 {
        let frame = SHARED.read_frame().await.unwrap();
        assert_eq!(frame.samples.as_slice(), &[n]);
        assert!(frame.overflow.is_none());
    }
    producer.join().unwrap();
    SHARED.close();
    assert_eq!(SHARED.push_frame(&[0]), Err(PushError::Closed));
}

#[test]
fn test_short_frame_is_rejected() {
    let queue: FrameQueue<NoopRawMutex, 4> = FrameQueue::new();
    queue.open(3, SampleFormat::Bits32);
    assert_eq!(
        queue.push_frame(&[1, 2]),
        Err(PushError::ShortFrame {
            expected: 3,
            got: 2
        })
    );
    assert!(queue.is_empty());
}

// ── Overflow accounting ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Op {
    Push,
    Pop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![3 => Just(Op::Push), 2 => Just(Op::Pop)]
}

proptest! {
    #[test]
    fn prop_every_drop_is_reported_once(ops in prop::collection::vec(op(), 0..200)) {
        let queue: FrameQueue<NoopRawMutex, 4> = FrameQueue::new();
        queue.open(1, SampleFormat::Bits32);

        let mut pushed = 0u32;
        let mut delivered = 0u32;
        let mut reported = 0u32;
        let mut next_expected = 0u32;
        for op in ops {
            match op {
                Op::Push => {
                    queue.push_frame(&[pushed as i32]).unwrap();
                    pushed += 1;
                }
                Op::Pop => {
                    if let Some(frame) = queue.try_read_frame().unwrap() {
                        let gap = frame.overflow.map_or(0, |o| o.dropped);
                        prop_assert!(frame.overflow.map_or(true, |o| o.dropped > 0));
                        prop_assert_eq!(frame.sequence, next_expected + gap);
                        next_expected = frame.sequence + 1;
                        reported += gap;
                        delivered += 1;
                    }
                }
            }
            prop_assert!(queue.len() <= queue.capacity());
        }

        let stats = queue.stats();
        prop_assert_eq!(stats.delivered, delivered);
        // Drops not yet reported belong to frames still to be delivered.
        prop_assert!(stats.dropped >= reported);
        prop_assert_eq!(pushed, delivered + stats.dropped + queue.len() as u32);
    }
}
