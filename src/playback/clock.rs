use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic playback clock, in seconds since the output opened.
///
/// The scheduler computes chunk start times against this clock; tests drive a
/// manual implementation.
pub trait OutputClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock derived from the number of frames the output device has rendered.
///
/// Mirrors the timeline the speaker actually hears, so scheduled start times
/// stay glued to real playback position rather than wall time.
#[derive(Debug)]
pub struct SampleClock {
    frames: AtomicU64,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            frames: AtomicU64::new(0),
            sample_rate: sample_rate.max(1),
        })
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Advance by `frames` rendered output frames (called from the device
    /// callback).
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl OutputClock for SampleClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}
