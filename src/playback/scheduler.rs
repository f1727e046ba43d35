//! Gapless playback timeline for synthesized audio chunks.
//!
//! Chunks arrive as base64 16-bit PCM and are scheduled back to back on the
//! sink's clock. A server-detected barge-in cancels everything queued and
//! resets the timeline cursor so the next chunk schedules against real time.

use super::clock::OutputClock;
use super::device::PlaybackSink;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("malformed audio payload: {0}")]
pub struct DecodeError(pub String);

/// Timeline placement of one accepted chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub source_id: u64,
    pub start_time: f64,
    pub duration_secs: f64,
}

pub struct PlaybackScheduler {
    sink: Arc<dyn PlaybackSink>,
    clock: Arc<dyn OutputClock>,
    active: HashSet<u64>,
    next_start_time: f64,
    next_source_id: u64,
    priming_delay: f64,
    sample_rate: u32,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn PlaybackSink>, priming_delay: f64, sample_rate: u32) -> Self {
        let clock = sink.clock();
        Self {
            sink,
            clock,
            active: HashSet::new(),
            next_start_time: 0.0,
            next_source_id: 0,
            priming_delay,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Decode one inbound chunk and schedule it on the timeline.
    ///
    /// Start times are non-decreasing across an uninterrupted run. The first
    /// chunk after silence is pushed out by the priming delay to absorb
    /// network jitter.
    pub async fn enqueue(&mut self, data: &str) -> Result<ScheduledChunk, DecodeError> {
        let pcm = decode_pcm16(data)?;
        let samples: Vec<f32> = pcm.iter().map(|&s| f32::from(s) / 32_768.0).collect();
        let duration_secs = samples.len() as f64 / f64::from(self.sample_rate);

        let mut start_time = self.next_start_time.max(self.clock.now());
        if self.active.is_empty() {
            start_time += self.priming_delay;
        }

        let source_id = self.next_source_id;
        self.next_source_id += 1;

        // Registered before scheduling so a completion racing in cannot miss
        // the entry.
        self.active.insert(source_id);
        if let Err(e) = self
            .sink
            .play(source_id, Arc::new(samples), start_time)
            .await
        {
            self.active.remove(&source_id);
            return Err(DecodeError(format!("sink rejected chunk: {e}")));
        }

        self.next_start_time = start_time + duration_secs;
        debug!(
            "scheduled chunk {source_id}: start={start_time:.3}s dur={duration_secs:.3}s queue={}",
            self.active.len()
        );

        Ok(ScheduledChunk {
            source_id,
            start_time,
            duration_secs,
        })
    }

    /// Barge-in: stop everything queued or playing and reset the cursor so
    /// the next chunk schedules fresh against the live clock.
    pub async fn interrupt(&mut self) {
        let cancelled = self.active.len();
        for source_id in self.active.drain() {
            // Sources that already ended are gone from the sink; fine.
            if let Err(e) = self.sink.stop(source_id).await {
                warn!("failed to stop source {source_id}: {e}");
            }
        }
        self.next_start_time = 0.0;
        if cancelled > 0 {
            debug!("interrupted playback, cancelled {cancelled} sources");
        }
    }

    /// A source finished playing naturally.
    pub fn on_source_ended(&mut self, source_id: u64) {
        self.active.remove(&source_id);
    }

    pub fn active_sources(&self) -> usize {
        self.active.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }
}

/// Decode a base64 payload of little-endian 16-bit PCM samples.
pub fn decode_pcm16(data: &str) -> Result<Vec<i16>, DecodeError> {
    let bytes = BASE64
        .decode(data)
        .map_err(|e| DecodeError(format!("invalid base64: {e}")))?;
    if bytes.len() % 2 != 0 {
        return Err(DecodeError(format!(
            "odd payload length: {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
