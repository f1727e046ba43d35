//! Outbound capture stage: frames microphone samples into fixed windows and
//! encodes them as realtime-input frames for the live session.

use crate::live::client::FrameSender;
use crate::live::messages::RealtimeFrame;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Frames raw samples into fixed windows, converts each window to 16-bit PCM
/// and submits it to the session as a base64 realtime frame.
///
/// Submission never blocks; the sender applies the bounded-queue drop policy.
pub struct CaptureStage {
    window: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    frames_sent: u64,
}

impl CaptureStage {
    pub fn new(window: usize, sample_rate: u32) -> Self {
        Self {
            window: window.max(1),
            sample_rate,
            pending: Vec::with_capacity(window.max(1)),
            frames_sent: 0,
        }
    }

    /// Feed new samples; submits one frame per completed window.
    ///
    /// Returns the number of frames submitted for this batch.
    pub fn push(&mut self, samples: &[f32], out: &FrameSender) -> usize {
        self.pending.extend_from_slice(samples);

        let mut submitted = 0;
        while self.pending.len() >= self.window {
            let window: Vec<f32> = self.pending.drain(..self.window).collect();
            out.submit(encode_frame(&window, self.sample_rate));
            self.frames_sent += 1;
            submitted += 1;
        }
        submitted
    }

    /// Samples accumulated but not yet filling a window.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

/// Encode one window of f32 samples as a wire frame.
pub fn encode_frame(samples: &[f32], sample_rate: u32) -> RealtimeFrame {
    let pcm = pcm16_from_f32(samples);
    let mut bytes = Vec::with_capacity(pcm.len() * 2);
    for sample in pcm {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    RealtimeFrame::pcm(BASE64.encode(&bytes), sample_rate)
}

/// Convert f32 samples in [-1.0, 1.0] to 16-bit signed integers.
pub fn pcm16_from_f32(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            (s * 32_768.0)
                .round()
                .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
        })
        .collect()
}
