pub mod backend;
pub mod capture;
pub mod mic;
pub mod recorder;

pub use backend::{CaptureBackend, CaptureConfig, MicFrame};
pub use capture::CaptureStage;
pub use mic::MicBackend;
pub use recorder::SessionRecorder;

/// Nearest-neighbor resampling between integer sample rates.
///
/// Good enough for speech at the rates this crate moves between (device rate
/// to 16kHz on capture, 24kHz to device rate on playback).
pub fn resample_nearest(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let out_len =
        ((samples.len() as u64 * to_rate as u64) / from_rate as u64).max(1) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src = (i as u64 * from_rate as u64 / to_rate as u64) as usize;
        out.push(samples[src.min(samples.len() - 1)]);
    }
    out
}
