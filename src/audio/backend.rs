use anyhow::Result;
use tokio::sync::mpsc;

/// One window of raw microphone samples as delivered by the capture backend.
///
/// Samples are mono f32 in [-1.0, 1.0], already resampled to the configured
/// capture rate.
#[derive(Debug, Clone)]
pub struct MicFrame {
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for the capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (will resample if the device differs)
    pub sample_rate: u32,
    /// Preferred input device name; default device when unset
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000, // 16kHz PCM expected by the live service
            device: None,
        }
    }
}

/// Microphone capture backend trait
///
/// The shipped implementation wraps cpal; tests substitute channel-fed fakes.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive microphone frames
    async fn start(&mut self) -> Result<mpsc::Receiver<MicFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
