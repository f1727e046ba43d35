//! Microphone capture via cpal.
//!
//! The cpal stream is not `Send`, so it lives on a dedicated worker thread;
//! frames cross into async land over an mpsc channel.

use super::backend::{CaptureBackend, CaptureConfig, MicFrame};
use super::resample_nearest;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const FRAME_CHANNEL_DEPTH: usize = 64;

pub struct MicBackend {
    config: CaptureConfig,
    capturing: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// List input device names so the CLI can expose a selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn open_device(preferred: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();
        match preferred {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))
            }
            None => host
                .default_input_device()
                .context("no default input device available"),
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<MicFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            anyhow::bail!("microphone already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_DEPTH);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);
        let target_rate = self.config.sample_rate;
        let preferred = self.config.device.clone();

        let worker_flag = Arc::clone(&self.capturing);
        let worker = std::thread::spawn(move || {
            let stream = match build_input_stream(preferred.as_deref(), target_rate, frame_tx) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    worker_flag.store(false, Ordering::SeqCst);
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while worker_flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }

            // Dropping the stream stops the device callback.
            drop(stream);
            debug!("microphone worker thread finished");
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.worker = Some(worker);
                info!("microphone capture started at {}Hz", target_rate);
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                self.capturing.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                self.capturing.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(anyhow!("microphone worker exited before reporting readiness"))
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || {
                if worker.join().is_err() {
                    warn!("microphone worker thread panicked");
                }
            })
            .await
            .context("failed to join microphone worker")?;
        }
        info!("microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

fn build_input_stream(
    preferred: Option<&str>,
    target_rate: u32,
    frame_tx: mpsc::Sender<MicFrame>,
) -> Result<cpal::Stream> {
    let device = MicBackend::open_device(preferred)?;
    let default_config = device
        .default_input_config()
        .context("failed to query input device format")?;
    let format = default_config.sample_format();
    let device_config: StreamConfig = default_config.into();
    let device_rate = device_config.sample_rate.0;
    let channels = usize::from(device_config.channels.max(1));

    debug!(
        "input device '{}': format={:?} rate={}Hz channels={}",
        device.name().unwrap_or_else(|_| "unknown".into()),
        format,
        device_rate,
        channels
    );

    let started = Instant::now();
    let dropped = Arc::new(AtomicUsize::new(0));

    let err_fn = |err| warn!("input stream error: {err}");

    // Convert every supported sample type to mono f32 at the target rate up
    // front so the capture stage can stay format-agnostic.
    let stream = match format {
        SampleFormat::F32 => {
            let forward = make_forwarder(frame_tx, channels, device_rate, target_rate, started, dropped);
            device.build_input_stream(
                &device_config,
                move |data: &[f32], _| forward(data.to_vec()),
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let forward = make_forwarder(frame_tx, channels, device_rate, target_rate, started, dropped);
            device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    let floats: Vec<f32> =
                        data.iter().map(|&s| f32::from(s) / 32_768.0).collect();
                    forward(floats);
                },
                err_fn,
                None,
            )?
        }
        other => anyhow::bail!("unsupported input sample format: {other:?}"),
    };

    stream.play().context("failed to start input stream")?;
    Ok(stream)
}

fn make_forwarder(
    frame_tx: mpsc::Sender<MicFrame>,
    channels: usize,
    device_rate: u32,
    target_rate: u32,
    started: Instant,
    dropped: Arc<AtomicUsize>,
) -> impl Fn(Vec<f32>) {
    move |interleaved: Vec<f32>| {
        let mono = downmix(&interleaved, channels);
        let samples = resample_nearest(&mono, device_rate, target_rate);
        let frame = MicFrame {
            samples,
            sample_rate: target_rate,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };
        // The device callback must never block; drop the frame if the
        // consumer is behind.
        if frame_tx.try_send(frame).is_err() {
            let n = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if n % 50 == 1 {
                warn!("capture consumer behind; {n} mic frames dropped so far");
            }
        }
    }
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
