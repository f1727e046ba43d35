//! Speaker output via cpal.
//!
//! Like the microphone side, the cpal stream is not `Send` and lives on a
//! worker thread. Scheduled buffers are mixed sample-accurately against a
//! frame counter that doubles as the output clock.

use super::clock::{OutputClock, SampleClock};
use crate::audio::resample_nearest;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Output sink the scheduler plays sources through.
///
/// `play` queues a decoded buffer to begin at `start_at` seconds on this
/// sink's clock; `stop` tolerates ids that already finished.
#[async_trait::async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self, source_id: u64, samples: Arc<Vec<f32>>, start_at: f64) -> Result<()>;

    async fn stop(&self, source_id: u64) -> Result<()>;

    fn clock(&self) -> Arc<dyn OutputClock>;

    /// Release the output device. Idempotent.
    async fn close(&self) -> Result<()>;
}

struct Voice {
    id: u64,
    samples: Vec<f32>,
    start_frame: u64,
}

struct SinkShared {
    voices: parking_lot::Mutex<Vec<Voice>>,
    clock: Arc<SampleClock>,
    done_tx: mpsc::UnboundedSender<u64>,
    /// Sample rate of buffers handed to `play` (model output, 24kHz)
    source_rate: u32,
}

/// cpal-backed speaker sink.
pub struct SpeakerSink {
    shared: Arc<SinkShared>,
    running: Arc<AtomicBool>,
    worker: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl SpeakerSink {
    /// Open the default output device.
    ///
    /// Returns the sink plus a receiver of source ids that finished playing
    /// naturally, for the scheduler's active-set bookkeeping.
    pub fn open(source_rate: u32) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<u64>)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default output device available")?;
        let default_config = device
            .default_output_config()
            .context("failed to query output device format")?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));

        debug!(
            "output device '{}': format={:?} rate={}Hz channels={}",
            device.name().unwrap_or_else(|_| "unknown".into()),
            format,
            device_rate,
            channels
        );

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SinkShared {
            voices: parking_lot::Mutex::new(Vec::new()),
            clock: SampleClock::new(device_rate),
            done_tx,
            source_rate,
        });

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        let worker_shared = Arc::clone(&shared);
        let worker_flag = Arc::clone(&running);
        let worker = std::thread::spawn(move || {
            let stream =
                match build_output_stream(&device, &device_config, format, channels, &worker_shared)
                {
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

            drop(stream);
            debug!("speaker worker thread finished");
        });

        // open() is called from async context via spawn_blocking in the
        // controller; a blocking wait here keeps the constructor synchronous.
        match ready_rx.blocking_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                anyhow::bail!("speaker worker exited before reporting readiness");
            }
        }

        info!("speaker output opened at {}Hz", device_rate);

        let sink = Arc::new(Self {
            shared,
            running,
            worker: parking_lot::Mutex::new(Some(worker)),
        });
        Ok((sink, done_rx))
    }
}

#[async_trait::async_trait]
impl PlaybackSink for SpeakerSink {
    async fn play(&self, source_id: u64, samples: Arc<Vec<f32>>, start_at: f64) -> Result<()> {
        let device_rate = self.shared.clock.sample_rate();
        let resampled = resample_nearest(&samples, self.shared.source_rate, device_rate);
        let start_frame = (start_at * f64::from(device_rate)).round() as u64;

        self.shared.voices.lock().push(Voice {
            id: source_id,
            samples: resampled,
            start_frame,
        });
        Ok(())
    }

    async fn stop(&self, source_id: u64) -> Result<()> {
        // Already-finished sources are simply absent; that is not an error.
        self.shared.voices.lock().retain(|v| v.id != source_id);
        Ok(())
    }

    fn clock(&self) -> Arc<dyn OutputClock> {
        Arc::clone(&self.shared.clock) as Arc<dyn OutputClock>
    }

    async fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || {
                if worker.join().is_err() {
                    warn!("speaker worker thread panicked");
                }
            })
            .await
            .context("failed to join speaker worker")?;
        }
        Ok(())
    }
}

fn build_output_stream(
    device: &cpal::Device,
    device_config: &StreamConfig,
    format: SampleFormat,
    channels: usize,
    shared: &Arc<SinkShared>,
) -> Result<cpal::Stream> {
    let err_fn = |err| warn!("output stream error: {err}");

    let stream = match format {
        SampleFormat::F32 => {
            let shared = Arc::clone(shared);
            device.build_output_stream(
                device_config,
                move |data: &mut [f32], _| {
                    render_block(&shared, data.len() / channels, |frame, value| {
                        let base = frame * channels;
                        for ch in 0..channels {
                            data[base + ch] = value;
                        }
                    });
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let shared = Arc::clone(shared);
            device.build_output_stream(
                device_config,
                move |data: &mut [i16], _| {
                    render_block(&shared, data.len() / channels, |frame, value| {
                        let sample = (value * 32_768.0).clamp(-32_768.0, 32_767.0) as i16;
                        let base = frame * channels;
                        for ch in 0..channels {
                            data[base + ch] = sample;
                        }
                    });
                },
                err_fn,
                None,
            )?
        }
        other => anyhow::bail!("unsupported output sample format: {other:?}"),
    };

    stream.play().context("failed to start output stream")?;
    Ok(stream)
}

/// Mix all scheduled voices for one callback block and advance the clock.
fn render_block(shared: &Arc<SinkShared>, frames: usize, mut write: impl FnMut(usize, f32)) {
    let base_frame = shared.clock.frames();
    let mut voices = shared.voices.lock();

    for i in 0..frames {
        let t = base_frame + i as u64;
        let mut mixed = 0.0f32;
        for voice in voices.iter() {
            if t >= voice.start_frame {
                let idx = (t - voice.start_frame) as usize;
                if idx < voice.samples.len() {
                    mixed += voice.samples[idx];
                }
            }
        }
        write(i, mixed.clamp(-1.0, 1.0));
    }

    let end_frame = base_frame + frames as u64;
    voices.retain(|voice| {
        let finished = end_frame >= voice.start_frame
            && (end_frame - voice.start_frame) as usize >= voice.samples.len();
        if finished {
            // Natural end of playback; report so the scheduler can drop it
            // from the active set.
            let _ = shared.done_tx.send(voice.id);
        }
        !finished
    });
    drop(voices);

    shared.clock.advance(frames as u64);
}
