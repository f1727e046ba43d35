use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes the model's synthesized replies for one session to a WAV file so
/// the finished conversation can be attached to a note.
pub struct SessionRecorder {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    samples_written: usize,
}

impl SessionRecorder {
    pub fn create(output_dir: &Path, session_id: &str, sample_rate: u32) -> Result<Self> {
        fs::create_dir_all(output_dir).context("Failed to create recordings directory")?;

        let path = output_dir.join(format!("{session_id}-replies.wav"));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {path:?}"))?;

        info!("recording session replies to {}", path.display());

        Ok(Self {
            writer: Some(writer),
            path,
            samples_written: 0,
        })
    }

    pub fn write(&mut self, pcm: &[i16]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in pcm {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.samples_written += pcm.len();
        }
        Ok(())
    }

    pub fn samples_written(&self) -> usize {
        self.samples_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finalize(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(self.path.clone())
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
