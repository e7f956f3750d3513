//! WAV recording of received audio.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use media::pcm::samples_from_le_bytes;
use media::AudioConfig;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Writes 16-bit PCM payloads to a WAV file.
pub struct WavRecorder {
    // ---
    writer: WavWriter<BufWriter<File>>,
    samples_written: u64,
    channels: u16,
}

impl WavRecorder {
    // ---
    /// Creates (or truncates) `path` with the given PCM format.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, format: AudioConfig) -> Result<Self> {
        // ---
        let path = path.as_ref();
        let format = format.normalized();
        let spec = WavSpec {
            channels: format.channels as u16,
            sample_rate: format.sampling_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV file: {}", path.display()))?;
        info!(
            "Recording to {} ({}Hz, {} channels)",
            path.display(),
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            writer,
            samples_written: 0,
            channels: spec.channels,
        })
    }

    /// Appends a little-endian PCM payload.
    ///
    /// # Errors
    ///
    /// Returns error if writing fails.
    pub fn write_pcm(&mut self, payload: &[u8]) -> Result<()> {
        // ---
        for sample in samples_from_le_bytes(payload) {
            self.writer
                .write_sample(sample)
                .context("failed to write WAV sample")?;
            self.samples_written += 1;
        }
        Ok(())
    }

    /// Samples written so far (all channels).
    pub fn samples_written(&self) -> u64 {
        // ---
        self.samples_written
    }

    /// Flushes the header and closes the file.
    ///
    /// # Errors
    ///
    /// Returns error if the final write fails.
    pub fn finalize(self) -> Result<()> {
        // ---
        let frames = self.samples_written / self.channels.max(1) as u64;
        self.writer.finalize().context("failed to finalize WAV file")?;
        info!("Recording finalized: {} sample frames", frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_records_pcm_payloads() {
        // ---
        let path = std::env::temp_dir().join(format!("receiver-rec-{}.wav", std::process::id()));
        let mut recorder = WavRecorder::create(
            &path,
            AudioConfig {
                channels: 1,
                sampling_rate: 48_000,
            },
        )
        .expect("create recorder");

        recorder.write_pcm(&[0x01, 0x00, 0xFF, 0xFF]).expect("write");
        recorder.write_pcm(&[0x00, 0x80, 0x7F]).expect("write");
        assert_eq!(recorder.samples_written(), 3);
        recorder.finalize().expect("finalize");

        let mut reader = WavReader::open(&path).expect("open WAV");
        assert_eq!(reader.spec().sample_rate, 48_000);
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .expect("read samples");
        let _ = std::fs::remove_file(&path);

        assert_eq!(samples, vec![1, -1, i16::MIN]);
    }
}
