//! WAV input for the sender.
//!
//! Loads a WAV file and normalizes it to the stream format: 48kHz mono
//! 16-bit PCM, cut into 20ms frames.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use tracing::info;

/// Stream sampling rate (Hz)
pub const SAMPLE_RATE: u32 = 48_000;

/// Samples per 20ms frame at [`SAMPLE_RATE`]
pub const SAMPLES_PER_FRAME: usize = 960;

/// Mono PCM clip at [`SAMPLE_RATE`].
#[derive(Debug, Clone)]
pub struct AudioClip {
    // ---
    pub samples: Vec<i16>,

    /// Sampling rate of the source file
    pub source_rate: u32,

    /// Channel count of the source file
    pub source_channels: u16,
}

impl AudioClip {
    // ---
    /// 20ms frames; the last one is zero-padded to full length.
    pub fn frames(&self) -> impl Iterator<Item = Vec<i16>> + '_ {
        // ---
        self.samples.chunks(SAMPLES_PER_FRAME).map(|chunk| {
            let mut frame = chunk.to_vec();
            frame.resize(SAMPLES_PER_FRAME, 0);
            frame
        })
    }

    pub fn frame_count(&self) -> usize {
        // ---
        self.samples.len().div_ceil(SAMPLES_PER_FRAME)
    }

    pub fn duration_secs(&self) -> f64 {
        // ---
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }
}

/// Reads a WAV file and converts it to 48kHz mono.
///
/// Accepts 16-bit integer and 32-bit float PCM with any channel count
/// and sampling rate.
///
/// # Errors
///
/// Returns error if:
/// - File cannot be opened or decoded
/// - Sample format is not 16-bit int or 32-bit float
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioClip> {
    // ---
    let path = path.as_ref();
    let mut reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    info!(
        "WAV {}: {}Hz, {} channels, {}-bit {:?}",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read 16-bit PCM samples")?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read 32-bit float samples")?,
        (format, bits) => {
            anyhow::bail!("unsupported WAV sample format: {}-bit {:?}", bits, format)
        }
    };

    let mono = downmix(&interleaved, spec.channels.max(1) as usize);
    let samples = resample(&mono, spec.sample_rate, SAMPLE_RATE);

    Ok(AudioClip {
        samples,
        source_rate: spec.sample_rate,
        source_channels: spec.channels,
    })
}

/// Averages interleaved channels into one.
fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    // ---
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampler; adequate for voice.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    // ---
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / step) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[idx + 1] as f64;
            (a + (b - a) * frac) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(name: &str, spec: WavSpec, samples: &[i16]) -> std::path::PathBuf {
        // ---
        let path = std::env::temp_dir().join(format!("sender-{}-{}.wav", name, std::process::id()));
        let mut writer = WavWriter::create(&path, spec).expect("create WAV");
        for &s in samples {
            writer.write_sample(s).expect("write sample");
        }
        writer.finalize().expect("finalize WAV");
        path
    }

    #[test]
    fn test_downmix_stereo() {
        // ---
        assert_eq!(downmix(&[100, 200, 300, 400, -10, 10], 2), vec![150, 350, 0]);
    }

    #[test]
    fn test_resample_doubles_rate() {
        // ---
        let out = resample(&[0, 1000, 2000, 3000], 24_000, 48_000);
        assert_eq!(out.len(), 8);
        assert_eq!(out[1], 500);
        assert_eq!(*out.last().expect("non-empty"), 3000);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        // ---
        assert_eq!(resample(&[1, 2, 3], 48_000, 48_000), vec![1, 2, 3]);
    }

    #[test]
    fn test_frames_are_padded() {
        // ---
        let clip = AudioClip {
            samples: vec![7; SAMPLES_PER_FRAME + 10],
            source_rate: SAMPLE_RATE,
            source_channels: 1,
        };

        let frames: Vec<_> = clip.frames().collect();
        assert_eq!(clip.frame_count(), 2);
        assert_eq!(frames[1].len(), SAMPLES_PER_FRAME);
        assert_eq!(frames[1][9], 7);
        assert_eq!(frames[1][10], 0);
    }

    #[test]
    fn test_read_stereo_16k_wav() {
        // ---
        let spec = WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        // 0.1s of stereo audio
        let samples: Vec<i16> = (0..3200).map(|i| if i % 2 == 0 { 1000 } else { 3000 }).collect();
        let path = write_wav("stereo", spec, &samples);

        let clip = read_wav(&path).expect("read WAV");
        let _ = std::fs::remove_file(&path);

        assert_eq!(clip.source_rate, 16_000);
        assert_eq!(clip.source_channels, 2);
        assert_eq!(clip.samples.len(), 4800);
        assert!(clip.samples.iter().all(|&s| s == 2000));
        assert!((clip.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_error() {
        // ---
        assert!(read_wav("/nonexistent/clip.wav").is_err());
    }
}
