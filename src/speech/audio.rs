//! Mono audio buffers
//!
//! Samples are `f32` in `[-1.0, 1.0]` at a fixed sample rate. Buffers of
//! different rates are never concatenated directly; one side is resampled
//! first.

use crate::{PieError, Result};
use log::debug;
use rubato::{FftFixedIn, Resampler};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Resampler chunk size in frames
const RESAMPLE_CHUNK: usize = 1024;
/// Sub-chunks per chunk for the FFT resampler
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Ordered mono samples at a fixed rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate)
    }

    /// Silence lasting `duration`, rounded to whole samples
    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let len = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Append another buffer of the same rate
    pub fn append(&mut self, other: &AudioBuffer) -> Result<()> {
        if other.sample_rate != self.sample_rate {
            return Err(PieError::synthesis(format!(
                "Cannot append {} Hz audio to a {} Hz buffer",
                other.sample_rate, self.sample_rate
            )));
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Append `duration` of silence
    pub fn push_silence(&mut self, duration: Duration) {
        let gap = Self::silence(duration, self.sample_rate);
        self.samples.extend(gap.samples);
    }

    /// Scale so the loudest sample hits `target` (no-op on silence)
    pub fn normalize(&mut self, target: f32) {
        let peak = self.peak();
        if peak > 0.0 {
            let gain = target / peak;
            self.samples.iter_mut().for_each(|s| *s *= gain);
        }
    }

    /// Convert to another sample rate.
    ///
    /// The result has exactly `round(len * to / from)` samples so durations
    /// are preserved.
    pub fn resampled(&self, to: u32) -> Result<AudioBuffer> {
        if to == self.sample_rate {
            return Ok(self.clone());
        }
        if self.sample_rate == 0 || to == 0 {
            return Err(PieError::synthesis("Cannot resample to or from 0 Hz"));
        }

        let expected =
            (self.samples.len() as f64 * to as f64 / self.sample_rate as f64).round() as usize;
        if self.samples.is_empty() {
            return Ok(AudioBuffer::empty(to));
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.sample_rate as usize,
            to as usize,
            RESAMPLE_CHUNK,
            RESAMPLE_SUB_CHUNKS,
            1,
        )
        .map_err(|e| PieError::synthesis(format!("Unsupported resampling: {}", e)))?;

        let delay = resampler.output_delay();
        let mut out = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

        // Feed zero-padded chunks until the delayed tail has come out too
        let mut pos = 0;
        while out.len() < expected + delay {
            let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
            if pos < self.samples.len() {
                let end = (pos + RESAMPLE_CHUNK).min(self.samples.len());
                chunk[..end - pos].copy_from_slice(&self.samples[pos..end]);
            }
            pos += RESAMPLE_CHUNK;

            let block = vec![chunk];
            let frames = resampler
                .process(&block, None)
                .map_err(|e| PieError::synthesis(format!("Resampling failed: {}", e)))?;
            out.extend_from_slice(&frames[0]);
        }

        let samples: Vec<f32> = out.into_iter().skip(delay).take(expected).collect();
        debug!(
            "Resampled {} samples at {} Hz to {} samples at {} Hz",
            self.samples.len(),
            self.sample_rate,
            samples.len(),
            to
        );
        Ok(AudioBuffer::new(samples, to))
    }

    /// Write as 16-bit mono PCM WAV
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &s in &self.samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
        debug!("Wrote {} samples to {:?}", self.samples.len(), path);
        Ok(())
    }

    /// Read a WAV file, mixing multi-channel audio down to mono
    pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
        let reader = hound::WavReader::open(path)?;
        Self::from_wav_reader(reader, false)
    }

    /// Decode WAV bytes from any reader.
    ///
    /// With `lenient` set, decoding stops quietly at the first bad sample;
    /// streamed WAV output often carries a placeholder data length.
    pub fn from_wav<R: Read>(input: R, lenient: bool) -> Result<AudioBuffer> {
        let reader = hound::WavReader::new(input)?;
        Self::from_wav_reader(reader, lenient)
    }

    fn from_wav_reader<R: Read>(mut reader: hound::WavReader<R>, lenient: bool) -> Result<AudioBuffer> {
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => collect_samples(reader.samples::<f32>(), lenient)?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                collect_samples(reader.samples::<i32>(), lenient)?
                    .into_iter()
                    .map(|s| s as f32 / scale)
                    .collect()
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };
        Ok(AudioBuffer::new(samples, spec.sample_rate))
    }
}

fn collect_samples<T, I>(samples: I, lenient: bool) -> Result<Vec<T>>
where
    I: Iterator<Item = hound::Result<T>>,
{
    let mut out = Vec::new();
    for sample in samples {
        match sample {
            Ok(s) => out.push(s),
            Err(_) if lenient => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(out)
}
