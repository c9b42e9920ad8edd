//! Time-frequency view of a rendered utterance
//!
//! A short-time Fourier transform over Hann-windowed frames. Magnitudes are
//! stored in dB, indexed `[bin][frame]`.

use super::audio::AudioBuffer;
use crate::{PieError, Result};
use log::debug;
use rustfft::{num_complex::Complex, FftPlanner};
use std::io::Write;

/// Floor for log magnitudes, keeps silence finite
const MIN_DB: f32 = -120.0;

/// STFT parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrogramSettings {
    pub fft_size: usize,
    pub hop_size: usize,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            fft_size: 512,
            hop_size: 128,
        }
    }
}

impl SpectrogramSettings {
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 || self.hop_size == 0 {
            return Err(PieError::Config(format!(
                "Invalid spectrogram settings: fft_size {} hop_size {}",
                self.fft_size, self.hop_size
            )));
        }
        Ok(())
    }
}

/// Magnitude spectrogram (frequency bins × time frames), immutable
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    values: Vec<Vec<f32>>,
    sample_rate: u32,
    settings: SpectrogramSettings,
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

impl Spectrogram {
    /// Compute the spectrogram of a whole buffer.
    ///
    /// The tail is zero-padded so every sample lands in at least one frame.
    pub fn compute(audio: &AudioBuffer, settings: &SpectrogramSettings) -> Result<Self> {
        settings.validate()?;
        let SpectrogramSettings { fft_size, hop_size } = *settings;
        let samples = audio.samples();

        let frames = if samples.len() <= fft_size {
            1
        } else {
            1 + (samples.len() - fft_size).div_ceil(hop_size)
        };
        let bins = fft_size / 2 + 1;

        let window = hann_window(fft_size);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let mut buf = vec![Complex::new(0.0f32, 0.0); fft_size];

        let mut values = vec![Vec::with_capacity(frames); bins];
        for frame in 0..frames {
            let start = frame * hop_size;
            for (i, slot) in buf.iter_mut().enumerate() {
                let s = samples.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(s * window[i], 0.0);
            }
            fft.process(&mut buf);
            for (bin, column) in values.iter_mut().enumerate() {
                let magnitude = buf[bin].norm() / fft_size as f32;
                column.push((20.0 * magnitude.max(1e-12).log10()).max(MIN_DB));
            }
        }

        debug!(
            "Spectrogram: {} bins x {} frames from {} samples",
            bins,
            frames,
            samples.len()
        );
        Ok(Self {
            values,
            sample_rate: audio.sample_rate(),
            settings: *settings,
        })
    }

    pub fn bins(&self) -> usize {
        self.values.len()
    }

    pub fn frames(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// Level in dB at a bin and frame
    pub fn get(&self, bin: usize, frame: usize) -> Option<f32> {
        self.values.get(bin)?.get(frame).copied()
    }

    pub fn values(&self) -> &[Vec<f32>] {
        &self.values
    }

    /// Centre frequency of a bin in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.settings.fft_size as f32
    }

    /// Start time of a frame in seconds
    pub fn frame_time(&self, frame: usize) -> f32 {
        (frame * self.settings.hop_size) as f32 / self.sample_rate as f32
    }

    /// Write as CSV: one row per bin, first column the frequency
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        let header: Vec<String> = (0..self.frames())
            .map(|f| format!("{:.4}", self.frame_time(f)))
            .collect();
        writeln!(out, "hz,{}", header.join(","))?;
        for (bin, row) in self.values.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|v| format!("{:.1}", v)).collect();
            writeln!(out, "{:.1},{}", self.bin_frequency(bin), cells.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, rate: u32, len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect();
        AudioBuffer::new(samples, rate)
    }

    #[test]
    fn test_shape() {
        let settings = SpectrogramSettings {
            fft_size: 256,
            hop_size: 64,
        };
        let spec = Spectrogram::compute(&tone(1000.0, 8000, 1000), &settings).unwrap();
        assert_eq!(spec.bins(), 129);
        // 1 + ceil((1000 - 256) / 64) = 1 + 12
        assert_eq!(spec.frames(), 13);
    }

    #[test]
    fn test_peak_bin_matches_tone() {
        let settings = SpectrogramSettings {
            fft_size: 256,
            hop_size: 128,
        };
        let spec = Spectrogram::compute(&tone(1000.0, 8000, 2048), &settings).unwrap();
        let frame = 2;
        let loudest = (0..spec.bins())
            .max_by(|&a, &b| {
                spec.get(a, frame)
                    .unwrap()
                    .total_cmp(&spec.get(b, frame).unwrap())
            })
            .unwrap();
        assert!((spec.bin_frequency(loudest) - 1000.0).abs() <= 8000.0 / 256.0);
    }

    #[test]
    fn test_short_and_silent_input() {
        let spec = Spectrogram::compute(&AudioBuffer::empty(8000), &SpectrogramSettings::default())
            .unwrap();
        assert_eq!(spec.frames(), 1);
        assert_eq!(spec.get(0, 0), Some(MIN_DB));
    }

    #[test]
    fn test_invalid_settings() {
        let settings = SpectrogramSettings {
            fft_size: 256,
            hop_size: 0,
        };
        assert!(Spectrogram::compute(&tone(100.0, 8000, 10), &settings).is_err());
    }

    #[test]
    fn test_csv_output() {
        let spec = Spectrogram::compute(&tone(500.0, 8000, 300), &SpectrogramSettings::default())
            .unwrap();
        let mut out = Vec::new();
        spec.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), spec.bins() + 1);
        assert!(text.starts_with("hz,"));
    }
}
