//! Integration tests for speech synthesis
//!
//! These tests drive the orchestrator with the built-in formant backend
//! and with mock backends that fail or change sample rate.

use pietts::speech::backends::formant::FormantSynth;
use pietts::speech::{OrchestratorSettings, SpectrogramSettings};
use pietts::transcribe::Segment;
use pietts::{segment, synthesize, transcribe, AudioBuffer, PauseKind, PieError, RuleTable, SynthBackend};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;

fn settings(rate: u32) -> OrchestratorSettings {
    OrchestratorSettings {
        minor_pause: Duration::from_millis(200),
        major_pause: Duration::from_millis(500),
        concurrent: false,
        sample_rate: rate,
        spectrogram: SpectrogramSettings {
            fft_size: 256,
            hop_size: 64,
        },
    }
}

fn segments_for(text: &str) -> Vec<Segment> {
    let table = RuleTable::load("standard").unwrap();
    segment(&transcribe(text, &table).tokens, true)
}

#[test]
fn test_duration_is_segments_plus_gaps() {
    let synth = FormantSynth::new(16_000, 120.0);
    let segments = segments_for("óynos, dwóh₁. tréyes");
    assert_eq!(segments.len(), 3);

    let pieces: usize = segments
        .iter()
        .map(|s| synth.render(&s.phonemes).unwrap().len())
        .sum();
    // 200 ms + 500 ms at 16 kHz
    let gaps = 3_200 + 8_000;

    let rendering = synthesize(&segments, &synth, &settings(16_000), false).unwrap();
    assert_eq!(rendering.audio.len(), pieces + gaps);
    assert_eq!(rendering.segment_count, 3);
    assert!(rendering.spectrogram.is_none());
}

#[test]
fn test_concurrent_rendering_matches_sequential() {
    let synth = FormantSynth::new(16_000, 120.0);
    let segments = segments_for("óynos, dwóh₁, tréyes, kʷetwóres, pénkʷe");
    let sequential = synthesize(&segments, &synth, &settings(16_000), true).unwrap();

    let mut concurrent_settings = settings(16_000);
    concurrent_settings.concurrent = true;
    let concurrent = synthesize(&segments, &synth, &concurrent_settings, true).unwrap();
    assert_eq!(sequential, concurrent);
}

/// Fails on one segment index, counting calls
struct FailingBackend {
    fail_at: usize,
    calls: AtomicUsize,
}

impl SynthBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn render(&self, phonemes: &[String]) -> pietts::Result<AudioBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if phonemes.first().map(String::as_str) == Some(self.fail_at.to_string().as_str()) {
            return Err(PieError::backend("connection reset"));
        }
        Ok(AudioBuffer::new(vec![0.25; 100], 8_000))
    }
}

fn numbered_segments(n: usize) -> Vec<Segment> {
    (0..n)
        .map(|i| Segment {
            phonemes: vec![i.to_string()],
            terminator: (i + 1 < n).then_some(PauseKind::Minor),
        })
        .collect()
}

#[test]
fn test_backend_failure_names_segment() {
    let backend = FailingBackend {
        fail_at: 1,
        calls: AtomicUsize::new(0),
    };
    let result = synthesize(&numbered_segments(3), &backend, &settings(8_000), true);
    match result {
        Err(PieError::SynthesisBackend { segment, message }) => {
            assert_eq!(segment, 1);
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected backend error, got {:?}", other.map(|r| r.audio.len())),
    }
    // sequential rendering stops at the failure
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_first_failure_wins_when_concurrent() {
    struct FailsFromOne;
    impl SynthBackend for FailsFromOne {
        fn name(&self) -> &str {
            "fails-from-one"
        }
        fn render(&self, phonemes: &[String]) -> pietts::Result<AudioBuffer> {
            if phonemes[0] == "0" {
                Ok(AudioBuffer::new(vec![0.1; 10], 8_000))
            } else {
                Err(PieError::synthesis(format!("cannot say {}", phonemes[0])))
            }
        }
    }

    let mut s = settings(8_000);
    s.concurrent = true;
    let err = synthesize(&numbered_segments(4), &FailsFromOne, &s, false).unwrap_err();
    assert_eq!(err.segment(), Some(1));
    assert!(matches!(err, PieError::Synthesis { .. }));
}

/// Alternates between two sample rates
struct MixedRates {
    calls: AtomicUsize,
}

impl SynthBackend for MixedRates {
    fn name(&self) -> &str {
        "mixed"
    }

    fn render(&self, _phonemes: &[String]) -> pietts::Result<AudioBuffer> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            Ok(AudioBuffer::new(vec![0.2; 1_600], 16_000))
        } else {
            Ok(AudioBuffer::new(vec![0.2; 2_205], 22_050))
        }
    }
}

#[test]
fn test_mismatched_rates_are_resampled() {
    let backend = MixedRates {
        calls: AtomicUsize::new(0),
    };
    let segments = numbered_segments(2);
    let rendering = synthesize(&segments, &backend, &settings(8_000), false).unwrap();

    // first segment fixes the rate; 100 ms + 200 ms gap + 100 ms
    assert_eq!(rendering.audio.sample_rate(), 16_000);
    assert_eq!(rendering.audio.len(), 1_600 + 3_200 + 1_600);
}

#[test]
fn test_spectrogram_of_whole_utterance() {
    let synth = FormantSynth::new(16_000, 120.0);
    let segments = segments_for("óynos. dwóh₁");
    let rendering = synthesize(&segments, &synth, &settings(16_000), true).unwrap();

    let spectrogram = rendering.spectrogram.as_ref().unwrap();
    assert_eq!(spectrogram.bins(), 129);
    let len = rendering.audio.len();
    assert_eq!(spectrogram.frames(), 1 + (len - 256).div_ceil(64));

    // frames inside the inserted silence are at the floor
    let first = synth.render(&segments[0].phonemes).unwrap().len();
    let quiet_frame = (first + 4_000) / 64;
    let loudest = (0..spectrogram.bins())
        .filter_map(|b| spectrogram.get(b, quiet_frame))
        .fold(f32::MIN, f32::max);
    assert!(loudest < -100.0, "silence frame peaked at {} dB", loudest);
}

#[test]
fn test_wav_round_trip() {
    let synth = FormantSynth::new(22_050, 110.0);
    let rendering = synthesize(&segments_for("h₂ówis"), &synth, &settings(22_050), false).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("owis.wav");
    rendering.audio.write_wav(&path).unwrap();

    let back = AudioBuffer::read_wav(&path).unwrap();
    assert_eq!(back.sample_rate(), 22_050);
    assert_eq!(back.len(), rendering.audio.len());
    let max_err = back
        .samples()
        .iter()
        .zip(rendering.audio.samples())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_err < 1e-3);
}

#[test]
fn test_empty_text_renders_nothing() {
    let synth = FormantSynth::new(16_000, 120.0);
    let rendering = synthesize(&segments_for(" , . "), &synth, &settings(16_000), false).unwrap();
    assert!(rendering.audio.is_empty());
    assert_eq!(rendering.segment_count, 0);
}
