//! Segment-by-segment synthesis
//!
//! Renders every segment through the backend, joins the pieces with
//! silences sized by the pause that separated them, and optionally
//! computes a spectrogram of the finished utterance.

use super::audio::AudioBuffer;
use super::spectrogram::{Spectrogram, SpectrogramSettings};
use super::synth::SynthBackend;
use crate::transcribe::{PauseKind, Segment};
use crate::{PieError, Result};
use log::{debug, info};
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

/// How segments are joined and rendered
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Gap inserted at comma-like boundaries
    pub minor_pause: Duration,
    /// Gap inserted at sentence-like boundaries
    pub major_pause: Duration,
    /// Render segments on parallel threads
    pub concurrent: bool,
    /// Rate of the output when there is nothing to render
    pub sample_rate: u32,
    pub spectrogram: SpectrogramSettings,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            minor_pause: Duration::from_millis(250),
            major_pause: Duration::from_millis(600),
            concurrent: false,
            sample_rate: 22_050,
            spectrogram: SpectrogramSettings::default(),
        }
    }
}

impl OrchestratorSettings {
    /// Silence to insert after a segment ending with `terminator`
    pub fn gap_after(&self, terminator: Option<PauseKind>) -> Duration {
        match terminator {
            Some(PauseKind::Minor) => self.minor_pause,
            Some(PauseKind::Major) => self.major_pause,
            None => Duration::ZERO,
        }
    }
}

/// Finished audio for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct Rendering {
    pub audio: AudioBuffer,
    pub spectrogram: Option<Spectrogram>,
    pub segment_count: usize,
}

/// Render segments in order and join them.
///
/// Any segment failure aborts the whole request; the error carries the
/// index of the first failing segment and no partial audio is returned.
/// The spectrogram, when requested, is computed over the joined buffer so
/// it includes the inserted silences.
pub fn synthesize(
    segments: &[Segment],
    backend: &dyn SynthBackend,
    settings: &OrchestratorSettings,
    want_spectrogram: bool,
) -> Result<Rendering> {
    debug!(
        "Synthesizing {} segments with {} ({})",
        segments.len(),
        backend.name(),
        if settings.concurrent { "concurrent" } else { "sequential" }
    );

    let pieces = if settings.concurrent && segments.len() > 1 {
        render_concurrent(segments, backend)?
    } else {
        render_sequential(segments, backend)?
    };

    let mut audio: Option<AudioBuffer> = None;
    for (index, (segment, piece)) in segments.iter().zip(pieces).enumerate() {
        let joined = match audio.as_mut() {
            None => audio.insert(piece),
            Some(joined) => {
                let piece = if piece.sample_rate() != joined.sample_rate() {
                    debug!(
                        "Segment {} arrived at {} Hz, resampling to {} Hz",
                        index,
                        piece.sample_rate(),
                        joined.sample_rate()
                    );
                    piece
                        .resampled(joined.sample_rate())
                        .map_err(|e| e.at_segment(index))?
                } else {
                    piece
                };
                joined.append(&piece).map_err(|e| e.at_segment(index))?;
                joined
            }
        };
        if index + 1 < segments.len() {
            joined.push_silence(settings.gap_after(segment.terminator));
        }
    }

    let audio = audio.unwrap_or_else(|| AudioBuffer::empty(settings.sample_rate));
    let spectrogram = if want_spectrogram {
        Some(Spectrogram::compute(&audio, &settings.spectrogram)?)
    } else {
        None
    };

    info!(
        "Synthesized {} segments into {:.2}s of audio",
        segments.len(),
        audio.duration().as_secs_f64()
    );
    Ok(Rendering {
        audio,
        spectrogram,
        segment_count: segments.len(),
    })
}

fn render_sequential(segments: &[Segment], backend: &dyn SynthBackend) -> Result<Vec<AudioBuffer>> {
    segments
        .iter()
        .enumerate()
        .map(|(index, seg)| backend.render(&seg.phonemes).map_err(|e| e.at_segment(index)))
        .collect()
}

/// Render segments on at most one scoped thread per available core
fn render_concurrent(segments: &[Segment], backend: &dyn SynthBackend) -> Result<Vec<AudioBuffer>> {
    let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    render_in_chunks(segments, backend, workers)
}

/// Split segments into contiguous runs, one run per worker thread.
///
/// Each worker stops at its first failure, so walking the runs in order
/// yields the lowest failing index.
fn render_in_chunks(
    segments: &[Segment],
    backend: &dyn SynthBackend,
    workers: usize,
) -> Result<Vec<AudioBuffer>> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }
    let chunk_len = segments.len().div_ceil(workers.max(1));
    debug!(
        "Rendering {} segments on {} threads",
        segments.len(),
        segments.len().div_ceil(chunk_len)
    );

    let runs: Vec<Result<Vec<AudioBuffer>>> = thread::scope(|scope| {
        let handles: Vec<_> = segments
            .chunks(chunk_len)
            .enumerate()
            .map(|(chunk, run)| {
                let first = chunk * chunk_len;
                scope.spawn(move || {
                    run.iter()
                        .enumerate()
                        .map(|(i, seg)| {
                            backend
                                .render(&seg.phonemes)
                                .map_err(|e| e.at_segment(first + i))
                        })
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(chunk, h)| {
                h.join().unwrap_or_else(|_| {
                    Err(PieError::backend("Synthesis thread panicked").at_segment(chunk * chunk_len))
                })
            })
            .collect()
    });

    let mut pieces = Vec::with_capacity(segments.len());
    for run in runs {
        pieces.extend(run?);
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PieError;

    /// Renders 10 samples per phoneme at a fixed rate
    struct Counter {
        rate: u32,
    }

    impl SynthBackend for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn render(&self, phonemes: &[String]) -> Result<AudioBuffer> {
            Ok(AudioBuffer::new(vec![0.5; phonemes.len() * 10], self.rate))
        }
    }

    fn seg(phonemes: &[&str], terminator: Option<PauseKind>) -> Segment {
        Segment {
            phonemes: phonemes.iter().map(|s| s.to_string()).collect(),
            terminator,
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            minor_pause: Duration::from_millis(10),
            major_pause: Duration::from_millis(30),
            concurrent: false,
            sample_rate: 1_000,
            spectrogram: SpectrogramSettings {
                fft_size: 16,
                hop_size: 8,
            },
        }
    }

    #[test]
    fn test_gaps_follow_pause_kind() {
        let segments = [
            seg(&["a"], Some(PauseKind::Minor)),
            seg(&["b", "c"], Some(PauseKind::Major)),
            seg(&["d"], None),
        ];
        let r = synthesize(&segments, &Counter { rate: 1_000 }, &settings(), false).unwrap();
        // 10 + 10 silence + 20 + 30 silence + 10
        assert_eq!(r.audio.len(), 80);
        assert_eq!(r.audio.samples()[10..20], [0.0; 10]);
        assert!(r.spectrogram.is_none());
        assert_eq!(r.segment_count, 3);
    }

    #[test]
    fn test_no_trailing_gap() {
        let segments = [seg(&["a"], Some(PauseKind::Major))];
        let r = synthesize(&segments, &Counter { rate: 1_000 }, &settings(), false).unwrap();
        assert_eq!(r.audio.len(), 10);
    }

    #[test]
    fn test_empty_input_gives_empty_audio() {
        let r = synthesize(&[], &Counter { rate: 1_000 }, &settings(), true).unwrap();
        assert!(r.audio.is_empty());
        assert_eq!(r.audio.sample_rate(), 1_000);
        assert!(r.spectrogram.is_some());
    }

    #[test]
    fn test_spectrogram_covers_whole_utterance() {
        let segments = [seg(&["a"], Some(PauseKind::Major)), seg(&["b"], None)];
        let r = synthesize(&segments, &Counter { rate: 1_000 }, &settings(), true).unwrap();
        let spec = r.spectrogram.unwrap();
        // 50 samples: 1 + ceil((50 - 16) / 8)
        assert_eq!(spec.frames(), 6);
    }

    struct FailOn(usize);

    impl SynthBackend for FailOn {
        fn name(&self) -> &str {
            "fail"
        }

        fn render(&self, phonemes: &[String]) -> Result<AudioBuffer> {
            if phonemes[0] == self.0.to_string() {
                return Err(PieError::backend("boom"));
            }
            Ok(AudioBuffer::new(vec![0.1; 5], 1_000))
        }
    }

    #[test]
    fn test_failure_reports_segment_index() {
        let segments = [
            seg(&["0"], Some(PauseKind::Minor)),
            seg(&["1"], Some(PauseKind::Minor)),
            seg(&["2"], None),
        ];
        for concurrent in [false, true] {
            let mut s = settings();
            s.concurrent = concurrent;
            let err = synthesize(&segments, &FailOn(1), &s, false).unwrap_err();
            assert!(matches!(err, PieError::SynthesisBackend { segment: 1, .. }));
        }
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let segments = [
            seg(&["a", "b"], Some(PauseKind::Minor)),
            seg(&["c"], Some(PauseKind::Major)),
            seg(&["d", "e", "f"], None),
        ];
        let sequential = synthesize(&segments, &Counter { rate: 1_000 }, &settings(), true).unwrap();
        let mut s = settings();
        s.concurrent = true;
        let concurrent = synthesize(&segments, &Counter { rate: 1_000 }, &s, true).unwrap();
        assert_eq!(sequential, concurrent);
    }

    /// Records how many renders overlap
    #[derive(Default)]
    struct Overlap {
        active: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    impl SynthBackend for Overlap {
        fn name(&self) -> &str {
            "overlap"
        }

        fn render(&self, phonemes: &[String]) -> Result<AudioBuffer> {
            use std::sync::atomic::Ordering;
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(AudioBuffer::new(vec![0.5; phonemes.len()], 1_000))
        }
    }

    #[test]
    fn test_worker_threads_are_capped() {
        let segments: Vec<Segment> = (1..=9)
            .map(|n| Segment {
                phonemes: vec!["x".to_string(); n],
                terminator: Some(PauseKind::Minor),
            })
            .collect();
        let backend = Overlap::default();
        let pieces = render_in_chunks(&segments, &backend, 2).unwrap();

        assert!(backend.peak.load(std::sync::atomic::Ordering::SeqCst) <= 2);
        let lengths: Vec<usize> = pieces.iter().map(|p| p.len()).collect();
        assert_eq!(lengths, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_chunked_failure_keeps_utterance_index() {
        let segments: Vec<Segment> = (0..7).map(|n| seg(&[n.to_string().as_str()], None)).collect();
        for workers in [1, 2, 3, 7, 16] {
            let err = render_in_chunks(&segments, &FailOn(5), workers).unwrap_err();
            assert_eq!(err.segment(), Some(5), "{} workers", workers);
        }
    }
}
