//! Speech synthesizer abstraction
//!
//! A backend turns the phonemes of one segment into audio. The orchestrator
//! only ever talks to this trait, so backends can be swapped (or mocked)
//! freely.

use super::audio::AudioBuffer;
use super::backends::espeak::EspeakSynth;
use super::backends::formant::FormantSynth;
use crate::state::config::Config;
use crate::{PieError, Result};
use log::info;

/// Speech synthesizer trait
///
/// Implementations must be shareable across threads; segments may be
/// rendered concurrently.
pub trait SynthBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Render one segment's phonemes.
    ///
    /// Fails with `PieError::SynthesisBackend` when the backend itself
    /// breaks, or `PieError::Synthesis` when none of the phonemes can be
    /// rendered. The segment index in the error is filled in by the caller.
    fn render(&self, phonemes: &[String]) -> Result<AudioBuffer>;
}

/// Create the backend named in the configuration
///
/// **formant**: built-in formant synthesizer, always available.
///
/// **espeak**: espeak-ng subprocess. Falls back to the formant
/// synthesizer when espeak-ng isn't installed.
pub fn create_backend(config: &Config) -> Result<Box<dyn SynthBackend>> {
    let sample_rate = config.sample_rate();
    let pitch = config.pitch_hz();

    match config.backend_name().as_str() {
        "formant" => {
            info!("Using built-in formant synthesizer at {} Hz", sample_rate);
            Ok(Box::new(FormantSynth::new(sample_rate, pitch)))
        }
        "espeak" => {
            info!("Trying espeak-ng backend...");
            match EspeakSynth::new(&config.espeak_voice()) {
                Ok(synth) => {
                    info!("✓ Successfully initialized espeak-ng backend");
                    Ok(Box::new(synth))
                }
                Err(e) => {
                    info!("✗ espeak-ng backend unavailable: {}", e);
                    info!("Falling back to built-in formant synthesizer");
                    Ok(Box::new(FormantSynth::new(sample_rate, pitch)))
                }
            }
        }
        other => Err(PieError::Config(format!(
            "Unknown speech backend '{}' (expected 'formant' or 'espeak')",
            other
        ))),
    }
}
