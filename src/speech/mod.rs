//! Speech synthesis system

pub mod audio;
pub mod backends;
pub mod orchestrator;
pub mod spectrogram;
pub mod synth;

pub use audio::AudioBuffer;
pub use orchestrator::{synthesize, OrchestratorSettings, Rendering};
pub use spectrogram::{Spectrogram, SpectrogramSettings};
pub use synth::{create_backend, SynthBackend};
