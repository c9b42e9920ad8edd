//! pietts - Proto-Indo-European text-to-speech
//!
//! Transcribes reconstructed Proto-Indo-European text into phonemes under
//! a selectable phonological reconstruction, then synthesizes speech
//! segment by segment with pauses, optionally with a spectrogram.

pub mod error;
pub mod lexicon;
pub mod phonology;
pub mod samples;
pub mod speech;
pub mod state;
pub mod transcribe;

pub use error::{PieError, Result};
pub use phonology::{PhonologyOptions, PhonologySelection, Registry, RuleTable};
pub use speech::{synthesize, AudioBuffer, OrchestratorSettings, Rendering, Spectrogram, SynthBackend};
pub use state::{Action, Outcome, Session, Target};
pub use transcribe::{segment, transcribe, PauseKind, PhoneToken, Segment, Transcription};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "pietts";
