//! Error types for pietts

use std::io;
use thiserror::Error;

/// Main error type for pietts
#[derive(Error, Debug)]
pub enum PieError {
    /// Unknown phonology variant, malformed rule definition, rejected
    /// option combination or an unusable configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A segment could not be rendered (nothing renderable, unsupported
    /// sample rate conversion).
    #[error("Synthesis error in segment {segment}: {message}")]
    Synthesis { segment: usize, message: String },

    /// The synthesis backend itself failed (process, decoding, transport).
    #[error("Synthesis backend error in segment {segment}: {message}")]
    SynthesisBackend { segment: usize, message: String },

    /// The lexical source could not supply a word.
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for pietts operations
pub type Result<T> = std::result::Result<T, PieError>;

impl PieError {
    /// Synthesis error for a segment whose index is not yet known
    pub fn synthesis(message: impl Into<String>) -> Self {
        PieError::Synthesis {
            segment: 0,
            message: message.into(),
        }
    }

    /// Backend error for a segment whose index is not yet known
    pub fn backend(message: impl Into<String>) -> Self {
        PieError::SynthesisBackend {
            segment: 0,
            message: message.into(),
        }
    }

    /// Stamp the failing segment index onto a synthesis-level error.
    ///
    /// Backends don't know where in the utterance they are, the
    /// orchestrator does. Other variants pass through untouched.
    pub fn at_segment(self, index: usize) -> Self {
        match self {
            PieError::Synthesis { message, .. } => PieError::Synthesis {
                segment: index,
                message,
            },
            PieError::SynthesisBackend { message, .. } => PieError::SynthesisBackend {
                segment: index,
                message,
            },
            other => other,
        }
    }

    /// Index of the failing segment for synthesis-level errors
    pub fn segment(&self) -> Option<usize> {
        match self {
            PieError::Synthesis { segment, .. } | PieError::SynthesisBackend { segment, .. } => {
                Some(*segment)
            }
            _ => None,
        }
    }
}

impl From<String> for PieError {
    fn from(s: String) -> Self {
        PieError::Other(s)
    }
}

impl From<&str> for PieError {
    fn from(s: &str) -> Self {
        PieError::Other(s.to_string())
    }
}
