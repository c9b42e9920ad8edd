//! Speech synthesis backends

// Built-in formant synthesizer, always available
pub mod formant;

// espeak-ng subprocess backend
pub mod espeak;
