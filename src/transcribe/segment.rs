//! Splitting transcriptions into utterance segments
//!
//! Each segment is synthesized as one unit. Pauses are boundaries between
//! segments, never members of one.

use super::{PauseKind, PhoneToken};

/// A run of phonemes between pauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub phonemes: Vec<String>,
    /// Pause ending this segment; `None` for the last one
    pub terminator: Option<PauseKind>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.phonemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phonemes.is_empty()
    }
}

/// Cut a token stream into segments.
///
/// With `respect_pauses` false everything becomes a single segment and
/// pauses are dropped. Otherwise every pause is a boundary; consecutive
/// pauses collapse into one boundary of the strongest kind, and no empty
/// segment is ever produced.
pub fn segment(tokens: &[PhoneToken], respect_pauses: bool) -> Vec<Segment> {
    if !respect_pauses {
        let phonemes: Vec<String> = tokens
            .iter()
            .filter_map(|t| match t {
                PhoneToken::Phoneme(p) => Some(p.clone()),
                PhoneToken::Pause(_) => None,
            })
            .collect();
        if phonemes.is_empty() {
            return Vec::new();
        }
        return vec![Segment {
            phonemes,
            terminator: None,
        }];
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut current = Vec::new();

    for token in tokens {
        match token {
            PhoneToken::Phoneme(p) => current.push(p.clone()),
            PhoneToken::Pause(kind) => {
                if !current.is_empty() {
                    segments.push(Segment {
                        phonemes: std::mem::take(&mut current),
                        terminator: Some(*kind),
                    });
                } else if let Some(last) = segments.last_mut() {
                    // Pause right after a pause: widen the existing boundary
                    last.terminator = last.terminator.max(Some(*kind));
                }
            }
        }
    }

    if !current.is_empty() {
        segments.push(Segment {
            phonemes: current,
            terminator: None,
        });
    } else if let Some(last) = segments.last_mut() {
        last.terminator = None;
    }

    segments
}

/// Rebuild a token stream from segments, one pause per boundary
pub fn flatten_with_pauses(segments: &[Segment]) -> Vec<PhoneToken> {
    let mut tokens = Vec::new();
    for seg in segments {
        tokens.extend(seg.phonemes.iter().cloned().map(PhoneToken::Phoneme));
        if let Some(kind) = seg.terminator {
            tokens.push(PhoneToken::Pause(kind));
        }
    }
    tokens
}
