//! Orthography to phoneme transcription
//!
//! Scans text left to right, applying the longest matching rule of the
//! active [`RuleTable`] at each position. Punctuation becomes pause tokens,
//! whitespace only separates words, and anything else the table doesn't
//! know is reported as an [`UnknownSymbol`] and skipped.

pub mod segment;

pub use segment::{flatten_with_pauses, segment, Segment};

use crate::phonology::RuleTable;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Strength of a prosodic break
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseKind {
    /// Comma-like break
    Minor,
    /// Sentence-like break
    Major,
}

/// One unit of transcription output
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhoneToken {
    Phoneme(String),
    Pause(PauseKind),
}

impl PhoneToken {
    pub fn phoneme(symbol: &str) -> Self {
        PhoneToken::Phoneme(symbol.to_string())
    }
}

impl fmt::Display for PhoneToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoneToken::Phoneme(symbol) => write!(f, "{}", symbol),
            PhoneToken::Pause(PauseKind::Minor) => write!(f, "|"),
            PhoneToken::Pause(PauseKind::Major) => write!(f, "‖"),
        }
    }
}

/// A character no rule, punctuation mark or separator accounts for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownSymbol {
    pub symbol: char,
    /// Character index into the lowercased, NFC-normalized input
    pub offset: usize,
}

impl fmt::Display for UnknownSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown symbol '{}' (U+{:04X}) at {}",
            self.symbol, self.symbol as u32, self.offset
        )
    }
}

/// Tokens plus the diagnostics collected while producing them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub tokens: Vec<PhoneToken>,
    pub diagnostics: Vec<UnknownSymbol>,
}

impl Transcription {
    /// Space separated phonemes with `|` / `‖` for pauses
    pub fn to_phonetic_string(&self) -> String {
        self.tokens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Phoneme symbols in order, pauses left out
    pub fn phonemes(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                PhoneToken::Phoneme(p) => Some(p.as_str()),
                PhoneToken::Pause(_) => None,
            })
            .collect()
    }

    pub fn phoneme_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| matches!(t, PhoneToken::Phoneme(_)))
            .count()
    }
}

/// Transcribe `text` with `table`.
///
/// Deterministic: the same text and table always give the same tokens and
/// the same diagnostics in the same order. Matching is case-insensitive and
/// blind to Unicode composition: text is lowercased and brought to NFC
/// first, and diagnostic offsets index that normalized character sequence.
pub fn transcribe(text: &str, table: &RuleTable) -> Transcription {
    let chars: Vec<char> = text.chars().flat_map(char::to_lowercase).nfc().collect();
    let mut out = Transcription::default();

    // Last character of the current word, None at a word boundary
    let mut preceding: Option<char> = None;
    let mut pos = 0;

    while pos < chars.len() {
        if let Some(rule) = table.longest_match(&chars, pos, preceding) {
            out.tokens
                .extend(rule.phonemes.iter().cloned().map(PhoneToken::Phoneme));
            pos += rule.pattern.len();
            preceding = Some(chars[pos - 1]);
            continue;
        }

        let ch = chars[pos];
        if let Some(kind) = table.pause_kind(ch) {
            out.tokens.push(PhoneToken::Pause(kind));
            preceding = None;
        } else if ch.is_whitespace() || table.is_separator(ch) {
            preceding = None;
        } else {
            let unknown = UnknownSymbol {
                symbol: ch,
                offset: pos,
            };
            warn!("Transcription of '{}': {}", text, unknown);
            out.diagnostics.push(unknown);
            preceding = Some(ch);
        }
        pos += 1;
    }

    debug!(
        "Transcribed {} chars into {} tokens with '{}'",
        chars.len(),
        out.tokens.len(),
        table.fingerprint()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::from_json(
            r#"{
                "id": "mini",
                "rules": [
                    { "pattern": "k", "phoneme": "X" },
                    { "pattern": "kʷ", "phoneme": "Y" },
                    { "pattern": "e", "phoneme": "e" },
                    { "pattern": "m̥", "phoneme": "ə m" }
                ],
                "punctuation": { ",": "minor", ".": "major" },
                "separators": ["-"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_input() {
        let t = transcribe("", &table());
        assert!(t.tokens.is_empty());
        assert!(t.diagnostics.is_empty());
    }

    #[test]
    fn test_longest_match_over_prefix() {
        let t = transcribe("kʷe", &table());
        assert_eq!(t.tokens, vec![PhoneToken::phoneme("Y"), PhoneToken::phoneme("e")]);
        assert!(t.diagnostics.is_empty());
    }

    #[test]
    fn test_uppercase_folds() {
        let t = transcribe("KE", &table());
        assert_eq!(t.tokens, vec![PhoneToken::phoneme("X"), PhoneToken::phoneme("e")]);
    }

    #[test]
    fn test_only_punctuation() {
        let t = transcribe(", .", &table());
        assert_eq!(
            t.tokens,
            vec![
                PhoneToken::Pause(PauseKind::Minor),
                PhoneToken::Pause(PauseKind::Major)
            ]
        );
    }

    #[test]
    fn test_unknown_symbol_is_recoverable() {
        let t = transcribe("kqe", &table());
        assert_eq!(t.tokens, vec![PhoneToken::phoneme("X"), PhoneToken::phoneme("e")]);
        assert_eq!(t.diagnostics, vec![UnknownSymbol { symbol: 'q', offset: 1 }]);
    }

    #[test]
    fn test_multi_phoneme_target_and_separator() {
        let t = transcribe("  m̥-ke ", &table());
        assert_eq!(t.to_phonetic_string(), "ə m X e");
        assert!(t.diagnostics.is_empty());
    }

    #[test]
    fn test_phonetic_string_marks_pauses() {
        let t = transcribe("ke, ke.", &table());
        assert_eq!(t.to_phonetic_string(), "X e | X e ‖");
        assert_eq!(t.phoneme_count(), 4);
    }
}
