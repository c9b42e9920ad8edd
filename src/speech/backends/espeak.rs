//! espeak-ng backend
//!
//! Runs espeak-ng once per segment with phoneme input (`[[...]]`) and
//! decodes the WAV it writes to stdout.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::speech::{AudioBuffer, SynthBackend};
use crate::{PieError, Result};
use log::{debug, warn};
use std::io::Cursor;
use std::process::{Command, Stdio};

/// espeak-ng subprocess backend
pub struct EspeakSynth {
    /// Path to espeak-ng
    espeak_path: String,

    /// Voice whose phoneme inventory interprets the mnemonics
    voice: String,
}

impl EspeakSynth {
    /// Create a new espeak-ng synthesizer
    ///
    /// Verifies espeak-ng is available
    pub fn new(voice: &str) -> Result<Self> {
        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            espeak_path,
            voice: voice.to_string(),
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        for path in ["espeak-ng", "/usr/bin/espeak-ng"] {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(PieError::backend(
            "espeak-ng not found. Install with: sudo apt install espeak-ng",
        ))
    }

    /// Spell a segment in espeak's phoneme mnemonics
    fn to_mnemonics(phonemes: &[String]) -> String {
        phonemes
            .iter()
            .map(|p| p.chars().filter_map(mnemonic).collect::<String>())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// espeak-ng mnemonic for one IPA character. Unmappable marks are dropped.
fn mnemonic(ch: char) -> Option<&'static str> {
    let m = match ch {
        'a' => "a",
        'e' => "e",
        'i' => "i",
        'o' => "o",
        'u' => "u",
        'ə' => "@",
        'ː' => ":",
        'p' => "p",
        'b' => "b",
        't' => "t",
        'd' => "d",
        'k' => "k",
        'g' | 'ɡ' => "g",
        'c' => "c",
        'ɟ' => "J",
        'm' => "m",
        'n' => "n",
        'r' => "r",
        'l' => "l",
        'j' => "j",
        'w' => "w",
        's' => "s",
        'z' => "z",
        'h' | 'ʰ' | 'ʱ' => "h",
        'χ' => "x",
        'ɣ' => "Q",
        'ʔ' => "?",
        'ʷ' => "w",
        'ʲ' => "j",
        // ejectives: closure plus a glottal stop
        'ʼ' => "?",
        // syllabic mark
        '\u{329}' => ",",
        _ => {
            warn!("No espeak-ng mnemonic for '{}'", ch);
            return None;
        }
    };
    Some(m)
}

impl SynthBackend for EspeakSynth {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn render(&self, phonemes: &[String]) -> Result<AudioBuffer> {
        let spelled = Self::to_mnemonics(phonemes);
        if spelled.is_empty() {
            return Err(PieError::synthesis(format!(
                "No renderable phonemes in [{}]",
                phonemes.join(" ")
            )));
        }
        debug!("espeak-ng phonemes: [[{}]]", spelled);

        let output = Command::new(&self.espeak_path)
            .arg("-v")
            .arg(&self.voice)
            .arg("--stdout")
            .arg(format!("[[{}]]", spelled))
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| PieError::backend(format!("Failed to start espeak-ng: {}", e)))?;

        if !output.status.success() {
            return Err(PieError::backend(format!(
                "espeak-ng exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // espeak-ng streams with an open-ended data chunk length
        AudioBuffer::from_wav(Cursor::new(output.stdout), true)
            .map_err(|e| PieError::backend(format!("Unreadable espeak-ng output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        let phonemes: Vec<String> = ["kʷ", "e", "χ", "m̩", "oː"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(EspeakSynth::to_mnemonics(&phonemes), "kwexm,o:");
    }

    #[test]
    fn test_glottalic_ejectives_spelled() {
        let phonemes: Vec<String> = ["tʼ", "e", "kʷʼ"].iter().map(|s| s.to_string()).collect();
        assert_eq!(EspeakSynth::to_mnemonics(&phonemes), "t?ekw?");
    }

    #[test]
    fn test_every_builtin_phoneme_has_a_mnemonic() {
        use crate::phonology::{PhonologyOptions, PhonologySelection, Registry};

        let registry = Registry::builtin();
        let palatal = PhonologyOptions {
            palatals: true,
            ..PhonologyOptions::default()
        };
        let selections = [
            PhonologySelection::new("standard"),
            PhonologySelection::new("glottalic"),
            PhonologySelection::new("centum"),
            PhonologySelection::with_options("standard", palatal),
        ];
        for selection in selections {
            let table = registry.load(&selection).unwrap();
            for rule in table.rules() {
                for ch in rule.phonemes.iter().flat_map(|p| p.chars()) {
                    assert!(
                        mnemonic(ch).is_some(),
                        "'{}' in {} has no mnemonic",
                        ch,
                        table.id()
                    );
                }
            }
        }
    }

    #[test]
    fn test_create_espeak_synth() {
        // May fail where espeak-ng isn't installed
        match EspeakSynth::new("en") {
            Ok(synth) => assert_eq!(synth.name(), "espeak-ng"),
            Err(e) => println!("⚠ espeak-ng unavailable (may be expected): {}", e),
        }
    }
}
