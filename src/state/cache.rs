//! Vocabulary cache
//!
//! Remembers the last drawn word so it can be repeated without another
//! fetch, along with the audio rendered for it under a specific rule table.

use crate::lexicon::LexicalEntry;
use crate::speech::Rendering;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Audio rendered for the cached word
#[derive(Debug, Clone)]
pub struct CachedAudio {
    /// Fingerprint of the rule table the audio was rendered with
    pub fingerprint: String,
    pub rendering: Arc<Rendering>,
}

/// The last drawn word
#[derive(Debug, Clone)]
pub struct CachedWord {
    pub headword: String,
    pub definition: String,
    pub list: String,
    pub audio: Option<CachedAudio>,
}

impl CachedWord {
    /// Audio for this word, if it was rendered under `fingerprint`
    pub fn audio_for(&self, fingerprint: &str) -> Option<Arc<Rendering>> {
        self.audio
            .as_ref()
            .filter(|a| a.fingerprint == fingerprint)
            .map(|a| Arc::clone(&a.rendering))
    }
}

impl From<LexicalEntry> for CachedWord {
    fn from(entry: LexicalEntry) -> Self {
        Self {
            headword: entry.headword,
            definition: entry.definition,
            list: entry.list,
            audio: None,
        }
    }
}

/// Single-slot cache shared between concurrent actions
#[derive(Debug, Default)]
pub struct VocabularyCache {
    slot: Mutex<Option<CachedWord>>,
}

impl VocabularyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedWord>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the cached word; any audio for the previous word is dropped
    pub fn set(&self, entry: LexicalEntry) {
        debug!("Caching word '{}' from {}", entry.headword, entry.list);
        *self.lock() = Some(CachedWord::from(entry));
    }

    /// Snapshot of the cached word
    pub fn get(&self) -> Option<CachedWord> {
        self.lock().clone()
    }

    /// Store rendered audio, only if `headword` is still the cached word
    pub fn attach_audio(&self, headword: &str, fingerprint: &str, rendering: Arc<Rendering>) -> bool {
        let mut slot = self.lock();
        match slot.as_mut() {
            Some(word) if word.headword == headword => {
                word.audio = Some(CachedAudio {
                    fingerprint: fingerprint.to_string(),
                    rendering,
                });
                true
            }
            _ => false,
        }
    }

    /// Forget rendered audio, keeping the word itself
    pub fn invalidate_audio(&self) {
        if let Some(word) = self.lock().as_mut() {
            if word.audio.take().is_some() {
                debug!("Dropped cached audio for '{}'", word.headword);
            }
        }
    }
}
