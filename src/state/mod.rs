//! Session state
//!
//! The `Session` ties the pipeline together for one user: it owns the
//! active rule table, the vocabulary cache, the synthesis backend and the
//! word source. Every user action becomes exactly one pipeline run against
//! a declared target. A newer action on the same target supersedes an
//! older one still in flight, and the older result is then discarded
//! without touching the cache.

pub mod cache;
pub mod config;

use crate::lexicon::{StaticLexicon, VocabList, WordSource};
use crate::phonology::{PhonologySelection, Registry, RuleTable};
use crate::samples::SampleId;
use crate::speech::{create_backend, synthesize, OrchestratorSettings, Rendering, SynthBackend};
use crate::transcribe::{segment, transcribe, Transcription};
use crate::{PieError, Result};
use cache::VocabularyCache;
use config::Config;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// A user-triggered request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Draw a new word and speak it
    NewWord(VocabList),
    /// Speak the cached word again
    RepeatWord,
    /// Speak one of the literary samples
    Sample(SampleId),
    /// Speak arbitrary text
    FreeText(String),
}

/// Audio target an action renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Word,
    Sample(SampleId),
    FreeText,
}

impl Action {
    pub fn target(&self) -> Target {
        match self {
            Action::NewWord(_) | Action::RepeatWord => Target::Word,
            Action::Sample(id) => Target::Sample(*id),
            Action::FreeText(_) => Target::FreeText,
        }
    }

    /// Whether pauses split the utterance into segments
    pub fn respects_pauses(&self) -> bool {
        !matches!(self, Action::NewWord(_) | Action::RepeatWord)
    }

    /// Whether the presentation includes a spectrogram
    pub fn wants_spectrogram(&self) -> bool {
        !matches!(self, Action::Sample(_))
    }
}

/// An action that has been started but not yet run
#[derive(Debug, Clone)]
pub struct PendingAction {
    action: Action,
    target: Target,
    generation: u64,
}

impl PendingAction {
    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn target(&self) -> Target {
        self.target
    }
}

/// Result shown to the user
#[derive(Debug, Clone)]
pub struct Presentation {
    pub target: Target,
    /// Text that was spoken
    pub text: String,
    /// Definition of a drawn word
    pub definition: Option<String>,
    pub transcription: Transcription,
    pub rendering: Arc<Rendering>,
    /// Fingerprint of the rule table used
    pub fingerprint: String,
    /// Audio came from the vocabulary cache
    pub from_cache: bool,
}

/// How a pipeline run ended
#[derive(Debug, Clone)]
pub enum Outcome {
    Presented(Presentation),
    /// A newer action on the same target started first; result dropped
    Superseded,
}

impl Outcome {
    pub fn presentation(&self) -> Option<&Presentation> {
        match self {
            Outcome::Presented(p) => Some(p),
            Outcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }
}

/// Per-user pipeline state
pub struct Session {
    registry: Registry,
    selection: RwLock<PhonologySelection>,
    table: RwLock<Arc<RuleTable>>,
    cache: VocabularyCache,
    /// Latest generation started per target
    generations: Mutex<HashMap<Target, u64>>,
    backend: Box<dyn SynthBackend>,
    words: Box<dyn WordSource>,
    settings: OrchestratorSettings,
}

impl Session {
    /// Create a session, loading the initial rule table from `registry`
    pub fn new(
        registry: Registry,
        selection: PhonologySelection,
        backend: Box<dyn SynthBackend>,
        words: Box<dyn WordSource>,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        let table = registry.load(&selection)?;
        info!(
            "Session started with phonology '{}' and backend {}",
            table.fingerprint(),
            backend.name()
        );
        Ok(Self {
            registry,
            selection: RwLock::new(selection),
            table: RwLock::new(Arc::new(table)),
            cache: VocabularyCache::new(),
            generations: Mutex::new(HashMap::new()),
            backend,
            words,
            settings,
        })
    }

    /// Create a session from the user's configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Registry::with_custom_dir(&config.variant_dir())?;
        let backend = create_backend(config)?;
        let words: Box<dyn WordSource> = match config.lexicon_path() {
            Some(path) => Box::new(StaticLexicon::from_json_file(&path)?),
            None => Box::new(StaticLexicon::builtin()?),
        };
        Self::new(
            registry,
            config.phonology_selection(),
            backend,
            words,
            config.orchestrator_settings(),
        )
    }

    /// Rule table currently in use
    pub fn active_table(&self) -> Arc<RuleTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn selection(&self) -> PhonologySelection {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &VocabularyCache {
        &self.cache
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Switch phonology.
    ///
    /// On failure the active table stays as it was. On success the new
    /// table replaces it and cached audio is dropped.
    pub fn select_phonology(&self, selection: PhonologySelection) -> Result<Arc<RuleTable>> {
        let table = Arc::new(self.registry.load(&selection)?);
        let previous = {
            let mut active = self.table.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *active, Arc::clone(&table))
        };
        *self.selection.write().unwrap_or_else(PoisonError::into_inner) = selection;

        if previous.fingerprint() != table.fingerprint() {
            self.cache.invalidate_audio();
        }
        info!("Active phonology is now '{}'", table.fingerprint());
        Ok(table)
    }

    fn generations(&self) -> MutexGuard<'_, HashMap<Target, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start an action, superseding anything in flight for its target
    pub fn begin(&self, action: Action) -> PendingAction {
        let target = action.target();
        let mut generations = self.generations();
        let generation = generations.entry(target).or_insert(0);
        *generation += 1;
        debug!("Begin {:?} as generation {} of {:?}", action, generation, target);
        PendingAction {
            action,
            target,
            generation: *generation,
        }
    }

    /// True while no newer action has started on the same target
    pub fn is_live(&self, pending: &PendingAction) -> bool {
        self.generations().get(&pending.target) == Some(&pending.generation)
    }

    /// Run `commit` only if `pending` is still live, atomically with the check
    fn commit_if_live(&self, pending: &PendingAction, commit: impl FnOnce()) -> bool {
        let generations = self.generations();
        if generations.get(&pending.target) == Some(&pending.generation) {
            commit();
            true
        } else {
            false
        }
    }

    fn superseded(&self, pending: &PendingAction) -> Outcome {
        warn!(
            "Discarding result of {:?}: superseded by a newer action on {:?}",
            pending.action, pending.target
        );
        Outcome::Superseded
    }

    /// Execute a started action.
    ///
    /// Errors are reported only for live actions; a superseded action
    /// always ends in `Outcome::Superseded`.
    pub fn run(&self, pending: PendingAction) -> Result<Outcome> {
        let table = self.active_table();
        let result = match &pending.action {
            Action::NewWord(list) => self.run_new_word(&pending, list, &table),
            Action::RepeatWord => self.run_repeat_word(&pending, &table),
            Action::Sample(id) => {
                let text = id.text().pie.to_string();
                self.render_text(&pending, text, None, &table)
            }
            Action::FreeText(text) => self.render_text(&pending, text.clone(), None, &table),
        };

        match result {
            Ok(Some(presentation)) => {
                if self.is_live(&pending) {
                    Ok(Outcome::Presented(presentation))
                } else {
                    Ok(self.superseded(&pending))
                }
            }
            Ok(None) => Ok(self.superseded(&pending)),
            Err(e) if self.is_live(&pending) => Err(e),
            Err(e) => {
                debug!("Superseded action also failed: {}", e);
                Ok(self.superseded(&pending))
            }
        }
    }

    /// `begin` followed by `run`
    pub fn perform(&self, action: Action) -> Result<Outcome> {
        let pending = self.begin(action);
        self.run(pending)
    }

    /// Fetch a word, cache it, then speak it. `None` when superseded.
    fn run_new_word(
        &self,
        pending: &PendingAction,
        list: &VocabList,
        table: &RuleTable,
    ) -> Result<Option<Presentation>> {
        // a failed fetch leaves the previous word cached
        let entry = self.words.fetch(list)?;
        let headword = entry.headword.clone();
        let definition = entry.definition.clone();
        if !self.commit_if_live(pending, || self.cache.set(entry)) {
            return Ok(None);
        }

        let presentation = match self.render_text(pending, headword, Some(definition), table)? {
            Some(p) => p,
            None => return Ok(None),
        };
        self.store_word_audio(pending, &presentation);
        Ok(Some(presentation))
    }

    /// Speak the cached word, reusing its audio when the table is unchanged
    fn run_repeat_word(
        &self,
        pending: &PendingAction,
        table: &RuleTable,
    ) -> Result<Option<Presentation>> {
        let word = self
            .cache
            .get()
            .ok_or_else(|| PieError::Fetch("No word has been drawn yet".to_string()))?;

        if let Some(rendering) = word.audio_for(table.fingerprint()) {
            debug!("Reusing cached audio for '{}'", word.headword);
            return Ok(Some(Presentation {
                target: pending.target,
                transcription: transcribe(&word.headword, table),
                text: word.headword,
                definition: Some(word.definition),
                rendering,
                fingerprint: table.fingerprint().to_string(),
                from_cache: true,
            }));
        }

        let presentation =
            match self.render_text(pending, word.headword, Some(word.definition), table)? {
                Some(p) => p,
                None => return Ok(None),
            };
        self.store_word_audio(pending, &presentation);
        Ok(Some(presentation))
    }

    fn store_word_audio(&self, pending: &PendingAction, presentation: &Presentation) {
        self.commit_if_live(pending, || {
            self.cache.attach_audio(
                &presentation.text,
                &presentation.fingerprint,
                Arc::clone(&presentation.rendering),
            );
        });
    }

    /// Transcribe, segment and synthesize one text
    fn render_text(
        &self,
        pending: &PendingAction,
        text: String,
        definition: Option<String>,
        table: &RuleTable,
    ) -> Result<Option<Presentation>> {
        let transcription = transcribe(&text, table);
        let segments = segment(&transcription.tokens, pending.action.respects_pauses());
        if !self.is_live(pending) {
            return Ok(None);
        }

        let rendering = synthesize(
            &segments,
            self.backend.as_ref(),
            &self.settings,
            pending.action.wants_spectrogram(),
        )?;

        Ok(Some(Presentation {
            target: pending.target,
            text,
            definition,
            transcription,
            rendering: Arc::new(rendering),
            fingerprint: table.fingerprint().to_string(),
            from_cache: false,
        }))
    }
}
