//! Lexical sources
//!
//! A `WordSource` supplies random headwords with their definitions, either
//! from any list or from a named vocabulary list. The built-in
//! `StaticLexicon` draws from bundled word lists; other sources (a remote
//! dictionary, a test double) plug in behind the same trait.

use crate::{PieError, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

/// Names of the bundled vocabulary lists
pub const VOCAB_LISTS: [&str; 15] = [
    "adjectives",
    "adverbs",
    "anatomy",
    "animals",
    "colors",
    "food",
    "kinship",
    "nature",
    "numerals",
    "pronouns",
    "religion",
    "society",
    "time",
    "tools",
    "verbs",
];

static BUILTIN_WORDS: &str = include_str!("words.json");

/// Parsed bundled lists, shared by every `StaticLexicon::builtin()`
static BUILTIN_LISTS: Lazy<std::result::Result<WordLists, String>> =
    Lazy::new(|| parse_lists(BUILTIN_WORDS).map_err(|e| e.to_string()));

type WordLists = BTreeMap<String, Vec<WordRecord>>;

#[derive(Debug, Clone, Deserialize)]
struct WordRecord {
    headword: String,
    definition: String,
}

/// A drawn word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalEntry {
    pub headword: String,
    pub definition: String,
    /// List the word came from
    pub list: String,
}

/// Where to draw the next word from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VocabList {
    #[default]
    Any,
    Named(String),
}

impl VocabList {
    pub fn named(name: impl Into<String>) -> Self {
        VocabList::Named(name.into())
    }
}

impl fmt::Display for VocabList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabList::Any => f.write_str("any"),
            VocabList::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for VocabList {
    type Err = PieError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        if s.is_empty() || s == "any" {
            Ok(VocabList::Any)
        } else {
            Ok(VocabList::Named(s))
        }
    }
}

/// Supplier of random words
pub trait WordSource: Send + Sync {
    /// Draw one word, failing with `PieError::Fetch` when none is available
    fn fetch(&self, list: &VocabList) -> Result<LexicalEntry>;
}

/// Word lists held in memory
pub struct StaticLexicon {
    lists: WordLists,
    rng: Mutex<StdRng>,
}

impl StaticLexicon {
    /// The bundled lists
    pub fn builtin() -> Result<Self> {
        let lists = BUILTIN_LISTS
            .as_ref()
            .map_err(|e| PieError::Config(format!("Bundled word lists are malformed: {}", e)))?;
        Ok(Self::from_lists(lists.clone()))
    }

    /// Lists from a JSON object of `{ list: [{headword, definition}] }`
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::from_lists(parse_lists(json)?))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        debug!("Loading word lists from {:?}", path);
        let json = std::fs::read_to_string(path)?;
        let lexicon = Self::from_json_str(&json)?;
        info!(
            "Loaded {} words in {} lists from {:?}",
            lexicon.word_count(),
            lexicon.lists.len(),
            path
        );
        Ok(lexicon)
    }

    /// Fix the random sequence (tests, reproducible runs)
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    fn from_lists(lists: WordLists) -> Self {
        Self {
            lists,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Names of the lists present
    pub fn list_names(&self) -> Vec<&str> {
        self.lists.keys().map(String::as_str).collect()
    }

    pub fn word_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    fn pick(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(0..len)
    }
}

impl WordSource for StaticLexicon {
    fn fetch(&self, list: &VocabList) -> Result<LexicalEntry> {
        let (name, record) = match list {
            VocabList::Any => {
                let total = self.word_count();
                if total == 0 {
                    return Err(PieError::Fetch("No words available".to_string()));
                }
                let mut index = self.pick(total);
                let mut found = None;
                for (name, words) in &self.lists {
                    if index < words.len() {
                        found = Some((name, &words[index]));
                        break;
                    }
                    index -= words.len();
                }
                found.ok_or_else(|| PieError::Fetch("No words available".to_string()))?
            }
            VocabList::Named(name) => {
                let (name, words) = self
                    .lists
                    .get_key_value(name)
                    .ok_or_else(|| PieError::Fetch(format!("Unknown vocabulary list '{}'", name)))?;
                if words.is_empty() {
                    return Err(PieError::Fetch(format!("Vocabulary list '{}' is empty", name)));
                }
                (name, &words[self.pick(words.len())])
            }
        };

        debug!("Drew '{}' from {}", record.headword, name);
        Ok(LexicalEntry {
            headword: record.headword.clone(),
            definition: record.definition.clone(),
            list: name.clone(),
        })
    }
}

fn parse_lists(json: &str) -> Result<WordLists> {
    let lists: WordLists = serde_json::from_str(json)?;
    for (name, words) in &lists {
        if let Some(blank) = words.iter().find(|w| w.headword.trim().is_empty()) {
            return Err(PieError::Config(format!(
                "List '{}' has an entry with no headword (definition '{}')",
                name, blank.definition
            )));
        }
    }
    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_every_list() {
        let lexicon = StaticLexicon::builtin().unwrap();
        for name in VOCAB_LISTS {
            assert!(lexicon.list_names().contains(&name), "missing list {}", name);
        }
        assert_eq!(lexicon.list_names().len(), VOCAB_LISTS.len());
    }

    #[test]
    fn test_fetch_named_list() {
        let lexicon = StaticLexicon::builtin().unwrap().with_seed(7);
        for _ in 0..20 {
            let entry = lexicon.fetch(&VocabList::named("numerals")).unwrap();
            assert_eq!(entry.list, "numerals");
            assert!(!entry.headword.is_empty());
        }
    }

    #[test]
    fn test_fetch_any() {
        let lexicon = StaticLexicon::builtin().unwrap().with_seed(1);
        let entry = lexicon.fetch(&VocabList::Any).unwrap();
        assert!(VOCAB_LISTS.contains(&entry.list.as_str()));
    }

    #[test]
    fn test_unknown_and_empty_lists() {
        let lexicon = StaticLexicon::from_json_str(r#"{ "empty": [] }"#).unwrap();
        assert!(matches!(
            lexicon.fetch(&VocabList::named("empty")),
            Err(PieError::Fetch(_))
        ));
        assert!(matches!(
            lexicon.fetch(&VocabList::named("nope")),
            Err(PieError::Fetch(_))
        ));
        assert!(matches!(lexicon.fetch(&VocabList::Any), Err(PieError::Fetch(_))));
    }

    #[test]
    fn test_blank_headword_rejected() {
        let json = r#"{ "x": [{ "headword": " ", "definition": "nothing" }] }"#;
        assert!(StaticLexicon::from_json_str(json).is_err());
    }

    #[test]
    fn test_parse_vocab_list() {
        assert_eq!("any".parse::<VocabList>().unwrap(), VocabList::Any);
        assert_eq!("".parse::<VocabList>().unwrap(), VocabList::Any);
        assert_eq!(
            "Animals".parse::<VocabList>().unwrap(),
            VocabList::named("animals")
        );
    }
}
