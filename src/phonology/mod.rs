//! Phonology rule tables
//!
//! A [`RuleTable`] describes one reconstruction of the PIE sound system:
//! which spellings map to which phonemes, and which punctuation marks
//! become pauses. Tables are immutable once compiled; selecting another
//! variant builds a fresh table and replaces the old one wholesale.

pub mod definition;
pub mod variants;

pub use definition::{RuleDefinition, TableDefinition};
pub use variants::{PhonologyOptions, PhonologySelection, Registry};

use crate::transcribe::PauseKind;
use crate::Result;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Neighbouring-character constraint on a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// Neighbour must be a word boundary (text edge, whitespace, punctuation)
    Boundary,
    /// Neighbour must be one of these characters
    Class(BTreeSet<char>),
}

impl Context {
    /// Check a neighbouring character. `None` means word boundary.
    pub fn admits(&self, neighbour: Option<char>) -> bool {
        match (self, neighbour) {
            (Context::Boundary, None) => true,
            (Context::Class(set), Some(ch)) => set.contains(&ch),
            _ => false,
        }
    }
}

/// Compiled grapheme rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub pattern: Vec<char>,
    pub phonemes: Vec<String>,
    pub preceded_by: Option<Context>,
    pub followed_by: Option<Context>,
}

impl RuleEntry {
    /// Does this rule match `chars` at `pos`, given its neighbours?
    fn matches(&self, chars: &[char], pos: usize, preceding: Option<char>, table: &RuleTable) -> bool {
        if !chars[pos..].starts_with(&self.pattern) {
            return false;
        }
        if let Some(ctx) = &self.preceded_by {
            if !ctx.admits(preceding) {
                return false;
            }
        }
        if let Some(ctx) = &self.followed_by {
            let following = chars
                .get(pos + self.pattern.len())
                .copied()
                .filter(|&ch| !table.is_boundary(ch));
            if !ctx.admits(following) {
                return false;
            }
        }
        true
    }
}

/// Immutable mapping from orthography to phonemes for one variant
#[derive(Debug, Clone)]
pub struct RuleTable {
    id: String,
    /// Variant id plus sub-options, identifies audio produced with this table
    fingerprint: String,
    rules: Vec<RuleEntry>,
    /// Rule indices keyed by first pattern character, declaration order kept
    by_first: HashMap<char, Vec<usize>>,
    punctuation: HashMap<char, PauseKind>,
    separators: HashSet<char>,
}

impl RuleTable {
    pub(crate) fn new(
        id: String,
        fingerprint: String,
        rules: Vec<RuleEntry>,
        punctuation: HashMap<char, PauseKind>,
        separators: HashSet<char>,
    ) -> Self {
        let mut by_first: HashMap<char, Vec<usize>> = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            by_first.entry(rule.pattern[0]).or_default().push(idx);
        }
        Self {
            id,
            fingerprint,
            rules,
            by_first,
            punctuation,
            separators,
        }
    }

    /// Load a built-in variant with its usual sub-options
    pub fn load(variant_id: &str) -> Result<Self> {
        Registry::builtin().load(&PhonologySelection::new(variant_id))
    }

    /// Compile a table straight from JSON (no inheritance, no options)
    pub fn from_json(json: &str) -> Result<Self> {
        let def = TableDefinition::from_json(json)?;
        def.compile(def.id.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier that changes whenever the produced phonemes could change
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn rules(&self) -> &[RuleEntry] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the longest rule matching at `pos`.
    ///
    /// Among equally long matches the first declared rule wins.
    pub fn longest_match(
        &self,
        chars: &[char],
        pos: usize,
        preceding: Option<char>,
    ) -> Option<&RuleEntry> {
        let candidates = self.by_first.get(chars.get(pos)?)?;
        let mut best: Option<&RuleEntry> = None;
        for &idx in candidates {
            let rule = &self.rules[idx];
            if best.is_some_and(|b| b.pattern.len() >= rule.pattern.len()) {
                continue;
            }
            if rule.matches(chars, pos, preceding, self) {
                best = Some(rule);
            }
        }
        best
    }

    /// Pause strength for a punctuation character
    pub fn pause_kind(&self, ch: char) -> Option<PauseKind> {
        self.punctuation.get(&ch).copied()
    }

    /// Word separator that is neither whitespace nor punctuation
    pub fn is_separator(&self, ch: char) -> bool {
        self.separators.contains(&ch)
    }

    /// Does this character end a word?
    pub fn is_boundary(&self, ch: char) -> bool {
        ch.is_whitespace() || self.is_separator(ch) || self.punctuation.contains_key(&ch)
    }

    /// Pattern -> phoneme pairs for display, in declaration order
    pub fn display_map(&self) -> Vec<(String, String)> {
        self.rules
            .iter()
            .filter(|r| r.preceded_by.is_none() && r.followed_by.is_none())
            .map(|r| (r.pattern.iter().collect(), r.phonemes.join(" ")))
            .collect()
    }
}

impl PartialEq for RuleTable {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for RuleTable {}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::from_json(
            r##"{
                "id": "test",
                "classes": { "cons": ["t", "k"] },
                "rules": [
                    { "pattern": "k", "phoneme": "X" },
                    { "pattern": "kʷ", "phoneme": "Y" },
                    { "pattern": "h", "phoneme": "ə", "preceded_by": "cons", "followed_by": "cons" },
                    { "pattern": "h", "phoneme": "h" },
                    { "pattern": "a", "phoneme": "A1" },
                    { "pattern": "a", "phoneme": "A1" }
                ],
                "punctuation": { ",": "minor" }
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn test_longest_match_wins() {
        let t = table();
        let chars: Vec<char> = "kʷe".chars().collect();
        let rule = t.longest_match(&chars, 0, None).unwrap();
        assert_eq!(rule.phonemes, vec!["Y"]);
    }

    #[test]
    fn test_context_rule_applies_between_consonants() {
        let t = table();
        let chars: Vec<char> = "tht".chars().collect();
        let rule = t.longest_match(&chars, 1, Some('t')).unwrap();
        assert_eq!(rule.phonemes, vec!["ə"]);

        let chars: Vec<char> = "th,".chars().collect();
        let rule = t.longest_match(&chars, 1, Some('t')).unwrap();
        assert_eq!(rule.phonemes, vec!["h"]);
    }

    #[test]
    fn test_boundary_detection() {
        let t = table();
        assert!(t.is_boundary(' '));
        assert!(t.is_boundary(','));
        assert!(!t.is_boundary('k'));
        assert_eq!(t.pause_kind(','), Some(PauseKind::Minor));
    }

    #[test]
    fn test_display_map_skips_context_rules() {
        let map = table().display_map();
        assert!(map.contains(&("kʷ".to_string(), "Y".to_string())));
        assert_eq!(map.iter().filter(|(p, _)| p == "h").count(), 1);
    }
}
