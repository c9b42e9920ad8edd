//! On-disk format for phonology rule tables
//!
//! A definition is plain JSON so that new reconstructions can be dropped
//! into the variants directory without recompiling. Definitions are
//! validated and flattened into a [`RuleTable`] by [`TableDefinition::compile`].

use super::{Context, RuleEntry, RuleTable};
use crate::transcribe::PauseKind;
use crate::{PieError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

/// Name of the pseudo-class matching a word boundary
pub const BOUNDARY_CLASS: &str = "#";

/// Serialized rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Variant identifier, unique within a registry
    pub id: String,

    /// Human readable name shown in variant listings
    #[serde(default)]
    pub name: Option<String>,

    /// Base definition whose classes, rules and punctuation are inherited
    #[serde(default)]
    pub extends: Option<String>,

    /// Base definitions can't be selected on their own
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Character classes used by rule contexts.
    ///
    /// Members are single characters or `@other_class` references.
    #[serde(default)]
    pub classes: BTreeMap<String, Vec<String>>,

    /// Grapheme rules in declaration order
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,

    /// Punctuation character -> pause strength
    #[serde(default)]
    pub punctuation: BTreeMap<String, PauseKind>,

    /// Characters that separate words without producing a pause
    #[serde(default)]
    pub separators: Vec<String>,
}

/// One grapheme rule as written in a definition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Source characters to match
    pub pattern: String,

    /// Target phoneme symbols, whitespace separated. May be empty to
    /// consume the pattern silently (e.g. stray diacritics).
    pub phoneme: String,

    /// Class the character before the match must belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preceded_by: Option<String>,

    /// Class the character after the match must belong to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed_by: Option<String>,
}

impl RuleDefinition {
    /// Rule without context constraints
    pub fn new(pattern: &str, phoneme: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            phoneme: phoneme.to_string(),
            preceded_by: None,
            followed_by: None,
        }
    }

    /// Pattern in composed (NFC) form, the form input is matched in
    fn composed_pattern(&self) -> String {
        self.pattern.nfc().collect()
    }

    /// Key that identifies "the same rule" for conflict detection
    fn key(&self) -> (String, Option<&str>, Option<&str>) {
        (
            self.composed_pattern(),
            self.preceded_by.as_deref(),
            self.followed_by.as_deref(),
        )
    }
}

impl TableDefinition {
    /// Parse a definition from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PieError::Config(format!("Malformed rule table definition: {}", e)))
    }

    /// Merge a resolved base definition underneath this one.
    ///
    /// Own rules keep precedence (they are declared first); own classes and
    /// punctuation entries shadow the base's.
    pub fn inherit(&mut self, base: &TableDefinition) {
        for (name, members) in &base.classes {
            self.classes
                .entry(name.clone())
                .or_insert_with(|| members.clone());
        }
        self.rules.extend(base.rules.iter().cloned());
        for (ch, kind) in &base.punctuation {
            self.punctuation.entry(ch.clone()).or_insert(*kind);
        }
        for sep in &base.separators {
            if !self.separators.contains(sep) {
                self.separators.push(sep.clone());
            }
        }
    }

    /// Rewrite target phoneme symbols throughout the definition.
    ///
    /// Works on whole symbols: `from` only matches a symbol exactly, and
    /// `to` may expand into several symbols.
    pub fn rewrite_phoneme(&mut self, from: &str, to: &[&str]) {
        for rule in &mut self.rules {
            if !rule.phoneme.split_whitespace().any(|sym| sym == from) {
                continue;
            }
            let rewritten: Vec<&str> = rule
                .phoneme
                .split_whitespace()
                .flat_map(|sym| {
                    if sym == from {
                        to.to_vec()
                    } else {
                        vec![sym]
                    }
                })
                .collect();
            rule.phoneme = rewritten.join(" ");
        }
    }

    /// Validate and flatten into an immutable rule table
    pub fn compile(&self, fingerprint: String) -> Result<RuleTable> {
        let classes = self.resolve_classes()?;

        let mut seen: HashMap<(String, Option<&str>, Option<&str>), &str> = HashMap::new();
        let mut rules = Vec::with_capacity(self.rules.len());

        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(PieError::Config(format!(
                    "Rule {} in '{}' has an empty pattern",
                    idx, self.id
                )));
            }

            if let Some(existing) = seen.get(&rule.key()) {
                if *existing != rule.phoneme {
                    return Err(PieError::Config(format!(
                        "Conflicting rules in '{}' for pattern '{}': '{}' vs '{}'",
                        self.id, rule.pattern, existing, rule.phoneme
                    )));
                }
                debug!("Skipping duplicate rule '{}' in '{}'", rule.pattern, self.id);
                continue;
            }
            seen.insert(rule.key(), &rule.phoneme);

            rules.push(RuleEntry {
                pattern: rule.composed_pattern().chars().collect(),
                phonemes: rule.phoneme.split_whitespace().map(str::to_string).collect(),
                preceded_by: self.context(rule.preceded_by.as_deref(), &classes)?,
                followed_by: self.context(rule.followed_by.as_deref(), &classes)?,
            });
        }

        let mut punctuation = HashMap::new();
        for (key, kind) in &self.punctuation {
            let ch = single_char(key).ok_or_else(|| {
                PieError::Config(format!(
                    "Punctuation entry '{}' in '{}' must be a single character",
                    key, self.id
                ))
            })?;
            if rules.iter().any(|r| r.pattern[0] == ch) {
                return Err(PieError::Config(format!(
                    "Punctuation '{}' in '{}' is also the start of a rule pattern",
                    ch, self.id
                )));
            }
            punctuation.insert(ch, *kind);
        }

        let mut separators = HashSet::new();
        for key in &self.separators {
            let ch = single_char(key).ok_or_else(|| {
                PieError::Config(format!(
                    "Separator '{}' in '{}' must be a single character",
                    key, self.id
                ))
            })?;
            separators.insert(ch);
        }

        debug!(
            "Compiled rule table '{}': {} rules, {} punctuation marks",
            self.id,
            rules.len(),
            punctuation.len()
        );

        Ok(RuleTable::new(
            self.id.clone(),
            fingerprint,
            rules,
            punctuation,
            separators,
        ))
    }

    fn context(
        &self,
        name: Option<&str>,
        classes: &BTreeMap<String, BTreeSet<char>>,
    ) -> Result<Option<Context>> {
        match name {
            None => Ok(None),
            Some(BOUNDARY_CLASS) => Ok(Some(Context::Boundary)),
            Some(name) => classes
                .get(name)
                .map(|members| Some(Context::Class(members.clone())))
                .ok_or_else(|| {
                    PieError::Config(format!(
                        "Rule context in '{}' names unknown class '{}'",
                        self.id, name
                    ))
                }),
        }
    }

    /// Expand `@class` references into flat character sets
    fn resolve_classes(&self) -> Result<BTreeMap<String, BTreeSet<char>>> {
        let mut resolved = BTreeMap::new();
        for name in self.classes.keys() {
            let mut stack = Vec::new();
            self.expand_class(name, &mut stack, &mut resolved)?;
        }
        Ok(resolved)
    }

    fn expand_class(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        resolved: &mut BTreeMap<String, BTreeSet<char>>,
    ) -> Result<BTreeSet<char>> {
        if let Some(done) = resolved.get(name) {
            return Ok(done.clone());
        }
        if stack.iter().any(|s| s == name) {
            stack.push(name.to_string());
            return Err(PieError::Config(format!(
                "Cyclic class reference in '{}': {}",
                self.id,
                stack.join(" -> ")
            )));
        }
        let members = self.classes.get(name).ok_or_else(|| {
            PieError::Config(format!(
                "Class '{}' in '{}' references unknown class '{}'",
                stack.last().map(String::as_str).unwrap_or(name),
                self.id,
                name
            ))
        })?;

        stack.push(name.to_string());
        let mut set = BTreeSet::new();
        for member in members {
            if let Some(reference) = member.strip_prefix('@') {
                set.extend(self.expand_class(reference, stack, resolved)?);
            } else if let Some(ch) = single_char(member) {
                set.insert(ch);
            } else {
                return Err(PieError::Config(format!(
                    "Class '{}' in '{}' has member '{}' that is not a single character",
                    name, self.id, member
                )));
            }
        }
        stack.pop();

        resolved.insert(name.to_string(), set.clone());
        Ok(set)
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}
