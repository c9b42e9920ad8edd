//! Built-in reconstructions and variant selection
//!
//! Variants are JSON definitions compiled into the binary, optionally
//! extended with user definitions from a directory. Sub-options rewrite
//! target phonemes of the selected variant before it is compiled.

use super::definition::TableDefinition;
use super::RuleTable;
use crate::{PieError, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Definitions shipped with the crate
const BUILTIN_DEFINITIONS: &[&str] = &[
    include_str!("variants/pie-common.json"),
    include_str!("variants/standard.json"),
    include_str!("variants/glottalic.json"),
    include_str!("variants/centum.json"),
];

/// Variant used when nothing else is selected
pub const DEFAULT_VARIANT: &str = "standard";

/// Boolean sub-options of a variant
///
/// Each option toggles how one class of sounds is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhonologyOptions {
    /// h₂ and h₃ keep their a/o colouring (χ, ɣʷ) instead of a plain h
    pub colored_laryngeals: bool,
    /// Palatovelars as true palatals (c, ɟ) instead of palatalized velars
    pub palatals: bool,
    /// Voiced aspirates as breathy voice (bʱ) instead of aspirated (bʰ)
    pub breathy_aspirates: bool,
    /// Syllabic resonants kept as such instead of schwa + resonant
    pub syllabic_resonants: bool,
}

impl Default for PhonologyOptions {
    fn default() -> Self {
        Self {
            colored_laryngeals: true,
            palatals: false,
            breathy_aspirates: true,
            syllabic_resonants: true,
        }
    }
}

impl PhonologyOptions {
    /// The usual options for a variant
    pub fn for_variant(variant: &str) -> Self {
        let mut options = Self::default();
        if variant == "glottalic" {
            options.breathy_aspirates = false;
        }
        options
    }

    /// Reject combinations a variant doesn't define
    pub fn validate(&self, variant: &str) -> Result<()> {
        if variant == "glottalic" && self.breathy_aspirates {
            return Err(PieError::Config(
                "The glottalic variant has no breathy-voiced series; disable breathy_aspirates"
                    .to_string(),
            ));
        }
        if variant == "centum" && self.palatals {
            return Err(PieError::Config(
                "The centum variant merges palatovelars with plain velars; disable palatals"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Short tag used in table fingerprints
    fn tag(&self) -> String {
        [
            self.colored_laryngeals,
            self.palatals,
            self.breathy_aspirates,
            self.syllabic_resonants,
        ]
        .iter()
        .map(|&on| if on { '1' } else { '0' })
        .collect()
    }

    /// Apply phoneme rewrites for every option
    fn apply(&self, def: &mut TableDefinition) {
        if self.palatals {
            for (from, to) in [
                ("kʲ", "c"),
                ("gʲ", "ɟ"),
                ("gʲʰ", "ɟʰ"),
                ("kʲʰ", "cʰ"),
                ("kʲʼ", "cʼ"),
            ] {
                def.rewrite_phoneme(from, &[to]);
            }
        }
        if self.breathy_aspirates {
            for (from, to) in [
                ("bʰ", "bʱ"),
                ("dʰ", "dʱ"),
                ("gʰ", "gʱ"),
                ("gʷʰ", "gʷʱ"),
                ("gʲʰ", "gʲʱ"),
                ("ɟʰ", "ɟʱ"),
            ] {
                def.rewrite_phoneme(from, &[to]);
            }
        }
        if !self.colored_laryngeals {
            def.rewrite_phoneme("χ", &["h"]);
            def.rewrite_phoneme("ɣʷ", &["h"]);
        }
        if !self.syllabic_resonants {
            for (from, resonant) in [("m̩", "m"), ("n̩", "n"), ("r̩", "r"), ("l̩", "l")] {
                def.rewrite_phoneme(from, &["ə", resonant]);
            }
        }
    }
}

/// A variant id plus its sub-options, as chosen by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonologySelection {
    pub variant: String,
    pub options: PhonologyOptions,
}

impl PhonologySelection {
    /// Select a variant with its usual options
    pub fn new(variant: &str) -> Self {
        Self {
            variant: variant.to_string(),
            options: PhonologyOptions::for_variant(variant),
        }
    }

    pub fn with_options(variant: &str, options: PhonologyOptions) -> Self {
        Self {
            variant: variant.to_string(),
            options,
        }
    }
}

/// Known variant definitions
#[derive(Debug, Clone)]
pub struct Registry {
    definitions: BTreeMap<String, TableDefinition>,
}

impl Registry {
    /// Registry holding only the built-in variants
    pub fn builtin() -> Self {
        let mut definitions = BTreeMap::new();
        for json in BUILTIN_DEFINITIONS {
            match TableDefinition::from_json(json) {
                Ok(def) => {
                    definitions.insert(def.id.clone(), def);
                }
                // Built-in files are covered by tests; keep going if one is broken
                Err(e) => warn!("Skipping built-in variant: {}", e),
            }
        }
        Self { definitions }
    }

    /// Built-in variants plus every `*.json` definition in `dir`.
    ///
    /// A missing directory is not an error. A custom definition may not
    /// reuse a built-in id.
    pub fn with_custom_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        if !dir.is_dir() {
            debug!("No custom variant directory at {:?}", dir);
            return Ok(registry);
        }

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let json = fs::read_to_string(&path)?;
            let def = TableDefinition::from_json(&json)
                .map_err(|e| PieError::Config(format!("{}: {}", path.display(), e)))?;
            registry.register(def)?;
            info!("Registered custom variant from {:?}", path);
        }
        Ok(registry)
    }

    /// Add a definition; ids must be unique
    pub fn register(&mut self, def: TableDefinition) -> Result<()> {
        if self.definitions.contains_key(&def.id) {
            return Err(PieError::Config(format!(
                "Variant '{}' is already defined",
                def.id
            )));
        }
        self.definitions.insert(def.id.clone(), def);
        Ok(())
    }

    /// Selectable variant ids with their display names
    pub fn variants(&self) -> Vec<(String, String)> {
        self.definitions
            .values()
            .filter(|d| !d.is_abstract)
            .map(|d| (d.id.clone(), d.name.clone().unwrap_or_else(|| d.id.clone())))
            .collect()
    }

    /// Build the rule table for a selection
    pub fn load(&self, selection: &PhonologySelection) -> Result<RuleTable> {
        let id = selection.variant.as_str();
        let def = self
            .definitions
            .get(id)
            .ok_or_else(|| PieError::Config(format!("Unknown phonology variant '{}'", id)))?;
        if def.is_abstract {
            return Err(PieError::Config(format!(
                "'{}' is a base definition and can't be selected",
                id
            )));
        }
        selection.options.validate(id)?;

        let mut resolved = self.resolve(id, &mut Vec::new())?;
        selection.options.apply(&mut resolved);

        let fingerprint = format!("{}:{}", id, selection.options.tag());
        let table = resolved.compile(fingerprint)?;
        info!(
            "Loaded phonology '{}' ({} rules)",
            table.fingerprint(),
            table.len()
        );
        Ok(table)
    }

    /// Flatten the `extends` chain of a definition
    fn resolve(&self, id: &str, chain: &mut Vec<String>) -> Result<TableDefinition> {
        if chain.iter().any(|c| c == id) {
            chain.push(id.to_string());
            return Err(PieError::Config(format!(
                "Cyclic variant inheritance: {}",
                chain.join(" -> ")
            )));
        }
        let def = self.definitions.get(id).ok_or_else(|| {
            PieError::Config(format!(
                "Variant '{}' extends unknown definition '{}'",
                chain.last().map(String::as_str).unwrap_or(id),
                id
            ))
        })?;

        let mut resolved = def.clone();
        if let Some(base) = &def.extends {
            chain.push(id.to_string());
            let base = self.resolve(base, chain)?;
            chain.pop();
            resolved.inherit(&base);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_compile() {
        let registry = Registry::builtin();
        let ids: Vec<String> = registry.variants().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["centum", "glottalic", "standard"]);
        for id in ids {
            let table = registry.load(&PhonologySelection::new(&id)).unwrap();
            assert!(!table.is_empty());
        }
    }

    #[test]
    fn test_abstract_base_not_selectable() {
        let err = Registry::builtin()
            .load(&PhonologySelection::new("pie-common"))
            .unwrap_err();
        assert!(matches!(err, PieError::Config(_)));
    }

    #[test]
    fn test_invalid_combinations_rejected() {
        let registry = Registry::builtin();
        let mut options = PhonologyOptions::for_variant("glottalic");
        options.breathy_aspirates = true;
        assert!(registry
            .load(&PhonologySelection::with_options("glottalic", options))
            .is_err());

        let mut options = PhonologyOptions::default();
        options.palatals = true;
        assert!(registry
            .load(&PhonologySelection::with_options("centum", options))
            .is_err());
    }

    #[test]
    fn test_options_change_fingerprint() {
        let registry = Registry::builtin();
        let a = registry.load(&PhonologySelection::new("standard")).unwrap();
        let mut options = PhonologyOptions::default();
        options.colored_laryngeals = false;
        let b = registry
            .load(&PhonologySelection::with_options("standard", options))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_cyclic_inheritance_rejected() {
        let mut registry = Registry::builtin();
        registry
            .register(TableDefinition::from_json(r#"{ "id": "x", "extends": "y" }"#).unwrap())
            .unwrap();
        registry
            .register(TableDefinition::from_json(r#"{ "id": "y", "extends": "x" }"#).unwrap())
            .unwrap();
        let err = registry.load(&PhonologySelection::new("x")).unwrap_err();
        assert!(err.to_string().contains("Cyclic"));
    }

    #[test]
    fn test_custom_dir_registration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("anatolian.json"),
            r#"{ "id": "anatolian", "extends": "standard", "rules": [{ "pattern": "ḫ", "phoneme": "χ" }] }"#,
        )
        .unwrap();
        let registry = Registry::with_custom_dir(dir.path()).unwrap();
        let table = registry.load(&PhonologySelection::new("anatolian")).unwrap();
        assert!(table.display_map().iter().any(|(p, _)| p == "ḫ"));
    }

    #[test]
    fn test_custom_dir_duplicate_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("s.json"), r#"{ "id": "standard" }"#).unwrap();
        assert!(Registry::with_custom_dir(dir.path()).is_err());
    }
}
