//! Rule model and parsing
//!
//! A rule document is an object with an optional top-level `dryrun` flag and
//! a `rules` array; each rule carries an ordered condition list (AND
//! semantics) and an ordered action list. Documents may be JSON or YAML; the
//! format is sniffed from the first non-whitespace byte. Conditions and
//! actions arrive as flat string maps with a `type` discriminator and are
//! decoded here, once, into typed variants - parsing is the only place
//! schema validation happens, and unknown discriminators decode into an
//! `Unknown` variant instead of failing, so downstream evaluation stays
//! total.

pub mod action;
pub mod condition;

pub use action::Action;
pub use condition::Condition;

use crate::error::{Error, ParseError};
use serde::Deserialize;
use std::path::Path;

/// A parsed rule set
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TagRules {
    /// Pre-seeds the engine's dry-run switch; explicit overrides win
    #[serde(default)]
    pub dryrun: Option<bool>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A single named rule
///
/// A rule with zero conditions matches every resource; a rule with zero
/// actions matches but has no effect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Rule {
    /// Used only for reporting; duplicates are allowed
    #[serde(default)]
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

impl TagRules {
    /// Read and parse a rule document from `path`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let wrap = |source: ParseError| Error::Rules {
            path: path.display().to_string(),
            source,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| wrap(ParseError::Io(e)))?;
        Self::parse(&contents).map_err(wrap)
    }

    /// Parse a rule document from a string, sniffing JSON vs YAML
    pub fn parse(definition: &str) -> Result<Self, ParseError> {
        if has_json_prefix(definition) {
            Ok(serde_json::from_str(definition)?)
        } else {
            Ok(serde_yaml::from_str(definition)?)
        }
    }
}

/// True if the first non-whitespace byte opens a JSON object
fn has_json_prefix(definition: &str) -> bool {
    definition.trim_start().starts_with('{')
}
