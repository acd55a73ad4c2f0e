//! Tag mutation actions
//!
//! Actions are pure over a tag map; the dispatcher decides when the result
//! is written back to the remote side. Discriminators: `addTag`, `delTag`,
//! `cleanTags`. Anything else decodes into [`Action::Unknown`], a logged
//! no-op.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// A typed tag mutation decoded from one action item
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Add `tag` with `value` unless the key already exists (first write
    /// wins, existing values are never overwritten)
    AddTag { tag: String, value: String },
    /// Remove `tag` if present
    DelTag { tag: String },
    /// Replace the tag map with an empty one
    CleanTags,
    /// Unrecognized discriminator; never mutates
    Unknown { kind: String },
}

impl Action {
    /// Apply the mutation to `tags`, returning whether the map changed
    pub fn apply(&self, tags: &mut HashMap<String, String>) -> bool {
        match self {
            Action::AddTag { tag, value } => {
                if tags.contains_key(tag) {
                    false
                } else {
                    tags.insert(tag.clone(), value.clone());
                    true
                }
            }
            Action::DelTag { tag } => tags.remove(tag).is_some(),
            Action::CleanTags => {
                if tags.is_empty() {
                    false
                } else {
                    tags.clear();
                    true
                }
            }
            Action::Unknown { kind } => {
                warn!(kind = %kind, "Unknown action type");
                false
            }
        }
    }

    /// Wire discriminator of this action, for reports and errors
    pub fn kind(&self) -> &str {
        match self {
            Action::AddTag { .. } => "addTag",
            Action::DelTag { .. } => "delTag",
            Action::CleanTags => "cleanTags",
            Action::Unknown { kind } => kind,
        }
    }

    fn from_raw(raw: HashMap<String, String>) -> Self {
        let get = |key: &str| raw.get(key).cloned().unwrap_or_default();
        match raw.get("type").map(String::as_str).unwrap_or_default() {
            "addTag" => Action::AddTag {
                tag: get("tag"),
                value: get("value"),
            },
            "delTag" => Action::DelTag { tag: get("tag") },
            "cleanTags" => Action::CleanTags,
            kind => Action::Unknown {
                kind: kind.to_string(),
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AddTag { tag, value } => write!(f, "addTag [{tag} = {value}]"),
            Action::DelTag { tag } => write!(f, "delTag [{tag}]"),
            Action::CleanTags => write!(f, "cleanTags"),
            Action::Unknown { kind } => write!(f, "unknown [{kind}]"),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, String>::deserialize(deserializer)?;
        Ok(Action::from_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn add_tag_is_a_noop_when_the_key_exists() {
        let action = Action::AddTag {
            tag: "env".to_string(),
            value: "dev".to_string(),
        };
        let mut map = tags(&[("env", "prod")]);
        assert!(!action.apply(&mut map));
        assert_eq!(map, tags(&[("env", "prod")]));
    }

    #[test]
    fn add_tag_inserts_when_absent() {
        let action = Action::AddTag {
            tag: "owner".to_string(),
            value: "team-x".to_string(),
        };
        let mut map = tags(&[]);
        assert!(action.apply(&mut map));
        assert_eq!(map, tags(&[("owner", "team-x")]));
    }

    #[test]
    fn del_tag_on_absent_key_leaves_tags_unchanged() {
        let action = Action::DelTag {
            tag: "b".to_string(),
        };
        let mut map = tags(&[("a", "1")]);
        assert!(!action.apply(&mut map));
        assert_eq!(map, tags(&[("a", "1")]));
    }

    #[test]
    fn del_tag_removes_present_key() {
        let action = Action::DelTag {
            tag: "a".to_string(),
        };
        let mut map = tags(&[("a", "1"), ("b", "2")]);
        assert!(action.apply(&mut map));
        assert_eq!(map, tags(&[("b", "2")]));
    }

    #[test]
    fn clean_tags_empties_any_map() {
        let mut map = tags(&[("a", "1"), ("b", "2")]);
        assert!(Action::CleanTags.apply(&mut map));
        assert!(map.is_empty());
        // already empty: nothing to write back
        assert!(!Action::CleanTags.apply(&mut map));
    }

    #[test]
    fn unknown_action_is_a_noop() {
        let action = Action::Unknown {
            kind: "bogus".to_string(),
        };
        let mut map = tags(&[("a", "1")]);
        assert!(!action.apply(&mut map));
        assert_eq!(map, tags(&[("a", "1")]));
    }
}
