//! Condition predicates over a resource
//!
//! Wire discriminators match the rule document vocabulary: `noTags`,
//! `tagEqual`, `tagNotEqual`, `tagExists`, `tagNotExists`, `regionEqual`,
//! `regionNotEqual`, `rgEqual`, `rgNotEqual`. Anything else decodes into
//! [`Condition::Unknown`], which always evaluates false.

use crate::cloud::Resource;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tracing::warn;

/// A typed predicate decoded from one condition item
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The resource has no tags at all
    NoTags,
    /// Tag `tag` is present with exactly `value`
    TagEqual { tag: String, value: String },
    /// Tag `tag` is present with a value other than `value`
    TagNotEqual { tag: String, value: String },
    TagExists { tag: String },
    TagNotExists { tag: String },
    RegionEqual { region: String },
    RegionNotEqual { region: String },
    ResourceGroupEqual { resource_group: String },
    ResourceGroupNotEqual { resource_group: String },
    /// Unrecognized discriminator; never matches
    Unknown { kind: String },
}

impl Condition {
    /// Evaluate the predicate against one resource
    ///
    /// Total: unknown discriminators log a warning and return false rather
    /// than erroring, so third-party rule files cannot break evaluation.
    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            Condition::NoTags => resource.tags.is_empty(),
            Condition::TagEqual { tag, value } => resource.tags.get(tag) == Some(value),
            Condition::TagNotEqual { tag, value } => {
                resource.tags.get(tag).is_some_and(|v| v != value)
            }
            Condition::TagExists { tag } => resource.tags.contains_key(tag),
            Condition::TagNotExists { tag } => !resource.tags.contains_key(tag),
            Condition::RegionEqual { region } => resource.region == *region,
            Condition::RegionNotEqual { region } => resource.region != *region,
            Condition::ResourceGroupEqual { resource_group } => {
                resource.resource_group.as_deref() == Some(resource_group.as_str())
            }
            Condition::ResourceGroupNotEqual { resource_group } => resource
                .resource_group
                .as_deref()
                .is_some_and(|g| g != resource_group),
            Condition::Unknown { kind } => {
                warn!(kind = %kind, "Unknown condition type");
                false
            }
        }
    }

    fn from_raw(raw: HashMap<String, String>) -> Self {
        let get = |key: &str| raw.get(key).cloned().unwrap_or_default();
        match raw.get("type").map(String::as_str).unwrap_or_default() {
            "noTags" => Condition::NoTags,
            "tagEqual" => Condition::TagEqual {
                tag: get("tag"),
                value: get("value"),
            },
            "tagNotEqual" => Condition::TagNotEqual {
                tag: get("tag"),
                value: get("value"),
            },
            "tagExists" => Condition::TagExists { tag: get("tag") },
            "tagNotExists" => Condition::TagNotExists { tag: get("tag") },
            "regionEqual" => Condition::RegionEqual {
                region: get("region"),
            },
            "regionNotEqual" => Condition::RegionNotEqual {
                region: get("region"),
            },
            "rgEqual" => Condition::ResourceGroupEqual {
                resource_group: get("resourceGroup"),
            },
            "rgNotEqual" => Condition::ResourceGroupNotEqual {
                resource_group: get("resourceGroup"),
            },
            kind => Condition::Unknown {
                kind: kind.to_string(),
            },
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, String>::deserialize(deserializer)?;
        Ok(Condition::from_raw(raw))
    }
}
