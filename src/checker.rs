//! Tag consistency checking
//!
//! Flags tag keys whose values disagree across an inventory. The first
//! value seen for a key becomes the reference; every resource that carries
//! the same key with a different value is reported under that key. Purely
//! informational - nothing is mutated.

use crate::cloud::Resource;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Resources carrying a divergent value, grouped by tag key
pub type NonCompliant = BTreeMap<String, Vec<Resource>>;

/// Scan the inventory for tag keys with inconsistent values
pub fn find_inconsistent(resources: &[Resource]) -> NonCompliant {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut non_compliant = NonCompliant::new();

    for resource in resources {
        for (key, value) in &resource.tags {
            if let Some(reference) = seen.get(key.as_str()).copied() {
                if reference != value.as_str() {
                    debug!(
                        key = %key,
                        reference = %reference,
                        value = %value,
                        resource = %resource.id,
                        "Tag value mismatch"
                    );
                    non_compliant
                        .entry(key.clone())
                        .or_default()
                        .push(resource.clone());
                }
            } else {
                seen.insert(key.as_str(), value.as_str());
            }
        }
    }

    non_compliant
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, tags: &[(&str, &str)]) -> Resource {
        Resource {
            id: id.to_string(),
            name: None,
            region: "westeurope".to_string(),
            resource_group: None,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn consistent_inventory_reports_nothing() {
        let inventory = vec![
            resource("1", &[("env", "prod")]),
            resource("2", &[("env", "prod"), ("owner", "team-x")]),
        ];
        assert!(find_inconsistent(&inventory).is_empty());
    }

    #[test]
    fn divergent_value_is_reported_under_its_key() {
        let inventory = vec![
            resource("1", &[("env", "prod")]),
            resource("2", &[("env", "dev")]),
            resource("3", &[("env", "prod")]),
        ];
        let report = find_inconsistent(&inventory);
        assert_eq!(report.len(), 1);
        let offenders = &report["env"];
        assert_eq!(offenders.len(), 1);
        assert_eq!(offenders[0].id, "2");
    }

    #[test]
    fn keys_are_checked_independently() {
        let inventory = vec![
            resource("1", &[("env", "prod"), ("tier", "web")]),
            resource("2", &[("env", "dev"), ("tier", "web")]),
        ];
        let report = find_inconsistent(&inventory);
        assert!(report.contains_key("env"));
        assert!(!report.contains_key("tier"));
    }
}
