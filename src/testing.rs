//! In-memory cloud for tests
//!
//! Implements both collaborator traits over a mutex-guarded store so the
//! engine, discovery, and backup layers can be exercised end-to-end without
//! a network. Failure injection mirrors the error shapes the ARM client
//! produces.

use crate::cloud::{CloudError, Resource, ResourceLister, TagClient};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    resources: Vec<Resource>,
    /// Live tag state, keyed by resource ID; diverges from the inventory
    /// snapshot once writes land
    tags: HashMap<String, HashMap<String, String>>,
    writes: Vec<(String, HashMap<String, String>)>,
    fail_groups: HashSet<String>,
    fail_group_listing: bool,
    fail_writes: HashSet<String>,
}

/// Mock implementation of [`ResourceLister`] and [`TagClient`]
#[derive(Default)]
pub struct MockCloud {
    state: Mutex<MockState>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the mock with an inventory; the live tag store starts from each
    /// resource's tag map
    pub fn with_resources(resources: Vec<Resource>) -> Self {
        let tags = resources
            .iter()
            .map(|r| (r.id.clone(), r.tags.clone()))
            .collect();
        Self {
            state: Mutex::new(MockState {
                resources,
                tags,
                ..Default::default()
            }),
        }
    }

    /// Make `list_resources` fail for one group
    pub fn fail_group(&self, group: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_groups
            .insert(group.to_string());
    }

    /// Make `list_groups` fail
    pub fn fail_group_listing(&self) {
        self.state.lock().unwrap().fail_group_listing = true;
    }

    /// Make `write_tags` fail for one resource
    pub fn fail_writes_for(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_writes
            .insert(id.to_string());
    }

    /// Current live tags of a resource (empty if unknown)
    pub fn tags_of(&self, id: &str) -> HashMap<String, String> {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every successful write, in order
    pub fn writes(&self) -> Vec<(String, HashMap<String, String>)> {
        self.state.lock().unwrap().writes.clone()
    }
}

fn unavailable(what: &str) -> CloudError {
    CloudError::Api {
        status: 500,
        body: format!("injected failure: {what}"),
    }
}

#[async_trait]
impl ResourceLister for MockCloud {
    async fn list_groups(&self) -> Result<Vec<String>, CloudError> {
        let state = self.state.lock().unwrap();
        if state.fail_group_listing {
            return Err(unavailable("group listing"));
        }
        let mut groups = Vec::new();
        for resource in &state.resources {
            if let Some(group) = &resource.resource_group {
                if !groups.contains(group) {
                    groups.push(group.clone());
                }
            }
        }
        Ok(groups)
    }

    async fn list_resources(&self, group: Option<&str>) -> Result<Vec<Resource>, CloudError> {
        let state = self.state.lock().unwrap();
        if let Some(group) = group {
            if state.fail_groups.contains(group) {
                return Err(unavailable(group));
            }
        }
        Ok(state
            .resources
            .iter()
            .filter(|r| group.is_none() || r.resource_group.as_deref() == group)
            .cloned()
            .map(|mut r| {
                if let Some(live) = state.tags.get(&r.id) {
                    r.tags = live.clone();
                }
                r
            })
            .collect())
    }
}

#[async_trait]
impl TagClient for MockCloud {
    async fn read_tags(&self, id: &str) -> Result<HashMap<String, String>, CloudError> {
        self.state
            .lock()
            .unwrap()
            .tags
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound { id: id.to_string() })
    }

    async fn write_tags(&self, id: &str, tags: HashMap<String, String>) -> Result<(), CloudError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes.contains(id) {
            return Err(unavailable(id));
        }
        if !state.tags.contains_key(id) {
            return Err(CloudError::NotFound { id: id.to_string() });
        }
        state.tags.insert(id.to_string(), tags.clone());
        state.writes.push((id.to_string(), tags));
        Ok(())
    }
}
