//! Cloud-facing types and collaborator traits
//!
//! The engine never talks to a concrete API directly. It consumes two small
//! traits: a lister that produces the resource inventory and a tag client
//! that reads and writes one resource's tag set by its opaque ID. The Azure
//! Resource Manager implementation lives in [`arm`]; tests use the in-memory
//! implementation from [`crate::testing`].

pub mod arm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// A generic taggable resource discovered during a scan
///
/// Created fresh on every discovery pass and never mutated locally; tag
/// mutation happens only on the remote side, so a `Resource` is stale the
/// moment a write for its ID succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Opaque identifier, unique within the scanned scope
    pub id: String,
    /// Display name, if the API returned one
    pub name: Option<String>,
    /// Geographic region
    pub region: String,
    /// Owning resource group; absent for group-less queries
    pub resource_group: Option<String>,
    /// Tag map; keys unique, order unspecified
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Remote-call failures surfaced by collaborator implementations
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("resource '{id}' not found")]
    NotFound { id: String },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

/// Lists resource groups and resources for discovery
///
/// Implementations paginate internally; a pagination failure mid-listing
/// must surface as an error, never as a silently truncated result.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    /// List all resource group identifiers in the scope
    async fn list_groups(&self) -> Result<Vec<String>, CloudError>;

    /// List resources within `group`, or across the whole scope when `None`
    async fn list_resources(&self, group: Option<&str>) -> Result<Vec<Resource>, CloudError>;
}

/// Reads and writes one resource's tag set, addressed by opaque ID
#[async_trait]
pub trait TagClient: Send + Sync {
    async fn read_tags(&self, id: &str) -> Result<HashMap<String, String>, CloudError>;

    /// Replace the resource's whole tag set with `tags`
    async fn write_tags(&self, id: &str, tags: HashMap<String, String>) -> Result<(), CloudError>;
}
