//! Azure Resource Manager implementation of the collaborator traits
//!
//! Talks to the ARM REST API with a pre-acquired bearer token; session
//! bootstrapping is not this crate's concern. Tag reads and writes go
//! through the resource-type-independent tags endpoint
//! (`{id}/providers/Microsoft.Resources/tags/default`).

use super::{CloudError, Resource, ResourceLister, TagClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
const API_VERSION: &str = "2021-04-01";
const CONNECT_TIMEOUT: u64 = 5;
const READ_TIMEOUT: u64 = 60;

/// ARM REST client scoped to one subscription
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    token: String,
}

#[derive(Deserialize)]
struct GroupPage {
    #[serde(default)]
    value: Vec<ArmGroup>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct ArmGroup {
    name: String,
}

#[derive(Deserialize)]
struct ResourcePage {
    #[serde(default)]
    value: Vec<ArmResource>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct ArmResource {
    id: String,
    name: Option<String>,
    #[serde(default)]
    location: String,
    tags: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct TagsEnvelope {
    properties: TagsProperties,
}

#[derive(Deserialize, Default)]
struct TagsProperties {
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl ArmClient {
    pub fn new(
        subscription_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .timeout(Duration::from_secs(READ_TIMEOUT))
            .build()?;

        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            token: token.into(),
        })
    }

    /// Build a client from `AZURE_SUBSCRIPTION_ID` and `AZURE_ACCESS_TOKEN`
    ///
    /// The token is expected to come from outside (e.g.
    /// `az account get-access-token`); tagwarden never refreshes it.
    pub fn from_env() -> Result<Self, CloudError> {
        let subscription_id = std::env::var("AZURE_SUBSCRIPTION_ID")
            .map_err(|_| CloudError::MissingEnv("AZURE_SUBSCRIPTION_ID"))?;
        let token = std::env::var("AZURE_ACCESS_TOKEN")
            .map_err(|_| CloudError::MissingEnv("AZURE_ACCESS_TOKEN"))?;
        Self::new(subscription_id, token)
    }

    /// Override the management endpoint (sovereign clouds, tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, CloudError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CloudError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    fn resource_from_arm(&self, raw: ArmResource, group: Option<&str>) -> Resource {
        let resource_group = group
            .map(|g| g.to_string())
            .or_else(|| group_from_id(&raw.id));
        Resource {
            id: raw.id,
            name: raw.name,
            region: raw.location,
            resource_group,
            tags: raw.tags.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ResourceLister for ArmClient {
    async fn list_groups(&self) -> Result<Vec<String>, CloudError> {
        let mut groups = Vec::new();
        let mut url = format!(
            "{}/subscriptions/{}/resourcegroups?api-version={}",
            self.endpoint, self.subscription_id, API_VERSION
        );

        loop {
            let page: GroupPage = self.get_json(&url).await?;
            groups.extend(page.value.into_iter().map(|g| g.name));
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        debug!(count = groups.len(), "Listed resource groups");
        Ok(groups)
    }

    async fn list_resources(&self, group: Option<&str>) -> Result<Vec<Resource>, CloudError> {
        let mut url = match group {
            Some(g) => format!(
                "{}/subscriptions/{}/resourceGroups/{}/resources?api-version={}",
                self.endpoint, self.subscription_id, g, API_VERSION
            ),
            None => format!(
                "{}/subscriptions/{}/resources?api-version={}",
                self.endpoint, self.subscription_id, API_VERSION
            ),
        };

        let mut resources = Vec::new();
        loop {
            let page: ResourcePage = self.get_json(&url).await?;
            resources.extend(
                page.value
                    .into_iter()
                    .map(|raw| self.resource_from_arm(raw, group)),
            );
            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        debug!(count = resources.len(), group = ?group, "Listed resources");
        Ok(resources)
    }
}

#[async_trait]
impl TagClient for ArmClient {
    async fn read_tags(&self, id: &str) -> Result<HashMap<String, String>, CloudError> {
        let url = format!(
            "{}{}/providers/Microsoft.Resources/tags/default?api-version={}",
            self.endpoint, id, API_VERSION
        );
        let envelope: TagsEnvelope = match self.get_json(&url).await {
            Ok(e) => e,
            Err(CloudError::Api { status: 404, .. }) => {
                return Err(CloudError::NotFound { id: id.to_string() });
            }
            Err(e) => return Err(e),
        };
        Ok(envelope.properties.tags)
    }

    async fn write_tags(&self, id: &str, tags: HashMap<String, String>) -> Result<(), CloudError> {
        let url = format!(
            "{}{}/providers/Microsoft.Resources/tags/default?api-version={}",
            self.endpoint, id, API_VERSION
        );
        let body = serde_json::json!({ "properties": { "tags": tags } });

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CloudError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Extract the owning resource group from a full ARM resource ID
///
/// IDs look like
/// `/subscriptions/<sub>/resourceGroups/<rg>/providers/<ns>/<type>/<name>`;
/// the segment name is matched case-insensitively because ARM is not
/// consistent about it.
pub fn group_from_id(id: &str) -> Option<String> {
    let mut segments = id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourcegroups") {
            return segments.next().map(|s| s.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_from_full_resource_id() {
        let id = "/subscriptions/sub-1/resourceGroups/rg-prod/providers/Microsoft.Compute/virtualMachines/vm-1";
        assert_eq!(group_from_id(id).as_deref(), Some("rg-prod"));
    }

    #[test]
    fn group_segment_is_case_insensitive() {
        let id = "/subscriptions/sub-1/resourcegroups/RG-Dev/providers/Microsoft.Storage/storageAccounts/acc";
        assert_eq!(group_from_id(id).as_deref(), Some("RG-Dev"));
    }

    #[test]
    fn no_group_in_subscription_scoped_id() {
        assert_eq!(group_from_id("/subscriptions/sub-1/providers/x"), None);
    }
}
