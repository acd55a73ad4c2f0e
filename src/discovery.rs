//! Concurrent resource discovery
//!
//! Whole-scope discovery lists all resource groups first, then fans out one
//! worker task per group. Each worker streams its batch onto an unbounded
//! channel; a coordinator task joins every worker before the channel closes,
//! and the collector drains it into the final inventory. Inventory order is
//! unspecified.
//!
//! A failure while listing groups, or inside any single worker, fails the
//! whole call - a partial inventory is never passed off as complete.
//! Workers send their result (success or failure) before exiting, so the
//! fan-in cannot deadlock on a failed group.

use crate::cloud::{CloudError, Resource, ResourceLister};
use crate::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Discovers the resource inventory for a scope
pub struct ResourceScanner {
    lister: Arc<dyn ResourceLister>,
}

impl ResourceScanner {
    pub fn new(lister: Arc<dyn ResourceLister>) -> Self {
        Self { lister }
    }

    /// Scan every resource group in the scope concurrently
    pub async fn get_resources(&self) -> Result<Vec<Resource>, Error> {
        let groups = self.lister.list_groups().await.map_err(Error::GroupList)?;
        info!(groups = groups.len(), "Scanning resource groups");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = Vec::with_capacity(groups.len());

        for group in groups {
            let lister = Arc::clone(&self.lister);
            let tx = tx.clone();
            workers.push(tokio::spawn(async move {
                let batch = lister
                    .list_resources(Some(&group))
                    .await
                    .map_err(|e| (group.clone(), e));
                // Completion is signalled by this send plus dropping the
                // sender clone; a failed group must not stall the fan-in.
                let _ = tx.send(batch);
            }));
        }

        // The coordinator owns the original sender and drops it only after
        // every worker has finished, so the collector below sees the channel
        // close exactly once all batches are in.
        let coordinator = tokio::spawn(async move {
            for worker in workers {
                let _ = worker.await;
            }
            drop(tx);
        });

        let mut inventory = Vec::new();
        let mut failed: Option<(String, CloudError)> = None;
        while let Some(batch) = rx.recv().await {
            match batch {
                Ok(mut resources) => inventory.append(&mut resources),
                // keep draining so every worker can finish; first failure wins
                Err(failure) => {
                    if failed.is_none() {
                        failed = Some(failure);
                    }
                }
            }
        }
        let _ = coordinator.await;

        if let Some((group, source)) = failed {
            return Err(Error::GroupScan { group, source });
        }

        debug!(count = inventory.len(), "Discovery complete");
        Ok(inventory)
    }

    /// Scan a single named resource group, sequentially
    pub async fn get_resources_by_group(&self, group: &str) -> Result<Vec<Resource>, Error> {
        self.lister
            .list_resources(Some(group))
            .await
            .map_err(|source| Error::GroupScan {
                group: group.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCloud;

    fn resource(id: &str, group: &str) -> Resource {
        Resource {
            id: id.to_string(),
            name: None,
            region: "westeurope".to_string(),
            resource_group: Some(group.to_string()),
            tags: Default::default(),
        }
    }

    #[tokio::test]
    async fn merged_inventory_keeps_every_worker_batch() {
        for group_count in 0..5 {
            let mut resources = Vec::new();
            for g in 0..group_count {
                for r in 0..3 {
                    resources.push(resource(&format!("res-{g}-{r}"), &format!("rg-{g}")));
                }
            }
            let expected = resources.len();

            let cloud = Arc::new(MockCloud::with_resources(resources));
            let scanner = ResourceScanner::new(cloud);
            let inventory = scanner.get_resources().await.unwrap();
            assert_eq!(inventory.len(), expected, "groups = {group_count}");
        }
    }

    #[tokio::test]
    async fn single_failing_group_fails_the_whole_scan() {
        let cloud = MockCloud::with_resources(vec![
            resource("res-a", "rg-ok"),
            resource("res-b", "rg-bad"),
        ]);
        cloud.fail_group("rg-bad");

        let scanner = ResourceScanner::new(Arc::new(cloud));
        let err = scanner.get_resources().await.unwrap_err();
        match err {
            Error::GroupScan { group, .. } => assert_eq!(group, "rg-bad"),
            other => panic!("expected GroupScan, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn group_listing_failure_is_fatal() {
        let cloud = MockCloud::with_resources(vec![resource("res-a", "rg-a")]);
        cloud.fail_group_listing();

        let scanner = ResourceScanner::new(Arc::new(cloud));
        assert!(matches!(
            scanner.get_resources().await,
            Err(Error::GroupList(_))
        ));
    }

    #[tokio::test]
    async fn single_group_scan_only_sees_that_group() {
        let cloud = Arc::new(MockCloud::with_resources(vec![
            resource("res-a", "rg-a"),
            resource("res-b", "rg-b"),
        ]));
        let scanner = ResourceScanner::new(cloud);
        let inventory = scanner.get_resources_by_group("rg-a").await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].id, "res-a");
    }
}
