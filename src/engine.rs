//! Rule evaluation and action dispatch
//!
//! The engine owns its dry-run flag and collaborator handle; there is no
//! process-global state. Evaluation is single-threaded over the inventory
//! and total over arbitrary rule content: unknown condition types never
//! match and unknown actions never mutate, both logged as warnings.
//!
//! Dispatch is deliberately non-transactional. The first remote failure
//! aborts the call with the failing rule, resource, and action named;
//! mutations already applied to other resources stand. Callers that need to
//! undo a partial run restore from the pre-dispatch backup.

use crate::cloud::{Resource, TagClient};
use crate::error::Error;
use crate::rules::{Action, Rule, TagRules};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One resource together with every rule it satisfied, in rule-set order
#[derive(Debug, Clone)]
pub struct Matched {
    /// Snapshot of the resource at match time
    pub resource: Resource,
    pub rules: Vec<Rule>,
}

/// Outcome of one action against one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Remote tag set was rewritten
    Applied,
    /// Action was a no-op; nothing was written
    Unchanged,
    /// Dry run; the action was recorded but no remote call was made
    WouldApply,
}

/// Record of one action attempt inside an execution
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub action: Action,
    pub outcome: ActionOutcome,
}

/// Execution report for one (resource, matched rule) pair
#[derive(Debug, Clone)]
pub struct ActionExecution {
    pub resource_id: String,
    pub rule_name: String,
    pub actions: Vec<ActionRecord>,
}

/// Evaluates rules against an inventory and dispatches the matched actions
pub struct TagEngine {
    rules: TagRules,
    client: Arc<dyn TagClient>,
    matched: BTreeMap<String, Matched>,
    dry_run: bool,
}

impl TagEngine {
    pub fn new(rules: TagRules, client: Arc<dyn TagClient>, dry_run: bool) -> Self {
        Self {
            rules,
            client,
            matched: BTreeMap::new(),
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Resources with at least one matched rule, keyed by resource ID
    pub fn matched(&self) -> &BTreeMap<String, Matched> {
        &self.matched
    }

    /// Check every resource against every rule, accumulating match records
    ///
    /// Conditions within a rule are AND-combined with short-circuit on the
    /// first false; an empty condition list matches unconditionally. A
    /// resource may match any number of rules - all of them are recorded,
    /// in rule-set order. Re-evaluating a resource that already has a match
    /// record appends to it rather than replacing it.
    pub fn evaluate_rules(&mut self, resources: &[Resource]) {
        for resource in resources {
            debug!(id = %resource.id, name = ?resource.name, "Checking resource");
            for rule in &self.rules.rules {
                if !rule.conditions.iter().all(|c| c.matches(resource)) {
                    continue;
                }
                self.matched
                    .entry(resource.id.clone())
                    .and_modify(|m| m.rules.push(rule.clone()))
                    .or_insert_with(|| Matched {
                        resource: resource.clone(),
                        rules: vec![rule.clone()],
                    });
            }
        }
        info!(matched = self.matched.len(), "Rule evaluation complete");
    }

    /// Run every matched rule's actions, in match order, per resource
    ///
    /// Each action goes through read-modify-write: read the live tags, apply
    /// the action to a local copy, and write back only when the result
    /// differs from what was read. In dry-run mode no remote call is made at
    /// all and every action is reported as [`ActionOutcome::WouldApply`].
    pub async fn execute_actions(&self) -> Result<Vec<ActionExecution>, Error> {
        let mut executions = Vec::new();

        for (resource_id, matched) in &self.matched {
            for rule in &matched.rules {
                let mut records = Vec::with_capacity(rule.actions.len());
                for action in &rule.actions {
                    let outcome = if self.dry_run {
                        info!(
                            resource = %resource_id,
                            rule = %rule.name,
                            action = %action,
                            "[DRY RUN] Would execute"
                        );
                        ActionOutcome::WouldApply
                    } else {
                        self.apply_remote(resource_id, rule, action).await?
                    };
                    records.push(ActionRecord {
                        action: action.clone(),
                        outcome,
                    });
                }
                executions.push(ActionExecution {
                    resource_id: resource_id.clone(),
                    rule_name: rule.name.clone(),
                    actions: records,
                });
            }
        }

        Ok(executions)
    }

    async fn apply_remote(
        &self,
        resource_id: &str,
        rule: &Rule,
        action: &Action,
    ) -> Result<ActionOutcome, Error> {
        let wrap = |source| Error::Action {
            rule: rule.name.clone(),
            resource: resource_id.to_string(),
            action: action.kind().to_string(),
            source,
        };

        let current = self.client.read_tags(resource_id).await.map_err(wrap)?;
        let mut updated = current.clone();
        if !action.apply(&mut updated) || updated == current {
            debug!(resource = %resource_id, action = %action, "No change, skipping write");
            return Ok(ActionOutcome::Unchanged);
        }

        self.client
            .write_tags(resource_id, updated)
            .await
            .map_err(wrap)?;
        info!(resource = %resource_id, rule = %rule.name, action = %action, "Executed");
        Ok(ActionOutcome::Applied)
    }
}
