//! End-to-end rewrite flow over the in-memory cloud: discovery, rule
//! evaluation, backup, dispatch, and restore, without any network.

use std::collections::HashMap;
use std::sync::Arc;
use tagwarden::backup::{self, TagRestorer};
use tagwarden::cloud::Resource;
use tagwarden::discovery::ResourceScanner;
use tagwarden::engine::{ActionOutcome, TagEngine};
use tagwarden::rules::TagRules;
use tagwarden::testing::MockCloud;

fn resource(id: &str, group: &str, tags: &[(&str, &str)]) -> Resource {
    Resource {
        id: id.to_string(),
        name: Some(format!("name-{id}")),
        region: "westeurope".to_string(),
        resource_group: Some(group.to_string()),
        tags: tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

const OWNER_RULES: &str = r#"{
    "rules": [
        {
            "name": "ensure-owner",
            "conditions": [{"type": "tagNotExists", "tag": "owner"}],
            "actions": [{"type": "addTag", "tag": "owner", "value": "team-x"}]
        }
    ]
}"#;

#[tokio::test]
async fn dry_run_schedules_actions_without_writing() {
    let cloud = Arc::new(MockCloud::with_resources(vec![
        resource("r1", "rg-a", &[]),
        resource("r2", "rg-a", &[("owner", "team-y")]),
    ]));

    let scanner = ResourceScanner::new(cloud.clone());
    let inventory = scanner.get_resources().await.unwrap();
    assert_eq!(inventory.len(), 2);

    let rules = TagRules::parse(OWNER_RULES).unwrap();
    let mut engine = TagEngine::new(rules, cloud.clone(), true);
    engine.evaluate_rules(&inventory);

    let executions = engine.execute_actions().await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].resource_id, "r1");
    assert_eq!(executions[0].actions.len(), 1);
    assert_eq!(executions[0].actions[0].outcome, ActionOutcome::WouldApply);

    // nothing was written remotely
    assert!(cloud.writes().is_empty());
    assert!(cloud.tags_of("r1").is_empty());
}

#[tokio::test]
async fn rewrite_backup_and_restore_round_trip() {
    let cloud = Arc::new(MockCloud::with_resources(vec![
        resource("r1", "rg-a", &[("temp", "purge-me")]),
        resource("r2", "rg-b", &[("owner", "team-y")]),
    ]));

    let scanner = ResourceScanner::new(cloud.clone());
    let inventory = scanner.get_resources().await.unwrap();

    let rules = TagRules::parse(
        r#"{
            "rules": [
                {
                    "name": "purge-temps",
                    "conditions": [{"type": "tagExists", "tag": "temp"}],
                    "actions": [{"type": "cleanTags"}]
                }
            ]
        }"#,
    )
    .unwrap();

    let mut engine = TagEngine::new(rules, cloud.clone(), false);
    engine.evaluate_rules(&inventory);
    assert!(engine.matched().contains_key("r1"));
    assert!(!engine.matched().contains_key("r2"));

    let dir = tempfile::tempdir().unwrap();
    let backup_file = backup::backup_matched(engine.matched(), Some(dir.path())).unwrap();

    let executions = engine.execute_actions().await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].actions[0].outcome, ActionOutcome::Applied);
    assert!(cloud.tags_of("r1").is_empty());

    // unmatched resources were never touched
    assert_eq!(
        cloud.tags_of("r2").get("owner").map(String::as_str),
        Some("team-y")
    );

    let restorer = TagRestorer::from_file(&backup_file, cloud.clone()).unwrap();
    assert_eq!(restorer.restore().await.unwrap(), 1);
    assert_eq!(
        cloud.tags_of("r1").get("temp").map(String::as_str),
        Some("purge-me")
    );
}

#[tokio::test]
async fn document_dryrun_flag_preseeds_the_engine() {
    let rules = TagRules::parse(r#"{"dryrun": true, "rules": []}"#).unwrap();
    assert_eq!(rules.dryrun, Some(true));

    // the CLI layer resolves precedence; here the document flag is honored
    let cloud = Arc::new(MockCloud::with_resources(vec![resource(
        "r1",
        "rg-a",
        &[],
    )]));
    let engine = TagEngine::new(rules.clone(), cloud, rules.dryrun.unwrap_or(true));
    assert!(engine.dry_run());
}

#[tokio::test]
async fn multiple_matched_rules_all_dispatch_in_order() {
    let cloud = Arc::new(MockCloud::with_resources(vec![resource(
        "r1",
        "rg-a",
        &[],
    )]));

    let rules = TagRules::parse(
        r#"{
            "rules": [
                {
                    "name": "add-owner",
                    "conditions": [],
                    "actions": [{"type": "addTag", "tag": "owner", "value": "team-x"}]
                },
                {
                    "name": "add-env",
                    "conditions": [],
                    "actions": [{"type": "addTag", "tag": "env", "value": "dev"}]
                }
            ]
        }"#,
    )
    .unwrap();

    let inventory = vec![resource("r1", "rg-a", &[])];
    let mut engine = TagEngine::new(rules, cloud.clone(), false);
    engine.evaluate_rules(&inventory);

    let executions = engine.execute_actions().await.unwrap();
    let rule_names: Vec<_> = executions.iter().map(|e| e.rule_name.as_str()).collect();
    assert_eq!(rule_names, vec!["add-owner", "add-env"]);

    let expected: HashMap<String, String> = [("owner", "team-x"), ("env", "dev")]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(cloud.tags_of("r1"), expected);
}
