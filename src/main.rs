//! tagwarden: policy-driven tag management for Azure resources
//!
//! Scans a subscription (or one resource group), evaluates a declarative
//! rule document against the inventory, and applies the matching tag
//! mutations - dry-run by default, with a JSON backup of the prior tag
//! state written before anything is changed.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagwarden::backup::{self, TagRestorer};
use tagwarden::checker;
use tagwarden::cloud::arm::ArmClient;
use tagwarden::cloud::Resource;
use tagwarden::discovery::ResourceScanner;
use tagwarden::engine::{ActionOutcome, TagEngine};
use tagwarden::rules::TagRules;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tagwarden")]
#[command(about = "Policy-driven tag management for Azure resources")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover resources and print the inventory
    Scan {
        /// Limit the scan to one resource group
        #[arg(long)]
        resource_group: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Evaluate a rule document and apply the matching tag mutations
    Rewrite {
        /// Rule document (JSON or YAML)
        #[arg(short = 'm', long)]
        mapping: PathBuf,

        /// Limit the rewrite to one resource group
        #[arg(long)]
        resource_group: Option<String>,

        /// Actually apply actions (default is dry-run)
        #[arg(long, conflicts_with = "dry_run")]
        execute: bool,

        /// Force dry-run even when the rule document says otherwise
        #[arg(long)]
        dry_run: bool,

        /// Directory for the pre-mutation backup file (default: temp dir)
        #[arg(long)]
        backup_dir: Option<PathBuf>,
    },

    /// Report tag keys with inconsistent values across the inventory
    Check {
        /// Limit the check to one resource group
        #[arg(long)]
        resource_group: Option<String>,
    },

    /// Restore previous tags from a backup file
    Restore {
        /// Backup file written by a previous rewrite
        #[arg(short = 'f', long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print the error and its cause chain
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\nError: {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  Caused by: {cause}");
        source = cause.source();
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let client = Arc::new(ArmClient::from_env()?);

    match args.command {
        Command::Scan {
            resource_group,
            format,
        } => {
            let inventory = discover(client, resource_group.as_deref()).await?;
            print_inventory(&inventory, &format)?;
        }

        Command::Rewrite {
            mapping,
            resource_group,
            execute,
            dry_run,
            backup_dir,
        } => {
            handle_rewrite(
                client,
                &mapping,
                resource_group.as_deref(),
                execute,
                dry_run,
                backup_dir.as_deref(),
            )
            .await?;
        }

        Command::Check { resource_group } => {
            let inventory = discover(client, resource_group.as_deref()).await?;
            let report = checker::find_inconsistent(&inventory);
            if report.is_empty() {
                println!("All tag values are consistent across {} resources", inventory.len());
            } else {
                for (key, offenders) in &report {
                    println!("Tag [{key}] has divergent values:");
                    for resource in offenders {
                        println!(
                            "  {} ({}) = {}",
                            resource.id,
                            resource.name.as_deref().unwrap_or("-"),
                            resource.tags.get(key).map(String::as_str).unwrap_or("")
                        );
                    }
                }
            }
        }

        Command::Restore { file } => {
            println!("Restoring tags from: [{}]", file.display());
            let restorer = TagRestorer::from_file(&file, client)?;
            let restored = restorer.restore().await?;
            println!("Restored tags of {restored} resources");
        }
    }

    Ok(())
}

async fn discover(
    client: Arc<ArmClient>,
    resource_group: Option<&str>,
) -> Result<Vec<Resource>> {
    let scanner = ResourceScanner::new(client);
    let inventory = match resource_group {
        Some(group) => scanner.get_resources_by_group(group).await?,
        None => scanner.get_resources().await?,
    };
    Ok(inventory)
}

async fn handle_rewrite(
    client: Arc<ArmClient>,
    mapping: &Path,
    resource_group: Option<&str>,
    execute: bool,
    force_dry_run: bool,
    backup_dir: Option<&Path>,
) -> Result<()> {
    let rules = TagRules::from_file(mapping)?;

    // Explicit flags beat the document's dryrun; with neither, the document
    // decides, defaulting to dry-run.
    let dry_run = if execute {
        false
    } else if force_dry_run {
        true
    } else {
        rules.dryrun.unwrap_or(true)
    };

    if dry_run {
        println!("!! Running in a dry run mode");
        println!("!! No actions will be executed");
    }

    info!(
        mapping = %mapping.display(),
        resource_group = ?resource_group,
        dry_run,
        "Starting rewrite"
    );

    let inventory = discover(client.clone(), resource_group).await?;
    let mut engine = TagEngine::new(rules, client, dry_run);
    engine.evaluate_rules(&inventory);

    for matched in engine.matched().values() {
        let resource = &matched.resource;
        for rule in &matched.rules {
            println!(
                "Conditions of rule [{}] matched [{}] in [{}] with ID {}",
                rule.name,
                resource.name.as_deref().unwrap_or("-"),
                resource.resource_group.as_deref().unwrap_or("-"),
                resource.id
            );
        }
    }

    if engine.matched().is_empty() {
        println!("No resources matched your conditions");
        return Ok(());
    }

    let backup_file = backup::backup_matched(engine.matched(), backup_dir)?;
    println!("Backup saved in: {}", backup_file.display());

    println!("\nExecuting actions on matched resources");
    let executions = engine.execute_actions().await?;
    for execution in &executions {
        println!(
            "Rule [{}] on [{}]",
            execution.rule_name, execution.resource_id
        );
        for record in &execution.actions {
            let outcome = match record.outcome {
                ActionOutcome::Applied => "applied",
                ActionOutcome::Unchanged => "no change",
                ActionOutcome::WouldApply => "would apply",
            };
            println!("  Action: [{}] ({outcome})", record.action);
        }
    }

    Ok(())
}

fn print_inventory(inventory: &[Resource], format: &str) -> Result<()> {
    if inventory.is_empty() {
        println!("No resources found.");
        return Ok(());
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(inventory)?);
        return Ok(());
    }

    println!(
        "{:<50} {:<20} {:<15} {:<20} {:<5}",
        "ID", "NAME", "REGION", "GROUP", "TAGS"
    );
    println!("{}", "-".repeat(112));
    for resource in inventory {
        println!(
            "{:<50} {:<20} {:<15} {:<20} {:<5}",
            truncate(&resource.id, 49),
            truncate(resource.name.as_deref().unwrap_or("-"), 19),
            resource.region,
            resource.resource_group.as_deref().unwrap_or("-"),
            resource.tags.len(),
        );
    }
    println!("\nTotal: {} resources", inventory.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}
