// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration metadata administration CLI
//!
//! Operates directly on a metadata root: lists and inspects jobs, adds or
//! restarts them, and records job and partition outcomes by hand (for
//! example to unstick a job whose worker died).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use strum::VariantNames;
use tracing::debug;

use migration_meta_store::{InMemoryCatalog, MetaManager, StoreConfig};
use migration_types::{
    AdditionalTableConfig, DEFAULT_PARTITION_GROUP_SIZE, DEFAULT_RETRY_LIMIT, JobIdentity,
    MigrationStatus, PartitionKey, TableMigrationConfig,
};

#[derive(Parser)]
#[command(name = "migration-adm")]
#[command(about = "Table migration metadata utility", long_about = None)]
#[command(version)]
struct Cli {
    /// Metadata root directory
    #[arg(long, env = "MIGRATION_META_DIR")]
    meta_dir: Option<PathBuf>,

    /// JSON store configuration file
    #[arg(long, env = "MIGRATION_STORE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON source catalog file ({"tables": [...]})
    #[arg(long, env = "MIGRATION_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Job operations
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Partition operations
    Partition {
        #[command(subcommand)]
        action: PartitionAction,
    },

    /// List tables with pending work
    Pending {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// List all known migration jobs
    List,

    /// Show one job
    Status {
        /// Job as <namespace>.<table>
        #[arg(value_parser = parse_identity)]
        job: JobIdentity,
    },

    /// Add a migration job, or restart a finished one
    Add {
        /// Source table as <namespace>.<table>
        #[arg(value_parser = parse_identity)]
        job: JobIdentity,

        /// Destination table as <namespace>.<table> (defaults to the source)
        #[arg(long, value_parser = parse_identity)]
        dest: Option<JobIdentity>,

        /// Partition to migrate, values separated by '/' (repeatable).
        /// Without this the source catalog's partition list is used.
        #[arg(short, long = "partition", value_parser = parse_partition)]
        partitions: Vec<PartitionKey>,

        #[command(flatten)]
        additional: AdditionalArgs,
    },

    /// Add a job for every table in a namespace
    AddNamespace {
        /// Source namespace
        namespace: String,

        /// Destination namespace (defaults to the source)
        #[arg(long)]
        dest_namespace: Option<String>,

        #[command(flatten)]
        additional: AdditionalArgs,
    },

    /// Delete a job and all of its metadata
    Remove {
        #[arg(value_parser = parse_identity)]
        job: JobIdentity,
    },

    /// Record a job-level status
    Update {
        #[arg(value_parser = parse_identity)]
        job: JobIdentity,

        /// RUNNING, SUCCEEDED or FAILED
        #[arg(value_parser = parse_status)]
        status: MigrationStatus,
    },
}

#[derive(Subcommand)]
enum PartitionAction {
    /// Record the outcome of one or more partitions
    Update {
        #[arg(value_parser = parse_identity)]
        job: JobIdentity,

        /// SUCCEEDED or FAILED
        #[arg(value_parser = parse_status)]
        status: MigrationStatus,

        /// Partitions, values separated by '/'
        #[arg(required = true, value_parser = parse_partition)]
        partitions: Vec<PartitionKey>,
    },

    /// List partitions of a job not yet migrated
    Pending {
        #[arg(value_parser = parse_identity)]
        job: JobIdentity,
    },
}

#[derive(Args)]
struct AdditionalArgs {
    /// Job-level failures tolerated before the job is marked FAILED
    #[arg(long, default_value_t = DEFAULT_RETRY_LIMIT)]
    retry_limit: u32,

    /// Partitions handed to a worker at a time
    #[arg(long, default_value_t = DEFAULT_PARTITION_GROUP_SIZE)]
    partition_group_size: u32,

    /// Only migrate partitions matching this filter
    #[arg(long)]
    partition_filter: Option<String>,
}

impl AdditionalArgs {
    fn into_config(self) -> AdditionalTableConfig {
        AdditionalTableConfig {
            partition_filter: self.partition_filter,
            table_properties: None,
            partition_group_size: self.partition_group_size,
            retry_limit: self.retry_limit,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "migration_adm=info,migration_meta_store=info".to_string()),
        ))
        .init();

    let manager = open_manager(&cli)?;

    match cli.command {
        Commands::Job { action } => run_job(&manager, action),
        Commands::Partition { action } => run_partition(&manager, action),
        Commands::Pending { json } => print_pending(&manager, json),
    }
}

fn open_manager(cli: &Cli) -> Result<MetaManager> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::from_env(),
    };
    if let Some(dir) = &cli.meta_dir {
        config.meta_dir = dir.clone();
    }

    let catalog = match &cli.catalog {
        Some(path) => InMemoryCatalog::from_file(path)?,
        None => InMemoryCatalog::new(),
    };

    debug!(meta_dir = %config.meta_dir.display(), "Opening metadata store");
    MetaManager::open(&config, Arc::new(catalog)).with_context(|| {
        format!(
            "Failed to open metadata store at {}",
            config.meta_dir.display()
        )
    })
}

fn run_job(manager: &MetaManager, action: JobAction) -> Result<()> {
    match action {
        JobAction::List => {
            let jobs = manager.list_jobs();
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<40} {:<10} {:>7} {:>10} {:>8}",
                    "JOB", "STATUS", "RETRIES", "PARTITIONS", "PENDING"
                );
                println!("{}", "-".repeat(79));
                for job in jobs {
                    println!(
                        "{:<40} {:<10} {:>7} {:>10} {:>8}",
                        job.identity.to_string(),
                        job.status.to_string(),
                        job.retry_count,
                        job.total_partitions,
                        job.pending_partitions,
                    );
                }
            }
        }

        JobAction::Status { job } => {
            let record = manager
                .get_job(&job)
                .map_err(|e| anyhow!("Failed to get job '{}': {}", job, e))?;
            let pending = manager.get_pending_partitions(&job)?;
            let additional = &record.config.additional;

            println!("Job Status");
            println!("{}", "=".repeat(50));
            println!();
            println!("  Job:         {}", record.identity);
            println!("  Status:      {}", record.status);
            println!(
                "  Retries:     {} of {}",
                record.retry_count, additional.retry_limit
            );
            println!("  Destination: {}", record.config.destination);
            println!();

            println!("Configuration:");
            println!("{}", "-".repeat(50));
            println!("  Partition group size: {}", additional.partition_group_size);
            if let Some(filter) = &additional.partition_filter {
                println!("  Partition filter:     {}", filter);
            }
            println!();

            println!("Pending partitions: {}", pending.len());
        }

        JobAction::Add {
            job,
            dest,
            partitions,
            additional,
        } => {
            let request = TableMigrationConfig {
                destination: dest.unwrap_or_else(|| job.clone()),
                source: job.clone(),
                partitions: (!partitions.is_empty()).then_some(partitions),
                additional: additional.into_config(),
            };
            manager
                .add_migration_job(&request)
                .map_err(|e| anyhow!("Failed to add job '{}': {}", job, e))?;
            println!("Job added: {}", job);
        }

        JobAction::AddNamespace {
            namespace,
            dest_namespace,
            additional,
        } => {
            let dest = dest_namespace.unwrap_or_else(|| namespace.clone());
            let added = manager
                .add_migration_jobs(&namespace, &dest, &additional.into_config())
                .map_err(|e| anyhow!("Failed to add jobs for '{}': {}", namespace, e))?;
            for job in &added {
                println!("Job added: {}", job);
            }
            println!("{} job(s) added", added.len());
        }

        JobAction::Remove { job } => {
            manager
                .remove_migration_job(&job)
                .map_err(|e| anyhow!("Failed to remove job '{}': {}", job, e))?;
            println!("Job removed: {}", job);
        }

        JobAction::Update { job, status } => {
            let stored = manager
                .update_status(&job, status)
                .map_err(|e| anyhow!("Failed to update job '{}': {}", job, e))?;
            println!("{}: {}", job, stored);
        }
    }
    Ok(())
}

fn run_partition(manager: &MetaManager, action: PartitionAction) -> Result<()> {
    match action {
        PartitionAction::Update {
            job,
            status,
            partitions,
        } => {
            manager
                .update_partition_status(&job, &partitions, status)
                .map_err(|e| anyhow!("Failed to update partitions of '{}': {}", job, e))?;
            println!("{} partition(s) of {} marked {}", partitions.len(), job, status);
        }

        PartitionAction::Pending { job } => {
            let pending = manager
                .get_pending_partitions(&job)
                .map_err(|e| anyhow!("Failed to get job '{}': {}", job, e))?;
            if pending.is_empty() {
                println!("No pending partitions.");
            }
            for key in pending {
                println!("{}", key);
            }
        }
    }
    Ok(())
}

fn print_pending(manager: &MetaManager, json: bool) -> Result<()> {
    let mut views = manager.get_pending_tables();
    views.sort_by(|a, b| a.source.cmp(&b.source));

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No pending tables.");
        return Ok(());
    }
    println!("{:<40} {:<40} {:>8}", "SOURCE", "DESTINATION", "PENDING");
    println!("{}", "-".repeat(90));
    for view in views {
        println!(
            "{:<40} {:<40} {:>8}",
            view.source.to_string(),
            view.destination.to_string(),
            view.partitions.len(),
        );
    }
    Ok(())
}

fn parse_identity(s: &str) -> Result<JobIdentity, String> {
    match s.split_once('.') {
        Some((namespace, table)) if !namespace.is_empty() && !table.is_empty() => {
            Ok(JobIdentity::new(namespace, table))
        }
        _ => Err(format!("expected <namespace>.<table>, got '{}'", s)),
    }
}

fn parse_status(s: &str) -> Result<MigrationStatus, String> {
    s.to_uppercase()
        .parse()
        .map_err(|_| {
            format!(
                "unknown status '{}', expected one of {}",
                s,
                MigrationStatus::VARIANTS.join(", ")
            )
        })
}

fn parse_partition(s: &str) -> Result<PartitionKey, String> {
    if s.is_empty() {
        return Err("partition must not be empty".to_string());
    }
    Ok(PartitionKey::new(s.split('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_parsing() {
        assert_eq!(
            parse_identity("sales.orders").unwrap(),
            JobIdentity::new("sales", "orders")
        );
        // Only the first dot separates
        assert_eq!(
            parse_identity("sales.orders.v2").unwrap(),
            JobIdentity::new("sales", "orders.v2")
        );
        for bad in ["orders", ".orders", "sales.", ""] {
            assert!(parse_identity(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn status_parsing_ignores_case() {
        assert_eq!(parse_status("failed").unwrap(), MigrationStatus::Failed);
        assert_eq!(parse_status("SUCCEEDED").unwrap(), MigrationStatus::Succeeded);
        assert!(parse_status("done").is_err());
    }

    #[test]
    fn partition_parsing() {
        assert_eq!(
            parse_partition("2024/01").unwrap(),
            PartitionKey::new(["2024", "01"])
        );
        assert_eq!(parse_partition("x").unwrap(), PartitionKey::new(["x"]));
        assert!(parse_partition("").is_err());
    }
}
