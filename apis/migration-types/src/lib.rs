// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Shared types for the table migration metadata store.
//!
//! This crate contains the data model shared by the metadata store, the
//! scheduler that consumes pending work, and the workers that report
//! migration outcomes back to the store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, VariantNames};

/// Retry limit used when a caller does not supply one.
pub const DEFAULT_RETRY_LIMIT: u32 = 1;

/// Partition group size used when a caller does not supply one.
pub const DEFAULT_PARTITION_GROUP_SIZE: u32 = 10;

// ============================================================================
// Identity
// ============================================================================

/// Identity of a migration job: one source table.
///
/// Names are kept exactly as given; `Sales` and `sales` are different jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobIdentity {
    /// Database / project the table lives in
    pub namespace: String,
    /// Table name
    pub table: String,
}

impl JobIdentity {
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.table)
    }
}

// ============================================================================
// Status
// ============================================================================

/// Job-level migration status.
///
/// The string forms (`PENDING`, `RUNNING`, ...) are what the store writes to
/// the first line of a job's `metadata` file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    VariantNames,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    /// Waiting to be dispatched
    Pending,
    /// Claimed by a worker
    Running,
    /// Migrated; restartable
    Succeeded,
    /// Retry budget exhausted; restartable
    Failed,
}

impl MigrationStatus {
    /// Terminal jobs are never dispatched again until restarted.
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationStatus::Succeeded | MigrationStatus::Failed)
    }
}

// ============================================================================
// Partitions
// ============================================================================

/// Values of every partition column for one partition, in column order.
///
/// Two keys are equal only if every value matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(pub Vec<String>);

impl PartitionKey {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for PartitionKey {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Per-job tunables supplied by whoever schedules the migration.
///
/// Attached to a job when it is added and replaced wholesale on restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalTableConfig {
    /// Only migrate partitions matching this filter expression
    pub partition_filter: Option<String>,
    /// Extra properties to set on the destination table
    pub table_properties: Option<BTreeMap<String, String>>,
    /// Batching hint for workers. Stored and returned as-is.
    pub partition_group_size: u32,
    /// Job-level failures tolerated before the job is marked FAILED
    pub retry_limit: u32,
}

impl Default for AdditionalTableConfig {
    fn default() -> Self {
        Self {
            partition_filter: None,
            table_properties: None,
            partition_group_size: DEFAULT_PARTITION_GROUP_SIZE,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

/// Configuration persisted with a job (the job's `config` file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Where the table is migrated to
    pub destination: JobIdentity,
    pub additional: AdditionalTableConfig,
}

/// A request to add (or restart) the migration of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMigrationConfig {
    pub source: JobIdentity,
    pub destination: JobIdentity,
    /// Partitions to migrate. When absent the source catalog is asked.
    #[serde(default)]
    pub partitions: Option<Vec<PartitionKey>>,
    #[serde(default)]
    pub additional: AdditionalTableConfig,
}

impl TableMigrationConfig {
    /// Migrate `source` to a table of the same name in the same namespace.
    pub fn same_name(source: JobIdentity, additional: AdditionalTableConfig) -> Self {
        Self {
            destination: source.clone(),
            source,
            partitions: None,
            additional,
        }
    }

    pub fn with_partitions(mut self, partitions: Vec<PartitionKey>) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn job_config(&self) -> JobConfig {
        JobConfig {
            destination: self.destination.clone(),
            additional: self.additional.clone(),
        }
    }
}

// ============================================================================
// Source catalog metadata
// ============================================================================

/// A column as reported by the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Source type name (e.g. "string", "bigint")
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            comment: None,
        }
    }
}

/// One partition as reported by the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub values: PartitionKey,
}

/// Table metadata as reported by the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub namespace: String,
    pub table: String,
    pub columns: Vec<ColumnMeta>,
    #[serde(default)]
    pub partition_columns: Vec<ColumnMeta>,
    #[serde(default)]
    pub partitions: Vec<PartitionMeta>,
}

impl TableMeta {
    pub fn is_partitioned(&self) -> bool {
        !self.partition_columns.is_empty()
    }

    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        self.partitions.iter().map(|p| p.values.clone()).collect()
    }
}

// ============================================================================
// Store views
// ============================================================================

/// A table with pending work, as handed to the scheduler.
///
/// Column metadata is read live from the source catalog; `partitions` holds
/// only partitions not yet confirmed migrated. Non-partitioned tables have an
/// empty `partition_columns` and `partitions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableView {
    pub source: JobIdentity,
    pub destination: JobIdentity,
    pub columns: Vec<ColumnMeta>,
    pub partition_columns: Vec<ColumnMeta>,
    pub partitions: Vec<PartitionKey>,
    pub config: AdditionalTableConfig,
}

/// Listing entry for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub identity: JobIdentity,
    pub status: MigrationStatus,
    pub retry_count: u32,
    pub total_partitions: usize,
    pub pending_partitions: usize,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_status_display_matches_metadata_file_format() {
        assert_eq!(MigrationStatus::Pending.to_string(), "PENDING");
        assert_eq!(MigrationStatus::Running.to_string(), "RUNNING");
        assert_eq!(MigrationStatus::Succeeded.to_string(), "SUCCEEDED");
        assert_eq!(MigrationStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_status_parses_its_own_display() {
        for status in MigrationStatus::iter() {
            let parsed = MigrationStatus::from_str(&status.to_string()).expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!(MigrationStatus::from_str("pending").is_err());
        assert!(MigrationStatus::from_str("DONE").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!MigrationStatus::Pending.is_terminal());
        assert!(!MigrationStatus::Running.is_terminal());
        assert!(MigrationStatus::Succeeded.is_terminal());
        assert!(MigrationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_identity_is_case_sensitive() {
        let upper = JobIdentity::new("test", "Sales");
        let lower = JobIdentity::new("test", "sales");
        assert_ne!(upper, lower);
        assert_eq!(upper.to_string(), "test.Sales");
    }

    #[test]
    fn test_partition_key_equality_is_full_sequence() {
        assert_eq!(PartitionKey::new(["a", "b"]), PartitionKey::new(["a", "b"]));
        assert_ne!(PartitionKey::new(["a", "b"]), PartitionKey::new(["b", "a"]));
        assert_ne!(PartitionKey::new(["a"]), PartitionKey::new(["a", "b"]));
        assert_eq!(PartitionKey::new(["2024", "01"]).to_string(), "2024/01");
    }

    #[test]
    fn test_additional_config_deserialization_uses_defaults() {
        let config: AdditionalTableConfig =
            serde_json::from_str(r#"{"retry_limit": 3}"#).expect("parse config");
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.partition_group_size, DEFAULT_PARTITION_GROUP_SIZE);
        assert!(config.partition_filter.is_none());
        assert!(config.table_properties.is_none());
    }

    #[test]
    fn test_table_meta_deserialization() {
        let json = r#"{
            "namespace": "test",
            "table": "test_partitioned",
            "columns": [{"name": "foo", "type": "string"}],
            "partition_columns": [{"name": "bar", "type": "string"}],
            "partitions": [{"values": ["hello_world"]}]
        }"#;
        let meta: TableMeta = serde_json::from_str(json).expect("parse table meta");
        assert!(meta.is_partitioned());
        assert_eq!(meta.columns[0].data_type, "string");
        assert_eq!(meta.partition_keys(), vec![PartitionKey::new(["hello_world"])]);
    }

    #[test]
    fn test_same_name_migration_config() {
        let source = JobIdentity::new("test", "t1");
        let config = TableMigrationConfig::same_name(source.clone(), Default::default())
            .with_partitions(vec![PartitionKey::new(["p1"])]);
        assert_eq!(config.destination, source);
        assert_eq!(config.job_config().destination, source);
        assert_eq!(config.partitions.as_ref().map(Vec::len), Some(1));
    }
}
