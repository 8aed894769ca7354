// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Source catalog port
//!
//! The store never talks to the source warehouse directly. It asks a
//! [`SourceCatalog`] for table names, columns and the current partition list,
//! both when a job is added and every time pending work is listed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use migration_types::{ColumnMeta, PartitionKey, PartitionMeta, TableMeta};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Namespace not found in source catalog: {0}")]
    NamespaceNotFound(String),
    #[error("Table not found in source catalog: {namespace}.{table}")]
    TableNotFound { namespace: String, table: String },
    #[error("Source catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the source catalog.
pub trait SourceCatalog: Send + Sync {
    /// Names of every table in `namespace`
    fn list_tables(&self, namespace: &str) -> Result<Vec<String>, CatalogError>;

    /// Columns, partition columns and current partitions of one table
    fn get_table_meta(&self, namespace: &str, table: &str) -> Result<TableMeta, CatalogError>;
}

/// Catalog held entirely in memory.
///
/// Tables are kept sorted by name within a namespace so `list_tables` is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    namespaces: BTreeMap<String, BTreeMap<String, TableMeta>>,
}

#[derive(Deserialize)]
struct CatalogFile {
    tables: Vec<TableMeta>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON document of the form `{"tables": [TableMeta, ...]}`.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        let mut catalog = Self::new();
        for table in file.tables {
            catalog.insert(table);
        }
        Ok(catalog)
    }

    /// Add or replace a table
    pub fn insert(&mut self, meta: TableMeta) {
        self.namespaces
            .entry(meta.namespace.clone())
            .or_default()
            .insert(meta.table.clone(), meta);
    }

    /// Add a non-partitioned table
    pub fn with_table(mut self, namespace: &str, table: &str, columns: Vec<ColumnMeta>) -> Self {
        self.insert(TableMeta {
            namespace: namespace.to_string(),
            table: table.to_string(),
            columns,
            partition_columns: Vec::new(),
            partitions: Vec::new(),
        });
        self
    }

    /// Add a partitioned table
    pub fn with_partitioned_table(
        mut self,
        namespace: &str,
        table: &str,
        columns: Vec<ColumnMeta>,
        partition_columns: Vec<ColumnMeta>,
        partitions: Vec<PartitionKey>,
    ) -> Self {
        self.insert(TableMeta {
            namespace: namespace.to_string(),
            table: table.to_string(),
            columns,
            partition_columns,
            partitions: partitions
                .into_iter()
                .map(|values| PartitionMeta { values })
                .collect(),
        });
        self
    }

    /// Append a partition to an existing table, as if it appeared upstream.
    pub fn add_partition(&mut self, namespace: &str, table: &str, key: PartitionKey) -> bool {
        match self
            .namespaces
            .get_mut(namespace)
            .and_then(|tables| tables.get_mut(table))
        {
            Some(meta) => {
                meta.partitions.push(PartitionMeta { values: key });
                true
            }
            None => false,
        }
    }
}

impl SourceCatalog for InMemoryCatalog {
    fn list_tables(&self, namespace: &str) -> Result<Vec<String>, CatalogError> {
        self.namespaces
            .get(namespace)
            .map(|tables| tables.keys().cloned().collect())
            .ok_or_else(|| CatalogError::NamespaceNotFound(namespace.to_string()))
    }

    fn get_table_meta(&self, namespace: &str, table: &str) -> Result<TableMeta, CatalogError> {
        self.namespaces
            .get(namespace)
            .and_then(|tables| tables.get(table))
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound {
                namespace: namespace.to_string(),
                table: table.to_string(),
            })
    }
}
