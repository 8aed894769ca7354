// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Metadata store configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default root directory for job metadata
const DEFAULT_META_DIR: &str = "/var/tmp/migration-meta";

/// Store configuration loaded from environment variables or a JSON file
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the `<namespace>/<table>` job directory tree
    pub meta_dir: PathBuf,

    /// Put jobs found RUNNING at startup back to PENDING
    ///
    /// A job can only be RUNNING on disk at startup if the previous process
    /// died while a worker held it, so nobody will ever report its outcome.
    /// Requeueing does not consume retry budget.
    pub requeue_running_on_recovery: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            meta_dir: PathBuf::from(DEFAULT_META_DIR),
            requeue_running_on_recovery: true,
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at `meta_dir` with every other setting defaulted
    pub fn new(meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta_dir: meta_dir.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let meta_dir = std::env::var("MIGRATION_META_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_META_DIR));

        // Accepts "true", "1", "yes" (case-insensitive) as true
        let requeue_running_on_recovery = std::env::var("MIGRATION_REQUEUE_RUNNING")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Self {
            meta_dir,
            requeue_running_on_recovery,
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: `from_env()` is not tested directly; `std::env::set_var` is
    // `unsafe` in Rust 2024 because of races with other test threads.

    #[test]
    fn default_config_has_sensible_values() {
        let config = StoreConfig::default();
        assert_eq!(config.meta_dir, PathBuf::from("/var/tmp/migration-meta"));
        assert!(config.requeue_running_on_recovery);
    }

    #[test]
    fn json_deserialization_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"meta_dir": "/data/meta"}"#).unwrap();
        assert_eq!(config.meta_dir, PathBuf::from("/data/meta"));
        assert!(config.requeue_running_on_recovery);

        let config: StoreConfig =
            serde_json::from_str(r#"{"requeue_running_on_recovery": false}"#).unwrap();
        assert_eq!(config.meta_dir, PathBuf::from(DEFAULT_META_DIR));
        assert!(!config.requeue_running_on_recovery);
    }

    #[test]
    fn from_file_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        std::fs::write(&path, "{ nope").unwrap();
        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        std::fs::write(&path, r#"{"meta_dir": "/x"}"#).unwrap();
        assert_eq!(StoreConfig::from_file(&path).unwrap(), StoreConfig::new("/x"));
    }

    #[test]
    fn flag_parsing() {
        for v in ["true", "TRUE", "1", "yes", " Yes "] {
            assert!(parse_flag(v), "{}", v);
        }
        for v in ["false", "0", "no", ""] {
            assert!(!parse_flag(v), "{}", v);
        }
    }
}
