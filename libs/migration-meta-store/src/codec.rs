// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Text encodings of the per-job files
//!
//! Every job directory holds five plain-text files:
//!
//! - `metadata`: status name and retry count on two lines, no trailing newline
//! - `config`: JSON of [`JobConfig`]
//! - `partitions_all`, `partitions_succeeded`, `partitions_failed`: one
//!   partition key per line, values joined by [`VALUE_DELIMITER`], every line
//!   terminated by `\n`
//!
//! This module only converts between those texts and typed values; reading
//! and writing the files is done by [`crate::store`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use migration_types::{JobConfig, MigrationStatus, PartitionKey};

use crate::error::{MetaError, Result};

/// Separates the values of a multi-column partition key on one line.
pub const VALUE_DELIMITER: char = '\t';

/// The files a job directory is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Metadata,
    Config,
    PartitionsAll,
    PartitionsSucceeded,
    PartitionsFailed,
}

impl Field {
    pub fn file_name(self) -> &'static str {
        match self {
            Field::Metadata => "metadata",
            Field::Config => "config",
            Field::PartitionsAll => "partitions_all",
            Field::PartitionsSucceeded => "partitions_succeeded",
            Field::PartitionsFailed => "partitions_failed",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

// ============================================================================
// metadata
// ============================================================================

pub fn encode_status(status: MigrationStatus, retry_count: u32) -> String {
    format!("{}\n{}", status, retry_count)
}

pub fn decode_status(path: &Path, content: &str) -> Result<(MigrationStatus, u32)> {
    let mut lines = content.trim_end_matches(['\n', '\r']).split('\n');

    let status_line = lines.next().unwrap_or_default().trim_end_matches('\r');
    let status = MigrationStatus::from_str(status_line)
        .map_err(|_| MetaError::invalid_data(path, format!("unknown status '{}'", status_line)))?;

    let count_line = lines
        .next()
        .ok_or_else(|| MetaError::invalid_data(path, "missing retry count line"))?
        .trim_end_matches('\r');
    let retry_count = count_line
        .parse::<u32>()
        .map_err(|e| MetaError::invalid_data(path, format!("bad retry count '{}': {}", count_line, e)))?;

    if lines.next().is_some() {
        return Err(MetaError::invalid_data(path, "unexpected extra lines"));
    }

    Ok((status, retry_count))
}

// ============================================================================
// config
// ============================================================================

pub fn encode_config(path: &Path, config: &JobConfig) -> Result<String> {
    serde_json::to_string_pretty(config).map_err(|e| MetaError::invalid_data(path, e.to_string()))
}

pub fn decode_config(path: &Path, content: &str) -> Result<JobConfig> {
    serde_json::from_str(content).map_err(|e| MetaError::invalid_data(path, e.to_string()))
}

// ============================================================================
// partition sets
// ============================================================================

/// Reject keys that cannot be written as a single line.
pub fn validate_partition_key(key: &PartitionKey) -> Result<()> {
    if key.is_empty() {
        return Err(MetaError::InvalidArgument(
            "partition key must have at least one value".to_string(),
        ));
    }
    for value in key.values() {
        if value.contains([VALUE_DELIMITER, '\n', '\r']) {
            return Err(MetaError::InvalidArgument(format!(
                "partition value {:?} contains a tab or line break",
                value
            )));
        }
    }
    Ok(())
}

/// Encode keys as newline-terminated lines, ready to be appended.
pub fn encode_partition_lines<'a, I>(keys: I) -> String
where
    I: IntoIterator<Item = &'a PartitionKey>,
{
    let mut out = String::new();
    for key in keys {
        let mut first = true;
        for value in key.values() {
            if !first {
                out.push(VALUE_DELIMITER);
            }
            out.push_str(value);
            first = false;
        }
        out.push('\n');
    }
    out
}

/// Decoded contents of a partition file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DecodedPartitions {
    /// Keys in file order, duplicates included
    pub keys: Vec<PartitionKey>,
    /// Bytes after the last newline; left behind by an interrupted append
    pub torn_tail: Option<String>,
}

/// Split a partition file into keys.
///
/// Empty lines are kept (a key whose only value is the empty string). A
/// trailing segment with no terminating newline is reported separately
/// instead of being decoded.
pub fn decode_partition_lines(content: &str) -> DecodedPartitions {
    let mut decoded = DecodedPartitions::default();
    for line in content.split_inclusive('\n') {
        match line.strip_suffix('\n') {
            Some(line) => decoded
                .keys
                .push(PartitionKey::new(line.split(VALUE_DELIMITER))),
            None => decoded.torn_tail = Some(line.to_string()),
        }
    }
    decoded
}
