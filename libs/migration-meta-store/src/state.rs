// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Job-level status machine with a bounded retry budget
//!
//! ```text
//!   add / restart
//!        |
//!        v
//!     PENDING ------------> RUNNING
//!      |  ^                   |
//!      |  |  FAILED,          |
//!      |  |  budget left      |
//!      |  +-------------------+
//!      |                      |
//!      +----> SUCCEEDED <-----+
//!      |                      |
//!      +----> FAILED <--------+   FAILED, budget spent
//! ```
//!
//! A FAILED request always consumes one unit of the retry budget. While
//! `retry_count + 1 <= retry_limit` the job is transparently put back to
//! PENDING; once the budget is exceeded the job is stored as FAILED.

use migration_types::{JobConfig, JobIdentity, MigrationStatus};

use crate::error::{MetaError, Result};

/// Durable job-level state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub identity: JobIdentity,
    pub status: MigrationStatus,
    pub retry_count: u32,
    pub config: JobConfig,
}

impl JobRecord {
    /// A fresh job, as created by add or reset by restart.
    pub fn new(identity: JobIdentity, config: JobConfig) -> Self {
        Self {
            identity,
            status: MigrationStatus::Pending,
            retry_count: 0,
            config,
        }
    }

    /// The status and retry count that result from a status request.
    ///
    /// Requests matching the current terminal status are accepted as
    /// no-ops so repeated reports from a worker are harmless.
    pub fn transition(&self, requested: MigrationStatus) -> Result<(MigrationStatus, u32)> {
        use MigrationStatus::*;

        let current = self.status;
        match (current, requested) {
            (Pending, Running) => Ok((Running, self.retry_count)),
            (Pending | Running | Succeeded, Succeeded) => Ok((Succeeded, self.retry_count)),
            (Pending | Running, Failed) => {
                let retry_count = self.retry_count.saturating_add(1);
                if retry_count <= self.config.additional.retry_limit {
                    Ok((Pending, retry_count))
                } else {
                    Ok((Failed, retry_count))
                }
            }
            (Failed, Failed) => Ok((Failed, self.retry_count)),
            _ => Err(MetaError::InvalidTransition {
                identity: self.identity.clone(),
                current,
                requested,
            }),
        }
    }

    /// Apply [`JobRecord::transition`] to a copy of this record.
    pub fn with_status(&self, requested: MigrationStatus) -> Result<JobRecord> {
        let (status, retry_count) = self.transition(requested)?;
        Ok(JobRecord {
            status,
            retry_count,
            ..self.clone()
        })
    }
}
