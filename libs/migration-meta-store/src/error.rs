// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Errors returned by the metadata store

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use migration_types::{JobIdentity, MigrationStatus};

use crate::catalog::CatalogError;
use crate::codec::Field;

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Migration job not found: {0}")]
    JobNotFound(JobIdentity),

    #[error("{field} not found for migration job {identity}")]
    FieldNotFound { identity: JobIdentity, field: Field },

    #[error("Migration job {identity} already exists and is {status}")]
    AlreadyExists {
        identity: JobIdentity,
        status: MigrationStatus,
    },

    #[error("Migration job {identity} cannot move from {current} to {requested}")]
    InvalidTransition {
        identity: JobIdentity,
        current: MigrationStatus,
        requested: MigrationStatus,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Persistence failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl MetaError {
    /// True for both a missing job and a missing field of an existing job.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetaError::JobNotFound(_) | MetaError::FieldNotFound { .. }
        )
    }

    /// Adapter for `map_err` on I/O results touching `path`.
    pub(crate) fn persistence(path: &Path) -> impl FnOnce(io::Error) -> MetaError + '_ {
        move |source| MetaError::Persistence {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Content that could not be encoded or parsed.
    pub(crate) fn invalid_data(path: &Path, reason: impl Into<String>) -> MetaError {
        MetaError::Persistence {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, reason.into()),
        }
    }
}

pub type Result<T, E = MetaError> = std::result::Result<T, E>;
