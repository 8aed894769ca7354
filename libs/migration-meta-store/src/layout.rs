// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! On-disk layout of the metadata root
//!
//! ```text
//! <root>/<namespace>/<table>/{metadata,config,partitions_*}
//! ```
//!
//! The path of a job is derived from its identity alone, so no index file is
//! needed to find it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use migration_types::JobIdentity;

use crate::codec::Field;
use crate::error::{MetaError, Result};

#[derive(Debug, Clone)]
pub struct JobLayout {
    root: PathBuf,
}

impl JobLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every file of one job.
    pub fn job_dir(&self, identity: &JobIdentity) -> Result<PathBuf> {
        validate_component("namespace", &identity.namespace)?;
        validate_component("table", &identity.table)?;
        Ok(self.root.join(&identity.namespace).join(&identity.table))
    }

    pub fn field_path(&self, identity: &JobIdentity, field: Field) -> Result<PathBuf> {
        Ok(self.job_dir(identity)?.join(field.file_name()))
    }

    /// Create the job directory (and its namespace directory) if missing.
    pub fn create_job_dir(&self, identity: &JobIdentity) -> Result<PathBuf> {
        let dir = self.job_dir(identity)?;
        fs::create_dir_all(&dir).map_err(MetaError::persistence(&dir))?;
        Ok(dir)
    }

    /// Delete the job directory tree, then the namespace directory if that
    /// left it empty. A job directory that is already gone is not an error.
    pub fn remove_job_dir(&self, identity: &JobIdentity) -> Result<()> {
        let dir = self.job_dir(identity)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(MetaError::persistence(&dir)(e)),
        }

        let ns_dir = self.root.join(&identity.namespace);
        if let Ok(mut entries) = fs::read_dir(&ns_dir) {
            if entries.next().is_none() {
                // Another job may be created here concurrently; losing that
                // race just means the directory is kept.
                let _ = fs::remove_dir(&ns_dir);
            }
        }
        Ok(())
    }

    /// Every `<namespace>/<table>` directory under the root.
    ///
    /// Entries that are not directories, or whose names are not valid UTF-8,
    /// are skipped with a warning. Whether a directory holds a committed job
    /// is for the caller to decide.
    pub fn scan(&self) -> Result<Vec<JobIdentity>> {
        let mut found = Vec::new();
        for namespace in list_dirs(&self.root)? {
            let ns_dir = self.root.join(&namespace);
            for table in list_dirs(&ns_dir)? {
                found.push(JobIdentity::new(namespace.clone(), table));
            }
        }
        found.sort();
        Ok(found)
    }
}

fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MetaError::persistence(dir)(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(MetaError::persistence(dir))?;
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .map_err(MetaError::persistence(&path))?
            .is_dir();
        if !is_dir {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if validate_component("directory", &name).is_ok() => names.push(name),
            _ => warn!(path = %path.display(), "Skipping unrecognised directory"),
        }
    }
    Ok(names)
}

fn validate_component(kind: &str, name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(MetaError::InvalidArgument(format!(
            "{} name {:?} cannot be used as a directory name",
            kind, name
        )));
    }
    Ok(())
}
