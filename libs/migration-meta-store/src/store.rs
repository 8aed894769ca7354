// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! File-backed field storage
//!
//! Whole-field writes go to a temporary file in the job directory which is
//! synced and then renamed over the target, so a crash leaves either the old
//! or the new content. Partition files are only ever appended to. A torn
//! final line is dropped when the file is decoded, and cut off before the
//! next append so new lines never join it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use migration_types::JobIdentity;

use crate::codec::Field;
use crate::error::{MetaError, Result};
use crate::layout::JobLayout;

/// Prefix of in-flight temporary files inside a job directory.
pub const TEMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Clone)]
pub struct JobStore {
    layout: JobLayout,
}

impl JobStore {
    pub fn new(layout: JobLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &JobLayout {
        &self.layout
    }

    /// Atomically replace one field of a job.
    ///
    /// The job directory must already exist.
    pub fn write(&self, identity: &JobIdentity, field: Field, value: &str) -> Result<()> {
        let dir = self.layout.job_dir(identity)?;
        let path = dir.join(field.file_name());

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&dir)
            .map_err(MetaError::persistence(&dir))?;
        write_synced(&mut tmp, value).map_err(MetaError::persistence(tmp.path()))?;
        tmp.persist(&path)
            .map_err(|e| MetaError::persistence(&path)(e.error))?;

        debug!(job = %identity, field = %field, bytes = value.len(), "Wrote field");
        Ok(())
    }

    /// Append newline-terminated lines to a field, creating it if missing.
    ///
    /// An unterminated tail left by an earlier interrupted append is cut off
    /// first. `value` is written with a single `write_all` and synced before
    /// returning; if that fails the file is truncated back to where it was.
    pub fn append(&self, identity: &JobIdentity, field: Field, value: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        let path = self.layout.field_path(identity, field)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(MetaError::persistence(&path))?;

        let (len, complete) = complete_len(&mut file).map_err(MetaError::persistence(&path))?;
        if complete != len {
            warn!(
                job = %identity,
                field = %field,
                bytes = len - complete,
                "Truncating incomplete trailing line before append"
            );
            file.set_len(complete).map_err(MetaError::persistence(&path))?;
        }

        if let Err(e) = file.write_all(value.as_bytes()).and_then(|()| file.sync_all()) {
            if let Err(undo) = file.set_len(complete) {
                warn!(job = %identity, field = %field, error = %undo, "Failed to undo partial append");
            }
            return Err(MetaError::persistence(&path)(e));
        }

        debug!(job = %identity, field = %field, bytes = value.len(), "Appended to field");
        Ok(())
    }

    /// Current content of a field.
    pub fn read(&self, identity: &JobIdentity, field: Field) -> Result<String> {
        self.read_optional(identity, field)?
            .ok_or_else(|| MetaError::FieldNotFound {
                identity: identity.clone(),
                field,
            })
    }

    /// Like [`JobStore::read`] but a missing field is `Ok(None)`.
    pub fn read_optional(&self, identity: &JobIdentity, field: Field) -> Result<Option<String>> {
        let path = self.layout.field_path(identity, field)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MetaError::persistence(&path)(e)),
        }
    }

    pub fn exists(&self, identity: &JobIdentity, field: Field) -> Result<bool> {
        let path = self.layout.field_path(identity, field)?;
        path.try_exists().map_err(MetaError::persistence(&path))
    }

    /// Delete one field. Missing is not an error.
    pub fn remove(&self, identity: &JobIdentity, field: Field) -> Result<()> {
        let path = self.layout.field_path(identity, field)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MetaError::persistence(&path)(e)),
        }
    }

    /// Delete the job's whole directory subtree.
    pub fn remove_all(&self, identity: &JobIdentity) -> Result<()> {
        self.layout.remove_job_dir(identity)
    }

    /// Delete temporary files left in a job directory by an interrupted write.
    pub fn sweep_temp_files(&self, identity: &JobIdentity) -> Result<usize> {
        let dir = self.layout.job_dir(identity)?;
        let mut removed = 0;
        for entry in fs::read_dir(&dir).map_err(MetaError::persistence(&dir))? {
            let entry = entry.map_err(MetaError::persistence(&dir))?;
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                let path = entry.path();
                fs::remove_file(&path).map_err(MetaError::persistence(&path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Current length of `file` and the length up to and including its last
/// newline. The two differ only when the file ends in a torn line.
fn complete_len(file: &mut File) -> io::Result<(u64, u64)> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok((0, 0));
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok((len, len));
    }

    let mut content = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut content)?;
    let complete = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    Ok((len, complete as u64))
}

fn write_synced(tmp: &mut NamedTempFile, value: &str) -> io::Result<()> {
    tmp.write_all(value.as_bytes())?;
    tmp.as_file().sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, JobStore, JobIdentity) {
        let dir = tempdir().unwrap();
        let store = JobStore::new(JobLayout::new(dir.path()));
        let id = JobIdentity::new("test", "t1");
        store.layout().create_job_dir(&id).unwrap();
        (dir, store, id)
    }

    #[test]
    fn test_write_and_read() {
        let (dir, store, id) = setup();
        store.write(&id, Field::Metadata, "PENDING\n0").unwrap();
        assert_eq!(store.read(&id, Field::Metadata).unwrap(), "PENDING\n0");

        store.write(&id, Field::Metadata, "RUNNING\n0").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("test/t1/metadata")).unwrap(),
            "RUNNING\n0"
        );
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (dir, store, id) = setup();
        for i in 0..5 {
            store.write(&id, Field::Config, &format!("{{\"n\": {}}}", i)).unwrap();
        }
        let names: Vec<String> = fs::read_dir(dir.path().join("test/t1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["config".to_string()]);
    }

    #[test]
    fn test_read_missing_field() {
        let (_dir, store, id) = setup();
        let err = store.read(&id, Field::PartitionsFailed).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            MetaError::FieldNotFound {
                field: Field::PartitionsFailed,
                ..
            }
        ));
        assert_eq!(store.read_optional(&id, Field::Config).unwrap(), None);
    }

    #[test]
    fn test_append() {
        let (_dir, store, id) = setup();
        store.append(&id, Field::PartitionsAll, "p1\n").unwrap();
        store.append(&id, Field::PartitionsAll, "").unwrap();
        store.append(&id, Field::PartitionsAll, "p2\np3\n").unwrap();
        assert_eq!(
            store.read(&id, Field::PartitionsAll).unwrap(),
            "p1\np2\np3\n"
        );
    }

    #[test]
    fn test_append_cuts_off_torn_tail() {
        let (dir, store, id) = setup();
        let path = dir.path().join("test/t1/partitions_succeeded");
        fs::write(&path, "p1\nhal").unwrap();

        store.append(&id, Field::PartitionsSucceeded, "p2\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "p1\np2\n");

        fs::write(&path, "hello_wo").unwrap();
        store.append(&id, Field::PartitionsSucceeded, "hello_world\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello_world\n");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let store = JobStore::new(JobLayout::new(dir.path()));
        let id = JobIdentity::new("test", "never_created");
        let err = store.write(&id, Field::Metadata, "PENDING\n0").unwrap_err();
        assert!(matches!(err, MetaError::Persistence { .. }));
    }

    #[test]
    fn test_remove_and_remove_all() {
        let (dir, store, id) = setup();
        store.write(&id, Field::Metadata, "PENDING\n0").unwrap();
        store.remove(&id, Field::Metadata).unwrap();
        store.remove(&id, Field::Metadata).unwrap();
        assert!(!store.exists(&id, Field::Metadata).unwrap());

        store.remove_all(&id).unwrap();
        assert!(!dir.path().join("test/t1").exists());
    }

    #[test]
    fn test_sweep_temp_files() {
        let (dir, store, id) = setup();
        fs::write(dir.path().join("test/t1/.tmp-abc123"), "half").unwrap();
        store.write(&id, Field::Metadata, "PENDING\n0").unwrap();
        assert_eq!(store.sweep_temp_files(&id).unwrap(), 1);
        assert!(store.exists(&id, Field::Metadata).unwrap());
    }
}
