// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration job metadata manager
//!
//! [`MetaManager`] is the only entry point schedulers and workers use. It
//! owns the on-disk job tree and an in-memory index of every job, and it
//! serializes all mutations of one job behind that job's own lock:
//!
//! 1. take the job lock
//! 2. read the cached job from the index
//! 3. compute the new state
//! 4. persist it (the `metadata` file is always written last)
//! 5. publish the new state to the index
//!
//! If step 4 fails the index is left untouched. Jobs with different
//! identities never wait on each other, and [`MetaManager::get_pending_tables`]
//! works from a snapshot of the index without holding any job lock.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use tracing::{debug, info, warn};

use migration_types::{
    AdditionalTableConfig, JobConfig, JobIdentity, JobSummary, MigrationStatus, PartitionKey,
    TableMeta, TableMigrationConfig, TableView,
};

use crate::catalog::SourceCatalog;
use crate::codec::{self, Field};
use crate::config::StoreConfig;
use crate::error::{MetaError, Result};
use crate::layout::JobLayout;
use crate::partitions::{self, KeySet, PartitionSets};
use crate::state::JobRecord;
use crate::store::JobStore;

/// Index entry: everything known about one job.
#[derive(Debug, Clone)]
struct CachedJob {
    record: JobRecord,
    partitions: Arc<PartitionSets>,
}

pub struct MetaManager {
    store: JobStore,
    catalog: Arc<dyn SourceCatalog>,
    index: RwLock<HashMap<JobIdentity, Arc<CachedJob>>>,
    // Entries are never removed: a waiter may still hold the handle of a
    // removed job, and a fresh lock for the same identity would not exclude it.
    locks: Mutex<HashMap<JobIdentity, Arc<Mutex<()>>>>,
}

impl fmt::Debug for MetaManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaManager")
            .field("root", &self.root())
            .field("jobs", &read_lock(&self.index).len())
            .finish_non_exhaustive()
    }
}

impl MetaManager {
    /// Open the store rooted at `config.meta_dir`, creating it if needed, and
    /// rebuild the index from disk.
    pub fn open(config: &StoreConfig, catalog: Arc<dyn SourceCatalog>) -> Result<Self> {
        fs::create_dir_all(&config.meta_dir).map_err(MetaError::persistence(&config.meta_dir))?;

        let manager = Self {
            store: JobStore::new(JobLayout::new(&config.meta_dir)),
            catalog,
            index: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        };
        manager.recover(config.requeue_running_on_recovery)?;
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        self.store.layout().root()
    }

    // ------------------------------------------------------------------------
    // Job lifecycle
    // ------------------------------------------------------------------------

    /// Add a migration job, or restart a job that already finished.
    ///
    /// A new job takes its partitions from `request.partitions` if given,
    /// otherwise from the source catalog. Restarting a SUCCEEDED or FAILED
    /// job resets it to PENDING with a zero retry count and the new
    /// configuration; the given (or freshly listed) partitions are added to
    /// the partitions already known, and the succeeded/failed sets are kept.
    /// A job that is PENDING or RUNNING cannot be added again.
    pub fn add_migration_job(&self, request: &TableMigrationConfig) -> Result<()> {
        let identity = &request.source;
        self.store.layout().job_dir(identity)?;
        if let Some(partitions) = &request.partitions {
            for key in partitions {
                codec::validate_partition_key(key)?;
            }
        }

        self.with_job_lock(identity, || match self.cached(identity) {
            None => self.create_job(request),
            Some(job) if !job.record.status.is_terminal() => Err(MetaError::AlreadyExists {
                identity: identity.clone(),
                status: job.record.status,
            }),
            Some(job) => self.restart_job(&job, request),
        })
    }

    /// Add a job for every table the source catalog lists in `namespace`.
    ///
    /// Each table is migrated to a table of the same name in
    /// `dest_namespace`. Tables whose job is still PENDING or RUNNING are
    /// skipped. Returns the jobs that were added or restarted.
    pub fn add_migration_jobs(
        &self,
        namespace: &str,
        dest_namespace: &str,
        additional: &AdditionalTableConfig,
    ) -> Result<Vec<JobIdentity>> {
        let tables = self.catalog.list_tables(namespace)?;
        let mut added = Vec::with_capacity(tables.len());

        for table in tables {
            let request = TableMigrationConfig {
                source: JobIdentity::new(namespace, table.as_str()),
                destination: JobIdentity::new(dest_namespace, table.as_str()),
                partitions: None,
                additional: additional.clone(),
            };
            match self.add_migration_job(&request) {
                Ok(()) => added.push(request.source),
                Err(MetaError::AlreadyExists { identity, status }) => {
                    info!(job = %identity, status = %status, "Job already active, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// Delete a job and everything persisted for it.
    ///
    /// Fails with [`MetaError::JobNotFound`] if there is no such job.
    pub fn remove_migration_job(&self, identity: &JobIdentity) -> Result<()> {
        self.require(identity)?;
        self.with_job_lock(identity, || {
            if self.cached(identity).is_none() {
                return Err(MetaError::JobNotFound(identity.clone()));
            }

            // Without its metadata file the directory is no longer a job,
            // even if deleting the rest fails below.
            self.store.remove(identity, Field::Metadata)?;
            write_lock(&self.index).remove(identity);
            self.store.remove_all(identity)?;

            info!(job = %identity, "Removed migration job");
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Status updates
    // ------------------------------------------------------------------------

    /// Report a job-level outcome.
    ///
    /// Returns the status actually stored, which differs from `requested`
    /// when a FAILED report is turned into a retry (PENDING).
    pub fn update_status(
        &self,
        identity: &JobIdentity,
        requested: MigrationStatus,
    ) -> Result<MigrationStatus> {
        self.require(identity)?;
        self.with_job_lock(identity, || {
            let job = self.require(identity)?;
            let record = job.record.with_status(requested)?;
            if record == job.record {
                debug!(job = %identity, status = %record.status, "Status unchanged");
                return Ok(record.status);
            }

            self.store.write(
                identity,
                Field::Metadata,
                &codec::encode_status(record.status, record.retry_count),
            )?;

            info!(
                job = %identity,
                requested = %requested,
                status = %record.status,
                retry_count = record.retry_count,
                retry_limit = record.config.additional.retry_limit,
                "Updated job status"
            );

            let status = record.status;
            self.publish(CachedJob {
                record,
                partitions: Arc::clone(&job.partitions),
            });
            Ok(status)
        })
    }

    /// Record partition-level outcomes without touching the job status.
    ///
    /// `status` must be SUCCEEDED or FAILED. Keys already recorded with that
    /// status are ignored. Keys the job does not know about are recorded
    /// anyway, with a warning.
    pub fn update_partition_status(
        &self,
        identity: &JobIdentity,
        keys: &[PartitionKey],
        status: MigrationStatus,
    ) -> Result<()> {
        let field = match status {
            MigrationStatus::Succeeded => Field::PartitionsSucceeded,
            MigrationStatus::Failed => Field::PartitionsFailed,
            other => {
                return Err(MetaError::InvalidArgument(format!(
                    "partition status must be SUCCEEDED or FAILED, got {}",
                    other
                )));
            }
        };
        for key in keys {
            codec::validate_partition_key(key)?;
        }

        self.require(identity)?;
        self.with_job_lock(identity, || {
            let job = self.require(identity)?;

            let unknown = job.partitions.unknown(keys);
            if !unknown.is_empty() {
                warn!(
                    job = %identity,
                    count = unknown.len(),
                    first = %unknown[0],
                    "Recording status for partitions the job does not know about"
                );
            }

            let target = match field {
                Field::PartitionsSucceeded => &job.partitions.succeeded,
                _ => &job.partitions.failed,
            };
            let new_keys = partitions::missing(target, keys);
            if new_keys.is_empty() {
                return Ok(());
            }

            self.store
                .append(identity, field, &codec::encode_partition_lines(&new_keys))?;

            let mut partitions = PartitionSets::clone(&job.partitions);
            let count = new_keys.len();
            match field {
                Field::PartitionsSucceeded => partitions.succeeded.extend(new_keys),
                _ => partitions.failed.extend(new_keys),
            }

            info!(job = %identity, status = %status, count, "Updated partition status");
            self.publish(CachedJob {
                record: job.record.clone(),
                partitions: Arc::new(partitions),
            });
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn get_status(&self, identity: &JobIdentity) -> Result<MigrationStatus> {
        Ok(self.require(identity)?.record.status)
    }

    pub fn get_job(&self, identity: &JobIdentity) -> Result<JobRecord> {
        Ok(self.require(identity)?.record.clone())
    }

    pub fn get_config(&self, identity: &JobIdentity) -> Result<JobConfig> {
        Ok(self.require(identity)?.record.config.clone())
    }

    /// Partitions of the job not yet confirmed migrated, in the order they
    /// became known.
    pub fn get_pending_partitions(&self, identity: &JobIdentity) -> Result<Vec<PartitionKey>> {
        Ok(self.require(identity)?.partitions.pending())
    }

    /// Every job, sorted by identity.
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        let mut jobs: Vec<JobSummary> = self
            .snapshot()
            .into_iter()
            .map(|job| JobSummary {
                identity: job.record.identity.clone(),
                status: job.record.status,
                retry_count: job.record.retry_count,
                total_partitions: job.partitions.all.len(),
                pending_partitions: job.partitions.pending_count(),
            })
            .collect();
        jobs.sort_by(|a, b| a.identity.cmp(&b.identity));
        jobs
    }

    /// Tables with pending work, in no particular order.
    ///
    /// Column metadata is read from the source catalog at call time. A job
    /// whose catalog lookup fails is left out of this round (with a warning)
    /// rather than reported with guessed metadata.
    pub fn get_pending_tables(&self) -> Vec<TableView> {
        let pending: Vec<Arc<CachedJob>> = self
            .snapshot()
            .into_iter()
            .filter(|job| job.record.status == MigrationStatus::Pending)
            .collect();

        let mut views = Vec::with_capacity(pending.len());
        for job in pending {
            let identity = &job.record.identity;
            match self
                .catalog
                .get_table_meta(&identity.namespace, &identity.table)
            {
                Ok(meta) => {
                    // A table that is no longer partitioned is migrated whole.
                    let partitions = if meta.is_partitioned() {
                        job.partitions.pending()
                    } else {
                        Vec::new()
                    };
                    views.push(TableView {
                        source: identity.clone(),
                        destination: job.record.config.destination.clone(),
                        columns: meta.columns,
                        partition_columns: meta.partition_columns,
                        partitions,
                        config: job.record.config.additional.clone(),
                    });
                }
                Err(e) => {
                    warn!(job = %identity, error = %e, "Skipping pending job, catalog lookup failed");
                }
            }
        }
        views
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn create_job(&self, request: &TableMigrationConfig) -> Result<()> {
        let identity = &request.source;
        let meta = self
            .catalog
            .get_table_meta(&identity.namespace, &identity.table)?;

        let all = match &request.partitions {
            Some(explicit) => {
                check_explicit_partitions(identity, &meta, explicit)?;
                explicit.clone()
            }
            None => catalog_partitions(&meta)?,
        };
        let partitions = PartitionSets::new(all);
        let record = JobRecord::new(identity.clone(), request.job_config());

        let dir = self.store.layout().create_job_dir(identity)?;
        let config = codec::encode_config(&dir.join(Field::Config.file_name()), &record.config)?;
        self.store.write(identity, Field::Config, &config)?;
        self.store.write(
            identity,
            Field::PartitionsAll,
            &codec::encode_partition_lines(partitions.all.iter()),
        )?;
        self.store.write(identity, Field::PartitionsSucceeded, "")?;
        self.store.write(identity, Field::PartitionsFailed, "")?;
        self.store.write(
            identity,
            Field::Metadata,
            &codec::encode_status(record.status, record.retry_count),
        )?;

        info!(
            job = %identity,
            destination = %record.config.destination,
            partitions = partitions.all.len(),
            retry_limit = record.config.additional.retry_limit,
            "Added migration job"
        );
        self.publish(CachedJob {
            record,
            partitions: Arc::new(partitions),
        });
        Ok(())
    }

    fn restart_job(&self, job: &CachedJob, request: &TableMigrationConfig) -> Result<()> {
        let identity = &request.source;
        let meta = self
            .catalog
            .get_table_meta(&identity.namespace, &identity.table)?;
        let offered = match &request.partitions {
            Some(explicit) => {
                check_explicit_partitions(identity, &meta, explicit)?;
                explicit.clone()
            }
            None => catalog_partitions(&meta)?,
        };
        let new_keys = partitions::missing(&job.partitions.all, &offered);
        let record = JobRecord::new(identity.clone(), request.job_config());

        let config_path = self.store.layout().field_path(identity, Field::Config)?;
        let config = codec::encode_config(&config_path, &record.config)?;
        self.store.write(identity, Field::Config, &config)?;
        self.store.append(
            identity,
            Field::PartitionsAll,
            &codec::encode_partition_lines(&new_keys),
        )?;
        self.store.write(
            identity,
            Field::Metadata,
            &codec::encode_status(record.status, record.retry_count),
        )?;

        info!(
            job = %identity,
            previous_status = %job.record.status,
            new_partitions = new_keys.len(),
            "Restarted migration job"
        );

        let mut partitions = PartitionSets::clone(&job.partitions);
        partitions.all.extend(new_keys);
        self.publish(CachedJob {
            record,
            partitions: Arc::new(partitions),
        });
        Ok(())
    }

    /// Rebuild the index from the job tree.
    ///
    /// Directories without a `metadata` file were never committed (the
    /// process died while creating them) and are deleted.
    fn recover(&self, requeue_running: bool) -> Result<()> {
        let mut recovered = 0;
        let mut requeued = 0;

        for identity in self.store.layout().scan()? {
            let swept = self.store.sweep_temp_files(&identity)?;
            if swept > 0 {
                debug!(job = %identity, files = swept, "Removed leftover temporary files");
            }

            let Some(mut job) = self.load_job(&identity)? else {
                warn!(job = %identity, "Removing uncommitted job directory");
                self.store.remove_all(&identity)?;
                continue;
            };

            if requeue_running && job.record.status == MigrationStatus::Running {
                job.record.status = MigrationStatus::Pending;
                self.store.write(
                    &identity,
                    Field::Metadata,
                    &codec::encode_status(job.record.status, job.record.retry_count),
                )?;
                info!(job = %identity, "Requeued job left RUNNING by a previous process");
                requeued += 1;
            }

            self.publish(job);
            recovered += 1;
        }

        info!(
            root = %self.root().display(),
            jobs = recovered,
            requeued,
            "Recovered migration jobs"
        );
        Ok(())
    }

    fn load_job(&self, identity: &JobIdentity) -> Result<Option<CachedJob>> {
        let layout = self.store.layout();
        let Some(metadata) = self.store.read_optional(identity, Field::Metadata)? else {
            return Ok(None);
        };
        let (status, retry_count) =
            codec::decode_status(&layout.field_path(identity, Field::Metadata)?, &metadata)?;
        let config = codec::decode_config(
            &layout.field_path(identity, Field::Config)?,
            &self.store.read(identity, Field::Config)?,
        )?;

        let partitions = PartitionSets {
            all: self.load_partitions(identity, Field::PartitionsAll)?,
            succeeded: self.load_partitions(identity, Field::PartitionsSucceeded)?,
            failed: self.load_partitions(identity, Field::PartitionsFailed)?,
        };

        Ok(Some(CachedJob {
            record: JobRecord {
                identity: identity.clone(),
                status,
                retry_count,
                config,
            },
            partitions: Arc::new(partitions),
        }))
    }

    /// Read a partition file, repairing it if the last append was torn.
    fn load_partitions(&self, identity: &JobIdentity, field: Field) -> Result<KeySet> {
        let decoded = codec::decode_partition_lines(&self.store.read(identity, field)?);
        let keys: KeySet = decoded.keys.into_iter().collect();

        if let Some(tail) = decoded.torn_tail {
            warn!(
                job = %identity,
                field = %field,
                tail = %tail,
                "Dropping incomplete trailing line"
            );
            self.store
                .write(identity, field, &codec::encode_partition_lines(keys.iter()))?;
        }
        Ok(keys)
    }

    fn with_job_lock<T>(&self, identity: &JobIdentity, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let handle = {
            let mut locks = lock(&self.locks);
            Arc::clone(locks.entry(identity.clone()).or_default())
        };
        let _guard = lock(&*handle);
        f()
    }

    fn cached(&self, identity: &JobIdentity) -> Option<Arc<CachedJob>> {
        read_lock(&self.index).get(identity).cloned()
    }

    fn require(&self, identity: &JobIdentity) -> Result<Arc<CachedJob>> {
        self.cached(identity)
            .ok_or_else(|| MetaError::JobNotFound(identity.clone()))
    }

    fn snapshot(&self) -> Vec<Arc<CachedJob>> {
        read_lock(&self.index).values().cloned().collect()
    }

    fn publish(&self, job: CachedJob) {
        write_lock(&self.index).insert(job.record.identity.clone(), Arc::new(job));
    }
}

fn catalog_partitions(meta: &TableMeta) -> Result<Vec<PartitionKey>> {
    let keys = meta.partition_keys();
    for key in &keys {
        codec::validate_partition_key(key)?;
    }
    Ok(keys)
}

fn check_explicit_partitions(
    identity: &JobIdentity,
    meta: &TableMeta,
    explicit: &[PartitionKey],
) -> Result<()> {
    if explicit.is_empty() {
        return Ok(());
    }
    if !meta.is_partitioned() {
        return Err(MetaError::InvalidArgument(format!(
            "{} is not partitioned but partitions were given",
            identity
        )));
    }
    let arity = meta.partition_columns.len();
    if let Some(bad) = explicit.iter().find(|key| key.len() != arity) {
        return Err(MetaError::InvalidArgument(format!(
            "partition {} of {} has {} values, table has {} partition columns",
            bad,
            identity,
            bad.len(),
            arity
        )));
    }
    Ok(())
}

// A panic while a lock is held cannot leave the guarded data half-updated:
// the index only ever has whole entries swapped in, and job locks guard `()`.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
