// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Partition bookkeeping for one job
//!
//! Three collections are kept per job: every partition known to the job
//! (`all`), those confirmed migrated (`succeeded`) and those that failed at
//! least once (`failed`). Pending work is `all - succeeded`; a failed
//! partition stays pending so it is retried.

use indexmap::IndexSet;

use migration_types::PartitionKey;

/// Partition keys in the order they were first recorded.
pub type KeySet = IndexSet<PartitionKey>;

/// Keys of `keys` that are not yet in `set`, de-duplicated and in first-seen
/// order, without inserting anything.
pub fn missing<'a, I>(set: &KeySet, keys: I) -> Vec<PartitionKey>
where
    I: IntoIterator<Item = &'a PartitionKey>,
{
    let mut new = KeySet::new();
    for key in keys {
        if !set.contains(key) {
            new.insert(key.clone());
        }
    }
    new.into_iter().collect()
}

/// The three partition collections of one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSets {
    pub all: KeySet,
    pub succeeded: KeySet,
    pub failed: KeySet,
}

impl PartitionSets {
    pub fn new(all: impl IntoIterator<Item = PartitionKey>) -> Self {
        Self {
            all: all.into_iter().collect(),
            succeeded: KeySet::new(),
            failed: KeySet::new(),
        }
    }

    /// Partitions not yet confirmed migrated, in the order they became known.
    pub fn pending(&self) -> Vec<PartitionKey> {
        self.all
            .iter()
            .filter(|key| !self.succeeded.contains(*key))
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.all
            .iter()
            .filter(|key| !self.succeeded.contains(*key))
            .count()
    }

    /// Keys of `keys` that are not part of `all`.
    pub fn unknown<'a>(&self, keys: &'a [PartitionKey]) -> Vec<&'a PartitionKey> {
        keys.iter().filter(|key| !self.all.contains(*key)).collect()
    }
}
