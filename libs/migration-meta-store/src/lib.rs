// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Durable job and partition state for table migrations.
//!
//! Schedulers and workers coordinate through [`MetaManager`]: jobs are
//! added per source table, workers report job and partition outcomes, and
//! the scheduler asks which tables still have pending work. Every job is a
//! directory of small plain-text files under one metadata root, so the
//! whole state survives a restart and can be inspected by hand:
//!
//! ```text
//! <meta_dir>/<namespace>/<table>/
//!     metadata               "<STATUS>\n<retry count>"
//!     config                 JSON job configuration
//!     partitions_all         one partition per line
//!     partitions_succeeded   one partition per line
//!     partitions_failed      one partition per line
//! ```
//!
//! Column metadata is never stored; it is read from a [`SourceCatalog`]
//! when needed.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod manager;
pub mod partitions;
pub mod state;
pub mod store;

pub use catalog::{CatalogError, InMemoryCatalog, SourceCatalog};
pub use config::StoreConfig;
pub use error::{MetaError, Result};
pub use manager::MetaManager;
pub use state::JobRecord;
