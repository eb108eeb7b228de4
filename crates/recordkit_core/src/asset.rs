//! Deferred removal of assets stored outside the database.
//!
//! Deleting a record may orphan files that belong to it. Those removals are
//! queued on the open transaction and run only after it commits; a rolled
//! back transaction discards its queue untouched.

use crate::error::AssetError;
use std::io;
use std::path::{Path, PathBuf};

/// A resource outside the relational store whose lifetime is bound to a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    path: PathBuf,
}

impl Asset {
    /// A file asset. Relative paths are resolved against
    /// [`crate::Config::asset_root`].
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path as scheduled.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, root: Option<&Path>) -> PathBuf {
        match root {
            Some(root) if self.path.is_relative() => root.join(&self.path),
            _ => self.path.clone(),
        }
    }
}

/// Removals scheduled during one physical transaction.
#[derive(Debug, Default)]
pub struct AssetQueue {
    pending: Vec<Asset>,
}

impl AssetQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an asset for removal. Scheduling the same asset twice
    /// queues it once.
    pub fn schedule(&mut self, asset: Asset) {
        if !self.pending.contains(&asset) {
            self.pending.push(asset);
        }
    }

    /// Number of queued removals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queued assets in scheduling order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.pending.iter()
    }

    /// Removes every queued asset. Consumes the queue, so no removal runs
    /// twice.
    ///
    /// Failures are collected, never propagated: the transaction that
    /// scheduled them has already committed.
    #[must_use]
    pub fn run(self, root: Option<&Path>) -> AssetReport {
        let mut report = AssetReport::default();
        for asset in self.pending {
            let path = asset.resolve(root);
            match std::fs::remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "asset already missing after commit");
                    report.failures.push(AssetError::Missing { path });
                }
                Err(source) => {
                    tracing::warn!(path = %path.display(), error = %source, "asset could not be removed after commit");
                    report.failures.push(AssetError::NotRemovable { path, source });
                }
            }
        }
        report
    }
}

/// Outcome of running an [`AssetQueue`].
#[derive(Debug, Default)]
pub struct AssetReport {
    /// Paths removed.
    pub removed: Vec<PathBuf>,
    /// Removals that failed.
    pub failures: Vec<AssetError>,
}

impl AssetReport {
    /// Returns true if every removal succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
