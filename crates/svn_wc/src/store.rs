// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The four content-bearing stores of a working copy's administrative
//! area (spec §4.5.1): entries, properties, pristine text bases, and the
//! crash-recovery log queue. Each is a small async trait over a
//! `RepoPath` key, grounded on the pack's `Blobstore`-shaped
//! get/put/is_present traits, so `FsWcStore` and `MemWcStore` can back
//! the same administrative logic with real files or in-memory maps.

use async_trait::async_trait;
use svn_types::{Entry, PropertyMap, RepoPath};

use crate::log::LogOp;

/// The pristine text base: the unmodified file contents as of the last
/// update, keyed by path (spec §4.5 "pristine text base subtree").
#[async_trait]
pub trait PristineStore: Send + Sync {
    async fn get(&self, path: &RepoPath) -> anyhow::Result<Option<Vec<u8>>>;
    async fn put(&self, path: &RepoPath, contents: Vec<u8>) -> anyhow::Result<()>;
    async fn is_present(&self, path: &RepoPath) -> anyhow::Result<bool>;
    async fn remove(&self, path: &RepoPath) -> anyhow::Result<()>;
}

/// The property subtree: the working (current) and base (pristine)
/// property sets for each versioned path.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn get_working(&self, path: &RepoPath) -> anyhow::Result<PropertyMap>;
    async fn set_working(&self, path: &RepoPath, props: PropertyMap) -> anyhow::Result<()>;
    async fn get_base(&self, path: &RepoPath) -> anyhow::Result<PropertyMap>;
    async fn set_base(&self, path: &RepoPath, props: PropertyMap) -> anyhow::Result<()>;
}

/// The entries file: one record per tracked path, including each
/// directory's `this-dir` self-entry (spec §3 `Entry`, §4.5 "a tabular
/// set of entry records").
#[async_trait]
pub trait EntriesStore: Send + Sync {
    async fn get_entry(&self, path: &RepoPath) -> anyhow::Result<Option<Entry>>;
    async fn set_entry(&self, path: &RepoPath, entry: Entry) -> anyhow::Result<()>;
    async fn remove_entry(&self, path: &RepoPath) -> anyhow::Result<()>;
    /// All tracked paths whose parent is exactly `dir` (not `dir` itself).
    async fn children_of(&self, dir: &RepoPath) -> anyhow::Result<Vec<RepoPath>>;
}

/// The per-directory crash-recovery log queue (spec §4.5 "Log-based
/// recovery"): a script of primitive operations appended before a
/// mutation begins and replayed (then cleared) once it completes.
///
/// Also carries the directory-scoped administrative lock (spec §4.5:
/// "a directory is locked administratively while any mutation is in
/// progress... readers do not require the lock"), since both are
/// per-directory administrative bookkeeping concerns.
#[async_trait]
pub trait AdminLog: Send + Sync {
    async fn append(&self, dir: &RepoPath, ops: Vec<LogOp>) -> anyhow::Result<()>;
    async fn pending(&self, dir: &RepoPath) -> anyhow::Result<Vec<LogOp>>;
    async fn clear(&self, dir: &RepoPath) -> anyhow::Result<()>;

    /// Attempts to take the administrative lock on `dir`. Returns `false`
    /// if another writer already holds it.
    async fn try_lock(&self, dir: &RepoPath) -> anyhow::Result<bool>;
    async fn unlock(&self, dir: &RepoPath) -> anyhow::Result<()>;
}

/// A place to materialize a translated file's content as a real,
/// independently-readable path (spec §4.5 `translated-file`), without
/// disturbing the working file itself.
#[async_trait]
pub trait TempArea: Send + Sync {
    async fn materialize_tmp(&self, path: &RepoPath, bytes: Vec<u8>) -> anyhow::Result<std::path::PathBuf>;
}
