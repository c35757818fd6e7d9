// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! An in-memory fake backing all four administrative-area stores at
//! once, grounded on the pack's `Tickable<T>` in-memory blobstore fake
//! (`Arc<Mutex<HashMap<...>>>` storage behind the same trait a real
//! backend implements). Used in unit tests across this crate and in
//! `svn_commit_driver`/`svn_repo` tests that need a working copy without
//! touching the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use svn_types::{Entry, PropertyMap, RepoPath};

use crate::log::LogOp;
use crate::store::{AdminLog, EntriesStore, PristineStore, PropertyStore, TempArea};

#[derive(Default)]
pub struct MemWcStore {
    pristine: Mutex<HashMap<String, Vec<u8>>>,
    working_props: Mutex<HashMap<String, PropertyMap>>,
    base_props: Mutex<HashMap<String, PropertyMap>>,
    entries: Mutex<HashMap<String, Entry>>,
    logs: Mutex<HashMap<String, Vec<LogOp>>>,
    locks: Mutex<HashSet<String>>,
    tmp_counter: AtomicU64,
}

impl MemWcStore {
    pub fn new() -> Self {
        MemWcStore::default()
    }
}

#[async_trait]
impl PristineStore for MemWcStore {
    async fn get(&self, path: &RepoPath) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.pristine.lock().unwrap().get(path.as_str()).cloned())
    }

    async fn put(&self, path: &RepoPath, contents: Vec<u8>) -> anyhow::Result<()> {
        self.pristine.lock().unwrap().insert(path.as_str().to_string(), contents);
        Ok(())
    }

    async fn is_present(&self, path: &RepoPath) -> anyhow::Result<bool> {
        Ok(self.pristine.lock().unwrap().contains_key(path.as_str()))
    }

    async fn remove(&self, path: &RepoPath) -> anyhow::Result<()> {
        self.pristine.lock().unwrap().remove(path.as_str());
        Ok(())
    }
}

#[async_trait]
impl PropertyStore for MemWcStore {
    async fn get_working(&self, path: &RepoPath) -> anyhow::Result<PropertyMap> {
        Ok(self
            .working_props
            .lock()
            .unwrap()
            .get(path.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn set_working(&self, path: &RepoPath, props: PropertyMap) -> anyhow::Result<()> {
        self.working_props.lock().unwrap().insert(path.as_str().to_string(), props);
        Ok(())
    }

    async fn get_base(&self, path: &RepoPath) -> anyhow::Result<PropertyMap> {
        Ok(self
            .base_props
            .lock()
            .unwrap()
            .get(path.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn set_base(&self, path: &RepoPath, props: PropertyMap) -> anyhow::Result<()> {
        self.base_props.lock().unwrap().insert(path.as_str().to_string(), props);
        Ok(())
    }
}

#[async_trait]
impl EntriesStore for MemWcStore {
    async fn get_entry(&self, path: &RepoPath) -> anyhow::Result<Option<Entry>> {
        Ok(self.entries.lock().unwrap().get(path.as_str()).cloned())
    }

    async fn set_entry(&self, path: &RepoPath, entry: Entry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().insert(path.as_str().to_string(), entry);
        Ok(())
    }

    async fn remove_entry(&self, path: &RepoPath) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(path.as_str());
        Ok(())
    }

    async fn children_of(&self, dir: &RepoPath) -> anyhow::Result<Vec<RepoPath>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .keys()
            .map(|s| RepoPath::from(s.as_str()))
            .filter(|p| !p.is_root() && p.parent().as_str() == dir.as_str())
            .collect())
    }
}

#[async_trait]
impl AdminLog for MemWcStore {
    async fn append(&self, dir: &RepoPath, mut ops: Vec<LogOp>) -> anyhow::Result<()> {
        self.logs.lock().unwrap().entry(dir.as_str().to_string()).or_default().append(&mut ops);
        Ok(())
    }

    async fn pending(&self, dir: &RepoPath) -> anyhow::Result<Vec<LogOp>> {
        Ok(self.logs.lock().unwrap().get(dir.as_str()).cloned().unwrap_or_default())
    }

    async fn clear(&self, dir: &RepoPath) -> anyhow::Result<()> {
        self.logs.lock().unwrap().remove(dir.as_str());
        Ok(())
    }

    async fn try_lock(&self, dir: &RepoPath) -> anyhow::Result<bool> {
        Ok(self.locks.lock().unwrap().insert(dir.as_str().to_string()))
    }

    async fn unlock(&self, dir: &RepoPath) -> anyhow::Result<()> {
        self.locks.lock().unwrap().remove(dir.as_str());
        Ok(())
    }
}

#[async_trait]
impl TempArea for MemWcStore {
    async fn materialize_tmp(&self, path: &RepoPath, bytes: Vec<u8>) -> anyhow::Result<PathBuf> {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp_dir = std::env::temp_dir().join("svn_wc_mem");
        tokio::fs::create_dir_all(&tmp_dir).await?;
        let tmp_path = tmp_dir.join(format!("{n}-{}", crate::codec::escape_path(path)));
        tokio::fs::write(&tmp_path, bytes).await?;
        Ok(tmp_path)
    }
}
