// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The public working-copy API (spec §4.5 "Operations (public contract)"),
//! generic over the store traits so the same logic drives both
//! `FsWcStore` and `MemWcStore`.

use std::path::PathBuf;

use async_trait::async_trait;
use svn_types::{Entry, NodeKind, PropertyMap, RepoPath, Revision, Schedule};
use svn_translate::{FileConfig, KeywordValues};

use crate::log::{replay, EntryField, LogOp};
use crate::store::{AdminLog, EntriesStore, PristineStore, PropertyStore, TempArea};

/// Receives each visited path during a `walk` (spec §4.5 `walk(path,
/// callbacks, depth)`).
#[async_trait]
pub trait WalkVisitor: Send {
    async fn visit(&mut self, path: &RepoPath, entry: &Entry) -> anyhow::Result<()>;
}

/// Whether a path's translated working text / properties differ from
/// its pristine base (spec §4.5 "A path is modified iff ...").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictState {
    pub text_conflict: bool,
    pub prop_conflict: bool,
}

/// The outcome of `translated_file`: either the raw path needs no
/// translation, or a freshly materialized temporary path holds the
/// translated form (spec §4.5 `translated-file`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatedFile {
    Unchanged,
    Temporary(PathBuf),
}

fn store_error(msg: impl Into<String>) -> anyhow::Error {
    svn_error::SvnErrorKind::ProtocolViolation(msg.into()).into()
}

/// A working copy's administrative logic, backed by any combination of
/// store traits (spec §4.5).
pub struct WorkingCopy<S> {
    store: S,
    logger: slog::Logger,
}

impl<S> WorkingCopy<S>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea,
{
    pub fn new(store: S, logger: slog::Logger) -> Self {
        WorkingCopy { store, logger }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub async fn get_entry(&self, path: &RepoPath) -> anyhow::Result<Option<Entry>> {
        self.store.get_entry(path).await
    }

    /// Removes a tracked path's entry entirely, e.g. once a scheduled
    /// delete has actually landed in a commit (spec §4.6 "clears the
    /// schedule" — for a delete there is no entry left to clear it on).
    pub async fn remove_entry(&self, path: &RepoPath) -> anyhow::Result<()> {
        self.store.remove_entry(path).await
    }

    /// The property base (pristine property set), for callers that need
    /// to diff it against the working set themselves (spec §4.6
    /// "diffs the working property set against the property base").
    pub async fn property_base(&self, path: &RepoPath) -> anyhow::Result<PropertyMap> {
        self.store.get_base(path).await
    }

    /// The pristine text base, if any is recorded yet (spec §4.5
    /// "pristine text base subtree"). `None` for a path that has never
    /// been committed (a fresh `schedule-add`).
    pub async fn pristine_text(&self, path: &RepoPath) -> anyhow::Result<Option<Vec<u8>>> {
        self.store.get(path).await
    }

    /// Depth-first walk rooted at `path`, visiting directories before
    /// their children, stopping at the requested `depth` (spec §4.2's
    /// depth lattice governs how far `walk` descends).
    pub async fn walk(&self, path: &RepoPath, depth: svn_types::Depth, visitor: &mut dyn WalkVisitor) -> anyhow::Result<()> {
        let entry = self
            .store
            .get_entry(path)
            .await?
            .ok_or_else(|| store_error(format!("no entry at '{}'", path.as_str())))?;
        visitor.visit(path, &entry).await?;
        if entry.kind != NodeKind::Directory || depth == svn_types::Depth::Empty {
            return Ok(());
        }
        let child_depth = depth.child_depth();
        for child in self.store.children_of(path).await? {
            if let Some(child_entry) = self.store.get_entry(&child).await? {
                if depth.includes(child_entry.kind) || child_entry.kind == NodeKind::Directory {
                    Box::pin(self.walk(&child, child_depth, visitor)).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn get_prop(&self, path: &RepoPath, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.store.get_working(path).await?.get(name).cloned())
    }

    pub async fn proplist(&self, path: &RepoPath) -> anyhow::Result<PropertyMap> {
        self.store.get_working(path).await
    }

    /// Sets (or, with `value = None`, deletes) one property, going
    /// through the crash-recovery log so a replay after a crash leaves
    /// the property set in a consistent state (spec §4.5 "every mutation
    /// writes intended operations into a log file, then replays them").
    pub async fn set_prop(&self, path: &RepoPath, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()> {
        let dir = log_dir_of(path);
        self.store
            .append(&dir, vec![LogOp::SetProp { path: path.clone(), name: name.to_string(), value }])
            .await?;
        replay(&dir, &self.store, &self.store, &self.store, &self.store).await?;
        slog::debug!(self.logger, "set-prop"; "path" => path.as_str(), "name" => name);
        Ok(())
    }

    /// Schedules `path` for addition. If `path` is already scheduled for
    /// deletion, this becomes a `Replace` (spec §3 `Schedule::Replace`:
    /// "delete followed by add at the same path within one pending
    /// commit").
    pub async fn schedule_add(&self, path: &RepoPath, kind: NodeKind, copyfrom: Option<(String, Revision)>) -> anyhow::Result<()> {
        let existing = self.store.get_entry(path).await?;
        let already_deleted = matches!(existing.as_ref().map(|e| e.schedule), Some(Schedule::Delete));

        let mut entry = existing.unwrap_or_else(|| {
            Entry::new_this_dir(path.as_str(), "", "", Revision::Invalid)
        });
        entry.name = path.basename().unwrap_or(svn_types::THIS_DIR).to_string();
        entry.kind = kind;
        entry.schedule = if already_deleted { Schedule::Replace } else { Schedule::Add };
        entry.copied = copyfrom.is_some();
        match copyfrom {
            Some((url, rev)) => {
                entry.copyfrom_url = Some(url);
                entry.copyfrom_rev = Some(rev);
            }
            None => {
                entry.copyfrom_url = None;
                entry.copyfrom_rev = None;
            }
        }
        entry
            .check_copyfrom_invariant()
            .map_err(store_error)?;
        self.store.set_entry(path, entry).await
    }

    /// Schedules `path` for deletion at the next commit.
    pub async fn schedule_delete(&self, path: &RepoPath) -> anyhow::Result<()> {
        let mut entry = self
            .store
            .get_entry(path)
            .await?
            .ok_or_else(|| store_error(format!("cannot schedule delete: no entry at '{}'", path.as_str())))?;
        entry.schedule = Schedule::Delete;
        self.store.set_entry(path, entry).await
    }

    /// Reverts local scheduling and property changes at `path` (and,
    /// for `Depth::Infinity`, its descendants): restores `Normal`
    /// scheduling, clears `copyfrom`, and resets working properties to
    /// the property base. Does not touch the on-disk working file
    /// itself; that is the caller's responsibility once this returns.
    pub async fn revert(&self, path: &RepoPath, depth: svn_types::Depth) -> anyhow::Result<()> {
        self.revert_one(path).await?;
        if depth != svn_types::Depth::Empty {
            for child in self.store.children_of(path).await? {
                Box::pin(self.revert(&child, depth.child_depth())).await?;
            }
        }
        Ok(())
    }

    async fn revert_one(&self, path: &RepoPath) -> anyhow::Result<()> {
        if let Some(mut entry) = self.store.get_entry(path).await? {
            entry.schedule = Schedule::Normal;
            entry.copied = false;
            entry.copyfrom_url = None;
            entry.copyfrom_rev = None;
            entry.conflict_old = None;
            entry.conflict_new = None;
            entry.conflict_working = None;
            entry.prop_conflict = None;
            self.store.set_entry(path, entry).await?;
        }
        let base_props = self.store.get_base(path).await?;
        self.store.set_working(path, base_props).await
    }

    /// Produces the working-copy form of `path`'s pristine text for
    /// reading (spec §4.5 `translated-file`). If no translation is
    /// configured, returns `Unchanged` so the caller reads the pristine
    /// bytes directly; otherwise materializes the translated bytes at a
    /// fresh temporary path.
    pub async fn translated_file(&self, path: &RepoPath, repair: bool) -> anyhow::Result<TranslatedFile> {
        let props = self.store.get_working(path).await?;
        let config = FileConfig::from_properties(&props);
        if !config.needs_translation() {
            return Ok(TranslatedFile::Unchanged);
        }
        let pristine = self
            .store
            .get(path)
            .await?
            .ok_or_else(|| store_error(format!("no pristine text for '{}'", path.as_str())))?;
        let entry = self.store.get_entry(path).await?;
        let values = KeywordValues {
            revision: entry.as_ref().map(|e| e.last_committed_rev).unwrap_or(Revision::Invalid),
            date: entry
                .as_ref()
                .and_then(|e| e.last_committed_date)
                .map(|d| d.to_string())
                .unwrap_or_default(),
            author: entry.as_ref().and_then(|e| e.last_committed_author.clone()).unwrap_or_default(),
            url: entry.as_ref().map(|e| e.url.clone()).unwrap_or_default(),
            basename: path.basename().unwrap_or_default().to_string(),
        };
        let translated = svn_translate::translate_out(&pristine, &config, &values);
        let _ = repair;
        let tmp_path = self.store.materialize_tmp(path, translated).await?;
        Ok(TranslatedFile::Temporary(tmp_path))
    }

    /// Applies the platform-executable bit iff the `svn:executable`
    /// property is set (spec §4.5 `maybe-set-executable`). Returns
    /// whether the bit was (or already is) set.
    #[cfg(unix)]
    pub async fn maybe_set_executable(&self, path: &RepoPath, on_disk_path: &std::path::Path) -> anyhow::Result<bool> {
        use std::os::unix::fs::PermissionsExt;
        let props = self.store.get_working(path).await?;
        if props.get("svn:executable").is_none() {
            return Ok(false);
        }
        let metadata = tokio::fs::metadata(on_disk_path).await?;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o111);
        tokio::fs::set_permissions(on_disk_path, perms).await?;
        Ok(true)
    }

    #[cfg(not(unix))]
    pub async fn maybe_set_executable(&self, path: &RepoPath, _on_disk_path: &std::path::Path) -> anyhow::Result<bool> {
        let props = self.store.get_working(path).await?;
        Ok(props.get("svn:executable").is_some())
    }

    /// Whether `path` carries an unresolved text and/or property
    /// conflict, as recorded on its entry (spec §4.5 `conflicted?`).
    pub async fn conflicted(&self, path: &RepoPath) -> anyhow::Result<ConflictState> {
        let entry = self.store.get_entry(path).await?;
        Ok(match entry {
            Some(e) => ConflictState {
                text_conflict: e.conflict_old.is_some() || e.conflict_new.is_some() || e.conflict_working.is_some(),
                prop_conflict: e.prop_conflict.is_some(),
            },
            None => ConflictState { text_conflict: false, prop_conflict: false },
        })
    }

    /// Takes the administrative lock on `dir`'s directory for the
    /// duration of a mutation; callers must pair this with `unlock`.
    pub async fn lock(&self, dir: &RepoPath) -> anyhow::Result<bool> {
        self.store.try_lock(dir).await
    }

    pub async fn unlock(&self, dir: &RepoPath) -> anyhow::Result<()> {
        self.store.unlock(dir).await
    }

    /// Records a post-commit outcome (spec §4.6 "post-commit
    /// bookkeeping"): advances the entry's committed revision/date/author,
    /// replaces the pristine base with the just-committed (translated)
    /// text, and clears the schedule — via the log, so it survives a
    /// crash mid-bookkeeping.
    pub async fn record_committed(
        &self,
        path: &RepoPath,
        new_rev: Revision,
        date: i64,
        author: &str,
        new_pristine: Vec<u8>,
    ) -> anyhow::Result<()> {
        let dir = log_dir_of(path);
        let ops = vec![LogOp::SetEntryField { path: path.clone(), field: EntryField::Schedule, value: None }];
        self.store.append(&dir, ops).await?;
        replay(&dir, &self.store, &self.store, &self.store, &self.store).await?;

        if let Some(mut entry) = self.store.get_entry(path).await? {
            entry.last_committed_rev = new_rev;
            entry.base_rev = new_rev;
            entry.last_committed_date = Some(date);
            entry.last_committed_author = Some(author.to_string());
            entry.schedule = Schedule::Normal;
            entry.copied = false;
            entry.copyfrom_url = None;
            entry.copyfrom_rev = None;
            entry.checksum = Some(svn_types::Checksum::sha1_of(&new_pristine));
            self.store.set_entry(path, entry).await?;
        }
        self.store.put(path, new_pristine.clone()).await?;
        self.store.set_base(path, self.store.get_working(path).await?).await?;
        slog::info!(self.logger, "recorded commit"; "path" => path.as_str(), "rev" => format!("{new_rev}"));
        Ok(())
    }

    /// The directory counterpart of `record_committed`: same entry
    /// bookkeeping, but a directory has no pristine text base to
    /// replace, only its property base advances to the just-committed
    /// working set (spec §4.6 "updates each committed path's entry").
    pub async fn record_committed_dir(
        &self,
        path: &RepoPath,
        new_rev: Revision,
        date: i64,
        author: &str,
    ) -> anyhow::Result<()> {
        let dir = log_dir_of(path);
        let ops = vec![LogOp::SetEntryField { path: path.clone(), field: EntryField::Schedule, value: None }];
        self.store.append(&dir, ops).await?;
        replay(&dir, &self.store, &self.store, &self.store, &self.store).await?;

        if let Some(mut entry) = self.store.get_entry(path).await? {
            entry.last_committed_rev = new_rev;
            entry.base_rev = new_rev;
            entry.last_committed_date = Some(date);
            entry.last_committed_author = Some(author.to_string());
            entry.schedule = Schedule::Normal;
            entry.copied = false;
            entry.copyfrom_url = None;
            entry.copyfrom_rev = None;
            self.store.set_entry(path, entry).await?;
        }
        self.store.set_base(path, self.store.get_working(path).await?).await?;
        slog::info!(self.logger, "recorded commit"; "path" => path.as_str(), "rev" => format!("{new_rev}"));
        Ok(())
    }
}

fn log_dir_of(path: &RepoPath) -> RepoPath {
    if path.is_root() {
        path.clone()
    } else {
        path.parent()
    }
}
