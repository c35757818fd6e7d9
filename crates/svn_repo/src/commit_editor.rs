// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The repository-side commit editor (spec §4.7): an `Editor<Handle =
//! RepoPath>` whose calls mutate a `Txn` directly, and whose `close_edit`
//! is the one path that calls `Repository::commit_txn`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use svn_delta::{CopyFrom, Editor};
use svn_txdelta::{Window, WindowSink};
use svn_types::{Checksum, NodeKind, RepoPath, Revision};

use crate::repository::{CommitInfo, Repository, Txn};
use crate::tree;

/// Receives the result of a successful commit (spec §4.1.1 "the commit
/// callback", §9 "vtable of callbacks -> trait/interface"). A trait
/// rather than a boxed closure so implementors can hold their own state
/// (a working-copy handle to post-commit-bump, a test probe, ...).
#[async_trait]
pub trait CommitCallback: Send {
    async fn on_commit(&mut self, info: CommitInfo) -> anyhow::Result<()>;
}

/// A `CommitCallback` that records every commit it sees; used by tests
/// and by callers that only want the final `CommitInfo` back.
#[derive(Default)]
pub struct RecordingCommitCallback {
    pub commits: Vec<CommitInfo>,
}

#[async_trait]
impl CommitCallback for RecordingCommitCallback {
    async fn on_commit(&mut self, info: CommitInfo) -> anyhow::Result<()> {
        self.commits.push(info);
        Ok(())
    }
}

/// State shared between `CommitEditor` and the per-file `FileWindowSink`s
/// it hands out: both sides need to mutate the same in-progress `Txn`, but
/// `apply_textdelta` must return a `WindowSink` that outlives the `&mut
/// self` borrow of the call that produced it (spec §4.3 "streaming").
type SharedTxn = Arc<Mutex<Option<Txn>>>;

pub struct CommitEditor {
    repo: Arc<Repository>,
    txn: SharedTxn,
    anchor: RepoPath,
    author: String,
    log_message: String,
    callback: Box<dyn CommitCallback>,
}

impl CommitEditor {
    /// `anchor` is the directory this editor's session is rooted at (spec
    /// §4.6 "anchor selection"): `open_root` returns it rather than the
    /// repository root, the same way an RA session opened at an anchor URL
    /// makes that URL the root of every path the session hands out.
    pub fn new(
        repo: Arc<Repository>,
        base_rev: Revision,
        anchor: RepoPath,
        author: impl Into<String>,
        log_message: impl Into<String>,
        callback: Box<dyn CommitCallback>,
    ) -> anyhow::Result<Self> {
        let txn = repo.begin_txn(base_rev)?;
        Ok(CommitEditor {
            repo,
            txn: Arc::new(Mutex::new(Some(txn))),
            anchor,
            author: author.into(),
            log_message: log_message.into(),
            callback,
        })
    }

    fn with_txn<T>(&self, f: impl FnOnce(&mut Txn) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let mut guard = self.txn.lock().unwrap();
        let txn = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::ProtocolViolation("edit already closed".to_string())))?;
        f(txn)
    }

    fn resolve_copyfrom(&self, copyfrom: Option<CopyFrom>) -> anyhow::Result<Option<(Arc<tree::Node>, RepoPath, Revision)>> {
        match copyfrom {
            None => Ok(None),
            Some(c) => {
                let src_path = RepoPath::from(c.path.as_str());
                let root = self.repo.root_at(c.rev)?;
                let node = tree::lookup(&root, &src_path)
                    .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::NotFound(c.path.clone())))?;
                Ok(Some((node, src_path, self.repo.resolve(c.rev))))
            }
        }
    }
}

#[async_trait]
impl Editor for CommitEditor {
    type Handle = RepoPath;

    async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        let root = self.anchor.clone();
        self.with_txn(|txn| txn.open(&root, base_rev, NodeKind::Directory))?;
        Ok(root)
    }

    async fn delete_entry(&mut self, parent: &Self::Handle, name: &str, base_rev: Revision) -> anyhow::Result<()> {
        let path = parent.join(name);
        self.with_txn(|txn| txn.delete(&path, base_rev))
    }

    async fn add_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        let path = parent.join(name);
        let copyfrom = self.resolve_copyfrom(copyfrom)?;
        self.with_txn(|txn| txn.add_directory(&path, copyfrom))?;
        Ok(path)
    }

    async fn open_directory(&mut self, parent: &Self::Handle, name: &str, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        let path = parent.join(name);
        self.with_txn(|txn| txn.open(&path, base_rev, NodeKind::Directory))?;
        Ok(path)
    }

    async fn absent_directory(&mut self, _parent: &Self::Handle, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn change_dir_prop(&mut self, dir: &Self::Handle, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()> {
        self.with_txn(|txn| txn.change_prop(dir, name, value))
    }

    async fn close_directory(&mut self, _dir: &Self::Handle) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_file(&mut self, parent: &Self::Handle, name: &str, copyfrom: Option<CopyFrom>) -> anyhow::Result<Self::Handle> {
        let path = parent.join(name);
        let copyfrom = self.resolve_copyfrom(copyfrom)?;
        self.with_txn(|txn| txn.add_file(&path, copyfrom))?;
        Ok(path)
    }

    async fn open_file(&mut self, parent: &Self::Handle, name: &str, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        let path = parent.join(name);
        self.with_txn(|txn| txn.open(&path, base_rev, NodeKind::File))?;
        Ok(path)
    }

    async fn absent_file(&mut self, _parent: &Self::Handle, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn apply_textdelta(&mut self, file: &Self::Handle, base_checksum: Option<Checksum>) -> anyhow::Result<Box<dyn WindowSink>> {
        let source = self.with_txn(|txn| {
            let node = txn.get(file).ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::NotFound(file.as_str().to_string())))?;
            let content = node
                .as_file()
                .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::UnversionedPath(file.as_str().to_string())))?
                .content
                .clone();
            if let Some(expected) = &base_checksum {
                svn_types::verify_checksum(file.as_str(), expected, &Checksum::md5_of(&content))?;
            }
            Ok(content)
        })?;
        Ok(Box::new(FileWindowSink {
            txn: self.txn.clone(),
            file: file.clone(),
            source,
            target: Vec::new(),
            finished: false,
        }))
    }

    async fn change_file_prop(&mut self, file: &Self::Handle, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()> {
        self.with_txn(|txn| txn.change_prop(file, name, value))
    }

    async fn close_file(&mut self, file: &Self::Handle, target_checksum: Option<Checksum>) -> anyhow::Result<()> {
        if let Some(expected) = target_checksum {
            self.with_txn(|txn| {
                let node = txn.get(file).ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::NotFound(file.as_str().to_string())))?;
                let content = node
                    .as_file()
                    .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::UnversionedPath(file.as_str().to_string())))?
                    .content
                    .clone();
                svn_types::verify_checksum(file.as_str(), &expected, &Checksum::md5_of(&content))
            })?;
        }
        Ok(())
    }

    async fn close_edit(&mut self) -> anyhow::Result<()> {
        let txn = self
            .txn
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::ProtocolViolation("edit already closed".to_string())))?;
        let info = self.repo.commit_txn(txn, &self.author, &self.log_message)?;
        self.callback.on_commit(info).await
    }

    async fn abort_edit(&mut self) -> anyhow::Result<()> {
        *self.txn.lock().unwrap() = None;
        Ok(())
    }
}

/// Receives a file's window stream and writes the reconstructed content
/// back into the shared `Txn` on the terminating null window (spec §4.3
/// "the final window is always empty").
struct FileWindowSink {
    txn: SharedTxn,
    file: RepoPath,
    source: Arc<Vec<u8>>,
    target: Vec<u8>,
    finished: bool,
}

#[async_trait]
impl WindowSink for FileWindowSink {
    async fn send_window(&mut self, window: Window) -> anyhow::Result<()> {
        if self.finished {
            anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(
                "window pushed after the terminating null window".to_string()
            ));
        }
        window.validate()?;
        if window.is_null() {
            self.finished = true;
            let mut guard = self.txn.lock().unwrap();
            let txn = guard
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::ProtocolViolation("edit already closed".to_string())))?;
            txn.set_file_content(&self.file, std::mem::take(&mut self.target))?;
            return Ok(());
        }
        let produced = svn_txdelta::apply_window(&self.source, &window)?;
        self.target.extend_from_slice(&produced);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;

    #[tokio::test]
    async fn a_simple_add_and_commit_round_trips() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut editor = CommitEditor::new(repo.clone(), Revision::Head, RepoPath::root(), "jrandom", "add hello.txt", Box::new(RecordingCommitCallback::default())).unwrap();

        let root = editor.open_root(Revision::Head).await.unwrap();
        let file = editor.add_file(&root, "hello.txt", None).await.unwrap();
        let mut sink = editor.apply_textdelta(&file, None).await.unwrap();
        sink.send_window(Window::insert(b"hello".to_vec())).await.unwrap();
        sink.send_window(Window::null()).await.unwrap();
        editor.close_file(&file, Some(Checksum::md5_of(b"hello"))).await.unwrap();
        editor.close_directory(&root).await.unwrap();
        editor.close_edit().await.unwrap();

        let head = repo.root_at(Revision::Head).unwrap();
        let node = tree::lookup(&head, &RepoPath::from("hello.txt")).unwrap();
        assert_eq!(node.as_file().unwrap().content.as_slice(), b"hello");
    }

    #[tokio::test]
    async fn mismatched_target_checksum_is_rejected() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut editor = CommitEditor::new(repo, Revision::Head, RepoPath::root(), "jrandom", "bad checksum", Box::new(RecordingCommitCallback::default())).unwrap();
        let root = editor.open_root(Revision::Head).await.unwrap();
        let file = editor.add_file(&root, "hello.txt", None).await.unwrap();
        let mut sink = editor.apply_textdelta(&file, None).await.unwrap();
        sink.send_window(Window::insert(b"hello".to_vec())).await.unwrap();
        sink.send_window(Window::null()).await.unwrap();
        let err = editor.close_file(&file, Some(Checksum::md5_of(b"not hello"))).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn abort_edit_leaves_the_repository_unchanged() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut editor = CommitEditor::new(repo.clone(), Revision::Head, RepoPath::root(), "jrandom", "never lands", Box::new(RecordingCommitCallback::default())).unwrap();
        let root = editor.open_root(Revision::Head).await.unwrap();
        editor.add_file(&root, "hello.txt", None).await.unwrap();
        editor.abort_edit().await.unwrap();
        assert_eq!(repo.head_rev(), Revision::ZERO);
    }
}
