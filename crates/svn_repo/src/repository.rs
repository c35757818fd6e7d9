// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The in-process repository filesystem (spec §4.7.1): an immutable
//! sequence of committed revision trees plus their revision properties,
//! and the transactions that produce new ones.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use svn_error::SvnErrorKind;
use svn_types::{NodeKind, PropertyMap, RepoPath, Revision};

use crate::tree::{self, DirNode, FileNode, Node};

/// {new revision, date, author} reported through a commit callback (spec
/// §4.7 "On success, report ... via the commit callback").
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub rev: Revision,
    pub date: i64,
    pub author: String,
}

struct RepoState {
    revisions: Vec<Arc<Node>>,
    rev_props: Vec<PropertyMap>,
}

/// `svn_fs_t` made concrete for in-process tests (spec §4.7.1): committed
/// trees never change once appended; a single mutex around `commit`
/// serializes the two concurrent `close-edit`s the original relies on the
/// underlying filesystem library's own locking for.
pub struct Repository {
    uuid: String,
    root_url: String,
    state: Mutex<RepoState>,
}

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

impl Repository {
    /// A fresh repository at revision 0: an empty root directory and an
    /// empty revision-0 property set (callers typically set `svn:date`
    /// on it themselves, mirroring `svnadmin create`).
    pub fn new(uuid: impl Into<String>, root_url: impl Into<String>) -> Self {
        Repository {
            uuid: uuid.into(),
            root_url: root_url.into(),
            state: Mutex::new(RepoState {
                revisions: vec![Arc::new(Node::empty_dir(Revision::ZERO))],
                rev_props: vec![PropertyMap::new()],
            }),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn head_rev(&self) -> Revision {
        let state = self.state.lock().unwrap();
        Revision::Number(state.revisions.len() as u64 - 1)
    }

    /// Resolves `Revision::Head` to the concrete head number; any other
    /// revision passes through unchanged (still subject to the bounds
    /// check in `root_at`/`rev_prop_get`).
    pub fn resolve(&self, rev: Revision) -> Revision {
        match rev {
            Revision::Head => self.head_rev(),
            other => other,
        }
    }

    pub fn root_at(&self, rev: Revision) -> anyhow::Result<Arc<Node>> {
        let rev = self.resolve(rev);
        let state = self.state.lock().unwrap();
        let n = rev
            .as_number()
            .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))?;
        state
            .revisions
            .get(n as usize)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))
    }

    pub fn rev_prop_get(&self, rev: Revision, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let rev = self.resolve(rev);
        let state = self.state.lock().unwrap();
        let n = rev.as_number().ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))? as usize;
        Ok(state.rev_props.get(n).and_then(|p| p.get(name).cloned()))
    }

    pub fn rev_prop_list(&self, rev: Revision) -> anyhow::Result<PropertyMap> {
        let rev = self.resolve(rev);
        let state = self.state.lock().unwrap();
        let n = rev.as_number().ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))? as usize;
        state
            .rev_props
            .get(n)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))
    }

    /// Writes through a single revision property. Callers that must
    /// normalize line endings for the names spec §3 marks as requiring it
    /// (`svn:log`, `svn:sync-*`, ...) do so before calling this, the way
    /// the sync driver normalizes before handing properties to the
    /// destination (spec §4.8.1).
    pub fn rev_prop_change(&self, rev: Revision, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()> {
        let rev = self.resolve(rev);
        let mut state = self.state.lock().unwrap();
        let n = rev.as_number().ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))? as usize;
        let props = state
            .rev_props
            .get_mut(n)
            .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(format!("revision {rev:?}"))))?;
        props.set(name, value);
        Ok(())
    }

    /// Begins a transaction against `base_rev` (or the current head, if
    /// `Head`/`Invalid`): an O(1) snapshot since the root is a shared
    /// `Arc` (spec §3 "Filesystem transaction").
    pub fn begin_txn(self: &Arc<Self>, base_rev: Revision) -> anyhow::Result<Txn> {
        let base_rev = self.resolve(base_rev);
        let root = self.root_at(base_rev)?;
        Ok(Txn {
            repo: self.clone(),
            base_rev,
            root,
            touches: Vec::new(),
        })
    }

    /// Validates `txn`'s recorded out-of-dateness checks against the
    /// *current* head (which may have advanced since the txn began),
    /// finalizes its touched nodes to the new revision number, and
    /// appends it (spec §4.7 "On conflict ... abort and return a
    /// conflict error naming the conflicting path").
    pub fn commit_txn(&self, txn: Txn, author: &str, log_message: &str) -> anyhow::Result<CommitInfo> {
        let mut state = self.state.lock().unwrap();
        let current_head_root = state.revisions.last().unwrap().clone();
        for (path, observed_base_rev) in &txn.touches {
            if let Some(node) = tree::lookup(&current_head_root, path) {
                if node.created_rev() > *observed_base_rev {
                    anyhow::bail!(SvnErrorKind::OutOfDate(path.as_str().to_string()));
                }
            }
        }

        let new_rev_num = state.revisions.len() as u64;
        let new_rev = Revision::Number(new_rev_num);
        let finalized_root = tree::finalize(&txn.root, new_rev);
        state.revisions.push(finalized_root);

        let mut props = PropertyMap::new();
        props.set("svn:author", Some(author.as_bytes().to_vec()));
        let date = now();
        props.set("svn:date", Some(date.to_string().into_bytes()));
        props.set("svn:log", Some(log_message.as_bytes().to_vec()));
        state.rev_props.push(props);

        Ok(CommitInfo {
            rev: new_rev,
            date,
            author: author.to_string(),
        })
    }
}

/// An in-progress edit against a pinned base revision (spec §3
/// "Filesystem transaction"). Mutations are pure, functional rewrites of
/// `root`; nothing is visible to other transactions until `Repository::
/// commit_txn` succeeds.
pub struct Txn {
    repo: Arc<Repository>,
    base_rev: Revision,
    root: Arc<Node>,
    /// Every out-of-dateness check this txn has performed and passed,
    /// re-validated against the real head at commit time.
    touches: Vec<(RepoPath, Revision)>,
}

impl Txn {
    pub fn base_rev(&self) -> Revision {
        self.base_rev
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn get(&self, path: &RepoPath) -> Option<Arc<Node>> {
        tree::lookup(&self.root, path)
    }

    fn record_touch(&mut self, path: &RepoPath, base_rev: Revision) {
        if base_rev.is_valid() {
            self.touches.push((path.clone(), base_rev));
        }
    }

    /// `delete-entry`: a no-op if the path is already absent (spec §4.7
    /// "idempotent delete"); otherwise out-of-date if the node was
    /// modified more recently than `base_rev`.
    pub fn delete(&mut self, path: &RepoPath, base_rev: Revision) -> anyhow::Result<()> {
        let existing = self.get(path);
        let Some(existing) = existing else { return Ok(()) };
        if base_rev.is_valid() {
            if let Some(observed) = base_rev.as_number() {
                if let Some(created) = existing.created_rev().as_number() {
                    if created > observed {
                        anyhow::bail!(SvnErrorKind::OutOfDate(path.as_str().to_string()));
                    }
                }
            }
        }
        self.record_touch(path, base_rev);
        self.root = tree::update_at(&self.root, path, |_| Ok(None))?;
        Ok(())
    }

    fn add(
        &mut self,
        path: &RepoPath,
        kind: NodeKind,
        copyfrom: Option<(Arc<Node>, RepoPath, Revision)>,
    ) -> anyhow::Result<()> {
        if self.get(path).is_some() {
            anyhow::bail!(SvnErrorKind::Conflict(format!("'{}' already exists in this transaction", path.as_str())));
        }
        let node = match copyfrom {
            Some((source, src_path, src_rev)) => match (&*source, kind) {
                (Node::Directory(d), NodeKind::Directory) => Node::Directory(DirNode {
                    copied_from: Some((src_path, src_rev)),
                    ..d.clone()
                }),
                (Node::File(f), NodeKind::File) => Node::File(FileNode {
                    copied_from: Some((src_path, src_rev)),
                    ..f.clone()
                }),
                _ => anyhow::bail!(SvnErrorKind::UnsupportedFeature(
                    "copyfrom source kind does not match the add kind".to_string()
                )),
            },
            None => match kind {
                NodeKind::Directory => Node::empty_dir(Revision::Invalid),
                NodeKind::File => Node::new_file(Revision::Invalid),
                _ => anyhow::bail!(SvnErrorKind::UnsupportedFeature("cannot add a node of unknown kind".to_string())),
            },
        };
        self.root = tree::update_at(&self.root, path, |_| Ok(Some(Arc::new(node))))?;
        Ok(())
    }

    pub fn add_directory(&mut self, path: &RepoPath, copyfrom: Option<(Arc<Node>, RepoPath, Revision)>) -> anyhow::Result<()> {
        self.add(path, NodeKind::Directory, copyfrom)
    }

    pub fn add_file(&mut self, path: &RepoPath, copyfrom: Option<(Arc<Node>, RepoPath, Revision)>) -> anyhow::Result<()> {
        self.add(path, NodeKind::File, copyfrom)
    }

    /// `open-directory`/`open-file`: no structural change, just the
    /// out-of-date check against `base_rev` (spec §4.7 "for files, read
    /// the node's created-revision and fail out-of-date if base-rev <
    /// created-rev").
    pub fn open(&mut self, path: &RepoPath, base_rev: Revision, expect_kind: NodeKind) -> anyhow::Result<()> {
        let node = self
            .get(path)
            .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(path.as_str().to_string())))?;
        if node.kind() != expect_kind {
            anyhow::bail!(SvnErrorKind::UnversionedPath(path.as_str().to_string()));
        }
        if let (Some(observed), Some(created)) = (base_rev.as_number(), node.created_rev().as_number()) {
            if observed < created {
                anyhow::bail!(SvnErrorKind::OutOfDate(path.as_str().to_string()));
            }
        }
        self.record_touch(path, base_rev);
        Ok(())
    }

    pub fn change_prop(&mut self, path: &RepoPath, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()> {
        self.root = tree::update_at(&self.root, path, |existing| {
            let existing = existing.ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(path.as_str().to_string())))?;
            let mut props = existing.props().clone();
            props.set(name, value);
            let rewritten = match &**existing {
                Node::Directory(d) => Node::Directory(DirNode {
                    props,
                    children: d.children.clone(),
                    created_rev: Revision::Invalid,
                    copied_from: d.copied_from.clone(),
                }),
                Node::File(f) => Node::File(FileNode {
                    props,
                    content: f.content.clone(),
                    created_rev: Revision::Invalid,
                    copied_from: f.copied_from.clone(),
                }),
            };
            Ok(Some(Arc::new(rewritten)))
        })?;
        Ok(())
    }

    pub fn set_file_content(&mut self, path: &RepoPath, content: Vec<u8>) -> anyhow::Result<()> {
        self.root = tree::update_at(&self.root, path, |existing| {
            let existing = existing.ok_or_else(|| anyhow::anyhow!(SvnErrorKind::NotFound(path.as_str().to_string())))?;
            let file = existing
                .as_file()
                .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::UnversionedPath(path.as_str().to_string())))?;
            Ok(Some(Arc::new(Node::File(FileNode {
                props: file.props.clone(),
                content: Arc::new(content),
                created_rev: Revision::Invalid,
                copied_from: file.copied_from.clone(),
            }))))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_repository_starts_at_revision_zero_with_an_empty_root() {
        let repo = Repository::new("uuid-1", "file:///repo");
        assert_eq!(repo.head_rev(), Revision::ZERO);
        let root = repo.root_at(Revision::ZERO).unwrap();
        assert!(root.as_directory().unwrap().children.is_empty());
    }

    #[test]
    fn committing_a_txn_advances_the_head_and_records_author_and_log() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut txn = repo.begin_txn(Revision::Head).unwrap();
        txn.add_file(&RepoPath::from("a.txt"), None).unwrap();
        txn.set_file_content(&RepoPath::from("a.txt"), b"hello".to_vec()).unwrap();

        let info = repo.commit_txn(txn, "jrandom", "add a.txt").unwrap();
        assert_eq!(info.rev, Revision::Number(1));
        assert_eq!(repo.head_rev(), Revision::Number(1));
        assert_eq!(repo.rev_prop_get(Revision::Number(1), "svn:author").unwrap(), Some(b"jrandom".to_vec()));
        assert_eq!(repo.rev_prop_get(Revision::Number(1), "svn:log").unwrap(), Some(b"add a.txt".to_vec()));

        let root = repo.root_at(Revision::Number(1)).unwrap();
        let a = tree::lookup(&root, &RepoPath::from("a.txt")).unwrap();
        assert_eq!(a.as_file().unwrap().content.as_slice(), b"hello");
    }

    #[test]
    fn out_of_date_delete_is_rejected_at_check_time() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut setup = repo.begin_txn(Revision::Head).unwrap();
        setup.add_file(&RepoPath::from("x.txt"), None).unwrap();
        repo.commit_txn(setup, "alice", "add x").unwrap(); // x.txt is now at rev 1

        let mut txn = repo.begin_txn(Revision::Head).unwrap();
        let err = txn.delete(&RepoPath::from("x.txt"), Revision::Number(0));
        assert!(err.is_err());
    }

    #[test]
    fn racing_commits_detect_the_conflict_at_commit_time() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut setup = repo.begin_txn(Revision::Head).unwrap();
        setup.add_file(&RepoPath::from("x.txt"), None).unwrap();
        repo.commit_txn(setup, "alice", "add x").unwrap(); // rev 1

        // Both txns begin against rev 1.
        let mut txn_a = repo.begin_txn(Revision::Head).unwrap();
        txn_a.open(&RepoPath::from("x.txt"), Revision::Number(1), NodeKind::File).unwrap();
        txn_a.set_file_content(&RepoPath::from("x.txt"), b"from a".to_vec()).unwrap();

        let mut txn_b = repo.begin_txn(Revision::Head).unwrap();
        txn_b.open(&RepoPath::from("x.txt"), Revision::Number(1), NodeKind::File).unwrap();
        txn_b.set_file_content(&RepoPath::from("x.txt"), b"from b".to_vec()).unwrap();

        repo.commit_txn(txn_a, "alice", "edit from a").unwrap(); // wins, becomes rev 2
        let result = repo.commit_txn(txn_b, "bob", "edit from b");
        assert!(result.is_err());
    }

    #[test]
    fn copy_with_history_shares_the_source_nodes_arc() {
        let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));
        let mut setup = repo.begin_txn(Revision::Head).unwrap();
        setup.add_file(&RepoPath::from("a.txt"), None).unwrap();
        setup.set_file_content(&RepoPath::from("a.txt"), b"original".to_vec()).unwrap();
        repo.commit_txn(setup, "alice", "add a").unwrap(); // rev 1

        let source_root = repo.root_at(Revision::Number(1)).unwrap();
        let source_node = tree::lookup(&source_root, &RepoPath::from("a.txt")).unwrap();

        let mut txn = repo.begin_txn(Revision::Head).unwrap();
        txn.add_file(&RepoPath::from("b.txt"), Some((source_node.clone(), RepoPath::from("a.txt"), Revision::Number(1))))
            .unwrap();
        let info = repo.commit_txn(txn, "alice", "copy a to b").unwrap();

        let root = repo.root_at(info.rev).unwrap();
        let b = tree::lookup(&root, &RepoPath::from("b.txt")).unwrap();
        assert_eq!(b.as_file().unwrap().content, source_node.as_file().unwrap().content);
        assert_eq!(b.copied_from(), Some(&(RepoPath::from("a.txt"), Revision::Number(1))));
    }
}
