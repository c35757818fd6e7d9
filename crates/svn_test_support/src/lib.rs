// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The seed scenarios from spec §8, wired end to end across crate
//! boundaries: a working copy's scheduled changes through the commit
//! driver and a real repository commit editor, and a source/destination
//! pair of repositories through the sync engine. Each crate's own test
//! module already covers its layer in isolation (`svn_repo::commit_editor`
//! for the out-of-date and copy-with-history checks at the `Txn` level,
//! `svn_sync::engine` for the bookkeeping state machine); this crate
//! exists to exercise the same scenarios through the full stack a real
//! caller drives, the way `mercurial_types/tests` sits above `blobrepo`
//! and `mercurial_types` rather than duplicating either crate's unit
//! tests.

use std::sync::Arc;

use svn_commit_driver::{apply_post_commit, commit, compute_anchor, MemWorkingText};
use svn_error::Cancellation;
use svn_repo::{CommitEditor, InMemorySession, Node, RecordingCommitCallback, Repository};
use svn_types::{Depth, NodeKind, PropertyMap, RepoPath, Revision, Schedule};
use svn_wc::{MemWcStore, WorkingCopy};

pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub fn new_wc() -> WorkingCopy<MemWcStore> {
    WorkingCopy::new(MemWcStore::new(), test_logger())
}

pub fn new_repo(uuid: &str, root_url: &str) -> Arc<Repository> {
    Arc::new(Repository::new(uuid, root_url))
}

/// `svn_repo::tree::lookup` is a private module function; every crate
/// downstream of `svn_repo` that needs to inspect a committed tree in
/// its own tests reimplements this two-line walk over the public
/// `Node::as_directory`/`DirNode::children` rather than reaching into
/// `svn_repo`'s internals.
pub fn lookup(root: &Arc<Node>, path: &RepoPath) -> Option<Arc<Node>> {
    let mut current = root.clone();
    for segment in path.segments() {
        let dir = current.as_directory()?;
        current = dir.children.get(segment)?.clone();
    }
    Some(current)
}

/// Drives a full commit of `targets` from `wc`'s scheduled changes
/// through a real `svn_repo::CommitEditor`, then applies post-commit
/// bookkeeping back onto `wc` — the same round trip a command-line
/// `commit` makes, minus the argument parsing spec §1 places out of
/// scope.
pub async fn run_commit(
    wc: &WorkingCopy<MemWcStore>,
    working_text: &MemWorkingText,
    targets: &[RepoPath],
    repo: &Arc<Repository>,
    author: &str,
    log_message: &str,
) -> anyhow::Result<Revision> {
    let anchor = compute_anchor(wc, targets).await?;
    let callback = RecordingCommitCallback::default();
    let mut editor = CommitEditor::new(repo.clone(), Revision::Head, anchor, author, log_message, Box::new(callback))?;

    let pending = commit(wc, working_text, targets, Depth::Infinity, &mut editor, &Cancellation::never()).await?;
    editor.close_edit().await?;

    let rev = repo.head_rev();
    let props = repo.rev_prop_list(rev)?;
    let date: i64 = props.get_str("svn:date").unwrap_or("0").parse().unwrap_or(0);
    let recorded_author = props.get_str("svn:author").unwrap_or("").to_string();

    apply_post_commit(wc, &pending, rev, date, &recorded_author).await?;
    Ok(rev)
}
