// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! End-to-end commit-driver tests: a `WorkingCopy<MemWcStore>` with scheduled
//! changes, driven against a real `svn_repo::CommitEditor` over an in-process
//! `Repository`, the same pairing `svn_repo`'s own tests use for a delta
//! editor, but exercised from the producer side this crate owns.

use std::sync::Arc;

use svn_repo::{CommitEditor, Node, RecordingCommitCallback, Repository};
use svn_types::{Depth, NodeKind, RepoPath, Revision, Schedule};
use svn_wc::{MemWcStore, WorkingCopy};

use crate::driver::{apply_post_commit, commit, compute_anchor, PendingOp};
use crate::working_text::MemWorkingText;

fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn wc() -> WorkingCopy<MemWcStore> {
    WorkingCopy::new(MemWcStore::new(), test_logger())
}

/// `svn_repo::tree::lookup` isn't exported (that module is private); its
/// logic is two lines over the public `Node::as_directory`/`DirNode::children`,
/// so tests reimplement it rather than reach into the crate's internals.
fn lookup(root: &Arc<Node>, path: &RepoPath) -> Option<Arc<Node>> {
    let mut current = root.clone();
    for segment in path.segments() {
        let dir = current.as_directory()?;
        current = dir.children.get(segment)?.clone();
    }
    Some(current)
}

async fn run_commit(
    wc: &WorkingCopy<MemWcStore>,
    working_text: &MemWorkingText,
    targets: &[RepoPath],
    repo: &Arc<Repository>,
) -> Revision {
    let anchor = compute_anchor(wc, targets).await.unwrap();
    let callback = RecordingCommitCallback::default();
    let mut editor = CommitEditor::new(repo.clone(), Revision::Head, anchor, "jrandom", "log message", Box::new(callback)).unwrap();

    let pending = commit(wc, working_text, targets, Depth::Infinity, &mut editor, &svn_error::Cancellation::never())
        .await
        .unwrap();
    editor.close_edit().await.unwrap();

    let rev = repo.head_rev();
    let props = repo.rev_prop_list(rev).unwrap();
    let date: i64 = props.get_str("svn:date").unwrap().parse().unwrap();
    let author = props.get_str("svn:author").unwrap().to_string();

    apply_post_commit(wc, &pending, rev, date, &author).await.unwrap();
    rev
}

#[tokio::test]
async fn adding_a_single_file_commits_its_text_and_records_the_pristine_base() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let path = RepoPath::from("hello.txt");
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&path, b"hello world".to_vec());

    let rev = run_commit(&wc, &working_text, &[path.clone()], &repo).await;
    assert_eq!(rev, Revision::Number(1));

    let root = repo.root_at(rev).unwrap();
    let node = lookup(&root, &path).unwrap();
    assert_eq!(node.as_file().unwrap().content.as_slice(), b"hello world");

    let entry = wc.get_entry(&path).await.unwrap().unwrap();
    assert_eq!(entry.schedule, Schedule::Normal);
    assert_eq!(entry.last_committed_rev, Revision::Number(1));
    assert_eq!(wc.pristine_text(&path).await.unwrap().as_deref(), Some(b"hello world".as_slice()));
}

#[tokio::test]
async fn modifying_a_file_sends_a_textdelta_against_the_real_base_not_an_empty_source() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let path = RepoPath::from("a.txt");
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&path, b"line one\nline two\n".to_vec());
    run_commit(&wc, &working_text, &[path.clone()], &repo).await;

    // Now modify just one line; the driver must diff against the
    // committed pristine, not an empty source.
    working_text.set(&path, b"line one\nline TWO\n".to_vec());
    let rev = run_commit(&wc, &working_text, &[path.clone()], &repo).await;
    assert_eq!(rev, Revision::Number(2));

    let root = repo.root_at(rev).unwrap();
    let node = lookup(&root, &path).unwrap();
    assert_eq!(node.as_file().unwrap().content.as_slice(), b"line one\nline TWO\n");
    assert_eq!(wc.pristine_text(&path).await.unwrap().as_deref(), Some(b"line one\nline TWO\n".as_slice()));
}

#[tokio::test]
async fn a_property_only_change_never_calls_apply_textdelta() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let path = RepoPath::from("a.txt");
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&path, b"unchanged".to_vec());
    run_commit(&wc, &working_text, &[path.clone()], &repo).await;

    wc.set_prop(&path, "svn:keywords", Some(b"Id".to_vec())).await.unwrap();
    let rev = run_commit(&wc, &working_text, &[path.clone()], &repo).await;
    assert_eq!(rev, Revision::Number(2));

    let root = repo.root_at(rev).unwrap();
    let node = lookup(&root, &path).unwrap();
    assert_eq!(node.as_file().unwrap().content.as_slice(), b"unchanged");
    assert_eq!(node.props().get("svn:keywords").map(|v| v.as_slice()), Some(b"Id".as_slice()));
}

#[tokio::test]
async fn deleting_a_file_removes_its_working_copy_entry() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let path = RepoPath::from("gone.txt");
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&path, b"temporary".to_vec());
    run_commit(&wc, &working_text, &[path.clone()], &repo).await;

    wc.schedule_delete(&path).await.unwrap();
    let rev = run_commit(&wc, &working_text, &[path.clone()], &repo).await;
    assert_eq!(rev, Revision::Number(2));

    assert!(wc.get_entry(&path).await.unwrap().is_none());
    let root = repo.root_at(rev).unwrap();
    assert!(lookup(&root, &path).is_none());
}

#[tokio::test]
async fn replacing_a_deleted_path_emits_delete_then_add() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let path = RepoPath::from("a.txt");
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&path, b"first".to_vec());
    run_commit(&wc, &working_text, &[path.clone()], &repo).await;

    wc.schedule_delete(&path).await.unwrap();
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    working_text.set(&path, b"second".to_vec());
    let entry = wc.get_entry(&path).await.unwrap().unwrap();
    assert_eq!(entry.schedule, Schedule::Replace);

    let rev = run_commit(&wc, &working_text, &[path.clone()], &repo).await;
    let root = repo.root_at(rev).unwrap();
    let node = lookup(&root, &path).unwrap();
    assert_eq!(node.as_file().unwrap().content.as_slice(), b"second");
}

#[tokio::test]
async fn adding_a_directory_with_a_nested_file_opens_every_ancestor_once() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let trunk = RepoPath::from("trunk");
    let dir = RepoPath::from("trunk/src");
    let file = RepoPath::from("trunk/src/main.c");
    wc.schedule_add(&trunk, NodeKind::Directory, None).await.unwrap();
    wc.schedule_add(&dir, NodeKind::Directory, None).await.unwrap();
    wc.schedule_add(&file, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&file, b"int main() {}\n".to_vec());

    let rev = run_commit(&wc, &working_text, &[trunk], &repo).await;
    assert_eq!(rev, Revision::Number(1));

    let root = repo.root_at(rev).unwrap();
    let node = lookup(&root, &file).unwrap();
    assert_eq!(node.as_file().unwrap().content.as_slice(), b"int main() {}\n");
    assert!(lookup(&root, &dir).unwrap().as_directory().is_some());
}

#[tokio::test]
async fn an_empty_target_set_commits_nothing() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let callback = RecordingCommitCallback::default();
    let mut editor = CommitEditor::new(repo.clone(), Revision::Head, RepoPath::root(), "jrandom", "nothing", Box::new(callback)).unwrap();
    let pending = commit(&wc, &MemWorkingText::new(), &[], Depth::Infinity, &mut editor, &svn_error::Cancellation::never())
        .await
        .unwrap();
    assert!(pending.is_empty());
    assert_eq!(repo.head_rev(), Revision::ZERO);
}

#[tokio::test]
async fn pending_committed_text_matches_what_apply_post_commit_writes_back() {
    let wc = wc();
    let repo = Arc::new(Repository::new("uuid-1", "file:///repo"));

    let path = RepoPath::from("a.txt");
    wc.schedule_add(&path, NodeKind::File, None).await.unwrap();
    let working_text = MemWorkingText::new();
    working_text.set(&path, b"payload".to_vec());

    let anchor = compute_anchor(&wc, &[path.clone()]).await.unwrap();
    let callback = RecordingCommitCallback::default();
    let mut editor = CommitEditor::new(repo.clone(), Revision::Head, anchor, "jrandom", "add a", Box::new(callback)).unwrap();
    let pending = commit(&wc, &working_text, &[path.clone()], Depth::Infinity, &mut editor, &svn_error::Cancellation::never())
        .await
        .unwrap();
    editor.close_edit().await.unwrap();

    assert_eq!(pending.len(), 1);
    match &pending[0].op {
        PendingOp::Committed { new_text } => assert_eq!(new_text.as_deref(), Some(b"payload".as_slice())),
        PendingOp::Deleted => panic!("expected a committed add"),
    }
}
