// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Drives an `Editor` across the difference between two versioned trees
//! (spec §4.7.1, §9 "vtable of callbacks"). The same recursive walk
//! serves `replay_range` (baseline = the previous revision's tree, or
//! none at revision 0) and `do_diff` (baseline = the reporter's claimed
//! working state); a copy's baseline is its source subtree, so edits made
//! to a freshly-copied file in the same revision still surface as a
//! textdelta against the source rather than a full re-send.

use std::sync::Arc;

use svn_delta::{CopyFrom, Editor};
use svn_txdelta::diff_bytes;
use svn_types::{Checksum, RepoPath, Revision};

use crate::tree::{FileNode, Node};

/// Resolves a `copied_from` pair to the node it names, so the differ can
/// use it as the baseline for the copy's subtree. `None` if the source
/// can't be resolved (the copy is still emitted; it's just treated as a
/// fresh add for diffing purposes).
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, path: &RepoPath, rev: Revision) -> Option<Arc<Node>>;
}

/// Drives `editor` through the edit that turns `baseline_root` (or empty,
/// if `None`) into `target_root`. `base_rev` is reported on every
/// `open_*`/`delete_entry` call (the revision the consumer should
/// consider itself working from).
pub async fn drive_diff(
    editor: &mut (dyn Editor<Handle = RepoPath> + Send),
    base_rev: Revision,
    baseline_root: Option<&Arc<Node>>,
    target_root: &Arc<Node>,
    resolver: &dyn SourceResolver,
) -> anyhow::Result<()> {
    let root = editor.open_root(base_rev).await?;
    diff_dir_contents(editor, &root, &RepoPath::root(), baseline_root, target_root, base_rev, resolver).await?;
    editor.close_directory(&root).await
}

fn not_a_directory(path: &RepoPath) -> anyhow::Error {
    anyhow::anyhow!(svn_error::SvnErrorKind::ProtocolViolation(format!(
        "'{}' is not a directory",
        path.as_str()
    )))
}

async fn diff_dir_contents(
    editor: &mut (dyn Editor<Handle = RepoPath> + Send),
    handle: &RepoPath,
    dir_path: &RepoPath,
    baseline: Option<&Arc<Node>>,
    target: &Arc<Node>,
    base_rev: Revision,
    resolver: &dyn SourceResolver,
) -> anyhow::Result<()> {
    let target_dir = target.as_directory().ok_or_else(|| not_a_directory(dir_path))?;
    let baseline_dir = match baseline {
        Some(b) => Some(b.as_directory().ok_or_else(|| not_a_directory(dir_path))?),
        None => None,
    };

    match baseline_dir {
        Some(bd) => {
            for (name, _old, new) in bd.props.diff(&target_dir.props) {
                editor.change_dir_prop(handle, name, new.cloned()).await?;
            }
        }
        None => {
            for (name, value) in target_dir.props.iter() {
                editor.change_dir_prop(handle, name, Some(value.to_vec())).await?;
            }
        }
    }

    if let Some(bd) = baseline_dir {
        for (child_name, baseline_child) in &bd.children {
            let still_same_kind = target_dir
                .children
                .get(child_name)
                .map(|t| t.kind() == baseline_child.kind())
                .unwrap_or(false);
            if !still_same_kind {
                editor.delete_entry(handle, child_name, base_rev).await?;
            }
        }
    }

    for (child_name, target_child) in &target_dir.children {
        let baseline_child = baseline_dir.and_then(|bd| bd.children.get(child_name));
        let child_path = dir_path.join(child_name);
        diff_child(editor, handle, child_name, &child_path, baseline_child, target_child, base_rev, resolver).await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn diff_child(
    editor: &mut (dyn Editor<Handle = RepoPath> + Send),
    parent: &RepoPath,
    name: &str,
    child_path: &RepoPath,
    baseline_child: Option<&Arc<Node>>,
    target_child: &Arc<Node>,
    base_rev: Revision,
    resolver: &dyn SourceResolver,
) -> anyhow::Result<()> {
    if let Some(b) = baseline_child {
        if Arc::ptr_eq(b, target_child) {
            return Ok(());
        }
        if b.kind() == target_child.kind() {
            match &**target_child {
                Node::Directory(_) => {
                    let child_handle = editor.open_directory(parent, name, base_rev).await?;
                    diff_dir_contents(editor, &child_handle, child_path, Some(b), target_child, base_rev, resolver).await?;
                    editor.close_directory(&child_handle).await?;
                }
                Node::File(tf) => {
                    let child_handle = editor.open_file(parent, name, base_rev).await?;
                    diff_file_contents(editor, &child_handle, b.as_file(), tf).await?;
                    editor.close_file(&child_handle, Some(Checksum::md5_of(&tf.content))).await?;
                }
            }
            return Ok(());
        }
    }

    let copyfrom = target_child
        .copied_from()
        .map(|(path, rev)| CopyFrom { path: path.as_str().to_string(), rev: *rev });
    let copy_source = target_child.copied_from().and_then(|(path, rev)| resolver.resolve(path, *rev));

    match &**target_child {
        Node::Directory(_) => {
            let child_handle = editor.add_directory(parent, name, copyfrom).await?;
            diff_dir_contents(editor, &child_handle, child_path, copy_source.as_ref(), target_child, base_rev, resolver).await?;
            editor.close_directory(&child_handle).await?;
        }
        Node::File(tf) => {
            let child_handle = editor.add_file(parent, name, copyfrom).await?;
            let baseline_file = copy_source.as_deref().and_then(Node::as_file);
            diff_file_contents(editor, &child_handle, baseline_file, tf).await?;
            editor.close_file(&child_handle, Some(Checksum::md5_of(&tf.content))).await?;
        }
    }
    Ok(())
}

async fn diff_file_contents(
    editor: &mut (dyn Editor<Handle = RepoPath> + Send),
    handle: &RepoPath,
    baseline: Option<&FileNode>,
    target: &FileNode,
) -> anyhow::Result<()> {
    match baseline {
        Some(bf) => {
            for (name, _old, new) in bf.props.diff(&target.props) {
                editor.change_file_prop(handle, name, new.cloned()).await?;
            }
            if bf.content != target.content {
                let base_checksum = Checksum::md5_of(&bf.content);
                let mut sink = editor.apply_textdelta(handle, Some(base_checksum)).await?;
                for window in diff_bytes(&bf.content, &target.content) {
                    sink.send_window(window).await?;
                }
            }
        }
        None => {
            for (name, value) in target.props.iter() {
                editor.change_file_prop(handle, name, Some(value.to_vec())).await?;
            }
            let mut sink = editor.apply_textdelta(handle, None).await?;
            for window in diff_bytes(&[], &target.content) {
                sink.send_window(window).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Repository;
    use crate::commit_editor::{CommitEditor, RecordingCommitCallback};
    use std::sync::Arc;
    use svn_txdelta::Window;

    struct NoResolver;
    impl SourceResolver for NoResolver {
        fn resolve(&self, _path: &RepoPath, _rev: Revision) -> Option<Arc<Node>> {
            None
        }
    }

    struct RepoResolver(Arc<Repository>);
    impl SourceResolver for RepoResolver {
        fn resolve(&self, path: &RepoPath, rev: Revision) -> Option<Arc<Node>> {
            let root = self.0.root_at(rev).ok()?;
            crate::tree::lookup(&root, path)
        }
    }

    #[tokio::test]
    async fn diffing_against_an_empty_baseline_adds_everything() {
        let repo = Arc::new(Repository::new("uuid", "file:///r"));
        let mut setup = repo.begin_txn(Revision::Head).unwrap();
        setup.add_file(&RepoPath::from("a.txt"), None).unwrap();
        setup.set_file_content(&RepoPath::from("a.txt"), b"hi".to_vec()).unwrap();
        repo.commit_txn(setup, "alice", "add a").unwrap();

        let target = repo.root_at(Revision::Number(1)).unwrap();

        let mut editor = CommitEditor::new(repo.clone(), Revision::Head, RepoPath::root(), "replay", "replay r1", Box::new(RecordingCommitCallback::default())).unwrap();
        drive_diff(&mut editor, Revision::Number(1), None, &target, &NoResolver).await.unwrap();
        editor.close_edit().await.unwrap();

        let replayed = repo.root_at(Revision::Number(2)).unwrap();
        let node = crate::tree::lookup(&replayed, &RepoPath::from("a.txt")).unwrap();
        assert_eq!(node.as_file().unwrap().content.as_slice(), b"hi");
    }

    #[tokio::test]
    async fn unchanged_subtrees_are_skipped_by_ptr_equality() {
        let repo = Arc::new(Repository::new("uuid", "file:///r"));
        let mut setup = repo.begin_txn(Revision::Head).unwrap();
        setup.add_directory(&RepoPath::from("trunk"), None).unwrap();
        setup.add_file(&RepoPath::from("trunk/a.txt"), None).unwrap();
        repo.commit_txn(setup, "alice", "setup").unwrap(); // rev 1

        let mut edit = repo.begin_txn(Revision::Head).unwrap();
        edit.add_file(&RepoPath::from("trunk/b.txt"), None).unwrap();
        repo.commit_txn(edit, "alice", "add b").unwrap(); // rev 2

        let baseline = repo.root_at(Revision::Number(1)).unwrap();
        let target = repo.root_at(Revision::Number(2)).unwrap();

        let mut editor = CommitEditor::new(repo.clone(), Revision::Number(1), RepoPath::root(), "replay", "replay r2", Box::new(RecordingCommitCallback::default())).unwrap();
        drive_diff(&mut editor, Revision::Number(2), Some(&baseline), &target, &NoResolver).await.unwrap();
        editor.close_edit().await.unwrap();

        let replayed = repo.root_at(Revision::Number(3)).unwrap();
        assert!(crate::tree::lookup(&replayed, &RepoPath::from("trunk/a.txt")).is_some());
        assert!(crate::tree::lookup(&replayed, &RepoPath::from("trunk/b.txt")).is_some());
    }

    #[tokio::test]
    async fn a_copy_diffs_against_its_source_not_as_a_fresh_add() {
        let repo = Arc::new(Repository::new("uuid", "file:///r"));
        let mut setup = repo.begin_txn(Revision::Head).unwrap();
        setup.add_file(&RepoPath::from("a.txt"), None).unwrap();
        setup.set_file_content(&RepoPath::from("a.txt"), b"original content".to_vec()).unwrap();
        repo.commit_txn(setup, "alice", "add a").unwrap(); // rev 1

        let source_root = repo.root_at(Revision::Number(1)).unwrap();
        let source_node = crate::tree::lookup(&source_root, &RepoPath::from("a.txt")).unwrap();

        let mut copy_txn = repo.begin_txn(Revision::Head).unwrap();
        copy_txn
            .add_file(&RepoPath::from("b.txt"), Some((source_node, RepoPath::from("a.txt"), Revision::Number(1))))
            .unwrap();
        let info = repo.commit_txn(copy_txn, "alice", "copy a to b").unwrap(); // rev 2
        let target = repo.root_at(info.rev).unwrap();

        let mut editor = CommitEditor::new(repo.clone(), Revision::Number(1), RepoPath::root(), "replay", "replay r2", Box::new(RecordingCommitCallback::default())).unwrap();
        drive_diff(&mut editor, info.rev, Some(&source_root), &target, &RepoResolver(repo.clone())).await.unwrap();
        editor.close_edit().await.unwrap();

        let replayed = repo.root_at(Revision::Number(3)).unwrap();
        let b = crate::tree::lookup(&replayed, &RepoPath::from("b.txt")).unwrap();
        assert_eq!(b.as_file().unwrap().content.as_slice(), b"original content");
        let _ = Window::null();
    }
}
