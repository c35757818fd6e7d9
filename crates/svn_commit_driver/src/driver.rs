// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Drives any `Editor` from a working copy's gathered changes (spec
//! §4.6 "depth-first emission"). Generic over `Editor::Handle`, which
//! this crate never assumes is a `RepoPath` — a combinator or an update
//! editor may hand out a different handle shape entirely.

use std::collections::{BTreeMap, BTreeSet};

use svn_delta::{CopyFrom, Editor};
use svn_error::Cancellation;
use svn_types::{Checksum, Depth, NodeKind, RepoPath, Revision, Schedule};
use svn_wc::{AdminLog, EntriesStore, PristineStore, PropertyStore, TempArea, WorkingCopy};

use crate::gather::{common_ancestor, gather_changes, ChangeOp, GatheredChange};
use crate::working_text::WorkingText;

/// What happened at one path, once the edit has been driven through;
/// returned so the caller can apply post-commit bookkeeping (spec §4.6
/// "post-commit bookkeeping") once it knows the new revision, date, and
/// author — information this crate has no way to obtain on its own,
/// since that comes back through whatever `CommitCallback`-equivalent
/// the consumer editor used.
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub path: RepoPath,
    pub kind: NodeKind,
    pub op: PendingOp,
}

#[derive(Debug, Clone)]
pub enum PendingOp {
    Deleted,
    /// Carries the repository-form text that was committed, so the
    /// caller can replace the pristine base with it; `None` for
    /// directories and for property-only changes to a file.
    Committed { new_text: Option<Vec<u8>> },
}

/// The deepest common ancestor directory a commit of `targets` can anchor
/// its editor session at (spec §4.6 "anchor selection"): a caller opens
/// its RA session (or, here, constructs its `Editor`) at this path *before*
/// calling `commit`, the same way `svn_client_commit` opens its session at
/// the anchor URL before requesting a commit editor over it. A directory
/// target only qualifies as its own anchor when it already exists in the
/// repository; one freshly scheduled for addition climbs to its parent,
/// like a plain file always does, since there is nothing yet to open it.
pub async fn compute_anchor<S>(wc: &WorkingCopy<S>, targets: &[RepoPath]) -> anyhow::Result<RepoPath>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea + Send + Sync,
{
    let mut anchor_dirs = Vec::with_capacity(targets.len());
    for target in targets {
        let entry = wc
            .get_entry(target)
            .await?
            .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::UnversionedPath(target.as_str().to_string())))?;
        let is_existing_dir = entry.kind == NodeKind::Directory && entry.schedule == Schedule::Normal;
        anchor_dirs.push(if is_existing_dir { target.clone() } else { target.parent() });
    }
    Ok(common_ancestor(&anchor_dirs))
}

/// Drives `editor` through every local modification under `targets`,
/// to `depth`, and returns what was committed at each path. `editor`'s
/// session must already be anchored at `compute_anchor(wc, targets)` — the
/// same way an RA session is opened at the anchor URL before its commit
/// editor is requested — so that `editor.open_root()` lands at that path.
/// Does not call `close_edit`; the caller controls when the edit is
/// finalized (so it can wire up its own commit callback first).
pub async fn commit<S, E>(
    wc: &WorkingCopy<S>,
    working_text: &dyn WorkingText,
    targets: &[RepoPath],
    depth: Depth,
    editor: &mut E,
    cancel: &Cancellation,
) -> anyhow::Result<Vec<PendingChange>>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea + Send + Sync,
    E: Editor,
{
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    cancel.check()?;
    let anchor = compute_anchor(wc, targets).await?;

    let changes = gather_changes(wc, working_text, targets, depth, cancel).await?;
    if changes.is_empty() {
        return Ok(Vec::new());
    }

    let mut need_open: BTreeMap<RepoPath, Revision> = BTreeMap::new();
    for path in changes.keys() {
        if path.as_str() == anchor.as_str() {
            continue;
        }
        for ancestor in ancestors_between(&path.parent(), &anchor) {
            if !changes.contains_key(&ancestor) && !need_open.contains_key(&ancestor) {
                let base_rev = wc.get_entry(&ancestor).await?.map(|e| e.base_rev).unwrap_or(Revision::Invalid);
                need_open.insert(ancestor, base_rev);
            }
        }
    }

    let anchor_base_rev = wc.get_entry(&anchor).await?.map(|e| e.base_rev).unwrap_or(Revision::Invalid);
    let anchor_handle = editor.open_root(anchor_base_rev).await?;

    let mut pending = Vec::new();
    if let Some(anchor_change) = changes.get(&anchor) {
        apply_dir_prop_changes(editor, &anchor_handle, anchor_change).await?;
        push_dir_pending(&mut pending, &anchor, anchor_change);
    }
    emit_dir(editor, anchor_handle.clone(), &anchor, &changes, &need_open, &mut pending, cancel).await?;
    editor.close_directory(&anchor_handle).await?;

    Ok(pending)
}

/// The directory chain strictly between `anchor` (exclusive) and `path`
/// (inclusive), root-to-leaf. Empty when `path` already is `anchor`.
fn ancestors_between(path: &RepoPath, anchor: &RepoPath) -> Vec<RepoPath> {
    let mut out = Vec::new();
    let mut cur = path.clone();
    loop {
        if cur.as_str() == anchor.as_str() {
            break;
        }
        out.push(cur.clone());
        if cur.is_root() {
            break;
        }
        cur = cur.parent();
    }
    out.reverse();
    out
}

fn push_dir_pending(pending: &mut Vec<PendingChange>, path: &RepoPath, change: &GatheredChange) {
    match &change.op {
        ChangeOp::Delete => pending.push(PendingChange { path: path.clone(), kind: change.kind, op: PendingOp::Deleted }),
        ChangeOp::Add { .. } | ChangeOp::Modify { .. } => {
            pending.push(PendingChange { path: path.clone(), kind: change.kind, op: PendingOp::Committed { new_text: None } })
        }
    }
}

async fn apply_dir_prop_changes<E: Editor>(editor: &mut E, handle: &E::Handle, change: &GatheredChange) -> anyhow::Result<()> {
    let prop_changes = match &change.op {
        ChangeOp::Add { prop_changes, .. } | ChangeOp::Modify { prop_changes, .. } => prop_changes,
        ChangeOp::Delete => return Ok(()),
    };
    for (name, value) in prop_changes {
        editor.change_dir_prop(handle, name, value.clone()).await?;
    }
    Ok(())
}

async fn apply_file_prop_changes<E: Editor>(editor: &mut E, handle: &E::Handle, change: &GatheredChange) -> anyhow::Result<()> {
    let prop_changes = match &change.op {
        ChangeOp::Add { prop_changes, .. } | ChangeOp::Modify { prop_changes, .. } => prop_changes,
        ChangeOp::Delete => return Ok(()),
    };
    for (name, value) in prop_changes {
        editor.change_file_prop(handle, name, value.clone()).await?;
    }
    Ok(())
}

/// Drives every child of `dir` that needs attention: an ancestor
/// directory that merely needs opening to reach a deeper change, or a
/// change recorded directly at that child path (spec §4.6 "coalesces
/// so each directory is opened at most once per session").
fn emit_dir<'a, E: Editor>(
    editor: &'a mut E,
    handle: E::Handle,
    dir: &'a RepoPath,
    changes: &'a BTreeMap<RepoPath, GatheredChange>,
    need_open: &'a BTreeMap<RepoPath, Revision>,
    pending: &'a mut Vec<PendingChange>,
    cancel: &'a Cancellation,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut children: BTreeSet<RepoPath> = BTreeSet::new();
        for p in changes.keys().chain(need_open.keys()) {
            if !p.is_root() && p.parent().as_str() == dir.as_str() {
                children.insert(p.clone());
            }
        }

        for child in children {
            cancel.check()?;
            let name = child.basename().expect("a non-root path has a basename").to_string();

            if let Some(change) = changes.get(&child) {
                emit_change(editor, &handle, &name, &child, change, changes, need_open, pending, cancel).await?;
            } else {
                let base_rev = *need_open.get(&child).unwrap_or(&Revision::Invalid);
                let child_handle = editor.open_directory(&handle, &name, base_rev).await?;
                emit_dir(editor, child_handle.clone(), &child, changes, need_open, pending, cancel).await?;
                editor.close_directory(&child_handle).await?;
            }
        }
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
fn emit_change<'a, E: Editor>(
    editor: &'a mut E,
    parent_handle: &'a E::Handle,
    name: &'a str,
    path: &'a RepoPath,
    change: &'a GatheredChange,
    changes: &'a BTreeMap<RepoPath, GatheredChange>,
    need_open: &'a BTreeMap<RepoPath, Revision>,
    pending: &'a mut Vec<PendingChange>,
    cancel: &'a Cancellation,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        match &change.op {
            ChangeOp::Delete => {
                editor.delete_entry(parent_handle, name, change.base_rev).await?;
                pending.push(PendingChange { path: path.clone(), kind: change.kind, op: PendingOp::Deleted });
            }
            ChangeOp::Add { copyfrom, replaces, new_text, .. } => {
                if *replaces {
                    editor.delete_entry(parent_handle, name, change.base_rev).await?;
                }
                let copy_from = copyfrom.as_ref().map(|(path, rev)| CopyFrom { path: path.clone(), rev: *rev });
                match change.kind {
                    NodeKind::Directory => {
                        let handle = editor.add_directory(parent_handle, name, copy_from).await?;
                        apply_dir_prop_changes(editor, &handle, change).await?;
                        emit_dir(editor, handle.clone(), path, changes, need_open, pending, cancel).await?;
                        editor.close_directory(&handle).await?;
                        pending.push(PendingChange { path: path.clone(), kind: change.kind, op: PendingOp::Committed { new_text: None } });
                    }
                    _ => {
                        let handle = editor.add_file(parent_handle, name, copy_from).await?;
                        let text = new_text.clone().unwrap_or_default();
                        send_file_text(editor, &handle, None, &[], &text).await?;
                        apply_file_prop_changes(editor, &handle, change).await?;
                        editor.close_file(&handle, Some(Checksum::md5_of(&text))).await?;
                        pending.push(PendingChange {
                            path: path.clone(),
                            kind: change.kind,
                            op: PendingOp::Committed { new_text: Some(text) },
                        });
                    }
                }
            }
            ChangeOp::Modify { base_text, new_text, .. } => match change.kind {
                NodeKind::Directory => {
                    let handle = editor.open_directory(parent_handle, name, change.base_rev).await?;
                    apply_dir_prop_changes(editor, &handle, change).await?;
                    emit_dir(editor, handle.clone(), path, changes, need_open, pending, cancel).await?;
                    editor.close_directory(&handle).await?;
                    pending.push(PendingChange { path: path.clone(), kind: change.kind, op: PendingOp::Committed { new_text: None } });
                }
                _ => {
                    let handle = editor.open_file(parent_handle, name, change.base_rev).await?;
                    let mut target_checksum = None;
                    if let Some(text) = new_text {
                        let source = base_text.as_deref().unwrap_or(&[]);
                        let base_checksum = base_text.as_ref().map(|b| Checksum::md5_of(b));
                        send_file_text(editor, &handle, base_checksum, source, text).await?;
                        target_checksum = Some(Checksum::md5_of(text));
                    }
                    apply_file_prop_changes(editor, &handle, change).await?;
                    editor.close_file(&handle, target_checksum).await?;
                    pending.push(PendingChange {
                        path: path.clone(),
                        kind: change.kind,
                        op: PendingOp::Committed { new_text: new_text.clone() },
                    });
                }
            },
        }
        Ok(())
    })
}

/// Binds a textdelta sink and pushes the diff from `source` to `target`
/// plus the terminating null window (spec §4.1 "the caller must push a
/// terminating null window"). Skipped entirely when `new_text` is
/// `None` (a property-only file modification never calls
/// `apply-textdelta`).
async fn send_file_text<E: Editor>(
    editor: &mut E,
    handle: &E::Handle,
    base_checksum: Option<Checksum>,
    source: &[u8],
    target: &[u8],
) -> anyhow::Result<()> {
    let mut sink = editor.apply_textdelta(handle, base_checksum).await?;
    for window in svn_txdelta::diff_bytes(source, target) {
        sink.send_window(window).await?;
    }
    Ok(())
}

/// Applies the post-commit bookkeeping spec §4.6 describes once the
/// caller has a revision, date, and author to record: advances each
/// committed path's entry and, for files, replaces the pristine base;
/// clears the entry for anything deleted.
pub async fn apply_post_commit<S>(
    wc: &WorkingCopy<S>,
    changes: &[PendingChange],
    new_rev: Revision,
    date: i64,
    author: &str,
) -> anyhow::Result<()>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea + Send + Sync,
{
    for change in changes {
        match &change.op {
            PendingOp::Deleted => wc.remove_entry(&change.path).await?,
            PendingOp::Committed { new_text } => {
                if change.kind == NodeKind::File {
                    let text = new_text.clone().unwrap_or_default();
                    wc.record_committed(&change.path, new_rev, date, author, text).await?;
                } else {
                    wc.record_committed_dir(&change.path, new_rev, date, author).await?;
                }
            }
        }
    }
    Ok(())
}
