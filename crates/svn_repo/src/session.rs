// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The repository-access session (spec §6, §9): the one abstraction the
//! rest of the core consumes without caring whether it talks to an
//! in-process repository or, eventually, a networked one. `InMemorySession`
//! is the concrete implementation the workspace's own tests run against.

use std::sync::Arc;

use async_trait::async_trait;
use svn_delta::Editor;
use svn_types::{Depth, PropertyMap, RepoPath, Revision};

use crate::commit_editor::{CommitCallback, CommitEditor};
use crate::repository::Repository;
use crate::tree::{self, Node};
use crate::tree_diff::{drive_diff, SourceResolver};

/// Per-revision callback driving a replay (spec §6 "replay-range(start,
/// end, callback(per-rev){start->editor; finish})"). `start_revision`
/// hands back the editor that revision's tree-edit calls are driven
/// into; `finish_revision` is called once that editor session has been
/// closed.
#[async_trait]
pub trait ReplayReceiver: Send {
    async fn start_revision(
        &mut self,
        rev: Revision,
        rev_props: &PropertyMap,
    ) -> anyhow::Result<Box<dyn Editor<Handle = RepoPath>>>;

    async fn finish_revision(&mut self, rev: Revision) -> anyhow::Result<()>;
}

/// The working-copy side of `do_diff` (spec §6): reports the paths and
/// revisions the caller already has, then receives the edit that brings
/// it up to the requested target.
#[async_trait]
pub trait Reporter: Send {
    async fn set_path(&mut self, path: &RepoPath, rev: Revision, depth: Depth) -> anyhow::Result<()>;
    async fn delete_path(&mut self, path: &RepoPath) -> anyhow::Result<()>;
    async fn finish_report(self: Box<Self>) -> anyhow::Result<()>;
}

/// The repository-access session trait (spec §6's minimal surface):
/// `get-latest-revnum`, `get-uuid`, `get-repos-root`, the rev-prop
/// accessors, `has-capability`, `get-commit-editor`, `replay-range`, and
/// `do-diff`.
#[async_trait]
pub trait RepoAccessSession: Send + Sync {
    async fn get_latest_revnum(&self) -> anyhow::Result<Revision>;
    async fn get_uuid(&self) -> anyhow::Result<String>;
    async fn get_repos_root(&self) -> anyhow::Result<String>;
    async fn rev_prop_get(&self, rev: Revision, name: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn rev_prop_list(&self, rev: Revision) -> anyhow::Result<PropertyMap>;
    async fn rev_prop_change(&self, rev: Revision, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()>;

    /// Capabilities this session supports; a session with no opinion on a
    /// name reports `false` rather than erroring (spec §7 "sync replay
    /// swallows a capability-unknown error as if the capability were
    /// false").
    async fn has_capability(&self, name: &str) -> anyhow::Result<bool>;

    async fn get_commit_editor(
        &self,
        log_message: &str,
        author: &str,
        callback: Box<dyn CommitCallback>,
    ) -> anyhow::Result<Box<dyn Editor<Handle = RepoPath>>>;

    async fn replay_range(&self, start: Revision, end: Revision, receiver: &mut dyn ReplayReceiver) -> anyhow::Result<()>;

    async fn do_diff(
        &self,
        target_rev: Revision,
        target_path: RepoPath,
        depth: Depth,
        editor: Box<dyn Editor<Handle = RepoPath>>,
    ) -> anyhow::Result<Box<dyn Reporter>>;
}

/// Names of capabilities every `InMemorySession` reports as supported;
/// spec §8 only requires `partial-replay` to be queryable before a
/// sync-from-subtree begins.
const KNOWN_CAPABILITIES: &[&str] = &["partial-replay", "mergeinfo", "depth"];

pub struct InMemorySession {
    repo: Arc<Repository>,
}

impl InMemorySession {
    pub fn new(repo: Arc<Repository>) -> Self {
        InMemorySession { repo }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }
}

struct InMemoryResolver(Arc<Repository>);

impl SourceResolver for InMemoryResolver {
    fn resolve(&self, path: &RepoPath, rev: Revision) -> Option<Arc<Node>> {
        let root = self.0.root_at(rev).ok()?;
        tree::lookup(&root, path)
    }
}

#[async_trait]
impl RepoAccessSession for InMemorySession {
    async fn get_latest_revnum(&self) -> anyhow::Result<Revision> {
        Ok(self.repo.head_rev())
    }

    async fn get_uuid(&self) -> anyhow::Result<String> {
        Ok(self.repo.uuid().to_string())
    }

    async fn get_repos_root(&self) -> anyhow::Result<String> {
        Ok(self.repo.root_url().to_string())
    }

    async fn rev_prop_get(&self, rev: Revision, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.repo.rev_prop_get(rev, name)
    }

    async fn rev_prop_list(&self, rev: Revision) -> anyhow::Result<PropertyMap> {
        self.repo.rev_prop_list(rev)
    }

    async fn rev_prop_change(&self, rev: Revision, name: &str, value: Option<Vec<u8>>) -> anyhow::Result<()> {
        self.repo.rev_prop_change(rev, name, value)
    }

    async fn has_capability(&self, name: &str) -> anyhow::Result<bool> {
        Ok(KNOWN_CAPABILITIES.contains(&name))
    }

    async fn get_commit_editor(
        &self,
        log_message: &str,
        author: &str,
        callback: Box<dyn CommitCallback>,
    ) -> anyhow::Result<Box<dyn Editor<Handle = RepoPath>>> {
        let editor = CommitEditor::new(self.repo.clone(), Revision::Head, RepoPath::root(), author, log_message, callback)?;
        Ok(Box::new(editor))
    }

    /// Drives `receiver` once per revision in `(start, end]`, the way the
    /// original's replay API is exclusive of `start` (spec §4.8 "replay at
    /// revision r"). Each revision's baseline is the previous revision's
    /// tree, so unchanged subtrees cost nothing beyond an `Arc::ptr_eq`.
    async fn replay_range(&self, start: Revision, end: Revision, receiver: &mut dyn ReplayReceiver) -> anyhow::Result<()> {
        let start_num = self.repo.resolve(start).as_number().unwrap_or(0);
        let end_num = self
            .repo
            .resolve(end)
            .as_number()
            .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::ProtocolViolation("replay_range end must resolve to a revision number".to_string())))?;

        for rev_num in (start_num + 1)..=end_num {
            let rev = Revision::Number(rev_num);
            let baseline = if rev_num == 0 {
                None
            } else {
                Some(self.repo.root_at(Revision::Number(rev_num - 1))?)
            };
            let target = self.repo.root_at(rev)?;
            let rev_props = self.repo.rev_prop_list(rev)?;

            let mut editor = receiver.start_revision(rev, &rev_props).await?;
            let resolver = InMemoryResolver(self.repo.clone());
            drive_diff(&mut *editor, rev, baseline.as_ref(), &target, &resolver).await?;
            editor.close_edit().await?;
            receiver.finish_revision(rev).await?;
        }
        Ok(())
    }

    /// A minimal reporter: the working copy reports exactly one root path
    /// (its only supported shape at present); `finish_report` then
    /// diffs the reported base against `target_rev`/`target_path` and
    /// drives `editor` through the result.
    async fn do_diff(
        &self,
        target_rev: Revision,
        target_path: RepoPath,
        depth: Depth,
        editor: Box<dyn Editor<Handle = RepoPath>>,
    ) -> anyhow::Result<Box<dyn Reporter>> {
        Ok(Box::new(InMemoryReporter {
            repo: self.repo.clone(),
            target_rev: self.repo.resolve(target_rev),
            target_path,
            depth,
            editor,
            root_report: None,
        }))
    }
}

struct InMemoryReporter {
    repo: Arc<Repository>,
    target_rev: Revision,
    target_path: RepoPath,
    depth: Depth,
    editor: Box<dyn Editor<Handle = RepoPath>>,
    root_report: Option<(Revision, Depth)>,
}

#[async_trait]
impl Reporter for InMemoryReporter {
    async fn set_path(&mut self, path: &RepoPath, rev: Revision, depth: Depth) -> anyhow::Result<()> {
        if path.is_root() {
            self.root_report = Some((rev, depth));
            Ok(())
        } else {
            anyhow::bail!(svn_error::SvnErrorKind::UnsupportedFeature(
                "InMemoryReporter only supports a single root-path report".to_string()
            ))
        }
    }

    async fn delete_path(&mut self, _path: &RepoPath) -> anyhow::Result<()> {
        anyhow::bail!(svn_error::SvnErrorKind::UnsupportedFeature(
            "InMemoryReporter does not support delete_path reports".to_string()
        ))
    }

    async fn finish_report(mut self: Box<Self>) -> anyhow::Result<()> {
        let (base_rev, _reported_depth) = self
            .root_report
            .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::ProtocolViolation("finish_report called with no set_path".to_string())))?;
        let _ = self.depth;

        let baseline_root = self.repo.root_at(base_rev)?;
        let baseline = tree::lookup(&baseline_root, &self.target_path);
        let target_root = self.repo.root_at(self.target_rev)?;
        let target = tree::lookup(&target_root, &self.target_path)
            .ok_or_else(|| anyhow::anyhow!(svn_error::SvnErrorKind::NotFound(self.target_path.as_str().to_string())))?;

        let resolver = InMemoryResolver(self.repo.clone());
        drive_diff(&mut *self.editor, self.target_rev, baseline.as_ref(), &target, &resolver).await?;
        self.editor.close_edit().await
    }
}
