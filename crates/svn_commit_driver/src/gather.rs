// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Walking a working copy's targets into the flat set of changes the
//! driver will emit (spec §4.6 "anchor selection", "text body",
//! "property changes").

use std::collections::BTreeMap;

use async_trait::async_trait;
use svn_types::{Entry, NodeKind, RepoPath, Revision, Schedule};
use svn_translate::FileConfig;
use svn_wc::{AdminLog, EntriesStore, PristineStore, PropertyStore, TempArea, WalkVisitor, WorkingCopy};

use crate::working_text::WorkingText;

/// One `change-*-prop` call to emit: `None` deletes the property.
pub(crate) type PropChange = (String, Option<Vec<u8>>);

/// What to do at one changed path, once base/working state has been
/// compared (spec §4.6's four change shapes: add-with-history,
/// replace, modified text/props, delete).
#[derive(Debug, Clone)]
pub(crate) enum ChangeOp {
    Delete,
    Add {
        copyfrom: Option<(String, Revision)>,
        /// Set for a `Replace` schedule: emit `delete-entry` before the add.
        replaces: bool,
        new_text: Option<Vec<u8>>,
        prop_changes: Vec<PropChange>,
    },
    Modify {
        /// The pristine base this file is diffed against, so the
        /// driver can emit a textdelta instead of re-sending the whole
        /// file (spec §4.6 "compares translated working text against
        /// pristine base"). Only set alongside `new_text`.
        base_text: Option<Vec<u8>>,
        new_text: Option<Vec<u8>>,
        prop_changes: Vec<PropChange>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct GatheredChange {
    pub(crate) kind: NodeKind,
    pub(crate) base_rev: Revision,
    pub(crate) op: ChangeOp,
}

struct GatherVisitor<'a, S> {
    wc: &'a WorkingCopy<S>,
    working_text: &'a dyn WorkingText,
    changes: BTreeMap<RepoPath, GatheredChange>,
    /// Directories already recorded as deleted; descendants under them
    /// are skipped rather than recorded again (spec §4.6 doesn't name a
    /// per-child delete once the parent's subtree is already gone).
    deleted_dirs: Vec<RepoPath>,
    cancel: svn_error::Cancellation,
}

impl<'a, S> GatherVisitor<'a, S>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea,
{
    async fn modified_op(&self, path: &RepoPath, entry: &Entry) -> anyhow::Result<Option<ChangeOp>> {
        let base_props = self.wc.property_base(path).await?;
        let working_props = self.wc.proplist(path).await?;
        let prop_changes = prop_diff(&base_props, &working_props);

        let mut base_text = None;
        let mut new_text = None;
        let mut text_changed = false;
        if entry.kind == NodeKind::File {
            let pristine = self.wc.pristine_text(path).await?.unwrap_or_default();
            let raw_working = self.working_text.read(path).await?;
            let config = FileConfig::from_properties(&working_props);
            let repo_form = svn_translate::translate_in(&raw_working, &config, false)?;
            text_changed = repo_form != pristine;
            base_text = Some(pristine);
            new_text = Some(repo_form);
        }

        if prop_changes.is_empty() && !text_changed {
            return Ok(None);
        }
        Ok(Some(ChangeOp::Modify {
            base_text: if text_changed { base_text } else { None },
            new_text: if text_changed { new_text } else { None },
            prop_changes,
        }))
    }
}

/// Every `(name, new-value)` pair where `base` and `working` disagree,
/// in the shape `change-*-prop` wants: `None` deletes the property.
fn prop_diff(base: &svn_types::PropertyMap, working: &svn_types::PropertyMap) -> Vec<PropChange> {
    base.diff(working)
        .into_iter()
        .map(|(name, _old, new)| (name.to_string(), new.cloned()))
        .collect()
}

#[async_trait]
impl<'a, S> WalkVisitor for GatherVisitor<'a, S>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea + Send + Sync,
{
    async fn visit(&mut self, path: &RepoPath, entry: &Entry) -> anyhow::Result<()> {
        self.cancel.check()?;
        if self
            .deleted_dirs
            .iter()
            .any(|d| path.as_str() != d.as_str() && path.is_within(d))
        {
            return Ok(());
        }

        match entry.schedule {
            Schedule::Delete => {
                if entry.kind == NodeKind::Directory {
                    self.deleted_dirs.push(path.clone());
                }
                self.changes.insert(
                    path.clone(),
                    GatheredChange { kind: entry.kind, base_rev: entry.base_rev, op: ChangeOp::Delete },
                );
            }
            Schedule::Add | Schedule::Replace => {
                let copyfrom = match (&entry.copyfrom_url, entry.copyfrom_rev) {
                    (Some(url), Some(rev)) => Some((url.clone(), rev)),
                    _ => None,
                };
                let working_props = self.wc.proplist(path).await?;
                let prop_changes = prop_diff(&svn_types::PropertyMap::new(), &working_props);
                let new_text = if entry.kind == NodeKind::File {
                    let raw_working = self.working_text.read(path).await?;
                    let config = FileConfig::from_properties(&working_props);
                    Some(svn_translate::translate_in(&raw_working, &config, false)?)
                } else {
                    None
                };
                self.changes.insert(
                    path.clone(),
                    GatheredChange {
                        kind: entry.kind,
                        base_rev: entry.base_rev,
                        op: ChangeOp::Add { copyfrom, replaces: entry.schedule == Schedule::Replace, new_text, prop_changes },
                    },
                );
            }
            Schedule::Normal => {
                if let Some(op) = self.modified_op(path, entry).await? {
                    self.changes.insert(path.clone(), GatheredChange { kind: entry.kind, base_rev: entry.base_rev, op });
                }
            }
        }
        Ok(())
    }
}

/// Walks every target to `depth`, returning the flat set of changed
/// paths in path order (so a parent always sorts before its children).
pub(crate) async fn gather_changes<S>(
    wc: &WorkingCopy<S>,
    working_text: &dyn WorkingText,
    targets: &[RepoPath],
    depth: svn_types::Depth,
    cancel: &svn_error::Cancellation,
) -> anyhow::Result<BTreeMap<RepoPath, GatheredChange>>
where
    S: PristineStore + PropertyStore + EntriesStore + AdminLog + TempArea + Send + Sync,
{
    let mut visitor = GatherVisitor {
        wc,
        working_text,
        changes: BTreeMap::new(),
        deleted_dirs: Vec::new(),
        cancel: cancel.clone(),
    };
    for target in targets {
        wc.walk(target, depth, &mut visitor).await?;
    }
    Ok(visitor.changes)
}

/// The deepest common ancestor directory of `dirs` (spec §4.6 "anchor
/// selection"). Callers have already rewritten file targets to their
/// parent directory before calling this.
pub(crate) fn common_ancestor(dirs: &[RepoPath]) -> RepoPath {
    let Some(first) = dirs.first() else {
        return RepoPath::root();
    };
    let mut common: Vec<&str> = first.segments();
    for dir in &dirs[1..] {
        let segs = dir.segments();
        let shared = common.iter().zip(segs.iter()).take_while(|(a, b)| *a == b).count();
        common.truncate(shared);
    }
    if common.is_empty() {
        RepoPath::root()
    } else {
        RepoPath::from(common.join("/"))
    }
}
