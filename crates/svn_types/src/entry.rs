// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use crate::checksum::Checksum;
use crate::kind::{Depth, NodeKind};
use crate::revision::Revision;

/// A locally scheduled change to a working-copy entry, pending the next
/// commit (spec §3 "Entry (working-copy)").
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Schedule {
    Normal,
    Add,
    Delete,
    /// Exactly `Delete` followed by `Add` at the same path within one
    /// pending commit.
    Replace,
}

/// The self-entry name every tracked working-copy directory carries in
/// addition to one entry per tracked child (spec §3).
pub const THIS_DIR: &str = "this-dir";

/// A per-path working-copy metadata record.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub kind: NodeKind,
    pub url: String,
    pub repos_root: String,
    pub repos_uuid: String,
    pub base_rev: Revision,
    pub last_committed_rev: Revision,
    pub last_committed_date: Option<i64>,
    pub last_committed_author: Option<String>,
    pub checksum: Option<Checksum>,
    pub text_time: Option<i64>,
    pub prop_time: Option<i64>,
    pub schedule: Schedule,
    pub copied: bool,
    pub copyfrom_url: Option<String>,
    pub copyfrom_rev: Option<Revision>,
    pub conflict_old: Option<String>,
    pub conflict_new: Option<String>,
    pub conflict_working: Option<String>,
    pub prop_conflict: Option<String>,
    pub depth: Depth,
}

impl Entry {
    /// A brand new `this-dir` entry for a directory freshly checked out at
    /// `base_rev`.
    pub fn new_this_dir(url: &str, repos_root: &str, repos_uuid: &str, base_rev: Revision) -> Self {
        Entry {
            name: THIS_DIR.to_string(),
            kind: NodeKind::Directory,
            url: url.to_string(),
            repos_root: repos_root.to_string(),
            repos_uuid: repos_uuid.to_string(),
            base_rev,
            last_committed_rev: base_rev,
            last_committed_date: None,
            last_committed_author: None,
            checksum: None,
            text_time: None,
            prop_time: None,
            schedule: Schedule::Normal,
            copied: false,
            copyfrom_url: None,
            copyfrom_rev: None,
            conflict_old: None,
            conflict_new: None,
            conflict_working: None,
            prop_conflict: None,
            depth: Depth::Infinity,
        }
    }

    /// True iff a `copyfrom` pair is set and consistent with the "set iff
    /// copied or the schedule carries history" invariant (spec §3).
    pub fn has_copyfrom(&self) -> bool {
        self.copyfrom_url.is_some() && self.copyfrom_rev.is_some()
    }

    /// Validates the §3 entry invariant: `copyfrom_url` is set iff
    /// `copied` is true or the schedule is `Add`/`Replace` carrying
    /// history. This does not by itself know whether an `Add` carries
    /// history (that is a property of the caller's intent, captured by
    /// `copied`), so it only checks the converse: a `copyfrom` pair
    /// without `copied` set and without an add/replace schedule is
    /// inconsistent.
    pub fn check_copyfrom_invariant(&self) -> Result<(), String> {
        if self.has_copyfrom() && !self.copied {
            match self.schedule {
                Schedule::Add | Schedule::Replace => Ok(()),
                _ => Err(format!(
                    "entry '{}' has copyfrom set without copied flag or add/replace schedule",
                    self.name
                )),
            }
        } else {
            Ok(())
        }
    }

    pub fn is_scheduled_for_commit(&self) -> bool {
        !matches!(self.schedule, Schedule::Normal)
    }

    pub fn is_replace(&self) -> bool {
        matches!(self.schedule, Schedule::Replace)
    }
}
