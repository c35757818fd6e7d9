// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Rev-0 bookkeeping properties a sync destination carries about its
//! source (spec §4.8.1): `from-url`, `from-uuid`, `last-merged-rev`, and
//! the `currently-copying` marker that makes a crashed run's resume state
//! unambiguous. All live under the `svn:sync-` prefix on revision 0,
//! alongside whatever regular rev-0 properties were copied from the
//! source at `init` time.

use svn_error::SvnErrorKind;
use svn_repo::RepoAccessSession;
use svn_types::Revision;

pub const FROM_URL: &str = "svn:sync-from-url";
pub const FROM_UUID: &str = "svn:sync-from-uuid";
pub const LAST_MERGED_REV: &str = "svn:sync-last-merged-rev";
pub const CURRENTLY_COPYING: &str = "svn:sync-currently-copying";
pub const LOCK: &str = "svn:sync-lock";

/// `true` for any of the bookkeeping names above; used to keep this
/// namespace out of the revision-property copy a sync performs on every
/// replayed revision (spec §4.8.1 "filters the svn:sync- namespace").
pub fn is_bookkeeping_prop(name: &str) -> bool {
    matches!(name, FROM_URL | FROM_UUID | LAST_MERGED_REV | CURRENTLY_COPYING | LOCK)
}

#[derive(Debug, Clone)]
pub struct Bookkeeping {
    pub from_url: String,
    pub from_uuid: String,
    pub last_merged_rev: u64,
    pub currently_copying: Option<u64>,
}

async fn read_u64(dest: &dyn RepoAccessSession, name: &str) -> anyhow::Result<Option<u64>> {
    match dest.rev_prop_get(Revision::ZERO, name).await? {
        Some(raw) => {
            let s = String::from_utf8(raw)
                .map_err(|_| anyhow::anyhow!(SvnErrorKind::ProtocolViolation(format!("'{name}' is not valid UTF-8"))))?;
            let n = s
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!(SvnErrorKind::ProtocolViolation(format!("'{name}' is not a revision number: '{s}'"))))?;
            Ok(Some(n))
        }
        None => Ok(None),
    }
}

/// Reads the full bookkeeping set. Errors if `dest` has never been
/// initialized for sync (spec §4.8.1 "a destination not yet `init`'d
/// has none of these properties").
pub async fn read(dest: &dyn RepoAccessSession) -> anyhow::Result<Bookkeeping> {
    let from_url = dest
        .rev_prop_get(Revision::ZERO, FROM_URL)
        .await?
        .ok_or_else(|| anyhow::anyhow!(SvnErrorKind::UnsupportedFeature("destination has not been initialized for sync".to_string())))?;
    let from_url = String::from_utf8(from_url)
        .map_err(|_| anyhow::anyhow!(SvnErrorKind::ProtocolViolation(format!("'{FROM_URL}' is not valid UTF-8"))))?;
    let from_uuid = dest.rev_prop_get(Revision::ZERO, FROM_UUID).await?.unwrap_or_default();
    let from_uuid = String::from_utf8(from_uuid)
        .map_err(|_| anyhow::anyhow!(SvnErrorKind::ProtocolViolation(format!("'{FROM_UUID}' is not valid UTF-8"))))?;
    let last_merged_rev = read_u64(dest, LAST_MERGED_REV).await?.unwrap_or(0);
    let currently_copying = read_u64(dest, CURRENTLY_COPYING).await?;
    Ok(Bookkeeping {
        from_url,
        from_uuid,
        last_merged_rev,
        currently_copying,
    })
}

/// Rejects a second `init` against an already-initialized destination
/// (spec §4.8.1 `init`: "errors if the destination already carries a
/// `from-url`").
pub async fn already_initialized(dest: &dyn RepoAccessSession) -> anyhow::Result<bool> {
    Ok(dest.rev_prop_get(Revision::ZERO, FROM_URL).await?.is_some())
}

pub async fn set_currently_copying(dest: &dyn RepoAccessSession, rev: u64) -> anyhow::Result<()> {
    dest.rev_prop_change(Revision::ZERO, CURRENTLY_COPYING, Some(rev.to_string().into_bytes())).await
}

pub async fn clear_currently_copying(dest: &dyn RepoAccessSession) -> anyhow::Result<()> {
    dest.rev_prop_change(Revision::ZERO, CURRENTLY_COPYING, None).await
}

pub async fn advance_last_merged_rev(dest: &dyn RepoAccessSession, rev: u64) -> anyhow::Result<()> {
    dest.rev_prop_change(Revision::ZERO, LAST_MERGED_REV, Some(rev.to_string().into_bytes())).await
}

/// Checks the invariant a sync destination must satisfy before each run
/// (spec §4.8.1 "restart invariant"): either no copy was in flight and
/// the destination's head matches `last-merged-rev` exactly, or a copy
/// of `last-merged-rev + 1` was in flight and the destination's head is
/// one of the two revisions that state permits. Anything else means the
/// destination was written to outside this sync and the run refuses to
/// guess which revision is trustworthy.
pub fn check_restart_invariant(b: &Bookkeeping, dest_head: u64) -> anyhow::Result<()> {
    match b.currently_copying {
        None => {
            if dest_head != b.last_merged_rev {
                anyhow::bail!(SvnErrorKind::SyncRestartInvariant(format!(
                    "destination is at r{dest_head} but last-merged-rev is r{}; something wrote to the destination outside this sync",
                    b.last_merged_rev
                )));
            }
        }
        Some(copying) => {
            if copying != b.last_merged_rev && copying != b.last_merged_rev + 1 {
                anyhow::bail!(SvnErrorKind::SyncRestartInvariant(format!(
                    "currently-copying is r{copying}, neither last-merged-rev (r{}) nor its successor",
                    b.last_merged_rev
                )));
            }
            if dest_head != b.last_merged_rev && dest_head != copying {
                anyhow::bail!(SvnErrorKind::SyncRestartInvariant(format!(
                    "destination is at r{dest_head}, neither last-merged-rev (r{}) nor currently-copying (r{copying})",
                    b.last_merged_rev
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bk(last_merged: u64, copying: Option<u64>) -> Bookkeeping {
        Bookkeeping {
            from_url: "file:///src".to_string(),
            from_uuid: "uuid".to_string(),
            last_merged_rev: last_merged,
            currently_copying: copying,
        }
    }

    #[test]
    fn a_quiescent_destination_must_match_last_merged_rev_exactly() {
        assert!(check_restart_invariant(&bk(3, None), 3).is_ok());
        assert!(check_restart_invariant(&bk(3, None), 4).is_err());
    }

    #[test]
    fn a_crash_before_commit_lands_leaves_the_head_at_last_merged_rev() {
        // currently-copying r4 was set, but the commit never landed.
        assert!(check_restart_invariant(&bk(3, Some(4)), 3).is_ok());
    }

    #[test]
    fn a_crash_after_commit_but_before_bookkeeping_leaves_the_head_one_ahead() {
        assert!(check_restart_invariant(&bk(3, Some(4)), 4).is_ok());
    }

    #[test]
    fn a_dangling_currently_copying_two_revisions_ahead_is_rejected() {
        assert!(check_restart_invariant(&bk(3, Some(5)), 5).is_err());
    }

    #[test]
    fn bookkeeping_prop_names_are_recognized() {
        assert!(is_bookkeeping_prop(FROM_URL));
        assert!(is_bookkeeping_prop(LOCK));
        assert!(!is_bookkeeping_prop("svn:log"));
    }
}
