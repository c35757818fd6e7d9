// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The crash-recovery log (spec §4.5 "Log-based recovery"): a script of
//! primitive filesystem-shaped operations appended before a mutation and
//! replayed atomically afterward. Replay must be idempotent, so every op
//! is written to tolerate being applied twice (a repeat `Move` of an
//! already-moved path is a no-op, not an error).

use svn_types::RepoPath;

use crate::store::{AdminLog, EntriesStore, PristineStore, PropertyStore};

/// One primitive operation in a directory's pending log (spec §4.5: "the
/// log is a script of primitive ops {mv, cp, rm, set-entry-field,
/// set-prop, commit-log-marker}").
#[derive(Debug, Clone)]
pub enum LogOp {
    Move { from: RepoPath, to: RepoPath },
    Copy { from: RepoPath, to: RepoPath },
    Remove { path: RepoPath },
    SetEntryField { path: RepoPath, field: EntryField, value: Option<String> },
    SetProp { path: RepoPath, name: String, value: Option<Vec<u8>> },
    /// Marks a commit as having completed; replaying past this point
    /// means the log can be cleared rather than continued.
    CommitLogMarker,
}

/// The subset of `Entry` fields the log can rewrite post-commit (spec
/// §4.6 "post-commit bookkeeping").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Schedule,
    TextTime,
    PropTime,
}

/// Replays `dir`'s pending log against the given stores, then clears it.
/// Idempotent: safe to call again on a log that was partially replayed
/// before a crash, since every op below tolerates its target already
/// being in the post-op state.
pub async fn replay<P, Pr, E, L>(dir: &RepoPath, pristine: &P, props: &Pr, entries: &E, log: &L) -> anyhow::Result<()>
where
    P: PristineStore,
    Pr: PropertyStore,
    E: EntriesStore,
    L: AdminLog,
{
    let ops = log.pending(dir).await?;
    for op in ops {
        apply_one(&op, pristine, props, entries).await?;
    }
    log.clear(dir).await
}

async fn apply_one<P, Pr, E>(op: &LogOp, pristine: &P, props: &Pr, entries: &E) -> anyhow::Result<()>
where
    P: PristineStore,
    Pr: PropertyStore,
    E: EntriesStore,
{
    match op {
        LogOp::Move { from, to } => {
            if let Some(contents) = pristine.get(from).await? {
                pristine.put(to, contents).await?;
                pristine.remove(from).await?;
            }
            Ok(())
        }
        LogOp::Copy { from, to } => {
            if let Some(contents) = pristine.get(from).await? {
                pristine.put(to, contents).await?;
            }
            Ok(())
        }
        LogOp::Remove { path } => pristine.remove(path).await,
        LogOp::SetEntryField { path, field, value } => {
            if let Some(mut entry) = entries.get_entry(path).await? {
                match field {
                    EntryField::Schedule => {
                        entry.schedule = match value.as_deref() {
                            Some("add") => svn_types::Schedule::Add,
                            Some("delete") => svn_types::Schedule::Delete,
                            Some("replace") => svn_types::Schedule::Replace,
                            _ => svn_types::Schedule::Normal,
                        };
                    }
                    EntryField::TextTime => {
                        entry.text_time = value.as_deref().and_then(|v| v.parse().ok());
                    }
                    EntryField::PropTime => {
                        entry.prop_time = value.as_deref().and_then(|v| v.parse().ok());
                    }
                }
                entries.set_entry(path, entry).await?;
            }
            Ok(())
        }
        LogOp::SetProp { path, name, value } => {
            let mut working = props.get_working(path).await?;
            working.set(name.clone(), value.clone());
            props.set_working(path, working).await
        }
        LogOp::CommitLogMarker => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemWcStore;

    #[tokio::test]
    async fn move_op_relocates_pristine_text_and_removes_the_source() {
        let store = MemWcStore::new();
        let from = RepoPath::from("trunk/old.txt");
        let to = RepoPath::from("trunk/new.txt");
        store.put(&from, b"hello".to_vec()).await.unwrap();

        apply_one(
            &LogOp::Move { from: from.clone(), to: to.clone() },
            &store,
            &store,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(store.get(&to).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get(&from).await.unwrap(), None);
    }

    #[tokio::test]
    async fn replaying_an_already_applied_move_is_a_no_op() {
        let store = MemWcStore::new();
        let from = RepoPath::from("trunk/old.txt");
        let to = RepoPath::from("trunk/new.txt");
        store.put(&to, b"already moved".to_vec()).await.unwrap();

        let op = LogOp::Move { from, to: to.clone() };
        apply_one(&op, &store, &store, &store).await.unwrap();
        assert_eq!(store.get(&to).await.unwrap(), Some(b"already moved".to_vec()));
    }

    #[tokio::test]
    async fn set_prop_op_writes_through_to_the_working_property_set() {
        let store = MemWcStore::new();
        let path = RepoPath::from("trunk/f.txt");
        apply_one(
            &LogOp::SetProp {
                path: path.clone(),
                name: "svn:eol-style".to_string(),
                value: Some(b"LF".to_vec()),
            },
            &store,
            &store,
            &store,
        )
        .await
        .unwrap();
        let working = store.get_working(&path).await.unwrap();
        assert_eq!(working.get_str("svn:eol-style"), Some("LF"));
    }

    #[tokio::test]
    async fn replay_clears_the_log_after_applying_every_op() {
        let store = MemWcStore::new();
        let dir = RepoPath::from("trunk");
        let path = RepoPath::from("trunk/f.txt");
        store
            .append(
                &dir,
                vec![LogOp::SetProp {
                    path: path.clone(),
                    name: "svn:executable".to_string(),
                    value: Some(b"*".to_vec()),
                }],
            )
            .await
            .unwrap();

        replay(&dir, &store, &store, &store, &store).await.unwrap();

        assert!(store.pending(&dir).await.unwrap().is_empty());
        assert!(store.get_working(&path).await.unwrap().get("svn:executable").is_some());
    }
}
