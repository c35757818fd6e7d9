// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Enforces the delta editor protocol invariants from spec §4.1 around any
//! `Editor` implementation: handle open/close bookkeeping, delete-before-add
//! ordering, at-most-one textdelta per file, and the mandatory terminating
//! null window. This is the state machine every consumer is expected to
//! observe; wrapping a consumer in `Validating` turns a silent protocol
//! bug into an immediate `ProtocolViolation` error instead of corrupted
//! state downstream.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use svn_error::SvnErrorKind;
use svn_txdelta::{Window, WindowSink};
use svn_types::{Checksum, Revision};

use crate::editor::{CopyFrom, Editor};

#[derive(Eq, PartialEq)]
enum SessionState {
    Initial,
    Active,
    Ended,
}

struct DirState {
    closed: bool,
    live_children: HashSet<String>,
}

struct FileState {
    closed: bool,
    sink_taken: bool,
    finished: Arc<AtomicBool>,
}

fn violation(msg: impl Into<String>) -> anyhow::Error {
    SvnErrorKind::ProtocolViolation(msg.into()).into()
}

/// Wraps any `Editor` and rejects calls that violate the spec §4.1 state
/// machine before they reach the inner editor.
pub struct Validating<E: Editor> {
    inner: E,
    state: SessionState,
    target_revision_set: bool,
    root_opened: bool,
    dirs: HashMap<E::Handle, DirState>,
    files: HashMap<E::Handle, FileState>,
    open_count: usize,
}

impl<E: Editor> Validating<E> {
    pub fn new(inner: E) -> Self {
        Validating {
            inner,
            state: SessionState::Initial,
            target_revision_set: false,
            root_opened: false,
            dirs: HashMap::new(),
            files: HashMap::new(),
            open_count: 0,
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn require_active(&self) -> anyhow::Result<()> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(violation("editor call made outside an active session"))
        }
    }

    fn require_open_dir(&self, handle: &E::Handle) -> anyhow::Result<()> {
        match self.dirs.get(handle) {
            Some(d) if !d.closed => Ok(()),
            Some(_) => Err(violation("directory handle used after close_directory")),
            None => Err(violation("unknown directory handle")),
        }
    }

    fn require_open_file(&self, handle: &E::Handle) -> anyhow::Result<()> {
        match self.files.get(handle) {
            Some(f) if !f.closed => Ok(()),
            Some(_) => Err(violation("file handle used after close_file")),
            None => Err(violation("unknown file handle")),
        }
    }

    /// `delete-entry` must precede any `add-*` of the same name in the
    /// same parent; a name already live (added/opened, not yet deleted)
    /// cannot be added or opened again.
    fn claim_name(&mut self, parent: &E::Handle, name: &str) -> anyhow::Result<()> {
        let dir = self
            .dirs
            .get_mut(parent)
            .ok_or_else(|| violation("unknown directory handle"))?;
        if dir.live_children.contains(name) {
            return Err(violation(format!(
                "'{name}' added or opened twice without an intervening delete_entry"
            )));
        }
        dir.live_children.insert(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl<E: Editor + Send> Editor for Validating<E> {
    type Handle = E::Handle;

    async fn set_target_revision(&mut self, rev: Revision) -> anyhow::Result<()> {
        if self.state != SessionState::Initial {
            return Err(violation("set_target_revision must precede open_root"));
        }
        if self.target_revision_set {
            return Err(violation("set_target_revision called more than once"));
        }
        self.target_revision_set = true;
        self.inner.set_target_revision(rev).await
    }

    async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        if self.state != SessionState::Initial {
            return Err(violation("open_root called more than once"));
        }
        let handle = self.inner.open_root(base_rev).await?;
        self.state = SessionState::Active;
        self.root_opened = true;
        self.dirs.insert(
            handle.clone(),
            DirState {
                closed: false,
                live_children: HashSet::new(),
            },
        );
        self.open_count += 1;
        Ok(handle)
    }

    async fn delete_entry(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.inner.delete_entry(parent, name, base_rev).await?;
        if let Some(dir) = self.dirs.get_mut(parent) {
            dir.live_children.remove(name);
        }
        Ok(())
    }

    async fn add_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.claim_name(parent, name)?;
        let handle = self.inner.add_directory(parent, name, copyfrom).await?;
        self.dirs.insert(
            handle.clone(),
            DirState {
                closed: false,
                live_children: HashSet::new(),
            },
        );
        self.open_count += 1;
        Ok(handle)
    }

    async fn open_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.claim_name(parent, name)?;
        let handle = self.inner.open_directory(parent, name, base_rev).await?;
        self.dirs.insert(
            handle.clone(),
            DirState {
                closed: false,
                live_children: HashSet::new(),
            },
        );
        self.open_count += 1;
        Ok(handle)
    }

    async fn absent_directory(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.inner.absent_directory(parent, name).await
    }

    async fn change_dir_prop(
        &mut self,
        dir: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_dir(dir)?;
        self.inner.change_dir_prop(dir, name, value).await
    }

    async fn close_directory(&mut self, dir: &Self::Handle) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_dir(dir)?;
        self.inner.close_directory(dir).await?;
        if let Some(d) = self.dirs.get_mut(dir) {
            d.closed = true;
        }
        Ok(())
    }

    async fn add_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.claim_name(parent, name)?;
        let handle = self.inner.add_file(parent, name, copyfrom).await?;
        self.files.insert(
            handle.clone(),
            FileState {
                closed: false,
                sink_taken: false,
                finished: Arc::new(AtomicBool::new(false)),
            },
        );
        self.open_count += 1;
        Ok(handle)
    }

    async fn open_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.claim_name(parent, name)?;
        let handle = self.inner.open_file(parent, name, base_rev).await?;
        self.files.insert(
            handle.clone(),
            FileState {
                closed: false,
                sink_taken: false,
                finished: Arc::new(AtomicBool::new(false)),
            },
        );
        self.open_count += 1;
        Ok(handle)
    }

    async fn absent_file(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_dir(parent)?;
        self.inner.absent_file(parent, name).await
    }

    async fn apply_textdelta(
        &mut self,
        file: &Self::Handle,
        base_checksum: Option<Checksum>,
    ) -> anyhow::Result<Box<dyn WindowSink>> {
        self.require_active()?;
        self.require_open_file(file)?;
        let state = self
            .files
            .get_mut(file)
            .ok_or_else(|| violation("unknown file handle"))?;
        if state.sink_taken {
            return Err(violation("apply_textdelta called more than once on the same file handle"));
        }
        state.sink_taken = true;
        let finished = state.finished.clone();
        let inner_sink = self.inner.apply_textdelta(file, base_checksum).await?;
        Ok(Box::new(VerifyingSink {
            inner: inner_sink,
            finished,
            done: false,
        }))
    }

    async fn change_file_prop(
        &mut self,
        file: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_file(file)?;
        self.inner.change_file_prop(file, name, value).await
    }

    async fn close_file(
        &mut self,
        file: &Self::Handle,
        target_checksum: Option<Checksum>,
    ) -> anyhow::Result<()> {
        self.require_active()?;
        self.require_open_file(file)?;
        {
            let state = self
                .files
                .get(file)
                .ok_or_else(|| violation("unknown file handle"))?;
            if state.sink_taken && !state.finished.load(Ordering::SeqCst) {
                return Err(violation(
                    "close_file called before the terminating null window was sent",
                ));
            }
        }
        self.inner.close_file(file, target_checksum).await?;
        if let Some(f) = self.files.get_mut(file) {
            f.closed = true;
        }
        Ok(())
    }

    async fn close_edit(&mut self) -> anyhow::Result<()> {
        self.require_active()?;
        let any_open_dir = self.dirs.values().any(|d| !d.closed);
        let any_open_file = self.files.values().any(|f| !f.closed);
        if any_open_dir || any_open_file {
            return Err(violation("close_edit called with handles still open"));
        }
        self.inner.close_edit().await?;
        self.state = SessionState::Ended;
        Ok(())
    }

    async fn abort_edit(&mut self) -> anyhow::Result<()> {
        if self.state == SessionState::Ended {
            return Err(violation("abort_edit called after the session already ended"));
        }
        self.inner.abort_edit().await?;
        self.state = SessionState::Ended;
        Ok(())
    }
}

struct VerifyingSink {
    inner: Box<dyn WindowSink>,
    finished: Arc<AtomicBool>,
    done: bool,
}

#[async_trait]
impl WindowSink for VerifyingSink {
    async fn send_window(&mut self, window: Window) -> anyhow::Result<()> {
        if self.done {
            return Err(violation("window pushed after the terminating null window"));
        }
        let is_null = window.is_null();
        self.inner.send_window(window).await?;
        if is_null {
            self.done = true;
            self.finished.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}
