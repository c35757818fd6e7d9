// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! `Cancelling`: checks a cooperative `Cancellation` token at every
//! suspension point (spec §5, §4.1 cancellation) and turns a raised flag
//! into the same `Cancelled` error whichever call it's checked at.

use async_trait::async_trait;
use svn_error::Cancellation;
use svn_txdelta::{Window, WindowSink};
use svn_types::{Checksum, Revision};

use crate::editor::{CopyFrom, Editor};

/// Wraps an editor so every call first checks `token`; a cancelled token
/// short-circuits with `SvnErrorKind::Cancelled` before the inner editor
/// is touched.
pub struct Cancelling<E: Editor> {
    inner: E,
    token: Cancellation,
}

impl<E: Editor> Cancelling<E> {
    pub fn new(inner: E, token: Cancellation) -> Self {
        Cancelling { inner, token }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E: Editor + Send> Editor for Cancelling<E> {
    type Handle = E::Handle;

    async fn set_target_revision(&mut self, rev: Revision) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.set_target_revision(rev).await
    }

    async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        self.token.check()?;
        self.inner.open_root(base_rev).await
    }

    async fn delete_entry(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.delete_entry(parent, name, base_rev).await
    }

    async fn add_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        self.token.check()?;
        self.inner.add_directory(parent, name, copyfrom).await
    }

    async fn open_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        self.token.check()?;
        self.inner.open_directory(parent, name, base_rev).await
    }

    async fn absent_directory(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.absent_directory(parent, name).await
    }

    async fn change_dir_prop(
        &mut self,
        dir: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.change_dir_prop(dir, name, value).await
    }

    async fn close_directory(&mut self, dir: &Self::Handle) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.close_directory(dir).await
    }

    async fn add_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        self.token.check()?;
        self.inner.add_file(parent, name, copyfrom).await
    }

    async fn open_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        self.token.check()?;
        self.inner.open_file(parent, name, base_rev).await
    }

    async fn absent_file(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.absent_file(parent, name).await
    }

    async fn apply_textdelta(
        &mut self,
        file: &Self::Handle,
        base_checksum: Option<Checksum>,
    ) -> anyhow::Result<Box<dyn WindowSink>> {
        self.token.check()?;
        let inner_sink = self.inner.apply_textdelta(file, base_checksum).await?;
        Ok(Box::new(CancellingSink {
            inner: inner_sink,
            token: self.token.clone(),
        }))
    }

    async fn change_file_prop(
        &mut self,
        file: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.change_file_prop(file, name, value).await
    }

    async fn close_file(
        &mut self,
        file: &Self::Handle,
        target_checksum: Option<Checksum>,
    ) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.close_file(file, target_checksum).await
    }

    async fn close_edit(&mut self) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.close_edit().await
    }

    async fn abort_edit(&mut self) -> anyhow::Result<()> {
        self.inner.abort_edit().await
    }
}

struct CancellingSink {
    inner: Box<dyn WindowSink>,
    token: Cancellation,
}

#[async_trait]
impl WindowSink for CancellingSink {
    async fn send_window(&mut self, window: Window) -> anyhow::Result<()> {
        self.token.check()?;
        self.inner.send_window(window).await
    }
}
