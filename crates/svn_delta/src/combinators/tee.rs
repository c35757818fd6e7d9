// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! `Tee`: drives two editors through the same call sequence, as one. Used
//! to fan a single edit out to, say, a working-copy update and a
//! notification collector at once without either consumer knowing the
//! other exists.

use async_trait::async_trait;
use svn_txdelta::{Window, WindowSink};
use svn_types::{Checksum, Revision};

use crate::editor::{CopyFrom, Editor};

/// Forwards every call to `a` then `b`. `a`'s return value wins where the
/// two must agree on something scalar; handles from both sides are kept
/// paired so later calls can be replayed against each.
pub struct Tee<A: Editor, B: Editor> {
    a: A,
    b: B,
}

impl<A: Editor, B: Editor> Tee<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Tee { a, b }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.a, self.b)
    }
}

/// Joins two editors into one that drives both (spec §4.1.1 combinator
/// `compose`/`tee`).
pub fn compose<A: Editor, B: Editor>(a: A, b: B) -> Tee<A, B> {
    Tee::new(a, b)
}

#[async_trait]
impl<A: Editor + Send, B: Editor + Send> Editor for Tee<A, B> {
    type Handle = (A::Handle, B::Handle);

    async fn set_target_revision(&mut self, rev: Revision) -> anyhow::Result<()> {
        self.a.set_target_revision(rev).await?;
        self.b.set_target_revision(rev).await?;
        Ok(())
    }

    async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        let ha = self.a.open_root(base_rev).await?;
        let hb = self.b.open_root(base_rev).await?;
        Ok((ha, hb))
    }

    async fn delete_entry(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<()> {
        self.a.delete_entry(&parent.0, name, base_rev).await?;
        self.b.delete_entry(&parent.1, name, base_rev).await?;
        Ok(())
    }

    async fn add_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        let ha = self.a.add_directory(&parent.0, name, copyfrom.clone()).await?;
        let hb = self.b.add_directory(&parent.1, name, copyfrom).await?;
        Ok((ha, hb))
    }

    async fn open_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        let ha = self.a.open_directory(&parent.0, name, base_rev).await?;
        let hb = self.b.open_directory(&parent.1, name, base_rev).await?;
        Ok((ha, hb))
    }

    async fn absent_directory(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        self.a.absent_directory(&parent.0, name).await?;
        self.b.absent_directory(&parent.1, name).await?;
        Ok(())
    }

    async fn change_dir_prop(
        &mut self,
        dir: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.a.change_dir_prop(&dir.0, name, value.clone()).await?;
        self.b.change_dir_prop(&dir.1, name, value).await?;
        Ok(())
    }

    async fn close_directory(&mut self, dir: &Self::Handle) -> anyhow::Result<()> {
        self.a.close_directory(&dir.0).await?;
        self.b.close_directory(&dir.1).await?;
        Ok(())
    }

    async fn add_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        let ha = self.a.add_file(&parent.0, name, copyfrom.clone()).await?;
        let hb = self.b.add_file(&parent.1, name, copyfrom).await?;
        Ok((ha, hb))
    }

    async fn open_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        let ha = self.a.open_file(&parent.0, name, base_rev).await?;
        let hb = self.b.open_file(&parent.1, name, base_rev).await?;
        Ok((ha, hb))
    }

    async fn absent_file(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        self.a.absent_file(&parent.0, name).await?;
        self.b.absent_file(&parent.1, name).await?;
        Ok(())
    }

    async fn apply_textdelta(
        &mut self,
        file: &Self::Handle,
        base_checksum: Option<Checksum>,
    ) -> anyhow::Result<Box<dyn WindowSink>> {
        let sa = self.a.apply_textdelta(&file.0, base_checksum.clone()).await?;
        let sb = self.b.apply_textdelta(&file.1, base_checksum).await?;
        Ok(Box::new(TeeSink { a: sa, b: sb }))
    }

    async fn change_file_prop(
        &mut self,
        file: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        self.a.change_file_prop(&file.0, name, value.clone()).await?;
        self.b.change_file_prop(&file.1, name, value).await?;
        Ok(())
    }

    async fn close_file(
        &mut self,
        file: &Self::Handle,
        target_checksum: Option<Checksum>,
    ) -> anyhow::Result<()> {
        self.a.close_file(&file.0, target_checksum.clone()).await?;
        self.b.close_file(&file.1, target_checksum).await?;
        Ok(())
    }

    async fn close_edit(&mut self) -> anyhow::Result<()> {
        self.a.close_edit().await?;
        self.b.close_edit().await?;
        Ok(())
    }

    async fn abort_edit(&mut self) -> anyhow::Result<()> {
        self.a.abort_edit().await?;
        self.b.abort_edit().await?;
        Ok(())
    }
}

struct TeeSink {
    a: Box<dyn WindowSink>,
    b: Box<dyn WindowSink>,
}

#[async_trait]
impl WindowSink for TeeSink {
    async fn send_window(&mut self, window: Window) -> anyhow::Result<()> {
        self.a.send_window(window.clone()).await?;
        self.b.send_window(window).await?;
        Ok(())
    }
}
