// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;
use svn_txdelta::WindowSink;
use svn_types::{Checksum, Revision};

/// A `copyfrom` pair, valid only inside `add_directory`/`add_file` (spec
/// §4.1). `copyfrom_rev` must name a committed revision of `copyfrom_path`
/// in the same repository the edit targets.
#[derive(Debug, Clone)]
pub struct CopyFrom {
    pub path: String,
    pub rev: Revision,
}

/// The delta editor ABI (spec §4.1): a depth-first tree-edit calling
/// contract. This is the Rust expression of `svn_delta_editor_t` — an
/// `async_trait` object whose `Handle` associated type stands in for the
/// original's opaque baton pointers (spec §4.1.1, §9 "Vtable of callbacks
/// → trait/interface").
///
/// Implementors are consumers: a working-copy update, a repository commit
/// editor, a combinator wrapping another `Editor`. Producers (the commit
/// driver, the replay engine) hold a `Box<dyn Editor<Handle = H>>` and
/// drive it through exactly the call sequence in spec §4.1.
#[async_trait]
pub trait Editor: Send {
    type Handle: Clone + Eq + std::hash::Hash + Send + Sync + std::fmt::Debug;

    /// Announces the revision the edit targets. Optional; at most once,
    /// and only before `open_root`.
    async fn set_target_revision(&mut self, _rev: Revision) -> anyhow::Result<()> {
        Ok(())
    }

    async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle>;

    /// Deletes `name` from `parent`. Must precede any `add_*` of the same
    /// name within the same parent in this session.
    async fn delete_entry(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<()>;

    async fn add_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle>;

    async fn open_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle>;

    /// The item exists but is not authorized for this caller to see.
    async fn absent_directory(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()>;

    async fn change_dir_prop(
        &mut self,
        dir: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()>;

    async fn close_directory(&mut self, dir: &Self::Handle) -> anyhow::Result<()>;

    async fn add_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle>;

    async fn open_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle>;

    async fn absent_file(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()>;

    /// Binds a window sink to `file`. At most once per file handle; the
    /// caller must push a terminating null window (spec §4.3) before
    /// `close_file`.
    async fn apply_textdelta(
        &mut self,
        file: &Self::Handle,
        base_checksum: Option<Checksum>,
    ) -> anyhow::Result<Box<dyn WindowSink>>;

    async fn change_file_prop(
        &mut self,
        file: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()>;

    async fn close_file(
        &mut self,
        file: &Self::Handle,
        target_checksum: Option<Checksum>,
    ) -> anyhow::Result<()>;

    /// Commits the edit. Exactly one of `close_edit`/`abort_edit` is
    /// called per session.
    async fn close_edit(&mut self) -> anyhow::Result<()>;

    /// Aborts the edit. No partial commit is observable afterwards.
    async fn abort_edit(&mut self) -> anyhow::Result<()>;
}
