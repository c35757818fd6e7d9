// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! `AmbientDepthFilter`: narrows an edit to the working copy's recorded
//! ambient depth at each path (spec §4.2 depth lattice, §4.1.1 "ambient
//! depth filter"). A directory opened at `Depth::Empty` absorbs every
//! call below it instead of forwarding; `Files` lets file children
//! through but absorbs directory children; `Immediates`/`Infinity`
//! forward everything, with the child's own depth computed by
//! `Depth::child_depth`.
//!
//! This lives in `svn_delta` rather than `svn_wc` so the filter can be
//! unit-tested against a fake `DepthSource` without depending on the
//! working-copy store crate.

use async_trait::async_trait;
use svn_txdelta::WindowSink;
use svn_types::{Checksum, Depth, NodeKind, RepoPath, Revision};

use crate::editor::{CopyFrom, Editor};

/// Supplies the recorded ambient depth for a path, independent of how it
/// is stored (spec §4.5 entries, `THIS_DIR`'s depth field).
#[async_trait]
pub trait DepthSource: Send + Sync {
    async fn depth_at(&self, path: &RepoPath) -> anyhow::Result<Depth>;
}

/// A handle forwarded to the inner editor carries the path it names and
/// the depth it was opened at; `Absorbed` means the inner editor was
/// never told about this node at all.
#[derive(Debug, Clone)]
pub enum DepthHandle<H> {
    Forward { handle: H, path: RepoPath, depth: Depth },
    Absorbed { path: RepoPath },
}

impl<H: Eq> PartialEq for DepthHandle<H> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DepthHandle::Forward { handle: a, .. }, DepthHandle::Forward { handle: b, .. }) => a == b,
            (DepthHandle::Absorbed { path: a }, DepthHandle::Absorbed { path: b }) => a == b,
            _ => false,
        }
    }
}
impl<H: Eq> Eq for DepthHandle<H> {}

impl<H: std::hash::Hash> std::hash::Hash for DepthHandle<H> {
    fn hash<S: std::hash::Hasher>(&self, state: &mut S) {
        match self {
            DepthHandle::Forward { handle, .. } => handle.hash(state),
            DepthHandle::Absorbed { path } => path.as_str().hash(state),
        }
    }
}

pub struct AmbientDepthFilter<E: Editor, D: DepthSource> {
    inner: E,
    source: D,
    requested: Depth,
}

impl<E: Editor, D: DepthSource> AmbientDepthFilter<E, D> {
    pub fn new(inner: E, source: D, requested: Depth) -> Self {
        AmbientDepthFilter {
            inner,
            source,
            requested,
        }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn clamp(recorded: Depth, requested: Depth) -> Depth {
        use Depth::*;
        let rank = |d: Depth| match d {
            Empty | Exclude | Unknown => 0,
            Files => 1,
            Immediates => 2,
            Infinity => 3,
        };
        if rank(recorded) <= rank(requested) {
            recorded
        } else {
            requested
        }
    }

    async fn resolve_child(
        &self,
        parent: &DepthHandle<E::Handle>,
        name: &str,
        kind: NodeKind,
    ) -> anyhow::Result<(RepoPath, bool)> {
        let (parent_path, parent_depth) = match parent {
            DepthHandle::Forward { path, depth, .. } => (path.clone(), *depth),
            DepthHandle::Absorbed { path } => (path.clone(), Depth::Empty),
        };
        let child_path = parent_path.join(name);
        let included = parent_depth.includes(kind);
        Ok((child_path, included))
    }
}

#[async_trait]
impl<E: Editor + Send, D: DepthSource + Send> Editor for AmbientDepthFilter<E, D> {
    type Handle = DepthHandle<E::Handle>;

    async fn set_target_revision(&mut self, rev: Revision) -> anyhow::Result<()> {
        self.inner.set_target_revision(rev).await
    }

    async fn open_root(&mut self, base_rev: Revision) -> anyhow::Result<Self::Handle> {
        let recorded = self.source.depth_at(&RepoPath::root()).await?;
        let depth = Self::clamp(recorded, self.requested);
        let handle = self.inner.open_root(base_rev).await?;
        Ok(DepthHandle::Forward {
            handle,
            path: RepoPath::root(),
            depth,
        })
    }

    async fn delete_entry(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<()> {
        // The entry's own kind isn't known here, but any depth above
        // `Empty` keeps an entries-table record of its immediate children
        // (spec §4.5 `Entry`) worth marking deleted, even at `Files` depth
        // where a subdirectory child is never itself recursed into.
        match parent {
            DepthHandle::Forward { handle, depth, .. } if *depth != Depth::Empty => {
                self.inner.delete_entry(handle, name, base_rev).await
            }
            _ => Ok(()),
        }
    }

    async fn add_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        let (path, included) = self.resolve_child(parent, name, NodeKind::Directory).await?;
        match parent {
            DepthHandle::Forward { handle, depth, .. } if included => {
                let child = self.inner.add_directory(handle, name, copyfrom).await?;
                let recorded = self.source.depth_at(&path).await?;
                let child_depth = Self::clamp(recorded, depth.child_depth());
                Ok(DepthHandle::Forward {
                    handle: child,
                    path,
                    depth: child_depth,
                })
            }
            _ => Ok(DepthHandle::Absorbed { path }),
        }
    }

    async fn open_directory(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        let (path, included) = self.resolve_child(parent, name, NodeKind::Directory).await?;
        match parent {
            DepthHandle::Forward { handle, depth, .. } if included => {
                let child = self.inner.open_directory(handle, name, base_rev).await?;
                let recorded = self.source.depth_at(&path).await?;
                let child_depth = Self::clamp(recorded, depth.child_depth());
                Ok(DepthHandle::Forward {
                    handle: child,
                    path,
                    depth: child_depth,
                })
            }
            _ => Ok(DepthHandle::Absorbed { path }),
        }
    }

    async fn absent_directory(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        let (_path, included) = self.resolve_child(parent, name, NodeKind::Directory).await?;
        if let DepthHandle::Forward { handle, .. } = parent {
            if included {
                return self.inner.absent_directory(handle, name).await;
            }
        }
        Ok(())
    }

    async fn change_dir_prop(
        &mut self,
        dir: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        if let DepthHandle::Forward { handle, .. } = dir {
            self.inner.change_dir_prop(handle, name, value).await
        } else {
            Ok(())
        }
    }

    async fn close_directory(&mut self, dir: &Self::Handle) -> anyhow::Result<()> {
        if let DepthHandle::Forward { handle, .. } = dir {
            self.inner.close_directory(handle).await
        } else {
            Ok(())
        }
    }

    async fn add_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        copyfrom: Option<CopyFrom>,
    ) -> anyhow::Result<Self::Handle> {
        let (path, included) = self.resolve_child(parent, name, NodeKind::File).await?;
        match parent {
            DepthHandle::Forward { handle, depth, .. } if included => {
                let child = self.inner.add_file(handle, name, copyfrom).await?;
                Ok(DepthHandle::Forward {
                    handle: child,
                    path,
                    depth: *depth,
                })
            }
            _ => Ok(DepthHandle::Absorbed { path }),
        }
    }

    async fn open_file(
        &mut self,
        parent: &Self::Handle,
        name: &str,
        base_rev: Revision,
    ) -> anyhow::Result<Self::Handle> {
        let (path, included) = self.resolve_child(parent, name, NodeKind::File).await?;
        match parent {
            DepthHandle::Forward { handle, depth, .. } if included => {
                let child = self.inner.open_file(handle, name, base_rev).await?;
                Ok(DepthHandle::Forward {
                    handle: child,
                    path,
                    depth: *depth,
                })
            }
            _ => Ok(DepthHandle::Absorbed { path }),
        }
    }

    async fn absent_file(&mut self, parent: &Self::Handle, name: &str) -> anyhow::Result<()> {
        let (_path, included) = self.resolve_child(parent, name, NodeKind::File).await?;
        if let DepthHandle::Forward { handle, .. } = parent {
            if included {
                return self.inner.absent_file(handle, name).await;
            }
        }
        Ok(())
    }

    async fn apply_textdelta(
        &mut self,
        file: &Self::Handle,
        base_checksum: Option<Checksum>,
    ) -> anyhow::Result<Box<dyn WindowSink>> {
        match file {
            DepthHandle::Forward { handle, .. } => self.inner.apply_textdelta(handle, base_checksum).await,
            DepthHandle::Absorbed { .. } => Ok(Box::new(svn_txdelta::NullSink)),
        }
    }

    async fn change_file_prop(
        &mut self,
        file: &Self::Handle,
        name: &str,
        value: Option<Vec<u8>>,
    ) -> anyhow::Result<()> {
        if let DepthHandle::Forward { handle, .. } = file {
            self.inner.change_file_prop(handle, name, value).await
        } else {
            Ok(())
        }
    }

    async fn close_file(
        &mut self,
        file: &Self::Handle,
        target_checksum: Option<Checksum>,
    ) -> anyhow::Result<()> {
        if let DepthHandle::Forward { handle, .. } = file {
            self.inner.close_file(handle, target_checksum).await
        } else {
            Ok(())
        }
    }

    async fn close_edit(&mut self) -> anyhow::Result<()> {
        self.inner.close_edit().await
    }

    async fn abort_edit(&mut self) -> anyhow::Result<()> {
        self.inner.abort_edit().await
    }
}
