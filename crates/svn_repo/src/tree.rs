// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The committed-revision tree representation (spec §3 "Versioned tree",
//! §4.7.1). Each revision's root is an immutable, structurally-shared
//! `Arc<Node>` — a server-side copy (spec §4.7 "perform a server-side
//! copy") is just another reference to the same `Arc`, not a deep clone,
//! which is what makes `add-*` with `copyfrom` O(1) the way the real
//! filesystem's node-revision sharing is.
//!
//! `Revision::Invalid` is used as an in-transaction marker: a node
//! carries it from the moment a txn creates or structurally touches it
//! until `finalize` rewrites it to the committed revision number at
//! commit time. A committed tree never contains it.

use std::collections::BTreeMap;
use std::sync::Arc;

use svn_types::{NodeKind, PropertyMap, RepoPath, Revision};

/// A node in a committed (or in-progress) tree.
#[derive(Debug, Clone)]
pub enum Node {
    File(FileNode),
    Directory(DirNode),
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub props: PropertyMap,
    pub content: Arc<Vec<u8>>,
    pub created_rev: Revision,
    /// Set iff this exact node was produced by `add-file` with a
    /// `copyfrom` pair in the transaction that created it (spec §4.7
    /// "perform a server-side copy"); cleared on any later structural
    /// rebuild, matching "ownership" of the copy by the one revision
    /// that performed it.
    pub copied_from: Option<(RepoPath, Revision)>,
}

#[derive(Debug, Clone)]
pub struct DirNode {
    pub props: PropertyMap,
    pub children: BTreeMap<String, Arc<Node>>,
    pub created_rev: Revision,
    pub copied_from: Option<(RepoPath, Revision)>,
}

impl Node {
    pub fn empty_dir(created_rev: Revision) -> Node {
        Node::Directory(DirNode {
            props: PropertyMap::new(),
            children: BTreeMap::new(),
            created_rev,
            copied_from: None,
        })
    }

    pub fn new_file(created_rev: Revision) -> Node {
        Node::File(FileNode {
            props: PropertyMap::new(),
            content: Arc::new(Vec::new()),
            created_rev,
            copied_from: None,
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File(_) => NodeKind::File,
            Node::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn created_rev(&self) -> Revision {
        match self {
            Node::File(f) => f.created_rev,
            Node::Directory(d) => d.created_rev,
        }
    }

    pub fn props(&self) -> &PropertyMap {
        match self {
            Node::File(f) => &f.props,
            Node::Directory(d) => &d.props,
        }
    }

    pub fn copied_from(&self) -> Option<&(RepoPath, Revision)> {
        match self {
            Node::File(f) => f.copied_from.as_ref(),
            Node::Directory(d) => d.copied_from.as_ref(),
        }
    }

    pub fn as_directory(&self) -> Option<&DirNode> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }
}

fn not_a_directory(path: &RepoPath) -> anyhow::Error {
    svn_error::SvnErrorKind::ProtocolViolation(format!("'{}' is not a directory", path.as_str())).into()
}

fn no_such_path(path: &RepoPath) -> anyhow::Error {
    svn_error::SvnErrorKind::NotFound(path.as_str().to_string()).into()
}

/// Descends `root` along `path`, returning the node there, or `None` if
/// any component of the path is absent.
pub fn lookup(root: &Arc<Node>, path: &RepoPath) -> Option<Arc<Node>> {
    let mut current = root.clone();
    for segment in path.segments() {
        let dir = current.as_directory()?;
        current = dir.children.get(segment)?.clone();
    }
    Some(current)
}

/// Rewrites the subtree along `path`, applying `f` to the node currently
/// there (`None` if absent) and replacing it with whatever `f` returns
/// (`None` deletes it). Every directory on the path from the root down to
/// (but not including) untouched siblings is rebuilt with a fresh `Arc`
/// tagged `Revision::Invalid`, since its own entries list just changed;
/// untouched subtrees keep their original `Arc` unchanged.
pub fn update_at(
    root: &Arc<Node>,
    path: &RepoPath,
    f: impl FnOnce(Option<&Arc<Node>>) -> anyhow::Result<Option<Arc<Node>>>,
) -> anyhow::Result<Arc<Node>> {
    let segments = path.segments();
    match update_rec(root, &segments, &mut Some(f)) {
        Ok(Some(new_root)) => Ok(new_root),
        Ok(None) => anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(
            "cannot delete the repository root".to_string()
        )),
        Err(e) => Err(e),
    }
}

fn update_rec(
    node: &Arc<Node>,
    segments: &[&str],
    f: &mut Option<impl FnOnce(Option<&Arc<Node>>) -> anyhow::Result<Option<Arc<Node>>>>,
) -> anyhow::Result<Option<Arc<Node>>> {
    match segments.split_first() {
        None => (f.take().expect("update_rec called once per path"))(Some(node)),
        Some((head, rest)) => {
            let dir = node
                .as_directory()
                .ok_or_else(|| not_a_directory(&RepoPath::from(*head)))?;
            let child = dir.children.get(*head);
            let new_child = if rest.is_empty() {
                (f.take().expect("update_rec called once per path"))(child)?
            } else {
                let child = child.ok_or_else(|| no_such_path(&RepoPath::from(*head)))?;
                update_rec(child, rest, f)?
            };
            let mut new_children = dir.children.clone();
            match new_child {
                Some(c) => {
                    new_children.insert((*head).to_string(), c);
                }
                None => {
                    new_children.remove(*head);
                }
            }
            Ok(Some(Arc::new(Node::Directory(DirNode {
                props: dir.props.clone(),
                children: new_children,
                created_rev: Revision::Invalid,
                copied_from: None,
            }))))
        }
    }
}

/// Rewrites every `Revision::Invalid`-tagged node reachable from `node`
/// to `new_rev`; stops descending into any subtree whose own `created_rev`
/// is already a concrete revision, since that subtree wasn't touched by
/// this transaction (spec §9 "closing a handle releases its scratch
/// region" — here, finalization only walks what was actually modified).
pub fn finalize(node: &Arc<Node>, new_rev: Revision) -> Arc<Node> {
    match &**node {
        Node::File(f) if f.created_rev == Revision::Invalid => Arc::new(Node::File(FileNode {
            created_rev: new_rev,
            ..f.clone()
        })),
        Node::Directory(d) if d.created_rev == Revision::Invalid => {
            let children = d.children.iter().map(|(k, v)| (k.clone(), finalize(v, new_rev))).collect();
            Arc::new(Node::Directory(DirNode {
                props: d.props.clone(),
                children,
                created_rev: new_rev,
                copied_from: d.copied_from.clone(),
            }))
        }
        _ => node.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_descends_through_directories() {
        let mut trunk = DirNode {
            props: PropertyMap::new(),
            children: BTreeMap::new(),
            created_rev: Revision::Number(1),
            copied_from: None,
        };
        trunk.children.insert(
            "f.txt".to_string(),
            Arc::new(Node::File(FileNode {
                props: PropertyMap::new(),
                content: Arc::new(b"hi".to_vec()),
                created_rev: Revision::Number(1),
                copied_from: None,
            })),
        );
        let mut root = DirNode {
            props: PropertyMap::new(),
            children: BTreeMap::new(),
            created_rev: Revision::Number(1),
            copied_from: None,
        };
        root.children.insert("trunk".to_string(), Arc::new(Node::Directory(trunk)));
        let root = Arc::new(Node::Directory(root));

        let found = lookup(&root, &RepoPath::from("trunk/f.txt")).unwrap();
        assert_eq!(found.as_file().unwrap().content.as_slice(), b"hi");
        assert!(lookup(&root, &RepoPath::from("trunk/missing.txt")).is_none());
    }

    #[test]
    fn update_at_adds_a_new_file_and_marks_ancestors_invalid() {
        let root = Arc::new(Node::empty_dir(Revision::ZERO));
        let new_root = update_at(&root, &RepoPath::from("a.txt"), |existing| {
            assert!(existing.is_none());
            Ok(Some(Arc::new(Node::File(FileNode {
                props: PropertyMap::new(),
                content: Arc::new(b"new".to_vec()),
                created_rev: Revision::Invalid,
                copied_from: None,
            }))))
        })
        .unwrap();
        assert_eq!(new_root.created_rev(), Revision::Invalid);
        let found = lookup(&new_root, &RepoPath::from("a.txt")).unwrap();
        assert_eq!(found.as_file().unwrap().content.as_slice(), b"new");
    }

    #[test]
    fn update_at_deleting_a_child_removes_it_from_the_parent() {
        let root = Arc::new(Node::empty_dir(Revision::ZERO));
        let with_file = update_at(&root, &RepoPath::from("a.txt"), |_| {
            Ok(Some(Arc::new(Node::new_file(Revision::Invalid))))
        })
        .unwrap();
        let without_file = update_at(&with_file, &RepoPath::from("a.txt"), |existing| {
            assert!(existing.is_some());
            Ok(None)
        })
        .unwrap();
        assert!(lookup(&without_file, &RepoPath::from("a.txt")).is_none());
    }

    #[test]
    fn finalize_rewrites_only_invalid_tagged_nodes() {
        let untouched = Arc::new(Node::empty_dir(Revision::Number(3)));
        let mut root_dir = DirNode {
            props: PropertyMap::new(),
            children: BTreeMap::new(),
            created_rev: Revision::Invalid,
            copied_from: None,
        };
        root_dir.children.insert("old".to_string(), untouched.clone());
        root_dir.children.insert(
            "new".to_string(),
            Arc::new(Node::new_file(Revision::Invalid)),
        );
        let root = Arc::new(Node::Directory(root_dir));

        let finalized = finalize(&root, Revision::Number(4));
        assert_eq!(finalized.created_rev(), Revision::Number(4));
        let old_child = lookup(&finalized, &RepoPath::from("old")).unwrap();
        assert!(Arc::ptr_eq(&old_child, &untouched));
        let new_child = lookup(&finalized, &RepoPath::from("new")).unwrap();
        assert_eq!(new_child.created_rev(), Revision::Number(4));
    }
}
