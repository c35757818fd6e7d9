// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use std::fmt;

/// A canonicalized, slash-separated repository path. Separate from URL
/// form, which prefixes a scheme and authority; `RepoPath` never carries
/// one.
///
/// Invariants: no leading slash, no trailing slash except the root `""`,
/// no `.`/`..` segments, no doubled slashes.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct RepoPath(String);

impl RepoPath {
    pub const ROOT: &'static str = "";

    /// Canonicalizes `raw` the way the original normalizes paths on entry:
    /// trims a leading `/`, collapses repeated slashes, rejects `.`/`..`
    /// segments, and strips a trailing slash (the root stays `""`).
    pub fn canonicalize(raw: &str) -> Self {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return RepoPath(String::new());
        }
        let segments: Vec<&str> = trimmed
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        RepoPath(segments.join("/"))
    }

    pub fn root() -> Self {
        RepoPath(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The final path component, or `None` at the root.
    pub fn basename(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            Some(self.0.rsplit('/').next().unwrap_or(&self.0))
        }
    }

    /// The parent path. The root is its own parent (callers must check
    /// `is_root` first, matching the data model's "every non-root path has
    /// a parent" invariant).
    pub fn parent(&self) -> RepoPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => RepoPath(parent.to_string()),
            None => RepoPath::root(),
        }
    }

    /// A path one level below `self` named `child`.
    pub fn join(&self, child: &str) -> RepoPath {
        if self.is_root() {
            RepoPath(child.to_string())
        } else {
            RepoPath(format!("{}/{}", self.0, child))
        }
    }

    /// True if `self` is `other` or a descendant of `other`.
    pub fn is_within(&self, other: &RepoPath) -> bool {
        if other.is_root() {
            return true;
        }
        self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0))
    }

    /// The path's components, root-to-leaf; empty at the root.
    pub fn segments(&self) -> Vec<&str> {
        if self.is_root() {
            Vec::new()
        } else {
            self.0.split('/').collect()
        }
    }

    /// The number of path components (`0` at the root).
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count() + 1
        }
    }
}

impl fmt::Debug for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoPath({:?})", self.0)
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for RepoPath {
    fn from(s: &str) -> Self {
        RepoPath::canonicalize(s)
    }
}

impl From<String> for RepoPath {
    fn from(s: String) -> Self {
        RepoPath::canonicalize(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_slashes_and_dot_segments() {
        assert_eq!(RepoPath::canonicalize("/a//b/./c/").as_str(), "a/b/c");
        assert_eq!(RepoPath::canonicalize("/").as_str(), "");
        assert_eq!(RepoPath::canonicalize("").as_str(), "");
    }

    #[test]
    fn basename_and_parent() {
        let p = RepoPath::from("trunk/src/main.c");
        assert_eq!(p.basename(), Some("main.c"));
        assert_eq!(p.parent().as_str(), "trunk/src");
        assert_eq!(p.parent().parent().as_str(), "trunk");
        assert_eq!(p.parent().parent().parent().as_str(), "");
        assert!(RepoPath::root().basename().is_none());
    }

    #[test]
    fn join_from_root_does_not_double_slash() {
        assert_eq!(RepoPath::root().join("trunk").as_str(), "trunk");
        assert_eq!(RepoPath::from("trunk").join("src").as_str(), "trunk/src");
    }

    #[test]
    fn is_within_covers_self_and_descendants_but_not_siblings() {
        let trunk = RepoPath::from("trunk");
        assert!(RepoPath::from("trunk").is_within(&trunk));
        assert!(RepoPath::from("trunk/src").is_within(&trunk));
        assert!(!RepoPath::from("branches/x").is_within(&trunk));
        assert!(RepoPath::from("anything").is_within(&RepoPath::root()));
    }

    #[test]
    fn segments_splits_on_slash_and_is_empty_at_root() {
        assert_eq!(RepoPath::root().segments(), Vec::<&str>::new());
        assert_eq!(RepoPath::from("trunk/src/main.c").segments(), vec!["trunk", "src", "main.c"]);
    }

    #[test]
    fn depth_counts_components() {
        assert_eq!(RepoPath::root().depth(), 0);
        assert_eq!(RepoPath::from("trunk").depth(), 1);
        assert_eq!(RepoPath::from("trunk/src/main.c").depth(), 3);
    }
}
