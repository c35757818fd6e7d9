// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Properties are an opaque bytes-to-bytes mapping (spec §3). Names
//! beginning with `svn:` are reserved; a fixed subset of those require
//! LF-only line endings, mirroring the original's `svn_prop_needs_translation`.

use std::collections::BTreeMap;

pub type PropValue = Vec<u8>;

/// An ordered (for deterministic diffing and serialization) property map.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PropertyMap(BTreeMap<String, PropValue>);

/// `svn:*` property names whose values must use LF-only line endings,
/// regardless of the file's own `svn:eol-style` (spec §3).
pub const LF_NORMALIZED_PROPS: &[&str] = &[
    "svn:log",
    "svn:author",
    "svn:date",
    "svn:mergeinfo",
    "svn:externals",
    "svn:ignore",
    "svn:sync-from-url",
    "svn:sync-from-uuid",
    "svn:sync-last-merged-rev",
    "svn:sync-currently-copying",
    "svn:sync-lock",
];

pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with("svn:")
}

pub fn needs_lf_normalization(name: &str) -> bool {
    LF_NORMALIZED_PROPS.contains(&name)
}

impl PropertyMap {
    pub fn new() -> Self {
        PropertyMap(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Sets a property, or deletes it if `value` is `None` (spec §4.1:
    /// "null value means delete this property").
    pub fn set(&mut self, name: impl Into<String>, value: Option<PropValue>) {
        let name = name.into();
        match value {
            Some(v) => {
                self.0.insert(name, v);
            }
            None => {
                self.0.remove(&name);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All `(name, old, new)` triples where `self` (old) and `other` (new)
    /// disagree, in name order. A name present only in `other` yields
    /// `old = None`; present only in `self` yields `new = None`. Drives
    /// the commit driver's "one `change-*-prop` per difference" policy
    /// (spec §4.6).
    pub fn diff<'a>(
        &'a self,
        other: &'a PropertyMap,
    ) -> Vec<(&'a str, Option<&'a PropValue>, Option<&'a PropValue>)> {
        let mut names: Vec<&str> = self.0.keys().chain(other.0.keys()).map(|s| s.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .filter_map(|name| {
                let old = self.0.get(name);
                let new = other.0.get(name);
                if old == new {
                    None
                } else {
                    Some((name, old, new))
                }
            })
            .collect()
    }
}

impl FromIterator<(String, PropValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, PropValue)>>(iter: I) -> Self {
        PropertyMap(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_none_deletes() {
        let mut p = PropertyMap::new();
        p.set("svn:eol-style", Some(b"LF".to_vec()));
        assert_eq!(p.get_str("svn:eol-style"), Some("LF"));
        p.set("svn:eol-style", None);
        assert_eq!(p.get("svn:eol-style"), None);
    }

    #[test]
    fn reserved_and_lf_normalized_names() {
        assert!(is_reserved_name("svn:mergeinfo"));
        assert!(!is_reserved_name("myapp:custom"));
        assert!(needs_lf_normalization("svn:log"));
        assert!(!needs_lf_normalization("svn:eol-style"));
    }

    #[test]
    fn diff_reports_adds_changes_and_removes() {
        let mut a = PropertyMap::new();
        a.set("keep", Some(b"1".to_vec()));
        a.set("removed", Some(b"x".to_vec()));
        a.set("changed", Some(b"old".to_vec()));

        let mut b = PropertyMap::new();
        b.set("keep", Some(b"1".to_vec()));
        b.set("changed", Some(b"new".to_vec()));
        b.set("added", Some(b"y".to_vec()));

        let diff = a.diff(&b);
        let names: Vec<&str> = diff.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names, vec!["added", "changed", "removed"]);

        let (_, old, new) = diff.iter().find(|(n, _, _)| *n == "removed").unwrap();
        assert!(old.is_some());
        assert!(new.is_none());
    }
}
