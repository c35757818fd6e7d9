// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Copies one revision's whole property set from source to destination
//! (spec §4.8.1): every sync commits with an empty log message (this
//! workspace's `get-commit-editor` has no revprops-at-commit-time
//! parameter, unlike the original's commit-revprops-capable path), so
//! `svn:log`/`svn:author`/`svn:date` ride along here with everything
//! else rather than going in at commit time.

use svn_repo::RepoAccessSession;
use svn_types::{PropertyMap, Revision};

use crate::bookkeeping;

/// Rewrites lone `\r` and `\r\n` to `\n`, mirroring `svn_subst_translate_
/// cstring2`'s EOL-only translation of the properties spec §3 marks as
/// requiring LF line endings. Returns whether anything was rewritten.
pub fn normalize_eol(value: &[u8]) -> (Vec<u8>, bool) {
    let mut out = Vec::with_capacity(value.len());
    let mut changed = false;
    let mut i = 0;
    while i < value.len() {
        let b = value[i];
        if b == b'\r' {
            out.push(b'\n');
            changed = true;
            if i + 1 < value.len() && value[i + 1] == b'\n' {
                i += 1;
            }
        } else {
            out.push(b);
        }
        i += 1;
    }
    (out, changed)
}

/// Makes `dest`'s regular properties at `rev` equal `source_props`:
/// every source property is written through (normalized if its name
/// requires it), and every destination-only regular property not present
/// in `source_props` is deleted. The `svn:sync-*` namespace is left
/// untouched regardless of what either side carries. Returns how many
/// values were changed by normalization.
pub async fn copy_rev_props(dest: &dyn RepoAccessSession, rev: Revision, source_props: &PropertyMap) -> anyhow::Result<usize> {
    let existing = dest.rev_prop_list(rev).await?;
    let mut normalized = 0;

    for (name, value) in source_props.iter() {
        if bookkeeping::is_bookkeeping_prop(name) {
            continue;
        }
        let (value, was_normalized) = if svn_types::needs_lf_normalization(name) {
            normalize_eol(value)
        } else {
            (value.clone(), false)
        };
        if was_normalized {
            normalized += 1;
        }
        dest.rev_prop_change(rev, name, Some(value)).await?;
    }

    for (name, _) in existing.iter() {
        if bookkeeping::is_bookkeeping_prop(name) {
            continue;
        }
        if source_props.get(name).is_none() {
            dest.rev_prop_change(rev, name, None).await?;
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_cr_and_crlf_both_become_lf() {
        let (out, changed) = normalize_eol(b"a\r\nb\rc\n");
        assert_eq!(out, b"a\nb\nc\n");
        assert!(changed);
    }

    #[test]
    fn already_lf_only_text_is_reported_unchanged() {
        let (out, changed) = normalize_eol(b"a\nb\nc\n");
        assert_eq!(out, b"a\nb\nc\n");
        assert!(!changed);
    }
}
