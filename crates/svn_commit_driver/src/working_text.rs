// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The one piece of a working copy the commit driver needs that `svn_wc`'s
//! administrative stores don't carry: the *current* on-disk bytes of a
//! versioned file, in working-copy form. Everything else a commit reads
//! (entries, property bases, pristine text bases) lives in the
//! administrative area; the file's live content is deliberately outside
//! it, the same way the original never copies a working file into `.svn/`
//! until a commit or revert calls for it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use svn_types::RepoPath;

/// Supplies a versioned file's current working-copy-form bytes (spec
/// §4.6 "compares translated working text against pristine base").
#[async_trait]
pub trait WorkingText: Send + Sync {
    async fn read(&self, path: &RepoPath) -> anyhow::Result<Vec<u8>>;
}

/// An in-memory `WorkingText`, used by this crate's own tests and by
/// `svn_test_support`'s end-to-end scenarios in place of real disk I/O.
#[derive(Default)]
pub struct MemWorkingText {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemWorkingText {
    pub fn new() -> Self {
        MemWorkingText::default()
    }

    pub fn set(&self, path: &RepoPath, contents: Vec<u8>) {
        self.files.lock().unwrap().insert(path.as_str().to_string(), contents);
    }
}

#[async_trait]
impl WorkingText for MemWorkingText {
    async fn read(&self, path: &RepoPath) -> anyhow::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| svn_error::SvnErrorKind::NotFound(path.as_str().to_string()).into())
    }
}
