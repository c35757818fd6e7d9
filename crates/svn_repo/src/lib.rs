// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The in-process repository filesystem (spec §4.7, §4.7.1): a
//! structurally-shared, immutable sequence of committed revision trees,
//! the transactions that produce new ones, the repository-side commit
//! editor, and the repository-access session the rest of the core
//! consumes via `RepoAccessSession`.

mod commit_editor;
mod repository;
mod session;
mod tree;
mod tree_diff;

pub use commit_editor::{CommitCallback, CommitEditor, RecordingCommitCallback};
pub use repository::{CommitInfo, Repository, Txn};
pub use session::{InMemorySession, RepoAccessSession, Reporter, ReplayReceiver};
pub use tree::{DirNode, FileNode, Node};
pub use tree_diff::{drive_diff, SourceResolver};
