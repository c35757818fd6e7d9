// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Walks a set of working-copy targets and drives a delta editor against
//! whatever local modifications they carry (spec §4.6). This crate only
//! knows the generic `Editor` ABI: it has no notion of a repository
//! filesystem, a network session, or even what `Editor::Handle` actually
//! is — that is the consumer's business (`svn_repo::CommitEditor` in our
//! tests, an update editor or a sync destination in general).

mod driver;
mod gather;
mod working_text;

#[cfg(test)]
mod tests;

pub use driver::{apply_post_commit, commit, compute_anchor, PendingChange, PendingOp};
pub use working_text::{MemWorkingText, WorkingText};
