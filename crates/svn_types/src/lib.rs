// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Core Subversion data model (spec §3): revision numbers, node kinds,
//! repository paths, depth, working-copy entries, locks, and checksums.
//! No I/O, no async — every other crate in the workspace builds on these
//! plain value types.

mod checksum;
mod entry;
mod kind;
mod lock;
mod path;
mod props;
mod revision;

pub use checksum::{verify as verify_checksum, Checksum};
pub use entry::{Entry, Schedule, THIS_DIR};
pub use kind::{Depth, NodeKind};
pub use lock::Lock;
pub use path::RepoPath;
pub use props::{is_reserved_name, needs_lf_normalization, PropValue, PropertyMap, LF_NORMALIZED_PROPS};
pub use revision::Revision;
