// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The replay/sync engine (spec §4.8): mirrors a source repository into a
//! destination repository via `init`/`sync`/`copy_revprops`/`info`,
//! cooperating with the destination's rev-0 bookkeeping properties, an
//! advisory sync lock, and a property-filtering/normalizing editor
//! wrapped around the destination's commit editor.

mod bookkeeping;
mod engine;
mod filter_editor;
mod lock;
mod revprops;

pub use bookkeeping::{
    is_bookkeeping_prop, Bookkeeping, CURRENTLY_COPYING, FROM_URL, FROM_UUID, LAST_MERGED_REV, LOCK,
};
pub use engine::{copy_revprops, info, init, sync, SyncReport};
pub use filter_editor::{is_regular_prop, migrate_svnmerge_property, FilterStats, SyncFilterEditor, SyncOptions};
pub use lock::SyncLock;
pub use revprops::normalize_eol;
