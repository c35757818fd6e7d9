// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The working-copy administrative store (spec §4.5): entries,
//! properties, pristine text bases, and crash-recoverable log replay,
//! plus the `WorkingCopy` API built on top of them.

mod codec;
mod fs_store;
mod log;
mod mem_store;
mod store;
mod working_copy;

pub use fs_store::FsWcStore;
pub use log::{replay, EntryField, LogOp};
pub use mem_store::MemWcStore;
pub use store::{AdminLog, EntriesStore, PristineStore, PropertyStore, TempArea};
pub use working_copy::{ConflictState, TranslatedFile, WalkVisitor, WorkingCopy};
