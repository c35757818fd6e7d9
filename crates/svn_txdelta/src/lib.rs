// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Text-delta window codec (spec §4.3): a pure, I/O-free binary diff
//! format plus the streaming sink consumers apply it through.

mod apply;
mod diff;
mod sink;
mod window;

pub use apply::{apply, apply_window};
pub use diff::diff_bytes;
pub use sink::{ApplyingSink, NullSink, WindowSink};
pub use window::{Op, Window};
