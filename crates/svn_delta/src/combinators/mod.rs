// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Editor combinators (spec §4.1.1): ways of composing `Editor`
//! implementations without either side knowing it's being composed.

mod ambient_depth;
mod cancel;
mod tee;

pub use ambient_depth::{AmbientDepthFilter, DepthHandle, DepthSource};
pub use cancel::Cancelling;
pub use tee::{compose, Tee};
