// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The translation layer (spec §4.4): EOL normalization, keyword
//! substitution, and `special`-file encoding applied on the byte stream
//! between a versioned file's repository form and its working-copy form.
//! Pure and I/O-free; callers own reading and writing the actual bytes.

mod config;
mod eol;
mod keyword;
mod special;
mod translate;

pub use config::FileConfig;
pub use eol::{check_consistent, normalize, translate_to_repository, EolStyle};
pub use keyword::{contract, expand, parse_keywords_property, Keyword, KeywordSpec, KeywordValues};
pub use special::{decode_link, encode_link};
pub use translate::{translate_in, translate_out};
