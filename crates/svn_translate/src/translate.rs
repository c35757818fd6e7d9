// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Ties the EOL and keyword transforms together into the two directions
//! a versioned file crosses the repository/working-copy boundary in
//! (spec §4.4's translation contract).

use crate::config::FileConfig;
use crate::eol::{self, EolStyle};
use crate::keyword::{self, KeywordValues};

/// Repository form → working-copy form: expand keywords, then apply the
/// configured EOL style (repository bytes are always LF internally).
pub fn translate_out(data: &[u8], config: &FileConfig, values: &KeywordValues) -> Vec<u8> {
    let with_keywords = if config.keywords.is_empty() {
        data.to_vec()
    } else {
        keyword::expand(data, &config.keywords, values)
    };
    match &config.eol_style {
        Some(style) if *style != EolStyle::None => eol::normalize(&with_keywords, style),
        _ => with_keywords,
    }
}

/// Working-copy form → repository form: contract keywords back to their
/// bare placeholders, then normalize line endings to LF, honoring
/// `repair` (spec §4.4 "the default rejects \[mixed endings\]").
pub fn translate_in(
    data: &[u8],
    config: &FileConfig,
    repair: bool,
) -> anyhow::Result<Vec<u8>> {
    let contracted = if config.keywords.is_empty() {
        data.to_vec()
    } else {
        keyword::contract(data, &config.keywords)
    };
    match &config.eol_style {
        Some(style) if *style != EolStyle::None => eol::translate_to_repository(&contracted, repair),
        _ => Ok(contracted),
    }
}
