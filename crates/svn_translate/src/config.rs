// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Derives a file's translation configuration from its `svn:*` properties
//! (spec §4.4, §6 "configuration options recognized"). Properties are
//! bytes, not structured data, so this is explicit parsing rather than a
//! `serde` derive.

use svn_types::PropertyMap;

use crate::eol::EolStyle;
use crate::keyword::{parse_keywords_property, KeywordSpec};

/// The translation-relevant configuration for one versioned file,
/// resolved from its property set.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub eol_style: Option<EolStyle>,
    pub keywords: Vec<KeywordSpec>,
    pub special: bool,
    pub executable: bool,
}

impl FileConfig {
    pub fn from_properties(props: &PropertyMap) -> FileConfig {
        let eol_style = props.get_str("svn:eol-style").and_then(EolStyle::parse);
        let keywords = props
            .get_str("svn:keywords")
            .map(parse_keywords_property)
            .unwrap_or_default();
        let special = props.get("svn:special").is_some();
        let executable = props.get("svn:executable").is_some();
        FileConfig {
            eol_style,
            keywords,
            special,
            executable,
        }
    }

    /// Whether this file needs any translation at all; callers use this
    /// to skip the round-trip and serve the raw bytes directly.
    pub fn needs_translation(&self) -> bool {
        self.eol_style.is_some() || !self.keywords.is_empty() || self.special
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_properties_need_no_translation() {
        let props = PropertyMap::new();
        let config = FileConfig::from_properties(&props);
        assert!(!config.needs_translation());
        assert!(!config.executable);
    }

    #[test]
    fn recognizes_eol_style_and_keywords() {
        let mut props = PropertyMap::new();
        props.set("svn:eol-style", Some(b"CRLF".to_vec()));
        props.set("svn:keywords", Some(b"Revision Author".to_vec()));
        props.set("svn:executable", Some(b"*".to_vec()));
        let config = FileConfig::from_properties(&props);
        assert_eq!(config.eol_style, Some(EolStyle::CrLf));
        assert_eq!(config.keywords.len(), 2);
        assert!(config.executable);
        assert!(config.needs_translation());
    }

    #[test]
    fn unrecognized_eol_style_value_is_ignored() {
        let mut props = PropertyMap::new();
        props.set("svn:eol-style", Some(b"bogus".to_vec()));
        let config = FileConfig::from_properties(&props);
        assert_eq!(config.eol_style, None);
    }
}
