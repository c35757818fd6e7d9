// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Keyword expansion/contraction (spec §4.4, §4.4.1). `$Name$` contracts
//! to a bare placeholder; expands to `$Name: value $` or, for a keyword
//! configured with a fixed width, `$Name:: value   $` padded with spaces
//! and terminated with `#` if the value overflows the declared width.

use svn_types::Revision;

/// The fixed keyword vocabulary (spec §4.4.1, from `subst.c`): not just
/// `revision`/`date`/`author`/`url`, but also the condensed `id` form and
/// the URL-bearing `header` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Revision,
    Date,
    Author,
    Url,
    Id,
    Header,
}

impl Keyword {
    /// All the aliases the original recognizes for this keyword's long
    /// and short spellings, matched case-sensitively against the
    /// identifier between `$`/`:` markers.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Keyword::Revision => &["LastChangedRevision", "Rev", "Revision"],
            Keyword::Date => &["LastChangedDate", "Date"],
            Keyword::Author => &["LastChangedBy", "Author"],
            Keyword::Url => &["HeadURL", "URL"],
            Keyword::Id => &["Id"],
            Keyword::Header => &["Header"],
        }
    }

    fn canonical_name(self) -> &'static str {
        self.aliases()[0]
    }

    pub fn from_name(name: &str) -> Option<Keyword> {
        for kw in [
            Keyword::Revision,
            Keyword::Date,
            Keyword::Author,
            Keyword::Url,
            Keyword::Id,
            Keyword::Header,
        ] {
            if kw.aliases().contains(&name) {
                return Some(kw);
            }
        }
        None
    }
}

/// The concrete per-file values a keyword set expands against (spec §3
/// `Entry`'s last-committed fields, plus the file's own basename/URL).
#[derive(Debug, Clone)]
pub struct KeywordValues {
    pub revision: Revision,
    pub date: String,
    pub author: String,
    pub url: String,
    pub basename: String,
}

impl KeywordValues {
    fn rendered(&self, kw: Keyword) -> String {
        match kw {
            Keyword::Revision => self
                .revision
                .as_number()
                .map(|n| n.to_string())
                .unwrap_or_default(),
            Keyword::Date => self.date.clone(),
            Keyword::Author => self.author.clone(),
            Keyword::Url => self.url.clone(),
            Keyword::Id => format!(
                "{} {} {} {}",
                self.basename,
                self.revision.as_number().unwrap_or(0),
                self.date,
                self.author
            ),
            Keyword::Header => format!(
                "{} {} {} {}",
                self.url,
                self.revision.as_number().unwrap_or(0),
                self.date,
                self.author
            ),
        }
    }
}

/// A keyword enabled for a file, with an optional fixed expansion width
/// (spec §4.4.1's `$Name:: value $` form, width named in the
/// `svn:keywords` property as `Name::width`).
#[derive(Debug, Clone, Copy)]
pub struct KeywordSpec {
    pub keyword: Keyword,
    pub fixed_width: Option<usize>,
}

/// Parses the whitespace-separated `svn:keywords` property value (spec
/// §4.4), including an optional `::width` suffix per entry.
pub fn parse_keywords_property(value: &str) -> Vec<KeywordSpec> {
    value
        .split_whitespace()
        .filter_map(|token| {
            let (name, width) = match token.split_once("::") {
                Some((name, width)) => (name, width.parse::<usize>().ok()),
                None => (token, None),
            };
            Keyword::from_name(name).map(|keyword| KeywordSpec {
                keyword,
                fixed_width: width,
            })
        })
        .collect()
}

const TRUNCATION_SENTINEL: u8 = b'#';

/// Expands every enabled keyword's bare or stale placeholder in `data`
/// (spec §4.4 "expands `$Name$` to `$Name: value $` on output").
pub fn expand(data: &[u8], specs: &[KeywordSpec], values: &KeywordValues) -> Vec<u8> {
    let contracted = contract(data, specs);
    let mut out = Vec::with_capacity(contracted.len());
    let mut i = 0;
    while i < contracted.len() {
        if contracted[i] != b'$' {
            out.push(contracted[i]);
            i += 1;
            continue;
        }
        if let Some((name, _fixed, end)) = scan_bare_placeholder(&contracted, i) {
            if let Some(spec) = specs.iter().find(|s| s.keyword.aliases().contains(&name)) {
                out.extend_from_slice(&render_expanded(spec, values));
                i = end;
                continue;
            }
        }
        out.push(contracted[i]);
        i += 1;
    }
    out
}

/// Scans a bare `$Name$` or `$Name::$` placeholder starting at `data[i]`
/// (which must be `$`). Returns the identifier, whether it used the
/// `::` marker, and the index just past the closing `$`.
fn scan_bare_placeholder(data: &[u8], i: usize) -> Option<(&str, bool, usize)> {
    let rest = &data[i + 1..];
    let name_end = rest.iter().position(|&b| b == b'$' || b == b':' || b == b' ')?;
    let name = std::str::from_utf8(&rest[..name_end]).ok()?;
    if name.is_empty() {
        return None;
    }
    let after_name = i + 1 + name_end;
    if data.get(after_name) == Some(&b'$') {
        return Some((name, false, after_name + 1));
    }
    if data.get(after_name) == Some(&b':') && data.get(after_name + 1) == Some(&b':') && data.get(after_name + 2) == Some(&b'$') {
        return Some((name, true, after_name + 3));
    }
    None
}

fn render_expanded(spec: &KeywordSpec, values: &KeywordValues) -> Vec<u8> {
    let name = spec.keyword.canonical_name();
    let value = values.rendered(spec.keyword);
    match spec.fixed_width {
        Some(width) => {
            let mut body = format!(" {value} ");
            if body.len() > width {
                body.truncate(width.saturating_sub(1));
                body.push(TRUNCATION_SENTINEL as char);
            } else {
                while body.len() < width {
                    body.push(' ');
                }
            }
            format!("${name}::{body}$").into_bytes()
        }
        None => format!("${name}: {value} $").into_bytes(),
    }
}

/// Turns every recognized keyword's expanded form back into its bare
/// placeholder (spec §4.4 "contracts it on input"). The `::` fixed-width
/// marker is preserved (an empty value, no padding) so a later `expand`
/// knows to re-render it fixed-width; a plain `$Name: ... $` contracts
/// to plain `$Name$`.
pub fn contract(data: &[u8], specs: &[KeywordSpec]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] != b'$' {
            out.push(data[i]);
            i += 1;
            continue;
        }
        if let Some((_name, _fixed, replacement, end)) = scan_expanded_form(data, i, specs) {
            out.extend_from_slice(&replacement);
            i = end;
            continue;
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

/// Scans `$Name: value $` or `$Name:: value  $`/`$Name::...#$` starting
/// at `data[i] == '$'`. Returns the bare replacement bytes and the index
/// just past the closing `$`.
fn scan_expanded_form<'a>(
    data: &'a [u8],
    i: usize,
    specs: &[KeywordSpec],
) -> Option<(&'a str, bool, Vec<u8>, usize)> {
    let rest = &data[i + 1..];
    let name_end = rest.iter().position(|&b| b == b':' || b == b'$' || b == b' ' || b == b'\n')?;
    let name = std::str::from_utf8(&rest[..name_end]).ok()?;
    if name.is_empty() || !specs.iter().any(|s| s.keyword.aliases().contains(&name)) {
        return None;
    }
    let after_name = i + 1 + name_end;
    let fixed = data.get(after_name) == Some(&b':') && data.get(after_name + 1) == Some(&b':');
    let colon_len = if fixed { 2 } else { 1 };
    if data.get(after_name) != Some(&b':') {
        return None;
    }
    let body_start = after_name + colon_len;
    // the value runs until the next '$' (never spans a newline: an
    // unterminated keyword is left untouched, matching the original's
    // refusal to expand across line boundaries)
    let rel_close = data[body_start..].iter().position(|&b| b == b'$' || b == b'\n')?;
    if data.get(body_start + rel_close) != Some(&b'$') {
        return None;
    }
    let end = body_start + rel_close + 1;
    let bare = if fixed {
        format!("${name}::$").into_bytes()
    } else {
        format!("${name}$").into_bytes()
    };
    Some((name, fixed, bare, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> KeywordValues {
        KeywordValues {
            revision: Revision::Number(42),
            date: "2024-01-01".to_string(),
            author: "jrandom".to_string(),
            url: "https://example.com/repo/trunk/f.txt".to_string(),
            basename: "f.txt".to_string(),
        }
    }

    #[test]
    fn expands_bare_revision_keyword() {
        let specs = parse_keywords_property("Revision");
        let out = expand(b"$Revision$", &specs, &values());
        assert_eq!(out, b"$Revision: 42 $");
    }

    #[test]
    fn round_trips_through_expand_then_contract() {
        let specs = parse_keywords_property("Revision Author");
        let expanded = expand(b"$Revision$ by $Author$", &specs, &values());
        let contracted = contract(&expanded, &specs);
        assert_eq!(contracted, b"$Revision$ by $Author$");
    }

    #[test]
    fn reexpanding_an_already_expanded_keyword_refreshes_the_value() {
        let specs = parse_keywords_property("Revision");
        let stale = b"$Revision: 7 $".to_vec();
        let refreshed = expand(&stale, &specs, &values());
        assert_eq!(refreshed, b"$Revision: 42 $");
    }

    #[test]
    fn fixed_width_expansion_pads_with_spaces() {
        let specs = parse_keywords_property("Revision::10");
        let out = expand(b"$Revision::$", &specs, &values());
        assert_eq!(out.len(), "$Revision::".len() + 10 + 1);
        let body = &out[b"$Revision::".len()..out.len() - 1];
        assert_eq!(body.len(), 10);
        assert!(body.starts_with(b" 42"));
        assert_eq!(out.last(), Some(&b'$'));
    }

    #[test]
    fn fixed_width_overflow_is_truncated_with_sentinel() {
        let specs = parse_keywords_property("Header::8");
        let out = expand(b"$Header::$", &specs, &values());
        let body = &out[b"$Header::".len()..out.len() - 1];
        assert_eq!(body.len(), 8);
        assert_eq!(body.last(), Some(&b'#'));
    }

    #[test]
    fn id_keyword_condenses_basename_revision_date_author() {
        let specs = parse_keywords_property("Id");
        let out = expand(b"$Id$", &specs, &values());
        assert_eq!(out, b"$Id: f.txt 42 2024-01-01 jrandom $");
    }

    #[test]
    fn header_keyword_uses_url_instead_of_basename() {
        let specs = parse_keywords_property("Header");
        let out = expand(b"$Header$", &specs, &values());
        assert_eq!(
            out,
            b"$Header: https://example.com/repo/trunk/f.txt 42 2024-01-01 jrandom $"
        );
    }

    #[test]
    fn unrecognized_dollar_text_is_left_alone() {
        let specs = parse_keywords_property("Revision");
        let out = expand(b"cost: $5.00", &specs, &values());
        assert_eq!(out, b"cost: $5.00");
    }
}
