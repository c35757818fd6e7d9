// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Line-ending normalization (spec §4.4). Pure byte-string transforms; no
//! file handles, no platform line-ending detection beyond `cfg(windows)`.

use svn_error::SvnErrorKind;

/// The `svn:eol-style` property's recognized values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EolStyle {
    /// No translation; bytes pass through unchanged.
    None,
    /// Translates to the checking-out platform's native line ending.
    Native,
    Lf,
    Cr,
    CrLf,
    /// A literal line ending supplied verbatim (not one of the four
    /// named styles, but a raw byte sequence some tools write).
    Fixed(Vec<u8>),
}

impl EolStyle {
    pub fn parse(value: &str) -> Option<EolStyle> {
        match value {
            "none" => Some(EolStyle::None),
            "native" => Some(EolStyle::Native),
            "LF" => Some(EolStyle::Lf),
            "CR" => Some(EolStyle::Cr),
            "CRLF" => Some(EolStyle::CrLf),
            _ => None,
        }
    }

    /// The literal byte sequence this style normalizes to, given the
    /// platform's native ending for `Native`.
    pub fn target_bytes(&self) -> &[u8] {
        match self {
            EolStyle::None => b"\n",
            EolStyle::Native => native_eol(),
            EolStyle::Lf => b"\n",
            EolStyle::Cr => b"\r",
            EolStyle::CrLf => b"\r\n",
            EolStyle::Fixed(bytes) => bytes,
        }
    }
}

#[cfg(windows)]
fn native_eol() -> &'static [u8] {
    b"\r\n"
}

#[cfg(not(windows))]
fn native_eol() -> &'static [u8] {
    b"\n"
}

enum LineEnding {
    Lf,
    Cr,
    CrLf,
}

/// Splits `data` into (content, ending) pairs, with the final segment
/// having no ending (`None`) if `data` doesn't end in one.
fn split_lines(data: &[u8]) -> Vec<(&[u8], Option<LineEnding>)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' => {
                if data.get(i + 1) == Some(&b'\n') {
                    out.push((&data[start..i], Some(LineEnding::CrLf)));
                    i += 2;
                } else {
                    out.push((&data[start..i], Some(LineEnding::Cr)));
                    i += 1;
                }
                start = i;
            }
            b'\n' => {
                out.push((&data[start..i], Some(LineEnding::Lf)));
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < data.len() {
        out.push((&data[start..], None));
    }
    out
}

/// Normalizes every line ending in `data` to `style`'s target bytes,
/// converting from any of LF/CR/CRLF (spec §4.4 translation contract).
/// This is the repository-form direction (all line endings are LF in the
/// repository, so `style` here is typically `Lf` when going *in*, and
/// the configured style when going *out*).
pub fn normalize(data: &[u8], style: &EolStyle) -> Vec<u8> {
    let target = style.target_bytes();
    let lines = split_lines(data);
    let mut out = Vec::with_capacity(data.len());
    for (content, ending) in lines {
        out.extend_from_slice(content);
        if ending.is_some() {
            out.extend_from_slice(target);
        }
    }
    out
}

/// Checks that `data` uses exactly one kind of line ending throughout
/// (spec §4.4 "the default rejects \[mixed endings\] with an
/// inconsistent-EOL error"). An empty file or a file with at most one
/// line ending always passes.
pub fn check_consistent(data: &[u8]) -> anyhow::Result<()> {
    let mut seen: Option<&'static str> = None;
    for (_, ending) in split_lines(data) {
        let kind = match ending {
            Some(LineEnding::Lf) => "LF",
            Some(LineEnding::Cr) => "CR",
            Some(LineEnding::CrLf) => "CRLF",
            None => continue,
        };
        match seen {
            None => seen = Some(kind),
            Some(prev) if prev != kind => {
                return Err(SvnErrorKind::InconsistentEol(format!("mixes {prev} and {kind} line endings")).into());
            }
            _ => {}
        }
    }
    Ok(())
}

/// Normalizes to repository form (LF), honoring `repair`: if `false` and
/// the input mixes line-ending styles, fails with `InconsistentEol`
/// rather than silently picking one.
pub fn translate_to_repository(data: &[u8], repair: bool) -> anyhow::Result<Vec<u8>> {
    if !repair {
        check_consistent(data)?;
    }
    Ok(normalize(data, &EolStyle::Lf))
}
