// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use crate::window::{Op, Window};

/// Applies a single window against `source`, returning the bytes this
/// window alone produces (spec §4.3 "Apply"). `CopySource` reads from
/// `source` at `source_offset + op.offset`; `CopyTarget` reads from the
/// bytes this call has already produced; `Insert` reads from the window's
/// own `new_data`.
pub fn apply_window(source: &[u8], window: &Window) -> anyhow::Result<Vec<u8>> {
    window.validate()?;
    let view_end = (window.source_offset + window.source_len) as usize;
    if view_end > source.len() {
        anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(format!(
            "window source view [{}, {}) exceeds source length {}",
            window.source_offset,
            view_end,
            source.len()
        )));
    }
    let source_view = &source[window.source_offset as usize..view_end];

    let mut target = Vec::with_capacity(window.target_len as usize);
    for op in &window.ops {
        match *op {
            Op::CopySource { offset, len } => {
                let start = offset as usize;
                let end = start + len as usize;
                if end > source_view.len() {
                    anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(format!(
                        "CopySource [{start}, {end}) exceeds the window's source view of length {}",
                        source_view.len()
                    )));
                }
                target.extend_from_slice(&source_view[start..end]);
            }
            Op::CopyTarget { offset, len } => {
                let start = offset as usize;
                let end = start + len as usize;
                // Already validated by Window::validate() against bytes
                // produced so far, but re-check here since target is a
                // plain Vec and could in principle be called directly.
                if end > target.len() {
                    anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(
                        "CopyTarget references bytes not yet produced".to_string()
                    ));
                }
                // Must copy byte-by-byte: the source range can overlap
                // the destination range being appended (e.g. run-length
                // patterns), which `extend_from_slice` cannot express.
                for i in start..end {
                    let byte = target[i];
                    target.push(byte);
                }
            }
            Op::Insert { offset, len } => {
                let start = offset as usize;
                let end = start + len as usize;
                if end > window.new_data.len() {
                    anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(format!(
                        "Insert [{start}, {end}) exceeds new_data length {}",
                        window.new_data.len()
                    )));
                }
                target.extend_from_slice(&window.new_data[start..end]);
            }
        }
    }
    Ok(target)
}

/// Applies a whole window sequence (including its trailing null window)
/// against `source`, returning the full reconstructed target. A
/// non-streaming convenience over `ApplyingSink` for callers that already
/// have every window in memory.
pub fn apply(source: &[u8], windows: &[Window]) -> anyhow::Result<Vec<u8>> {
    if windows.is_empty() {
        anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(
            "a textdelta window sequence must contain at least the terminating null window"
                .to_string()
        ));
    }
    let mut target = Vec::new();
    for window in windows {
        if window.is_null() {
            continue;
        }
        target.extend(apply_window(source, window)?);
    }
    Ok(target)
}
