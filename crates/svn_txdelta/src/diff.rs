// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use crate::window::{Op, Window};

/// Produces a window sequence (including the trailing null window) that
/// turns `source` into `target` when applied (spec §4.3.1). This is a
/// greedy common-prefix/common-suffix diff, not the original's
/// `xdelta`-style sliding-window matcher: the contract only requires that
/// `apply(source, diff_bytes(source, target)) == target`, not a minimal
/// encoding, so one window covers the whole file.
pub fn diff_bytes(source: &[u8], target: &[u8]) -> Vec<Window> {
    if source == target {
        return vec![
            Window {
                source_offset: 0,
                source_len: source.len() as u64,
                target_len: target.len() as u64,
                ops: if target.is_empty() {
                    vec![]
                } else {
                    vec![Op::CopySource {
                        offset: 0,
                        len: target.len() as u64,
                    }]
                },
                new_data: vec![],
            },
            Window::null(),
        ];
    }

    let max_common = source.len().min(target.len());
    let prefix = source
        .iter()
        .zip(target.iter())
        .take(max_common)
        .take_while(|(a, b)| a == b)
        .count();

    let remaining = max_common - prefix;
    let suffix = source[prefix..]
        .iter()
        .rev()
        .zip(target[prefix..].iter().rev())
        .take(remaining)
        .take_while(|(a, b)| a == b)
        .count();

    let source_mid_start = prefix;
    let source_mid_end = source.len() - suffix;
    let target_mid_start = prefix;
    let target_mid_end = target.len() - suffix;

    let mut ops = Vec::new();
    let mut new_data = Vec::new();
    let mut target_offset = 0u64;

    if prefix > 0 {
        ops.push(Op::CopySource {
            offset: 0,
            len: prefix as u64,
        });
        target_offset += prefix as u64;
    }
    if target_mid_end > target_mid_start {
        let inserted = &target[target_mid_start..target_mid_end];
        ops.push(Op::Insert {
            offset: new_data.len() as u64,
            len: inserted.len() as u64,
        });
        new_data.extend_from_slice(inserted);
        target_offset += inserted.len() as u64;
    }
    if suffix > 0 {
        ops.push(Op::CopySource {
            offset: source_mid_end as u64,
            len: suffix as u64,
        });
        target_offset += suffix as u64;
    }
    let _ = source_mid_start;

    let window = Window {
        source_offset: 0,
        source_len: source.len() as u64,
        target_len: target_offset,
        ops,
        new_data,
    };
    vec![window, Window::null()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use quickcheck_macros::quickcheck;

    #[test]
    fn identical_bytes_round_trip() {
        let windows = diff_bytes(b"same", b"same");
        assert_eq!(apply(b"same", &windows).unwrap(), b"same");
    }

    #[test]
    fn pure_insertion_round_trips() {
        let windows = diff_bytes(b"", b"new content");
        assert_eq!(apply(b"", &windows).unwrap(), b"new content");
    }

    #[test]
    fn pure_deletion_round_trips() {
        let windows = diff_bytes(b"old content", b"");
        assert_eq!(apply(b"old content", &windows).unwrap(), b"");
    }

    #[test]
    fn middle_edit_round_trips() {
        let windows = diff_bytes(b"hello world", b"hello there world");
        assert_eq!(
            apply(b"hello world", &windows).unwrap(),
            b"hello there world"
        );
    }

    #[quickcheck]
    fn diff_always_round_trips(source: Vec<u8>, target: Vec<u8>) -> bool {
        let windows = diff_bytes(&source, &target);
        apply(&source, &windows).unwrap() == target
    }
}
