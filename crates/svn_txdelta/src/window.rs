// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The text-delta window format (spec §4.3).

/// One operation within a window. Offsets in `CopySource` are relative to
/// the window's declared source view (`Window::source_offset`); offsets in
/// `CopyTarget` are relative to the bytes this window has produced so far
/// (never bytes from an earlier window); offsets in `Insert` index the
/// window's own `new_data` buffer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Op {
    CopySource { offset: u64, len: u64 },
    CopyTarget { offset: u64, len: u64 },
    Insert { offset: u64, len: u64 },
}

impl Op {
    pub fn target_len(&self) -> u64 {
        match self {
            Op::CopySource { len, .. } | Op::CopyTarget { len, .. } | Op::Insert { len, .. } => *len,
        }
    }
}

/// One chunk of a binary diff (spec §3 "Text-delta window").
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Window {
    pub source_offset: u64,
    pub source_len: u64,
    pub target_len: u64,
    pub ops: Vec<Op>,
    pub new_data: Vec<u8>,
}

impl Window {
    /// The terminating "null window": zero target length, no ops. Every
    /// textdelta application ends with exactly one of these (spec §4.1,
    /// §4.3 "Empty delta").
    pub fn null() -> Self {
        Window::default()
    }

    pub fn is_null(&self) -> bool {
        self.target_len == 0 && self.ops.is_empty()
    }

    /// A window that inserts `data` verbatim with no source view.
    pub fn insert(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Window {
            source_offset: 0,
            source_len: 0,
            target_len: len,
            ops: vec![Op::Insert { offset: 0, len }],
            new_data: data,
        }
    }

    /// Validates the structural invariant from spec §4.3: the sum of op
    /// target lengths equals the declared target length, and every
    /// `CopyTarget` op only references bytes already produced earlier in
    /// *this* window.
    pub fn validate(&self) -> anyhow::Result<()> {
        let sum: u64 = self.ops.iter().map(Op::target_len).sum();
        if sum != self.target_len {
            anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(format!(
                "window target length {} does not match sum of op lengths {}",
                self.target_len, sum
            )));
        }
        let mut produced: u64 = 0;
        for op in &self.ops {
            if let Op::CopyTarget { offset, len } = op {
                if offset + len > produced {
                    anyhow::bail!(svn_error::SvnErrorKind::ProtocolViolation(format!(
                        "CopyTarget references {}..{} but only {} bytes produced so far",
                        offset,
                        offset + len,
                        produced
                    )));
                }
            }
            produced += op.target_len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_window_is_empty_and_valid() {
        let w = Window::null();
        assert!(w.is_null());
        assert!(w.validate().is_ok());
    }

    #[test]
    fn insert_window_is_not_null() {
        let w = Window::insert(b"hi".to_vec());
        assert!(!w.is_null());
        assert!(w.validate().is_ok());
    }

    #[test]
    fn mismatched_target_len_fails_validation() {
        let mut w = Window::insert(b"hi".to_vec());
        w.target_len = 5;
        assert!(w.validate().is_err());
    }

    #[test]
    fn copy_target_referencing_unproduced_bytes_fails() {
        let w = Window {
            source_offset: 0,
            source_len: 0,
            target_len: 3,
            ops: vec![Op::CopyTarget { offset: 0, len: 3 }],
            new_data: vec![],
        };
        assert!(w.validate().is_err());
    }
}
