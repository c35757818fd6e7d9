// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

use std::fmt;

/// A revision number. `0` is the empty initial revision; revisions only
/// ever increase. `Invalid` and `Head` are reserved sentinels that never
/// appear as the revision of a committed tree.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Revision {
    /// A committed revision number.
    Number(u64),
    /// No revision specified; caller-dependent meaning (often "working").
    Invalid,
    /// The latest committed revision at the time the request is resolved.
    Head,
}

impl Revision {
    pub const ZERO: Revision = Revision::Number(0);

    pub fn number(n: u64) -> Self {
        Revision::Number(n)
    }

    /// The raw number, if this is a concrete revision.
    pub fn as_number(self) -> Option<u64> {
        match self {
            Revision::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_valid(self) -> bool {
        !matches!(self, Revision::Invalid)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Number(n) => write!(f, "r{n}"),
            Revision::Invalid => write!(f, "INVALID"),
            Revision::Head => write!(f, "HEAD"),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<u64> for Revision {
    fn from(n: u64) -> Self {
        Revision::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_valid_concrete_revision() {
        assert_eq!(Revision::ZERO.as_number(), Some(0));
        assert!(Revision::ZERO.is_valid());
    }

    #[test]
    fn sentinels_have_no_number() {
        assert_eq!(Revision::Invalid.as_number(), None);
        assert_eq!(Revision::Head.as_number(), None);
        assert!(!Revision::Invalid.is_valid());
    }

    #[test]
    fn ordering_is_by_number_for_concrete_revisions() {
        assert!(Revision::Number(1) < Revision::Number(2));
    }
}
