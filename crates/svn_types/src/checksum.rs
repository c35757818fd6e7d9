// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Content checksums for pristine bases and text-delta verification
//! (spec §3.1). The original bundles its own MD5 and (later) SHA1
//! implementations; we use the published `md-5` and `sha1` crates, which
//! compute the identical digests.

use std::fmt;

use md5::{Digest as _, Md5};
use sha1::Sha1;

#[derive(Clone, Eq, PartialEq, Hash)]
pub enum Checksum {
    Md5([u8; 16]),
    Sha1([u8; 20]),
}

impl Checksum {
    pub fn md5_of(data: &[u8]) -> Self {
        let digest = Md5::digest(data);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest);
        Checksum::Md5(bytes)
    }

    pub fn sha1_of(data: &[u8]) -> Self {
        let digest = Sha1::digest(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Checksum::Sha1(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Checksum::Md5(b) => b,
            Checksum::Sha1(b) => b,
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alg = match self {
            Checksum::Md5(_) => "md5",
            Checksum::Sha1(_) => "sha1",
        };
        write!(f, "{alg}:{}", self.to_hex())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Verifies `actual` against `expected`, raising `SvnErrorKind::BadChecksum`
/// on mismatch (spec §8 invariant 3, §7 "checksum mismatch is fatal").
pub fn verify(path: &str, expected: &Checksum, actual: &Checksum) -> anyhow::Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(svn_error::SvnErrorKind::BadChecksum {
            path: path.to_string(),
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_is_deterministic_and_content_addressed() {
        let a = Checksum::md5_of(b"hello");
        let b = Checksum::md5_of(b"hello");
        let c = Checksum::md5_of(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sha1_and_md5_of_the_same_bytes_are_not_equal() {
        let a = Checksum::md5_of(b"hello");
        let b = Checksum::sha1_of(b"hello");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_raises_bad_checksum_on_mismatch() {
        let expected = Checksum::md5_of(b"hello");
        let actual = Checksum::md5_of(b"goodbye");
        let err = verify("trunk/x", &expected, &actual).unwrap_err();
        match svn_error::kind_of(&err) {
            Some(svn_error::SvnErrorKind::BadChecksum { path, .. }) => assert_eq!(path, "trunk/x"),
            _ => panic!("expected BadChecksum"),
        }
    }
}
