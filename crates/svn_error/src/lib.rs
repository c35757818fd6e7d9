// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Shared error kinds and cooperative cancellation for the Subversion core
//! engine crates (`svn_delta`, `svn_wc`, `svn_repo`, `svn_sync`, ...).
//!
//! Every crate in the workspace returns `anyhow::Result<T>` at its public
//! boundary and raises one of the kinds here via `SvnErrorKind::into()`, the
//! same way `ErrorKind` is threaded through `apiserver`: a typed enum for
//! matching, carried across API seams by `anyhow::Error` for context.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Stable error kinds from the core engine's exit/error code table (spec §6).
#[derive(Debug, Error)]
pub enum SvnErrorKind {
    #[error("'{0}' is out of date")]
    OutOfDate(String),

    #[error("conflict at '{0}'")]
    Conflict(String),

    #[error("'{0}' is not under version control")]
    UnversionedPath(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error("'{0}' has inconsistent line endings")]
    InconsistentEol(String),

    #[error("unknown eol-style '{0}'")]
    UnknownEolStyle(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("bad checksum for '{path}': expected {expected}, got {actual}")]
    BadChecksum {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("partial replay is not supported by this source")]
    PartialReplayUnsupported,

    #[error("could not parse arguments: {0}")]
    ArgParseError(String),

    #[error("transaction is out of date: {0}")]
    TxnOutOfDate(String),

    #[error("destination is already initialized")]
    AlreadyInitialized,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("sync restart invariant violated: {0}")]
    SyncRestartInvariant(String),
}

impl SvnErrorKind {
    /// True for errors that are expected outcomes of normal operation
    /// (cancellation, a concurrent-update race) rather than bugs.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            SvnErrorKind::Cancelled
                | SvnErrorKind::OutOfDate(_)
                | SvnErrorKind::Conflict(_)
                | SvnErrorKind::TxnOutOfDate(_)
        )
    }
}

pub type Result<T> = anyhow::Result<T>;

/// Returns `true` if `err`'s root cause (or the error itself) downcasts to
/// `SvnErrorKind::Cancelled`. Mirrors `apiserver/src/errors.rs`'s use of
/// `err_downcast_ref!` to recover a typed kind from an opaque `anyhow::Error`.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SvnErrorKind>()
        .map(|k| matches!(k, SvnErrorKind::Cancelled))
        .unwrap_or(false)
}

pub fn kind_of(err: &anyhow::Error) -> Option<&SvnErrorKind> {
    err.downcast_ref::<SvnErrorKind>()
}

/// Cooperative cancellation flag (spec §5, §9 "Global mutable state").
///
/// A single `Arc<AtomicBool>` checked at every suspension point named in
/// §5: between editor calls, before each replay revision, before each
/// multi-target command target, and during long window loops. Flipping the
/// flag from a signal handler is the host's responsibility; this type only
/// carries the flag and the check.
#[derive(Clone)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Cancellation {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A cancellation that never fires; used where a caller has no
    /// cancellation policy of their own.
    pub fn never() -> Self {
        Self::new()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(SvnErrorKind::Cancelled)` if cancellation was requested.
    /// Called at every suspension point so the error is raised as soon as
    /// the signal is observed rather than at some arbitrary later check.
    pub fn check(&self) -> anyhow::Result<()> {
        if self.is_cancelled() {
            Err(SvnErrorKind::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_round_trips() {
        let c = Cancellation::new();
        assert!(c.check().is_ok());
        c.cancel();
        assert!(c.check().is_err());
        assert!(is_cancelled(&c.check().unwrap_err()));
    }

    #[test]
    fn clone_shares_the_flag() {
        let c = Cancellation::new();
        let c2 = c.clone();
        c2.cancel();
        assert!(c.is_cancelled());
    }

    #[test]
    fn kind_of_recovers_typed_kind() {
        let err: anyhow::Error = SvnErrorKind::OutOfDate("trunk/x".to_string()).into();
        match kind_of(&err) {
            Some(SvnErrorKind::OutOfDate(path)) => assert_eq!(path, "trunk/x"),
            _ => panic!("expected OutOfDate"),
        }
    }
}
