// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The advisory sync lock (spec §4.8.1 "at most one sync runs against a
//! destination at a time"): an opaque token written to the `svn:sync-lock`
//! revision property. Acquisition writes a fresh token and re-reads it
//! back; a concurrent racer that wrote afterwards will have overwritten
//! it, so the re-read simply won't match and this side retries. Last
//! write wins, and that's fine — the re-read is what makes the race
//! detectable rather than silently granting both sides the lock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use svn_error::SvnErrorKind;
use svn_repo::RepoAccessSession;
use svn_types::Revision;

use crate::bookkeeping;

const MAX_ATTEMPTS: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A held sync lock. Dropping it without calling `release` leaves the
/// token in place; a future `acquire` against the same destination will
/// simply overwrite it; the stale token was only ever advisory.
pub struct SyncLock {
    token: String,
}

fn new_token(hostname: &str) -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    format!("{hostname}:{}:{millis}", std::process::id())
}

/// Attempts to acquire the sync lock on `dest`, retrying up to
/// `MAX_ATTEMPTS` times with a one-second delay between attempts (spec
/// §4.8.1 "bounded retry"). `hostname` only identifies the holder for
/// diagnostic purposes; it plays no part in who wins a race.
pub async fn acquire(dest: &dyn RepoAccessSession, hostname: &str) -> anyhow::Result<SyncLock> {
    for attempt in 0..MAX_ATTEMPTS {
        let token = new_token(hostname);
        dest.rev_prop_change(Revision::ZERO, bookkeeping::LOCK, Some(token.clone().into_bytes())).await?;
        let observed = dest.rev_prop_get(Revision::ZERO, bookkeeping::LOCK).await?;
        if observed.as_deref() == Some(token.as_bytes()) {
            return Ok(SyncLock { token });
        }
        if attempt + 1 < MAX_ATTEMPTS {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
    anyhow::bail!(SvnErrorKind::UnsupportedFeature(format!(
        "could not acquire the sync lock on this destination after {MAX_ATTEMPTS} attempts"
    )))
}

impl SyncLock {
    /// Clears the lock, but only if it still holds our token — a lock
    /// some other racer has since taken over is left alone.
    pub async fn release(self, dest: &dyn RepoAccessSession) -> anyhow::Result<()> {
        let observed = dest.rev_prop_get(Revision::ZERO, bookkeeping::LOCK).await?;
        if observed.as_deref() == Some(self.token.as_bytes()) {
            dest.rev_prop_change(Revision::ZERO, bookkeeping::LOCK, None).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use svn_repo::{InMemorySession, Repository};

    #[tokio::test]
    async fn acquiring_an_unheld_lock_succeeds_on_the_first_attempt() {
        let repo = Arc::new(Repository::new("uuid", "file:///repo"));
        let session = InMemorySession::new(repo);
        let lock = acquire(&session, "host-a").await.unwrap();
        assert!(lock.token().starts_with("host-a:"));
    }

    #[tokio::test]
    async fn releasing_clears_the_token_we_hold() {
        let repo = Arc::new(Repository::new("uuid", "file:///repo"));
        let session = InMemorySession::new(repo);
        let lock = acquire(&session, "host-a").await.unwrap();
        lock.release(&session).await.unwrap();
        assert_eq!(session.rev_prop_get(Revision::ZERO, bookkeeping::LOCK).await.unwrap(), None);
    }

    #[tokio::test]
    async fn releasing_a_lock_someone_else_already_overwrote_is_a_no_op() {
        let repo = Arc::new(Repository::new("uuid", "file:///repo"));
        let session = InMemorySession::new(repo);
        let lock = acquire(&session, "host-a").await.unwrap();

        // Someone else's acquire overwrites our token.
        let other = acquire(&session, "host-b").await.unwrap();
        lock.release(&session).await.unwrap();

        assert_eq!(
            session.rev_prop_get(Revision::ZERO, bookkeeping::LOCK).await.unwrap(),
            Some(other.token().as_bytes().to_vec())
        );
    }
}
