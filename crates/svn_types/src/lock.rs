// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! A semantic lock on a single versioned file, distinct from the
//! working-copy administrative lock in `svn_wc` (spec §3 "Lock").

#[derive(Debug, Clone)]
pub struct Lock {
    pub token: String,
    pub owner: String,
    pub comment: Option<String>,
    pub created: i64,
    pub expires: Option<i64>,
}

impl Lock {
    pub fn new(token: impl Into<String>, owner: impl Into<String>, created: i64) -> Self {
        Lock {
            token: token.into(),
            owner: owner.into(),
            comment: None,
            created,
            expires: None,
        }
    }

    /// Only the token holder may modify or release a lock (spec §3).
    pub fn may_release(&self, candidate_token: &str) -> bool {
        self.token == candidate_token
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.map(|exp| now >= exp).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_token_holder_may_release() {
        let lock = Lock::new("tok-1", "alice", 1000);
        assert!(lock.may_release("tok-1"));
        assert!(!lock.may_release("tok-2"));
    }

    #[test]
    fn expiration() {
        let mut lock = Lock::new("tok-1", "alice", 1000);
        assert!(!lock.is_expired(2000));
        lock.expires = Some(1500);
        assert!(lock.is_expired(1500));
        assert!(!lock.is_expired(1499));
    }
}
