//! The lock entity.
//!
//! Only write locks exist in WebDAV, so there is no lock type field.
use std::time::{Duration, SystemTime};

use uuid::Uuid;
use xmltree::Element;

use crate::davpath::DavPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Exclusive,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDepth {
    Zero,
    Infinity,
}

/// An active WebDAV lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Lock {
    /// Token, `urn:uuid:...`.
    pub token: String,
    pub scope: LockScope,
    pub depth: LockDepth,
    /// Opaque owner element from the `lockinfo` body.
    pub owner: Option<Element>,
    /// Authenticated user that created the lock.
    pub principal: Option<String>,
    /// Relative timeout. `None` is infinite.
    pub timeout: Option<Duration>,
    /// When the lock turns stale. `None` is never.
    pub expires: Option<SystemTime>,
    /// The resource the lock was created on.
    pub root: DavPath,
}

impl Lock {
    /// Create a new lock with a fresh token.
    pub fn new(
        root: DavPath,
        scope: LockScope,
        depth: LockDepth,
        owner: Option<Element>,
        principal: Option<String>,
        timeout: Option<Duration>,
    ) -> Lock {
        Lock {
            token: Uuid::new_v4().urn().to_string(),
            scope,
            depth,
            owner,
            principal,
            timeout,
            expires: timeout.map(|t| SystemTime::now() + t),
            root,
        }
    }

    /// Set a new timeout, and move the expiry to now + timeout.
    pub fn refresh(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
        self.expires = timeout.map(|t| SystemTime::now() + t);
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        matches!(self.expires, Some(e) if now > e)
    }

    /// Time left before expiry. `None` for infinite locks.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires
            .map(|e| e.duration_since(SystemTime::now()).unwrap_or_default())
    }

    /// Exclusive locks conflict with everything, shared locks only
    /// with exclusive ones.
    pub fn conflicts_with(&self, other: &Lock) -> bool {
        self.scope == LockScope::Exclusive || other.scope == LockScope::Exclusive
    }
}
