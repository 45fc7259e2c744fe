//! Contains the structs and traits that define a `lockstore` backend.
//!
//! A lockstore is a key-value service: one [`Lock`] per resource path.
//! It is the only shared mutable state the locking engine touches, so
//! it must provide [`compare_and_set`](DavLockStore::compare_and_set)
//! atomically. Reading a lock and writing it back later is racy;
//! every write the engine does goes through `compare_and_set`.
//!
//! Expired locks must not be returned by `get`.
use std::error::Error;
use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;

use http::StatusCode;

use crate::davpath::DavPath;
use crate::lock::Lock;

pub mod memls;

pub type LsFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type LsResult<T> = Result<T, LsError>;

/// Errors returned by a lockstore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LsError {
    /// `compare_and_set` or `remove` found a different lock in the slot.
    Conflict,
    /// There is no lock at this path.
    NotFound,
    /// Backend failure, with an optional status to report.
    Failure {
        status: Option<StatusCode>,
        reason: String,
    },
}

impl LsError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            LsError::Conflict => StatusCode::LOCKED,
            LsError::NotFound => StatusCode::CONFLICT,
            LsError::Failure { status, .. } => status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl Error for LsError {}

impl fmt::Display for LsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LsError::Conflict => write!(f, "lock slot changed concurrently"),
            LsError::NotFound => write!(f, "no such lock"),
            LsError::Failure { reason, .. } => write!(f, "{reason}"),
        }
    }
}

/// The trait that defines a lockstore.
pub trait DavLockStore: Debug + Send + Sync {
    /// The live lock at this path, if any.
    fn get<'a>(&'a self, path: &'a DavPath) -> LsFuture<'a, LsResult<Option<Lock>>>;

    /// Store a lock unconditionally.
    fn set<'a>(&'a self, path: &'a DavPath, lock: Lock) -> LsFuture<'a, LsResult<()>>;

    /// Store `lock` only if the slot currently holds a lock with token
    /// `expected`, or, if `expected` is `None`, no live lock at all.
    /// Otherwise fails with `LsError::Conflict`.
    fn compare_and_set<'a>(
        &'a self,
        path: &'a DavPath,
        expected: Option<&'a str>,
        lock: Lock,
    ) -> LsFuture<'a, LsResult<()>>;

    /// Remove the lock at this path if it has this token.
    fn remove<'a>(&'a self, path: &'a DavPath, token: &'a str) -> LsFuture<'a, LsResult<()>>;

    /// Remove the lock at this path and all locks below it
    /// (after MOVE or DELETE).
    fn delete<'a>(&'a self, path: &'a DavPath) -> LsFuture<'a, LsResult<()>>;

    /// The live locks strictly below this path.
    fn descendants<'a>(&'a self, path: &'a DavPath) -> LsFuture<'a, LsResult<Vec<Lock>>>;
}
