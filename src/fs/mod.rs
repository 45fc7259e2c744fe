//! Contains the structs and traits that define a resource bridge.
//!
//! The locking engine never touches content. It only needs to know
//! whether a resource exists, whether it is a collection, and what its
//! current etag is. A bridge to a filesystem or an object store
//! implements [`ResourceBridge`] to provide exactly that.
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use crate::davpath::DavPath;
use crate::lock::Lock;

#[cfg(any(docsrs, feature = "memfs"))]
pub mod memfs;

/// Errors generated by a resource bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    Forbidden,
    GeneralFailure,
}

pub type FsResult<T> = Result<T, FsError>;

pub type FsFuture<'a, T> = Pin<Box<dyn Future<Output = FsResult<T>> + Send + 'a>>;

/// Metadata of a resource.
pub trait DavMetaData: Debug + Send + Sync {
    fn is_collection(&self) -> bool;

    /// Current entity tag, if the bridge can produce one.
    fn etag(&self) -> Option<String> {
        None
    }
}

/// The trait that defines a resource bridge.
pub trait ResourceBridge: Debug + Send + Sync {
    /// Metadata of the resource at this path, or `FsError::NotFound`.
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>>;
}

/// A resource as seen by the lock check: its name, its etag, and the
/// lock that is held on it.
///
/// Only a single lock is kept per resource.
#[derive(Debug, Clone)]
pub struct DavResource {
    name: String,
    is_collection: bool,
    etag: Option<String>,
    locks: Vec<Lock>,
}

impl DavResource {
    pub fn new(name: impl Into<String>, is_collection: bool, etag: Option<String>) -> DavResource {
        DavResource {
            name: name.into(),
            is_collection,
            etag,
            locks: Vec::new(),
        }
    }

    pub(crate) fn from_meta(path: &DavPath, meta: &dyn DavMetaData) -> DavResource {
        DavResource::new(path.with_prefix(), meta.is_collection(), meta.etag())
    }

    /// Canonical path, including prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// The lock held directly on this resource (depth 0).
    pub fn lock(&self) -> Option<&Lock> {
        self.locks.first()
    }

    pub fn set_locks(&mut self, locks: Vec<Lock>) {
        self.locks = locks;
    }
}
