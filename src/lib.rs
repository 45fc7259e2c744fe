//! ## WebDAV locking engine
//!
//! [`Webdav`] (RFC4918) lets clients take write locks on resources. A
//! locked resource may only be modified by a request that proves it
//! holds the lock, which it does through the `If` request header.
//!
//! This library implements that part of the protocol:
//!
//! - a parser for the `If` header, and an evaluator that matches the
//!   resulting rules against resources, their ETags and their locks.
//! - the lock check ([`check_lock`]), that decides whether a request may
//!   touch a resource given the locks on it and on its parent.
//! - a [handler][LockHandler] that answers LOCK and UNLOCK, and that gates
//!   the other write methods (PUT, DELETE, MOVE, ...) of your server.
//!
//! It does not serve files. You supply a [`ResourceBridge`] that tells
//! the handler whether a resource exists, whether it is a collection and
//! what its ETag is. Locks live in a [`DavLockStore`].
//!
//! ## Backends.
//!
//! Included are:
//!
//! - [`MemFs`]: in-memory resource tree, for tests and demos.
//! - [`MemLs`]: ephemeral in-memory lockstore.
//!
//! ## Example.
//!
//! Example server using [hyper] that answers LOCK and UNLOCK, and refuses
//! writes to locked resources.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use dav_locks::{error_response, LockHandler, MemFs, MemLs};
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr = ([127, 0, 0, 1], 4918).into();
//!
//!     let handler = LockHandler::builder(MemFs::new(), MemLs::new()).build();
//!
//!     let make_service = hyper::service::make_service_fn(move |_| {
//!         let handler = handler.clone();
//!         async move {
//!             let func = move |req: hyper::Request<hyper::Body>| {
//!                 let handler = handler.clone();
//!                 async move {
//!                     let resp = match req.method().as_str() {
//!                         "LOCK" | "UNLOCK" => handler.handle(req).await,
//!                         _ => {
//!                             let (parts, _body) = req.into_parts();
//!                             let req = hyper::Request::from_parts(parts, ());
//!                             match handler.check(&req).await {
//!                                 Ok(_) => hyper::Response::new(dav_locks::body::Body::empty()),
//!                                 Err(e) => error_response(&e),
//!                             }
//!                         }
//!                     };
//!                     Ok::<_, Infallible>(resp)
//!                 }
//!             };
//!             Ok::<_, Infallible>(hyper::service::service_fn(func))
//!         }
//!     });
//!
//!     println!("Serving on {}", addr);
//!     let _ = hyper::Server::bind(&addr)
//!         .serve(make_service)
//!         .await
//!         .map_err(|e| eprintln!("server error: {}", e));
//! }
//! ```
//!
//! [`Webdav`]: https://tools.ietf.org/html/rfc4918
//! [hyper]: https://hyper.rs/

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod conditional;
mod davhandler;
mod errors;
mod util;
mod xmltree_ext;

pub mod body;
pub mod davheaders;
pub mod davpath;
pub mod fs;
pub mod ifheader;
pub mod lock;
pub mod ls;

pub use crate::conditional::{check_lock, LockCheck, Outcome};
pub use crate::davhandler::{error_response, LockBuilder, LockHandler, LockTimeouts};
pub use crate::davpath::DavPath;
pub use crate::errors::{DavError, DavResult};
pub use crate::fs::{DavMetaData, DavResource, FsError, ResourceBridge};
pub use crate::lock::{Lock, LockDepth, LockScope};
pub use crate::ls::{DavLockStore, LsError};
pub use crate::util::DavMethod;

#[cfg(any(docsrs, feature = "memfs"))]
#[cfg_attr(docsrs, doc(cfg(feature = "memfs")))]
pub use crate::fs::memfs::MemFs;
pub use crate::ls::memls::MemLs;
