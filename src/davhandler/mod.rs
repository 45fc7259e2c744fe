//
// This module contains the main entry point of the library,
// LockHandler.
//
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut};
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::conditional::{LockCheck, Outcome};
use crate::davheaders::{self, DavTimeout, Timeout};
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs::{DavResource, FsError, ResourceBridge};
use crate::ls::DavLockStore;
use crate::util::{dav_error_body, dav_method, DavMethod};
use crate::DavResult;

pub mod handle_lock;

/// Lock body size limit.
const MAX_LOCK_BODY: usize = 65536;

/// Lock timeout policy.
///
/// A requested timeout outside `[min, max]` gets `default` instead.
/// So does `Infinite`, unless `allow_infinite` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeouts {
    pub min: Duration,
    pub max: Duration,
    pub default: Duration,
    pub allow_infinite: bool,
}

impl Default for LockTimeouts {
    fn default() -> Self {
        LockTimeouts {
            min: Duration::from_secs(1),
            max: Duration::from_secs(7 * 24 * 3600),
            default: Duration::from_secs(3600),
            allow_infinite: false,
        }
    }
}

impl LockTimeouts {
    /// Timeout for a lock, given the `Timeout` header. `None` is infinite.
    pub fn resolve(&self, hdr: Option<&Timeout>) -> Option<Duration> {
        match hdr.and_then(|t| t.first()) {
            Some(DavTimeout::Infinite) if self.allow_infinite => None,
            Some(DavTimeout::Seconds(n)) => {
                let d = Duration::from_secs(n as u64);
                if d >= self.min && d <= self.max {
                    Some(d)
                } else {
                    Some(self.default)
                }
            }
            _ => Some(self.default),
        }
    }
}

/// Configuration of the handler.
#[derive(Clone)]
pub struct LockBuilder {
    /// Prefix to be stripped off when handling request.
    prefix: String,
    /// Resource bridge.
    fs: Arc<dyn ResourceBridge>,
    /// Lockstore backend.
    ls: Arc<dyn DavLockStore>,
    /// Set of allowed methods (Defaults to "all methods")
    allow: DavMethod,
    /// Principal is webdav speak for "user", used to give locks an owner.
    principal: Option<String>,
    /// Lock timeout policy.
    timeouts: LockTimeouts,
}

impl LockBuilder {
    /// Create a new configuration builder.
    pub fn new(fs: Arc<dyn ResourceBridge>, ls: Arc<dyn DavLockStore>) -> LockBuilder {
        Self {
            prefix: String::new(),
            fs,
            ls,
            allow: DavMethod::WEBDAV_RW,
            principal: None,
            timeouts: LockTimeouts::default(),
        }
    }

    /// Use the configuration that was built to generate a LockHandler.
    pub fn build(self) -> LockHandler {
        self.into()
    }

    /// Prefix to be stripped off before translating the rest of
    /// the request path to a resource path.
    pub fn strip_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.prefix = prefix.into();
        this
    }

    /// Which methods to allow (default is all methods).
    pub fn methods(self, allow: DavMethod) -> Self {
        let mut this = self;
        this.allow = allow;
        this
    }

    /// Set the name of the "webdav principal". This will be the owner of any created locks.
    pub fn principal(self, principal: impl Into<String>) -> Self {
        let mut this = self;
        this.principal = Some(principal.into());
        this
    }

    /// Lock timeout policy.
    pub fn timeouts(self, timeouts: LockTimeouts) -> Self {
        let mut this = self;
        this.timeouts = timeouts;
        this
    }
}

/// The lock handler struct.
///
/// `check` gates write requests. `handle` answers LOCK and UNLOCK.
#[derive(Clone)]
pub struct LockHandler {
    pub(crate) prefix: Arc<String>,
    pub(crate) fs: Arc<dyn ResourceBridge>,
    pub(crate) ls: Arc<dyn DavLockStore>,
    pub(crate) allow: DavMethod,
    pub(crate) principal: Option<Arc<String>>,
    pub(crate) timeouts: LockTimeouts,
}

impl From<LockBuilder> for LockHandler {
    fn from(cfg: LockBuilder) -> Self {
        Self {
            prefix: Arc::new(cfg.prefix),
            fs: cfg.fs,
            ls: cfg.ls,
            allow: cfg.allow,
            principal: cfg.principal.map(Arc::new),
            timeouts: cfg.timeouts,
        }
    }
}

/// Turn an error into a HTTP response.
pub fn error_response(err: &DavError) -> Response<Body> {
    let mut resp = Response::builder().status(err.statuscode());
    let body = match err.precondition() {
        Some(cond) => {
            resp = resp.header("content-type", "application/xml; charset=utf-8");
            dav_error_body(cond)
        }
        None => {
            resp = resp.header("content-length", "0");
            Body::empty()
        }
    };
    resp.body(body).unwrap_or_else(|_| {
        let mut r = Response::new(Body::empty());
        *r.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        r
    })
}

impl LockHandler {
    /// Return a configuration builder.
    pub fn builder(fs: Arc<dyn ResourceBridge>, ls: Arc<dyn DavLockStore>) -> LockBuilder {
        LockBuilder::new(fs, ls)
    }

    /// Run the lock check for a request.
    ///
    /// Read methods always proceed. For write methods the request
    /// path is checked; for MOVE the `Destination` as well, and for
    /// COPY only the `Destination`. On success, returns the lock token
    /// the client proved to hold, if any.
    pub async fn check(&self, req: &Request<()>) -> DavResult<Option<String>> {
        let method = dav_method(req.method())?;
        if !self.allow.contains(method) {
            debug!("method {} not allowed on request {}", req.method(), req.uri());
            return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
        }
        if !method.is_write() {
            return Ok(None);
        }
        let path = self.path(req)?;
        let if_header = davheaders::if_header(req.headers())?;
        let if_header = if_header.as_deref();
        let lock_token = req
            .headers()
            .get("lock-token")
            .and_then(|v| v.to_str().ok());

        match method {
            DavMethod::COPY => {
                let dest = self.destination(req)?;
                self.check_path(&dest, method, if_header, None, true).await
            }
            DavMethod::MOVE => {
                let dest = self.destination(req)?;
                let token = self.check_path(&path, method, if_header, None, false).await?;
                let dtoken = self.check_path(&dest, method, if_header, None, true).await?;
                Ok(token.or(dtoken))
            }
            _ => {
                self.check_path(&path, method, if_header, lock_token, false)
                    .await
            }
        }
    }

    /// Like `check`, but returns an `Outcome`.
    pub async fn outcome(&self, req: &Request<()>) -> Outcome {
        self.check(req).await.into()
    }

    /// Handle a LOCK or UNLOCK request.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        self.handle_inner(req).await
    }

    /// Handle a LOCK or UNLOCK request, overriding the principal.
    pub async fn handle_with<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
        principal: Option<String>,
    ) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        let mut this = self.clone();
        if let Some(principal) = principal {
            this.principal = Some(Arc::new(principal));
        }
        this.handle_inner(req).await
    }

    /// Drop the locks on a path and below, after it was deleted
    /// or moved away.
    pub async fn forget(&self, path: &DavPath) -> DavResult<()> {
        debug!("forgetting locks on {:?}", path);
        Ok(self.ls.delete(path).await?)
    }

    // helper.
    pub fn path(&self, req: &Request<()>) -> DavResult<DavPath> {
        DavPath::from_uri_and_prefix(req.uri(), &self.prefix)
    }

    // helper.
    fn destination(&self, req: &Request<()>) -> DavResult<DavPath> {
        let dest = req
            .headers()
            .typed_get::<davheaders::Destination>()
            .ok_or(DavError::Status(StatusCode::BAD_REQUEST))?;
        DavPath::from_url_and_prefix(&dest.0, &self.prefix)
    }

    // Load a resource and the lock held on it. A path that only has a
    // lock is a lock-null resource.
    pub(crate) async fn load(&self, path: &DavPath) -> DavResult<Option<DavResource>> {
        let lock = self.ls.get(path).await?.filter(|l| !l.is_expired());
        let mut res = match self.fs.metadata(path).await {
            Ok(meta) => DavResource::from_meta(path, &*meta),
            Err(FsError::NotFound) => match lock {
                Some(_) => DavResource::new(path.with_prefix(), path.is_collection(), None),
                None => return Ok(None),
            },
            Err(e) => return Err(e.into()),
        };
        res.set_locks(lock.into_iter().collect());
        Ok(Some(res))
    }

    // Load a resource and its parent.
    pub(crate) async fn load_pair(
        &self,
        path: &DavPath,
    ) -> DavResult<(Option<DavResource>, Option<DavResource>)> {
        let res = self.load(path).await?;
        let parent = match path.parent() {
            Some(p) => self.load(&p).await?,
            None => None,
        };
        Ok((res, parent))
    }

    // Lock check on one path. For a destination, the If header only
    // counts when there is a lock to prove.
    pub(crate) async fn check_path(
        &self,
        path: &DavPath,
        method: DavMethod,
        if_header: Option<&str>,
        lock_token: Option<&str>,
        destination: bool,
    ) -> DavResult<Option<String>> {
        let (res, parent) = self.load_pair(path).await?;
        let locked = [&res, &parent]
            .into_iter()
            .flatten()
            .any(|r| r.lock().is_some());
        let chk = LockCheck {
            resource: res.as_ref(),
            parent: parent.as_ref(),
            if_header: if destination && !locked { None } else { if_header },
            method,
            lock_token,
        };
        let token = chk.run()?;
        if let Some(token) = &token {
            self.recheck(path, token).await?;
        }
        Ok(token)
    }

    // The store may have changed while we were evaluating. Check that
    // the token still names a lock on the path or its parent.
    async fn recheck(&self, path: &DavPath, token: &str) -> DavResult<()> {
        let parent = path.parent();
        for p in std::iter::once(path).chain(parent.as_ref()) {
            if let Some(lock) = self.ls.get(p).await? {
                if lock.token == token && !lock.is_expired() {
                    return Ok(());
                }
            }
        }
        debug!("lock {} on {:?} went away", token, path);
        Err(DavError::StaleToken)
    }

    // internal dispatcher.
    async fn handle_inner<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result OK");
                resp
            }
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                error_response(&err)
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if !self.allow.contains(method) {
            debug!(
                "method {} not allowed on request {}",
                req.method(),
                req.uri()
            );
            return Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED));
        }

        // make sure the request path is valid.
        let path = self.path(&req)?;
        let body_data = read_body(body, MAX_LOCK_BODY).await?;

        debug!("== START REQUEST {:?} {}", method, path);

        match method {
            DavMethod::LOCK => self.handle_lock(&req, &body_data).await,
            DavMethod::UNLOCK => {
                if !body_data.is_empty() {
                    return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
                }
                self.handle_unlock(&req).await
            }
            _ => Err(DavError::Status(StatusCode::METHOD_NOT_ALLOWED)),
        }
    }
}

// Collect the request body, refusing anything over `max_size` bytes.
async fn read_body<ReqBody, ReqData, ReqError>(
    body: ReqBody,
    max_size: usize,
) -> DavResult<Vec<u8>>
where
    ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    ReqData: Buf + Send + 'static,
    ReqError: StdError + Send + Sync + 'static,
{
    let mut body = Box::pin(body);
    let mut data = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| {
            debug!("reading request body: {e}");
            DavError::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()))
        })?;
        if data.len() + chunk.remaining() > max_size {
            return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
        }
        data.put(chunk);
    }
    Ok(data)
}
