use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use xmltree::Element;

use crate::body::Body;
use crate::conditional::LockCheck;
use crate::davheaders::{self, Depth, LockToken, Timeout};
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::fs::{DavResource, FsError};
use crate::lock::{Lock, LockDepth, LockScope};
use crate::ls::LsError;
use crate::util::DavMethod;
use crate::xmltree_ext::ElementExt;
use crate::DavResult;

impl crate::LockHandler {
    pub(crate) async fn handle_lock(
        &self,
        req: &Request<()>,
        xmldata: &[u8],
    ) -> DavResult<Response<Body>> {
        let path = self.path(req)?;
        let (res, parent) = self.load_pair(&path).await?;
        let if_header = davheaders::if_header(req.headers())?;
        if xmldata.is_empty() && if_header.is_none() {
            debug!("lock refresh without If header");
            return Err(StatusCode::BAD_REQUEST.into());
        }

        let token = LockCheck {
            resource: res.as_ref(),
            parent: parent.as_ref(),
            if_header: if_header.as_deref(),
            method: DavMethod::LOCK,
            lock_token: None,
        }
        .run()?;
        if let Some(token) = &token {
            self.recheck(&path, token).await?;
        }

        let timeout = self
            .timeouts
            .resolve(req.headers().typed_get::<Timeout>().as_ref());

        // no body: refresh.
        if xmldata.is_empty() {
            let token = token.ok_or(DavError::PreconditionFailed)?;
            let mut lock = [&res, &parent]
                .into_iter()
                .flatten()
                .filter_map(|r| r.lock())
                .find(|l| l.token == token)
                .cloned()
                .ok_or(DavError::PreconditionFailed)?;
            lock.refresh(timeout);
            let root = lock.root.clone();
            self.ls
                .compare_and_set(&root, Some(token.as_str()), lock.clone())
                .await
                .map_err(|e| match e {
                    LsError::Conflict => DavError::PreconditionFailed,
                    e => DavError::Store(e),
                })?;
            debug!("refreshed lock {} on {:?}", lock.token, root);
            return lock_response(&lock, StatusCode::OK);
        }

        // new lock.
        let (scope, owner) = parse_lockinfo(xmldata)?;
        let depth = match req.headers().typed_try_get::<Depth>() {
            Ok(None) | Ok(Some(Depth::Infinity)) => LockDepth::Infinity,
            Ok(Some(Depth::Zero)) => LockDepth::Zero,
            Ok(Some(Depth::One)) | Err(_) => return Err(StatusCode::BAD_REQUEST.into()),
        };
        if let Some(held) = res.as_ref().and_then(DavResource::lock) {
            debug!("lock on {:?}: already locked by {}", path, held.token);
            return Err(DavError::Locked);
        }
        if res.is_none() && !self.parent_is_collection(&path).await? {
            debug!("lock on {:?}: no parent collection", path);
            return Err(StatusCode::CONFLICT.into());
        }

        let lock = Lock::new(
            path.clone(),
            scope,
            depth,
            owner,
            self.principal.as_ref().map(|p| p.to_string()),
            timeout,
        );
        self.check_conflicts(&lock, parent.as_ref()).await?;
        self.ls
            .compare_and_set(&path, None, lock.clone())
            .await
            .map_err(|e| match e {
                LsError::Conflict => DavError::Locked,
                e => DavError::Store(e),
            })?;
        debug!("created lock {} on {:?}", lock.token, path);

        let status = if res.is_some() {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        let mut resp = lock_response(&lock, status)?;
        resp.headers_mut()
            .typed_insert(LockToken(lock.token.clone()));
        Ok(resp)
    }

    pub(crate) async fn handle_unlock(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req)?;
        let (res, parent) = self.load_pair(&path).await?;
        let if_header = davheaders::if_header(req.headers())?;
        let raw_token = req
            .headers()
            .get("lock-token")
            .and_then(|v| v.to_str().ok());

        LockCheck {
            resource: res.as_ref(),
            parent: parent.as_ref(),
            if_header: if_header.as_deref(),
            method: DavMethod::UNLOCK,
            lock_token: raw_token,
        }
        .run()?;

        let token = match req.headers().typed_try_get::<LockToken>() {
            Ok(Some(t)) => t.0,
            Ok(None) => return Err(DavError::MissingLockToken),
            Err(_) => return Err(DavError::MalformedLockToken),
        };
        let res = res.ok_or(DavError::ResourceAbsent)?;
        if res.lock().map(|l| l.token != token).unwrap_or(true) {
            debug!("unlock {:?}: token {} not held", path, token);
            return Err(DavError::TokenMismatch);
        }
        self.ls.remove(&path, &token).await.map_err(|e| match e {
            LsError::Conflict | LsError::NotFound => DavError::TokenMismatch,
            e => DavError::Store(e),
        })?;
        debug!("removed lock {} from {:?}", token, path);

        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = StatusCode::NO_CONTENT;
        Ok(resp)
    }

    // A lock-null resource needs a real parent collection.
    async fn parent_is_collection(&self, path: &DavPath) -> DavResult<bool> {
        let parent = match path.parent() {
            Some(p) => p,
            None => return Ok(false),
        };
        match self.fs.metadata(&parent).await {
            Ok(meta) => Ok(meta.is_collection()),
            Err(FsError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // An exclusive lock shares its scope with nobody: not with a
    // depth-infinity lock on the parent, and not with locks below it.
    async fn check_conflicts(
        &self,
        lock: &Lock,
        parent: Option<&DavResource>,
    ) -> DavResult<()> {
        let above = parent
            .and_then(DavResource::lock)
            .filter(|l| l.depth == LockDepth::Infinity && !l.is_expired());
        if let Some(other) = above {
            if other.conflicts_with(lock) {
                debug!(
                    "lock on {:?}: conflicts with {} on parent",
                    lock.root, other.token
                );
                return Err(DavError::Locked);
            }
        }
        if lock.depth == LockDepth::Infinity {
            let below = self.ls.descendants(&lock.root).await?;
            if let Some(other) = below.iter().find(|l| l.conflicts_with(lock)) {
                debug!(
                    "lock on {:?}: conflicts with {} on {:?}",
                    lock.root, other.token, other.root
                );
                return Err(DavError::Locked);
            }
        }
        Ok(())
    }
}

// Parse a DAV:lockinfo body into scope and owner.
fn parse_lockinfo(xmldata: &[u8]) -> DavResult<(LockScope, Option<Element>)> {
    let tree = Element::parse2(xmldata)?;
    if tree.name != "lockinfo" {
        return Err(DavError::XmlParseError);
    }

    let mut scope = None;
    let mut locktype = false;
    let mut owner = None;
    for elem in tree.child_elems_iter() {
        match elem.name.as_str() {
            "lockscope" => {
                scope = match elem.child_elems_iter().next().map(|e| e.name.as_str()) {
                    Some("exclusive") => Some(LockScope::Exclusive),
                    Some("shared") => Some(LockScope::Shared),
                    _ => return Err(DavError::XmlParseError),
                };
            }
            "locktype" => {
                locktype = elem.child_elems_iter().any(|e| e.name == "write");
                if !locktype {
                    return Err(DavError::XmlParseError);
                }
            }
            "owner" => {
                let mut o = elem.clone();
                o.prefix = Some("D".to_owned());
                o.namespace = None;
                o.namespaces = None;
                owner = Some(o);
            }
            _ => {}
        }
    }
    match (scope, locktype) {
        (Some(scope), true) => Ok((scope, owner)),
        _ => Err(DavError::XmlParseError),
    }
}

fn href(path: &DavPath) -> Element {
    Element::new2("D:href").text(path.as_url_string_with_prefix())
}

// <D:activelock> for a lock.
fn build_activelock(lock: &Lock) -> Element {
    let mut actlock = Element::new2("D:activelock");

    let mut elem = Element::new2("D:lockscope");
    elem.push_element(match lock.scope {
        LockScope::Exclusive => Element::new2("D:exclusive"),
        LockScope::Shared => Element::new2("D:shared"),
    });
    actlock.push_element(elem);

    let mut elem = Element::new2("D:locktype");
    elem.push_element(Element::new2("D:write"));
    actlock.push_element(elem);

    actlock.push_element(Element::new2("D:depth").text(match lock.depth {
        LockDepth::Zero => "0",
        LockDepth::Infinity => "infinity",
    }));

    actlock.push_element(Element::new2("D:timeout").text(match lock.timeout {
        None => "Infinite".to_string(),
        Some(d) => format!("Second-{}", d.as_secs()),
    }));

    let mut locktokenelem = Element::new2("D:locktoken");
    locktokenelem.push_element(Element::new2("D:href").text(lock.token.clone()));
    actlock.push_element(locktokenelem);

    let mut lockroot = Element::new2("D:lockroot");
    lockroot.push_element(href(&lock.root));
    actlock.push_element(lockroot);

    if let Some(ref o) = lock.owner {
        actlock.push_element(o.clone());
    }

    actlock
}

fn lock_response(lock: &Lock, status: StatusCode) -> DavResult<Response<Body>> {
    let mut prop = Element::new2("D:prop").ns("D", "DAV:");
    let mut ldis = Element::new2("D:lockdiscovery");
    ldis.push_element(build_activelock(lock));
    prop.push_element(ldis);

    let mut buffer = Vec::new();
    prop.write_doc(&mut buffer)?;

    let mut resp = Response::new(Body::from(bytes::Bytes::from(buffer)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        "content-type",
        http::HeaderValue::from_static("application/xml; charset=utf-8"),
    );
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lockinfo() {
        let body = br#"<?xml version="1.0" encoding="utf-8" ?>
            <D:lockinfo xmlns:D="DAV:">
              <D:lockscope><D:shared/></D:lockscope>
              <D:locktype><D:write/></D:locktype>
              <D:owner><D:href>http://example.org/~ejw/contact.html</D:href></D:owner>
            </D:lockinfo>"#;
        let (scope, owner) = parse_lockinfo(body).unwrap();
        assert_eq!(scope, LockScope::Shared);
        assert_eq!(owner.unwrap().name, "owner");
    }

    #[test]
    fn test_parse_lockinfo_bad() {
        for body in [
            &br#"<D:lockinfo xmlns:D="DAV:"><D:locktype><D:write/></D:locktype></D:lockinfo>"#[..],
            &br#"<D:lockinfo xmlns:D="DAV:"><D:lockscope><D:exclusive/></D:lockscope><D:locktype><D:read/></D:locktype></D:lockinfo>"#[..],
            &br#"<D:propfind xmlns:D="DAV:"/>"#[..],
            &b"not xml"[..],
        ] {
            assert!(parse_lockinfo(body).is_err());
        }
    }

    #[test]
    fn test_activelock() {
        let path = DavPath::new("/dir/file").unwrap();
        let lock = Lock::new(path, LockScope::Exclusive, LockDepth::Zero, None, None, None);
        let resp = lock_response(&lock, StatusCode::OK).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let actlock = build_activelock(&lock);
        let names: Vec<_> = actlock.child_elems_iter().map(|e| e.name.clone()).collect();
        assert_eq!(
            names,
            ["lockscope", "locktype", "depth", "timeout", "locktoken", "lockroot"]
        );
    }
}
