//! The lock check.
//!
//! Decides whether a write request may touch a resource, given the
//! locks held on the resource and its parent and the `If` header the
//! client sent. This is pure: the caller loads the resources and their
//! locks first.
use http::StatusCode;

use crate::davheaders;
use crate::errors::DavError;
use crate::fs::DavResource;
use crate::ifheader;
use crate::util::DavMethod;
use crate::DavResult;

/// Input of the lock check.
#[derive(Debug, Clone, Copy)]
pub struct LockCheck<'a> {
    /// The request target, `None` if it does not exist.
    pub resource: Option<&'a DavResource>,
    /// Its parent collection, `None` if it does not exist.
    pub parent: Option<&'a DavResource>,
    /// Raw `If` header.
    pub if_header: Option<&'a str>,
    pub method: DavMethod,
    /// Raw `Lock-Token` header (UNLOCK).
    pub lock_token: Option<&'a str>,
}

/// What the request handling layer gets to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Go ahead. The token is the lock the client proved to hold.
    Proceed(Option<String>),
    Reject(StatusCode),
}

impl From<DavResult<Option<String>>> for Outcome {
    fn from(res: DavResult<Option<String>>) -> Outcome {
        match res {
            Ok(token) => Outcome::Proceed(token),
            Err(e) => Outcome::Reject(e.statuscode()),
        }
    }
}

fn live_lock(res: &DavResource) -> Option<&crate::lock::Lock> {
    res.lock().filter(|l| !l.is_expired())
}

impl<'a> LockCheck<'a> {
    fn candidates(&self) -> Vec<&'a DavResource> {
        [self.resource, self.parent].into_iter().flatten().collect()
    }

    /// Run the check. Returns the lock token that the `If` header
    /// resolved to, or the reason to reject the request.
    pub fn run(&self) -> DavResult<Option<String>> {
        let locked = self.candidates().into_iter().any(|r| live_lock(r).is_some());

        if !locked {
            match self.if_header {
                None => {
                    trace!("check_lock: not locked, no If header");
                    return Ok(None);
                }
                Some(_) if self.resource.is_none() && self.parent.is_none() => {
                    trace!("check_lock: nothing to test If header against");
                    return Ok(None);
                }
                Some(hdr) => return self.evaluate(hdr),
            }
        }

        match self.if_header {
            None if self.method == DavMethod::UNLOCK => self.unlock_token(),
            None => {
                debug!("check_lock: locked, and no If header");
                Err(DavError::Locked)
            }
            Some(hdr) => self.evaluate(hdr),
        }
    }

    // UNLOCK without If header: the Lock-Token header is the evidence.
    fn unlock_token(&self) -> DavResult<Option<String>> {
        let raw = self.lock_token.ok_or(DavError::MissingLockToken)?;
        let token = davheaders::coded_url(raw)
            .filter(|t| !t.is_empty())
            .ok_or(DavError::MalformedLockToken)?;
        let res = self.resource.ok_or(DavError::ResourceAbsent)?;
        match res.lock() {
            Some(lock) if lock.token == token => Ok(Some(token.to_string())),
            _ => {
                debug!("check_lock: UNLOCK token {} not held on {}", token, res.name());
                Err(DavError::TokenMismatch)
            }
        }
    }

    fn evaluate(&self, hdr: &str) -> DavResult<Option<String>> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Ok(None);
        }
        let rules = ifheader::parse(hdr).map_err(|e| {
            debug!("check_lock: If header: {e}");
            DavError::from(e)
        })?;
        let token = ifheader::evaluate(&rules, &candidates)?;

        // the evidence must match a lock that is actually held.
        let held = match &token {
            Some(t) => candidates
                .iter()
                .any(|r| live_lock(r).map(|l| &l.token == t).unwrap_or(false)),
            None => candidates.iter().all(|r| live_lock(r).is_none()),
        };
        if !held {
            debug!("check_lock: If header resolved to {:?}, not held", token);
            return Err(DavError::StaleToken);
        }
        Ok(token)
    }
}

/// Shortcut for `LockCheck::run`.
pub fn check_lock(chk: &LockCheck) -> DavResult<Option<String>> {
    chk.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::davpath::DavPath;
    use crate::lock::{Lock, LockDepth, LockScope};
    use std::time::{Duration, SystemTime};

    fn resource(name: &str, token: Option<&str>) -> DavResource {
        let mut res = DavResource::new(name, name.ends_with('/'), Some("\"e1\"".to_string()));
        if let Some(token) = token {
            let mut lock = Lock::new(
                DavPath::new(name).unwrap(),
                LockScope::Exclusive,
                LockDepth::Zero,
                None,
                None,
                Some(Duration::from_secs(600)),
            );
            lock.token = token.to_string();
            res.set_locks(vec![lock]);
        }
        res
    }

    fn check(
        res: Option<&DavResource>,
        parent: Option<&DavResource>,
        if_header: Option<&str>,
        method: DavMethod,
        lock_token: Option<&str>,
    ) -> DavResult<Option<String>> {
        LockCheck {
            resource: res,
            parent,
            if_header,
            method,
            lock_token,
        }
        .run()
    }

    fn status(r: DavResult<Option<String>>) -> StatusCode {
        r.unwrap_err().statuscode()
    }

    #[test]
    fn test_unlocked_no_if() {
        let res = resource("/file", None);
        assert_eq!(check(Some(&res), None, None, DavMethod::PUT, None).unwrap(), None);
    }

    #[test]
    fn test_locked_no_if() {
        let res = resource("/file", Some("L1"));
        let r = check(Some(&res), None, None, DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::LOCKED);
    }

    #[test]
    fn test_locked_matching_if() {
        let res = resource("/file", Some("L1"));
        let r = check(Some(&res), None, Some("(<L1>)"), DavMethod::PUT, None);
        assert_eq!(r.unwrap(), Some("L1".to_string()));
    }

    #[test]
    fn test_locked_wrong_if() {
        let res = resource("/file", Some("L1"));
        let r = check(Some(&res), None, Some("(<L2>)"), DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn test_parent_locked() {
        let parent = resource("/dir/", Some("P1"));
        let r = check(None, Some(&parent), None, DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::LOCKED);
        let r = check(None, Some(&parent), Some("(<P1>)"), DavMethod::PUT, None);
        assert_eq!(r.unwrap(), Some("P1".to_string()));
    }

    #[test]
    fn test_unlock() {
        let res = resource("/file", Some("L1"));
        let r = check(Some(&res), None, None, DavMethod::UNLOCK, Some("<L1>"));
        assert_eq!(r.unwrap(), Some("L1".to_string()));
        let r = check(Some(&res), None, None, DavMethod::UNLOCK, Some("<L2>"));
        assert_eq!(status(r), StatusCode::CONFLICT);
        let r = check(Some(&res), None, None, DavMethod::UNLOCK, None);
        assert_eq!(status(r), StatusCode::BAD_REQUEST);
        let r = check(Some(&res), None, None, DavMethod::UNLOCK, Some("L1"));
        assert_eq!(status(r), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unlock_absent_resource() {
        let parent = resource("/dir/", Some("P1"));
        let r = check(None, Some(&parent), None, DavMethod::UNLOCK, Some("<P1>"));
        assert_eq!(status(r), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_stale_token() {
        let mut res = resource("/file", Some("L1"));
        let mut lock = res.lock().unwrap().clone();
        lock.expires = Some(SystemTime::now() - Duration::from_secs(1));
        res.set_locks(vec![lock]);
        let r = check(Some(&res), None, Some("(<L1>)"), DavMethod::PUT, None);
        assert!(matches!(r, Err(DavError::StaleToken)));
        assert_eq!(status(r), StatusCode::LOCKED);
    }

    #[test]
    fn test_if_on_unlocked() {
        let res = resource("/file", None);
        // conditions are still evaluated.
        let r = check(Some(&res), None, Some("([\"e1\"])"), DavMethod::PUT, None);
        assert_eq!(r.unwrap(), None);
        let r = check(Some(&res), None, Some("([\"e2\"])"), DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::PRECONDITION_FAILED);
        let r = check(Some(&res), None, Some("(<L1>)"), DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::PRECONDITION_FAILED);
        // nothing to test against.
        assert_eq!(check(None, None, Some("(<L1>)"), DavMethod::PUT, None).unwrap(), None);
    }

    #[test]
    fn test_no_rules() {
        let res = resource("/file", Some("L1"));
        for hdr in ["   ", "()"] {
            let r = check(Some(&res), None, Some(hdr), DavMethod::PUT, None);
            assert!(matches!(r, Err(DavError::NoRules)));
        }
        let res = resource("/file", None);
        let r = check(Some(&res), None, Some(" "), DavMethod::DELETE, None);
        assert_eq!(status(r), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn test_syntax_error() {
        let res = resource("/file", Some("L1"));
        let r = check(Some(&res), None, Some("(<L1>"), DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::PRECONDITION_FAILED);
        let r = check(Some(&res), None, Some("L1"), DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unlocked_child_does_not_cover_parent() {
        // child passes with no token, but the parent lock is not covered.
        let child = resource("/dir/file", None);
        let parent = resource("/dir/", Some("P1"));
        let r = check(Some(&child), Some(&parent), Some("(Not <urn:x>)"), DavMethod::PUT, None);
        assert_eq!(status(r), StatusCode::LOCKED);
    }

    #[test]
    fn test_outcome() {
        let res = resource("/file", Some("L1"));
        let o: Outcome = check(Some(&res), None, None, DavMethod::DELETE, None).into();
        assert_eq!(o, Outcome::Reject(StatusCode::LOCKED));
        let o: Outcome = check(Some(&res), None, Some("(<L1>)"), DavMethod::DELETE, None).into();
        assert_eq!(o, Outcome::Proceed(Some("L1".to_string())));
    }
}
