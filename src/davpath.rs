//! Utility module to handle the path part of an URL as a filesystem path.
//!
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::errors::DavError;
use crate::DavResult;

// Encode all non-unreserved characters, except '/'.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// URL path, with hidden prefix.
///
/// The path is percent-decoded and normalized: no `.` or `..`
/// segments, no empty segments. A trailing slash marks a collection.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DavPath {
    path: String,
    prefix: String,
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_url_string_with_prefix())
    }
}

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.with_prefix())
    }
}

// decode and normalize an absolute path.
fn normalize(src: &str) -> DavResult<String> {
    if !src.starts_with('/') {
        return Err(DavError::InvalidPath);
    }
    let decoded = percent_decode_str(src)
        .decode_utf8()
        .map_err(|_| DavError::InvalidPath)?;
    if decoded.contains('\0') {
        return Err(DavError::InvalidPath);
    }
    let mut segs: Vec<&str> = Vec::new();
    for seg in decoded.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if segs.pop().is_none() {
                    return Err(DavError::InvalidPath);
                }
            }
            s => segs.push(s),
        }
    }
    let mut path = String::with_capacity(decoded.len());
    path.push('/');
    path.push_str(&segs.join("/"));
    if !segs.is_empty() && (decoded.ends_with('/') || decoded.ends_with("/.")) {
        path.push('/');
    }
    Ok(path)
}

// prefix without a trailing slash.
fn clean_prefix(prefix: &str) -> &str {
    prefix.strip_suffix('/').unwrap_or(prefix)
}

impl DavPath {
    /// From an absolute path, without prefix.
    pub fn new(src: &str) -> DavResult<DavPath> {
        Ok(DavPath {
            path: normalize(src)?,
            prefix: String::new(),
        })
    }

    /// From a request URI; the prefix is stripped off.
    pub fn from_uri_and_prefix(uri: &http::Uri, prefix: &str) -> DavResult<DavPath> {
        DavPath::from_str_and_prefix(uri.path(), prefix)
    }

    /// From an absolute URL (as found in `Destination` or a resource
    /// tag) or an absolute path. The prefix is stripped off.
    pub fn from_url_and_prefix(src: &str, prefix: &str) -> DavResult<DavPath> {
        if src.starts_with('/') {
            return DavPath::from_str_and_prefix(src, prefix);
        }
        let url = url::Url::parse(src).map_err(|_| DavError::InvalidPath)?;
        DavPath::from_str_and_prefix(url.path(), prefix)
    }

    fn from_str_and_prefix(src: &str, prefix: &str) -> DavResult<DavPath> {
        let prefix = clean_prefix(prefix);
        let full = normalize(src)?;
        if prefix.is_empty() {
            return Ok(DavPath {
                path: full,
                prefix: String::new(),
            });
        }
        let pfx = normalize(prefix)?;
        let pfx = clean_prefix(&pfx);
        match full.strip_prefix(pfx) {
            Some("") => Ok(DavPath {
                path: "/".to_string(),
                prefix: pfx.to_string(),
            }),
            Some(rest) if rest.starts_with('/') => Ok(DavPath {
                path: rest.to_string(),
                prefix: pfx.to_string(),
            }),
            _ => Err(DavError::InvalidPath),
        }
    }

    /// The parent collection, `None` for the root.
    pub fn parent(&self) -> Option<DavPath> {
        if self.path == "/" {
            return None;
        }
        let p = self.path.trim_end_matches('/');
        let idx = p.rfind('/')?;
        Some(DavPath {
            path: p[..=idx].to_string(),
            prefix: self.prefix.clone(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    pub fn is_collection(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Path without prefix, as key for lookups. No trailing slash,
    /// except for the root.
    pub fn as_key(&self) -> &str {
        if self.path == "/" {
            &self.path
        } else {
            self.path.trim_end_matches('/')
        }
    }

    /// Path without prefix, decoded.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Path with prefix, decoded. This is the resource name.
    pub fn with_prefix(&self) -> String {
        format!("{}{}", self.prefix, self.path)
    }

    /// Path with prefix, percent-encoded. For use in hrefs.
    pub fn as_url_string_with_prefix(&self) -> String {
        utf8_percent_encode(&self.with_prefix(), PATH_ENCODE_SET).to_string()
    }
}

// canonical form of a resource tag: decoded path, no trailing slash.
fn canonical(tag: &str) -> Option<String> {
    let path = DavPath::from_url_and_prefix(tag, "").ok()?;
    Some(path.as_key().to_string())
}

/// Do a resource tag and a resource name refer to the same resource.
///
/// Tags may be absolute URLs or paths, with or without trailing slash.
/// The name is already decoded, so only the tag is canonicalized.
pub(crate) fn same_resource(tag: &str, name: &str) -> bool {
    let name = match name.trim_end_matches('/') {
        "" => "/",
        n => n,
    };
    canonical(tag).map(|t| t == name).unwrap_or(false)
}
