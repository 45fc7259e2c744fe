use bitflags::bitflags;

use crate::body::Body;
use crate::errors::DavError;
use crate::DavResult;

bitflags! {
    /// A set of HTTP/Webdav methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DavMethod: u32 {
        const HEAD = 0x0001;
        const GET = 0x0002;
        const PUT = 0x0004;
        const PATCH = 0x0008;
        const OPTIONS = 0x0010;
        const PROPFIND = 0x0020;
        const PROPPATCH = 0x0040;
        const MKCOL = 0x0080;
        const COPY = 0x0100;
        const MOVE = 0x0200;
        const DELETE = 0x0400;
        const LOCK = 0x0800;
        const UNLOCK = 0x1000;

        const WEBDAV_RO = Self::HEAD.bits() | Self::GET.bits()
            | Self::OPTIONS.bits() | Self::PROPFIND.bits();
        // methods that need to pass the lock check.
        const WEBDAV_WRITE = Self::PUT.bits() | Self::PATCH.bits()
            | Self::PROPPATCH.bits() | Self::MKCOL.bits() | Self::COPY.bits()
            | Self::MOVE.bits() | Self::DELETE.bits() | Self::LOCK.bits()
            | Self::UNLOCK.bits();
    }
}

const METHOD_NAMES: [(&str, DavMethod); 13] = [
    ("HEAD", DavMethod::HEAD),
    ("GET", DavMethod::GET),
    ("PUT", DavMethod::PUT),
    ("PATCH", DavMethod::PATCH),
    ("OPTIONS", DavMethod::OPTIONS),
    ("PROPFIND", DavMethod::PROPFIND),
    ("PROPPATCH", DavMethod::PROPPATCH),
    ("MKCOL", DavMethod::MKCOL),
    ("COPY", DavMethod::COPY),
    ("MOVE", DavMethod::MOVE),
    ("DELETE", DavMethod::DELETE),
    ("LOCK", DavMethod::LOCK),
    ("UNLOCK", DavMethod::UNLOCK),
];

impl DavMethod {
    pub const WEBDAV_RW: Self = Self::all();

    /// Does the method have to pass the lock check.
    pub fn is_write(&self) -> bool {
        self.intersects(DavMethod::WEBDAV_WRITE)
    }
}

// map a HTTP method onto a single DavMethod flag.
pub(crate) fn dav_method(m: &http::Method) -> DavResult<DavMethod> {
    METHOD_NAMES
        .iter()
        .find(|(name, _)| *name == m.as_str())
        .map(|&(_, method)| method)
        .ok_or(DavError::UnknownDavMethod)
}

// DAV:error body with a single precondition element.
pub(crate) fn dav_error_body(condition: &str) -> Body {
    Body::from(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n\
         <D:error xmlns:D=\"DAV:\">{condition}</D:error>\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dav_method() {
        let m = http::Method::from_bytes(b"UNLOCK").unwrap();
        assert_eq!(dav_method(&m).unwrap(), DavMethod::UNLOCK);
        assert_eq!(dav_method(&http::Method::PUT).unwrap(), DavMethod::PUT);
        let m = http::Method::from_bytes(b"BIND").unwrap();
        assert!(matches!(dav_method(&m), Err(DavError::UnknownDavMethod)));
    }

    #[test]
    fn test_write_methods() {
        assert!(DavMethod::PUT.is_write());
        assert!(DavMethod::UNLOCK.is_write());
        assert!(!DavMethod::PROPFIND.is_write());
        assert!(!DavMethod::GET.is_write());
        assert!(DavMethod::WEBDAV_RW.contains(DavMethod::WEBDAV_WRITE));
    }
}
