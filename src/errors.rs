use std::error::Error;
use std::fmt;
use std::io;

use http::StatusCode;

use crate::fs::FsError;
use crate::ifheader::SyntaxError;
use crate::ls::LsError;

pub type DavResult<T> = Result<T, DavError>;

#[derive(Debug)]
pub enum DavError {
    /// The `If` header does not follow the grammar.
    IfHeaderSyntax(SyntaxError),
    /// The `If` header was present but yielded no rules.
    NoRules,
    /// No resource / condition-set combination matched.
    PreconditionFailed,
    /// UNLOCK with a token that is not the one held on the resource.
    TokenMismatch,
    /// UNLOCK without a `Lock-Token` header.
    MissingLockToken,
    /// UNLOCK with a `Lock-Token` header that is not a coded-url.
    MalformedLockToken,
    /// UNLOCK on a resource that does not exist.
    ResourceAbsent,
    /// Resource is locked and no `If` header was submitted.
    Locked,
    /// The `If` header matched, but not against a lock that is held.
    StaleToken,
    Store(LsError),
    Fs(FsError),
    XmlParseError,
    XmlWriteError,
    InvalidPath,
    UnknownDavMethod,
    Status(StatusCode),
    IoError(io::Error),
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::IfHeaderSyntax(e) => Some(e),
            DavError::Store(e) => Some(e),
            DavError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for DavError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DavError::IfHeaderSyntax(e) => write!(f, "If header: {e}"),
            DavError::NoRules => write!(f, "If header contains no conditions"),
            DavError::PreconditionFailed => write!(f, "If header conditions not met"),
            DavError::TokenMismatch => write!(f, "lock token does not match"),
            DavError::MissingLockToken => write!(f, "Lock-Token header missing"),
            DavError::MalformedLockToken => write!(f, "Lock-Token header malformed"),
            DavError::ResourceAbsent => write!(f, "resource does not exist"),
            DavError::Locked => write!(f, "resource is locked"),
            DavError::StaleToken => write!(f, "submitted lock token is not held"),
            DavError::Store(e) => write!(f, "lock store: {e}"),
            DavError::Fs(e) => write!(f, "resource bridge: {e:?}"),
            DavError::XmlParseError => write!(f, "XML parse error"),
            DavError::XmlWriteError => write!(f, "XML write error"),
            DavError::InvalidPath => write!(f, "invalid path"),
            DavError::UnknownDavMethod => write!(f, "unknown HTTP method"),
            DavError::Status(s) => write!(f, "{s}"),
            DavError::IoError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl From<SyntaxError> for DavError {
    fn from(e: SyntaxError) -> Self {
        DavError::IfHeaderSyntax(e)
    }
}

impl From<LsError> for DavError {
    fn from(e: LsError) -> Self {
        DavError::Store(e)
    }
}

impl From<FsError> for DavError {
    fn from(e: FsError) -> Self {
        DavError::Fs(e)
    }
}

impl From<StatusCode> for DavError {
    fn from(e: StatusCode) -> Self {
        DavError::Status(e)
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        DavError::IoError(e)
    }
}

fn fserror_to_status(e: &FsError) -> StatusCode {
    match e {
        FsError::NotFound => StatusCode::NOT_FOUND,
        FsError::Forbidden => StatusCode::FORBIDDEN,
        FsError::GeneralFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl DavError {
    pub fn statuscode(&self) -> StatusCode {
        match self {
            DavError::IfHeaderSyntax(e) => {
                if e.early {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::PRECONDITION_FAILED
                }
            }
            DavError::NoRules => StatusCode::PRECONDITION_FAILED,
            DavError::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            DavError::TokenMismatch => StatusCode::CONFLICT,
            DavError::MissingLockToken => StatusCode::BAD_REQUEST,
            DavError::MalformedLockToken => StatusCode::BAD_REQUEST,
            DavError::ResourceAbsent => StatusCode::NOT_FOUND,
            DavError::Locked => StatusCode::LOCKED,
            DavError::StaleToken => StatusCode::LOCKED,
            DavError::Store(e) => e.statuscode(),
            DavError::Fs(e) => fserror_to_status(e),
            DavError::XmlParseError => StatusCode::BAD_REQUEST,
            DavError::XmlWriteError => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::UnknownDavMethod => StatusCode::NOT_IMPLEMENTED,
            DavError::Status(e) => *e,
            DavError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // failures that come from lock evidence get a DAV:error body.
    pub(crate) fn precondition(&self) -> Option<&'static str> {
        match self {
            DavError::Locked | DavError::StaleToken => Some("<D:lock-token-submitted/>"),
            DavError::TokenMismatch => Some("<D:lock-token-matches-request-uri/>"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifheader::SyntaxError;

    #[test]
    fn test_taxonomy() {
        assert_eq!(DavError::NoRules.statuscode(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(DavError::TokenMismatch.statuscode(), StatusCode::CONFLICT);
        assert_eq!(DavError::MissingLockToken.statuscode(), StatusCode::BAD_REQUEST);
        assert_eq!(DavError::ResourceAbsent.statuscode(), StatusCode::NOT_FOUND);
        assert_eq!(DavError::Locked.statuscode(), StatusCode::LOCKED);
        assert_eq!(DavError::StaleToken.statuscode(), StatusCode::LOCKED);
    }

    #[test]
    fn test_syntax_status() {
        let early = SyntaxError::new(0, "expected '<' or '('", true);
        let late = SyntaxError::new(7, "unterminated list", false);
        assert_eq!(DavError::from(early).statuscode(), StatusCode::BAD_REQUEST);
        assert_eq!(DavError::from(late).statuscode(), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn test_store_status() {
        let e = LsError::Failure {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            reason: "backend down".to_string(),
        };
        assert_eq!(DavError::from(e).statuscode(), StatusCode::SERVICE_UNAVAILABLE);
        let e = LsError::Failure {
            status: None,
            reason: "backend down".to_string(),
        };
        assert_eq!(DavError::from(e).statuscode(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
