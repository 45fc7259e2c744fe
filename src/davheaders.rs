use std::fmt;

use headers::Header;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use regex::Regex;

use crate::errors::DavError;
use crate::DavResult;

lazy_static! {
    static ref TIMEOUT: HeaderName = HeaderName::from_static("timeout");
    static ref LOCK_TOKEN: HeaderName = HeaderName::from_static("lock-token");
    static ref DEPTH: HeaderName = HeaderName::from_static("depth");
    static ref DESTINATION: HeaderName = HeaderName::from_static("destination");
    static ref IF: HeaderName = HeaderName::from_static("if");
    static ref RE_CODED_URL: Regex = Regex::new(r"^\s*<([^<>\s]*)>\s*$").unwrap();
    static ref RE_SECONDS: Regex = Regex::new(r"^Second-(\d+)$").unwrap();
}

// helper.
fn one<'i, I>(values: &mut I) -> Result<&'i HeaderValue, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let v = values.next().ok_or_else(headers::Error::invalid)?;
    if values.next().is_some() {
        return Err(headers::Error::invalid());
    }
    Ok(v)
}

// helper
fn map_invalid(_e: impl std::error::Error) -> headers::Error {
    headers::Error::invalid()
}

/// The token inside a coded-url (`<token>`).
pub(crate) fn coded_url(s: &str) -> Option<&str> {
    RE_CODED_URL
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// The raw `If` header. Multiple header lines are joined.
pub(crate) fn if_header(headers: &HeaderMap) -> DavResult<Option<String>> {
    let mut value: Option<String> = None;
    for v in headers.get_all(&*IF) {
        let v = v
            .to_str()
            .map_err(|_| DavError::Status(http::StatusCode::BAD_REQUEST))?;
        match value.as_mut() {
            Some(s) => {
                s.push(' ');
                s.push_str(v);
            }
            None => value = Some(v.to_string()),
        }
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DavTimeout {
    Seconds(u32),
    Infinite,
}

impl fmt::Display for DavTimeout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DavTimeout::Seconds(n) => write!(f, "Second-{n}"),
            DavTimeout::Infinite => write!(f, "Infinite"),
        }
    }
}

/// `Timeout: Second-3600, Infinite`. Unrecognized entries are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeout(pub Vec<DavTimeout>);

impl Timeout {
    /// The first recognized candidate.
    pub fn first(&self) -> Option<DavTimeout> {
        self.0.first().copied()
    }
}

impl Header for Timeout {
    fn name() -> &'static HeaderName {
        &TIMEOUT
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let mut v = Vec::new();
        for value in values {
            let value = value.to_str().map_err(map_invalid)?;
            for word in value.split(',').map(|w| w.trim()) {
                if word.eq_ignore_ascii_case("infinite") {
                    v.push(DavTimeout::Infinite);
                } else if let Some(n) = RE_SECONDS
                    .captures(word)
                    .and_then(|c| c.get(1))
                    .and_then(|n| n.as_str().parse::<u32>().ok())
                {
                    v.push(DavTimeout::Seconds(n));
                }
            }
        }
        if v.is_empty() {
            return Err(headers::Error::invalid());
        }
        Ok(Timeout(v))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let s = self
            .0
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(v) = HeaderValue::from_str(&s) {
            values.extend(std::iter::once(v));
        }
    }
}

/// `Lock-Token: <urn:uuid:...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(pub String);

impl Header for LockToken {
    fn name() -> &'static HeaderName {
        &LOCK_TOKEN
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?.to_str().map_err(map_invalid)?;
        match coded_url(value) {
            Some(t) if !t.is_empty() => Ok(LockToken(t.to_string())),
            _ => Err(headers::Error::invalid()),
        }
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(v) = HeaderValue::from_str(&format!("<{}>", self.0)) {
            values.extend(std::iter::once(v));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Header for Depth {
    fn name() -> &'static HeaderName {
        &DEPTH
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = one(values)?.as_bytes();
        if value.eq_ignore_ascii_case(b"0") {
            Ok(Depth::Zero)
        } else if value.eq_ignore_ascii_case(b"1") {
            Ok(Depth::One)
        } else if value.eq_ignore_ascii_case(b"infinity") {
            Ok(Depth::Infinity)
        } else {
            Err(headers::Error::invalid())
        }
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        let value = match *self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        };
        values.extend(std::iter::once(HeaderValue::from_static(value)));
    }
}

/// `Destination` header of COPY and MOVE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination(pub String);

impl Header for Destination {
    fn name() -> &'static HeaderName {
        &DESTINATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let s = one(values)?.to_str().map_err(map_invalid)?;
        if s.starts_with('/') || s.contains("://") {
            Ok(Destination(s.to_string()))
        } else {
            Err(headers::Error::invalid())
        }
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(v) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(v));
        }
    }
}
