//! Definitions for the Response body.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::Stream;
use http::header::HeaderMap;
use http_body::Body as HttpBody;

/// Body is returned by the lock handler, and implements both `Stream`
/// and `http_body::Body`.
///
/// Lock responses are small XML documents, so the body is always a
/// single buffer.
pub struct Body {
    inner: Option<Bytes>,
}

impl Body {
    /// Return an empty body.
    pub fn empty() -> Body {
        Body { inner: None }
    }
}

impl Stream for Body {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.inner.take().map(Ok))
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        self.poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_none()
    }
}

impl From<String> for Body {
    fn from(t: String) -> Body {
        Body {
            inner: Some(Bytes::from(t)),
        }
    }
}

impl From<&str> for Body {
    fn from(t: &str) -> Body {
        Body {
            inner: Some(Bytes::from(t.to_string())),
        }
    }
}

impl From<Bytes> for Body {
    fn from(t: Bytes) -> Body {
        Body { inner: Some(t) }
    }
}
