//! Definitions for the request and response bodies.
//!
//! The handler consumes a fully collected request body and produces a fully
//! buffered response body. Compat after-hooks inspect and rewrite multistatus
//! XML in place, which rules out a streaming response body.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::Stream;

/// Response body returned by the webdav handler.
#[derive(Debug, Default, Clone)]
pub struct Body {
    data: Bytes,
    sent: bool,
}

impl Body {
    /// Return an empty body.
    pub fn empty() -> Body {
        Body::default()
    }

    /// The body's bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Consume the body, returning its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The body as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

// One-shot stream, so the body can be forwarded to any transport
// that consumes `Stream<Item = io::Result<Bytes>>`.
impl Stream for Body {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Option<Self::Item>> {
        if self.sent || self.data.is_empty() {
            Poll::Ready(None)
        } else {
            self.sent = true;
            Poll::Ready(Some(Ok(self.data.clone())))
        }
    }
}

impl From<String> for Body {
    fn from(t: String) -> Body {
        Body { data: Bytes::from(t), sent: false }
    }
}

impl From<&str> for Body {
    fn from(t: &str) -> Body {
        Body { data: Bytes::from(t.to_string()), sent: false }
    }
}

impl From<Bytes> for Body {
    fn from(t: Bytes) -> Body {
        Body { data: t, sent: false }
    }
}

impl From<Vec<u8>> for Body {
    fn from(t: Vec<u8>) -> Body {
        Body { data: Bytes::from(t), sent: false }
    }
}
