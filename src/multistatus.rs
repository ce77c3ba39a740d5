//! Multistatus (and other XML) response generation.
//!
//! A thin wrapper around an `xml-rs` event writer emitting into memory.
//! Empty elements are written in paired form so the compat after-hooks can
//! do deterministic surgery on the body text.

use std::borrow::Cow;

use bytes::Bytes;
use http::{Response, StatusCode};
use xml::common::XmlVersion;
use xml::writer::{EventWriter, XmlEvent as XmlWEvent};
use xml::EmitterConfig;

use crate::body::Body;
use crate::util::MemBuffer;
use crate::DavResult;

pub(crate) const NS_DAV_URI: &str = "DAV:";
pub(crate) const NS_X_URI: &str = "urn:x";
pub(crate) const NS_CALDAV_URI: &str = "urn:ietf:params:xml:ns:caldav";

pub(crate) struct XmlWriter {
    emitter: EventWriter<MemBuffer>,
    open:    usize,
}

impl XmlWriter {
    /// Start a document with the given root element and namespace
    /// declarations.
    pub fn new(root: &str, namespaces: &[(&str, &str)]) -> DavResult<XmlWriter> {
        let mut emitter = EventWriter::new_with_config(
            MemBuffer::new(),
            EmitterConfig {
                normalize_empty_elements: false,
                perform_indent: false,
                indent_string: Cow::Borrowed(""),
                ..Default::default()
            },
        );
        emitter.write(XmlWEvent::StartDocument {
            version:    XmlVersion::Version10,
            encoding:   Some("utf-8"),
            standalone: None,
        })?;
        let mut ev = XmlWEvent::start_element(root);
        for (prefix, uri) in namespaces {
            ev = ev.ns(*prefix, *uri);
        }
        emitter.write(ev)?;
        Ok(XmlWriter { emitter, open: 1 })
    }

    /// `D:multistatus` with `D` and `Z` declared, plus any extras.
    pub fn multistatus(extra: &[(&str, &str)]) -> DavResult<XmlWriter> {
        let mut ns = vec![("D", NS_DAV_URI), ("Z", NS_X_URI)];
        ns.extend_from_slice(extra);
        XmlWriter::new("D:multistatus", &ns)
    }

    pub fn start(&mut self, name: &str) -> DavResult<()> {
        self.emitter.write(XmlWEvent::start_element(name))?;
        self.open += 1;
        Ok(())
    }

    pub fn end(&mut self) -> DavResult<()> {
        self.emitter.write(XmlWEvent::end_element())?;
        self.open -= 1;
        Ok(())
    }

    pub fn text(&mut self, text: &str) -> DavResult<()> {
        self.emitter.write(XmlWEvent::characters(text))?;
        Ok(())
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> DavResult<()> {
        self.start(name)?;
        if !text.is_empty() {
            self.text(text)?;
        }
        self.end()
    }

    pub fn empty_element(&mut self, name: &str) -> DavResult<()> {
        self.start(name)?;
        self.end()
    }

    /// `<D:status>HTTP/1.1 404 Not Found</D:status>`
    pub fn status_element(&mut self, status: StatusCode) -> DavResult<()> {
        let line = format!(
            "HTTP/1.1 {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        self.text_element("D:status", line.trim())
    }

    /// Close any still-open elements and return the document bytes.
    pub fn finish(mut self) -> DavResult<Bytes> {
        while self.open > 0 {
            self.end()?;
        }
        Ok(self.emitter.inner_mut().take())
    }
}

/// Wrap a finished multistatus document into a 207 response.
pub(crate) fn multistatus_response(body: Bytes) -> Response<Body> {
    let mut res = Response::new(Body::from(body));
    *res.status_mut() = StatusCode::MULTI_STATUS;
    res.headers_mut()
        .insert("content-type", "application/xml; charset=utf-8".parse().unwrap());
    res
}
