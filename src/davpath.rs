//! Utility module to handle the path part of an URL as a segment vector.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use percent_encoding as pct;

use crate::errors::DavError;

// Encode all non-unreserved characters, except '/'.
// See RFC3986, and https://en.wikipedia.org/wiki/Percent-encoding .
const PATH_ENCODE_SET: &pct::AsciiSet = &pct::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// An absolute URL path, normalized to a vector of non-empty segments.
///
/// The empty vector is the root. Handlers work on segments only; hrefs are
/// reconstructed at response-rendering time.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct DavPath {
    segs: Vec<String>,
}

impl std::fmt::Display for DavPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_url_string())
    }
}

impl std::fmt::Debug for DavPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.as_url_string())
    }
}

impl DavPath {
    /// The root path (empty segment list).
    pub fn root() -> DavPath {
        DavPath { segs: Vec::new() }
    }

    pub fn new(segs: Vec<String>) -> DavPath {
        DavPath { segs }
    }

    /// Parse the path part of a request URI. The optional `prefix` is
    /// stripped off before normalization.
    pub fn from_request_path(path: &str, prefix: &str) -> Result<DavPath, DavError> {
        // strip query and reject fragments.
        let path = match path.find(|c| c == '?' || c == '#') {
            Some(pos) if path.as_bytes()[pos] == b'#' => return Err(DavError::InvalidPath),
            Some(pos) => &path[..pos],
            None => path,
        };
        if !path.starts_with('/') {
            return Err(DavError::InvalidPath);
        }
        let path = if prefix.is_empty() {
            path
        } else {
            match path.strip_prefix(prefix) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => return Err(DavError::InvalidPath),
            }
        };

        let mut segs = Vec::new();
        for raw in path.split('/') {
            if raw.is_empty() || raw == "." {
                continue;
            }
            let seg = pct::percent_decode_str(raw)
                .decode_utf8()
                .map_err(|_| DavError::InvalidPath)?;
            if seg.contains('/') || seg.contains('\0') {
                return Err(DavError::InvalidPath);
            }
            if seg == ".." {
                if segs.pop().is_none() {
                    return Err(DavError::InvalidPath);
                }
                continue;
            }
            segs.push(seg.into_owned());
        }
        Ok(DavPath { segs })
    }

    /// Parse a `Destination:` or `Source:` header value. Absolute URLs are
    /// reduced to their path component first.
    pub fn from_destination(value: &str, prefix: &str) -> Result<DavPath, DavError> {
        if value.starts_with("http://") || value.starts_with("https://") {
            let url = url::Url::parse(value).map_err(|_| DavError::InvalidPath)?;
            DavPath::from_request_path(url.path(), prefix)
        } else {
            DavPath::from_request_path(value, prefix)
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segs
    }

    pub fn is_root(&self) -> bool {
        self.segs.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segs.len()
    }

    /// Last segment, or "/" for the root.
    pub fn file_name(&self) -> &str {
        self.segs.last().map(|s| s.as_str()).unwrap_or("/")
    }

    pub fn parent(&self) -> DavPath {
        let mut segs = self.segs.clone();
        segs.pop();
        DavPath { segs }
    }

    pub fn join(&self, name: &str) -> DavPath {
        let mut segs = self.segs.clone();
        segs.push(name.to_string());
        DavPath { segs }
    }

    /// Ancestor chain from the root down to (and including) this path.
    pub fn ancestors(&self) -> impl Iterator<Item = DavPath> + '_ {
        (0..=self.segs.len()).map(move |n| DavPath { segs: self.segs[..n].to_vec() })
    }

    /// The decoded path with a leading slash, no trailing slash (except root).
    pub fn as_url_string(&self) -> String {
        if self.segs.is_empty() {
            return "/".to_string();
        }
        let mut s = String::new();
        for seg in &self.segs {
            s.push('/');
            s.push_str(seg);
        }
        s
    }

    /// Percent-encoded href including prefix; collections get a trailing '/'.
    pub fn href(&self, is_collection: bool, prefix: &str) -> String {
        let mut s = String::from(prefix);
        if self.segs.is_empty() {
            s.push('/');
            return s;
        }
        for seg in &self.segs {
            s.push('/');
            s.push_str(&pct::percent_encode(seg.as_bytes(), PATH_ENCODE_SET).to_string());
        }
        if is_collection {
            s.push('/');
        }
        s
    }

    /// Filename-safe sidecar key: URL-safe base64 of the leading-slash path.
    pub fn sidecar_key(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.as_url_string().as_bytes())
    }
}
