//! `If:` / `Lock-Token:` / ETag precondition evaluation.
//!
//! The `If:` header is scanned for two token shapes only: `<...>` holds a
//! lock token, `[...]` an entity tag. The full RFC 4918 tagged-list grammar
//! is deliberately not modeled.

use headers::HeaderMapExt;
use http::HeaderMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::davheaders;
use crate::davpath::DavPath;
use crate::fs::PersistAdapter;
use crate::statestore::DavStateStore;

lazy_static! {
    static ref ANGLE: Regex = Regex::new(r"<([^<>]+)>").unwrap();
    static ref SQUARE: Regex = Regex::new(r"\[([^\[\]]+)\]").unwrap();
}

/// The first `<token>` inside the `If:` header, if any.
pub(crate) fn if_header_lock_token(headers: &HeaderMap) -> Option<String> {
    let ifh = headers.typed_get::<davheaders::IfHeader>()?;
    ANGLE.captures(&ifh.0).map(|c| c[1].to_string())
}

/// All `[etag]` occurrences inside the `If:` header.
pub(crate) fn if_header_etags(headers: &HeaderMap) -> Vec<String> {
    match headers.typed_get::<davheaders::IfHeader>() {
        Some(ifh) => SQUARE.captures_iter(&ifh.0).map(|c| c[1].to_string()).collect(),
        None => Vec::new(),
    }
}

/// Lock token candidates: `Lock-Token:` (angle brackets optional) plus the
/// first bracketed value of `If:`.
pub(crate) fn submitted_lock_tokens(headers: &HeaderMap) -> Vec<String> {
    let mut tokens = Vec::new();
    if let Some(lt) = headers.typed_get::<davheaders::LockToken>() {
        let t = lt.0.trim();
        let t = t.strip_prefix('<').and_then(|s| s.strip_suffix('>')).unwrap_or(t);
        tokens.push(t.to_string());
    }
    if let Some(t) = if_header_lock_token(headers) {
        tokens.push(t);
    }
    tokens
}

/// Lock precondition: pass when the path is unlocked, or when one of the
/// submitted tokens matches the current lock.
pub(crate) async fn require_lock_ok(
    store: &DavStateStore,
    path: &DavPath,
    headers: &HeaderMap,
) -> bool {
    let lock = match store.get_lock(path).await {
        None => return true,
        Some(l) => l,
    };
    submitted_lock_tokens(headers).iter().any(|t| *t == lock.token)
}

/// ETag precondition: pass when `If:` carries no `[etag]` at all, otherwise
/// the resource's current weak ETag must be in the list.
pub(crate) async fn etag_matches_if_header(
    fs: &dyn PersistAdapter,
    path: &DavPath,
    headers: &HeaderMap,
) -> bool {
    let etags = if_header_etags(headers);
    if etags.is_empty() {
        return true;
    }
    match fs.stat(path).await {
        Ok(stat) => etags.iter().any(|e| *e == stat.etag()),
        Err(_) => false,
    }
}
