//! Client-compat response transforms, layered in as after-hooks.
//!
//! All transforms guard on the response actually being multistatus XML
//! (or, for GET, a plain 200) and operate on the buffered body text.

use futures_util::future::FutureExt;
use headers::HeaderMapExt;
use http::{Response, StatusCode};
use lazy_static::lazy_static;
use regex::Regex;

use crate::body::Body;
use crate::davheaders;
use crate::hooks::{DavHooks, HookRequest, HookTransform};
use crate::xmlscan::{propfind_mode, PropfindMode};

lazy_static! {
    static ref RESPONSE_BLOCK: Regex = Regex::new(r"(?s)<D:response>.*?</D:response>").unwrap();
    static ref PROPSTAT_BLOCK: Regex = Regex::new(r"(?s)<D:propstat>.*?</D:propstat>").unwrap();
    static ref SUPPORTEDLOCK_ELEM: Regex =
        Regex::new(r"<D:supportedlock\s*(?:/>|></D:supportedlock>)").unwrap();
    static ref LOCKDISCOVERY_ELEM: Regex =
        Regex::new(r"<D:lockdiscovery\s*(?:/>|></D:lockdiscovery>)").unwrap();
    static ref EMPTY_404_PROPSTAT: Regex = Regex::new(
        r"(?s)<D:propstat>\s*<D:prop>\s*</D:prop>\s*<D:status>HTTP/1\.1 404 Not Found</D:status>\s*</D:propstat>"
    )
    .unwrap();
}

const MIN_SUPPORTEDLOCK: &str = "<D:supportedlock><D:lockentry><D:lockscope><D:exclusive></D:exclusive></D:lockscope><D:locktype><D:write></D:write></D:locktype></D:lockentry></D:supportedlock>";
const MIN_LOCKDISCOVERY: &str = "<D:lockdiscovery></D:lockdiscovery>";

pub(crate) fn is_multistatus(resp: &Response<Body>) -> bool {
    let is_xml = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("xml"))
        .unwrap_or(false);
    is_xml
        && resp
            .body()
            .as_str()
            .map(|s| s.contains("<D:multistatus"))
            .unwrap_or(false)
}

// drop every propstat block whose status is 404.
fn strip_not_found_propstats(body: &str) -> String {
    PROPSTAT_BLOCK
        .replace_all(body, |caps: &regex::Captures| {
            let block = caps.get(0).unwrap().as_str();
            if block.contains("404 Not Found") {
                String::new()
            } else {
                block.to_string()
            }
        })
        .into_owned()
}

/// Rewrite one multistatus response block: each `(pattern, replacement)`
/// pair whose pattern matches inside a 404 propstat gets removed there and
/// re-emitted inside the 200 propstat as `replacement`. A 404 propstat
/// left empty is dropped; a missing 200 propstat is created.
pub(crate) fn promote_propstat_elements(block: &str, subs: &[(&Regex, &str)]) -> String {
    let mut block = block.to_string();
    let mut synth = String::new();

    block = PROPSTAT_BLOCK
        .replace_all(&block, |pcaps: &regex::Captures| {
            let mut pblock = pcaps.get(0).unwrap().as_str().to_string();
            if !pblock.contains("404 Not Found") {
                return pblock;
            }
            for (pattern, replacement) in subs {
                if pattern.is_match(&pblock) {
                    pblock = pattern.replace(&pblock, "").into_owned();
                    synth.push_str(replacement);
                }
            }
            pblock
        })
        .into_owned();

    if synth.is_empty() {
        return block;
    }
    block = EMPTY_404_PROPSTAT.replace(&block, "").into_owned();
    let marker = "</D:prop><D:status>HTTP/1.1 200 OK</D:status>";
    if let Some(pos) = block.find(marker) {
        block.insert_str(pos, &synth);
    } else if let Some(pos) = block.find("</D:response>") {
        let propstat = format!(
            "<D:propstat><D:prop>{}</D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>",
            synth
        );
        block.insert_str(pos, &propstat);
    }
    block
}

// rewrite requested-but-unknown lock properties into a minimal 200 form.
fn synthesize_lock_props(body: &str, want_supported: bool, want_discovery: bool) -> String {
    RESPONSE_BLOCK
        .replace_all(body, |caps: &regex::Captures| {
            let mut subs: Vec<(&Regex, &str)> = Vec::new();
            if want_supported {
                subs.push((&*SUPPORTEDLOCK_ELEM, MIN_SUPPORTEDLOCK));
            }
            if want_discovery {
                subs.push((&*LOCKDISCOVERY_ELEM, MIN_LOCKDISCOVERY));
            }
            promote_propstat_elements(caps.get(0).unwrap().as_str(), &subs)
        })
        .into_owned()
}

fn wants_minimal(req: &HookRequest) -> (bool, bool) {
    let brief = req
        .headers
        .typed_get::<davheaders::Brief>()
        .map(|b| b.0.eq_ignore_ascii_case("t"))
        .unwrap_or(false);
    let prefer = req
        .headers
        .typed_get::<davheaders::Prefer>()
        .map(|p| p.0.contains("return=minimal"))
        .unwrap_or(false);
    (brief, prefer)
}

/// Brief/Prefer propstat stripping, lock-prop minimization, and GET
/// `return=minimal` handling.
#[derive(Debug, Clone, Default)]
pub struct CompatHooks;

impl DavHooks for CompatHooks {
    fn after_propfind<'a>(&'a self, req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        async move {
            if !is_multistatus(&resp) {
                return resp;
            }
            let mut resp = resp;
            let mut body = match resp.body().as_str() {
                Some(s) => s.to_string(),
                None => return resp,
            };

            let requested = match propfind_mode(&req.body) {
                PropfindMode::Prop(keys) => keys,
                _ => Vec::new(),
            };
            let want_supported = requested.iter().any(|k| k.ends_with("supportedlock"));
            let want_discovery = requested.iter().any(|k| k.ends_with("lockdiscovery"));
            if want_supported || want_discovery {
                body = synthesize_lock_props(&body, want_supported, want_discovery);
            }

            let (brief, prefer) = wants_minimal(req);
            if brief || prefer {
                body = strip_not_found_propstats(&body);
                if prefer {
                    resp.headers_mut()
                        .typed_insert(davheaders::PreferenceApplied("return=minimal".to_string()));
                }
            }

            *resp.body_mut() = Body::from(body);
            resp
        }
        .boxed()
    }

    fn after_get<'a>(&'a self, req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        async move {
            let (_, prefer) = wants_minimal(req);
            if !prefer || resp.status() != StatusCode::OK {
                return resp;
            }
            let mut resp = resp;
            *resp.status_mut() = StatusCode::NO_CONTENT;
            *resp.body_mut() = Body::empty();
            resp.headers_mut().remove("content-length");
            resp.headers_mut()
                .typed_insert(davheaders::PreferenceApplied("return=minimal".to_string()));
            resp
        }
        .boxed()
    }
}
