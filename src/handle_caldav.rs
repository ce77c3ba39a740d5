//! CalDAV support, layered over the core through hooks plus the
//! MKCALENDAR method.
//!
//! A calendar collection is marked by the `D:resourcetype` dead property
//! set at MKCALENDAR time; the marker never renders directly (live
//! resourcetype wins) but drives the afterPropfind injection and the
//! `.ics`-only gate on PUT.

use std::collections::VecDeque;

use futures_util::future::FutureExt;
use headers::HeaderMapExt;
use http::{Response, StatusCode};
use lazy_static::lazy_static;
use regex::Regex;

use crate::body::Body;
use crate::compat::is_multistatus;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::fs::PersistAdapter;
use crate::hooks::{DavHooks, HookRequest, HookShortCircuit, HookTransform, PutPayload};
use crate::ical;
use crate::ignore::IgnoreFilter;
use crate::multistatus::{multistatus_response, XmlWriter, NS_CALDAV_URI};
use crate::statestore::{DavStateStore, PropMap};
use crate::xmlscan::{self, ReportKind, TimeRange};

lazy_static! {
    static ref RESPONSE_BLOCK: Regex = Regex::new(r"(?s)<D:response>.*?</D:response>").unwrap();
    static ref HREF_ELEM: Regex = Regex::new(r"<D:href>([^<]*)</D:href>").unwrap();
    static ref HOME_SET_ELEM: Regex = Regex::new(
        r"<(?:[A-Za-z][\w.-]*:)?calendar-home-set\s*(?:/>|></(?:[A-Za-z][\w.-]*:)?calendar-home-set>)"
    )
    .unwrap();
}

/// Dead properties a fresh calendar collection starts with.
pub(crate) fn calendar_default_props() -> PropMap {
    let mut m = PropMap::new();
    m.insert(
        "D:resourcetype".to_string(),
        "<D:collection/><C:calendar/>".to_string(),
    );
    m.insert(
        "C:supported-calendar-component-set".to_string(),
        r#"<C:comp name="VEVENT"/><C:comp name="VTODO"/>"#.to_string(),
    );
    m.insert(
        "C:supported-calendar-data".to_string(),
        r#"<C:calendar-data content-type="text/calendar" version="2.0"/>"#.to_string(),
    );
    m.insert("C:max-resource-size".to_string(), "10485760".to_string());
    m.insert("C:min-date-time".to_string(), "19700101T000000Z".to_string());
    m.insert("C:max-date-time".to_string(), "20500101T000000Z".to_string());
    m.insert("C:max-instances".to_string(), "1000".to_string());
    m.insert("C:max-attendees-per-instance".to_string(), "100".to_string());
    m.insert("C:calendar-timezone".to_string(), "UTC".to_string());
    m
}

#[derive(Debug, Clone)]
pub struct CalDavHooks {
    fs:     Box<dyn PersistAdapter>,
    store:  DavStateStore,
    ignore: IgnoreFilter,
    prefix: String,
}

impl CalDavHooks {
    pub(crate) fn new(
        fs: Box<dyn PersistAdapter>,
        store: DavStateStore,
        ignore: IgnoreFilter,
        prefix: String,
    ) -> CalDavHooks {
        CalDavHooks { fs, store, ignore, prefix }
    }

    async fn is_calendar(&self, path: &DavPath) -> bool {
        self.store
            .get_props(path)
            .await
            .get("D:resourcetype")
            .map(|v| v.contains("calendar"))
            .unwrap_or(false)
    }

    async fn under_calendar(&self, path: &DavPath) -> bool {
        let parent = path.parent();
        for ancestor in parent.ancestors() {
            if self.is_calendar(&ancestor).await {
                return true;
            }
        }
        false
    }

    // every `.ics` file at/under `path`, honoring the requested depth.
    async fn collect_ics(&self, path: &DavPath, depth: Depth) -> Vec<(DavPath, String)> {
        let mut out = Vec::new();
        let stat = match self.fs.stat(path).await {
            Ok(s) => s,
            Err(_) => return out,
        };
        if stat.is_file() {
            if path.file_name().ends_with(".ics") {
                if let Ok(data) = self.fs.read_file(path).await {
                    if let Ok(text) = String::from_utf8(data.to_vec()) {
                        out.push((path.clone(), text));
                    }
                }
            }
            return out;
        }
        if depth == Depth::Zero {
            return out;
        }
        let mut queue: VecDeque<DavPath> = VecDeque::new();
        queue.push_back(path.clone());
        while let Some(dir) = queue.pop_front() {
            let names = match self.fs.read_dir(&dir).await {
                Ok(n) => n,
                Err(_) => continue,
            };
            for name in self.ignore.filter_names(names) {
                let child = dir.join(&name);
                let cstat = match self.fs.stat(&child).await {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                if cstat.is_dir() {
                    if depth == Depth::Infinity {
                        queue.push_back(child);
                    }
                    continue;
                }
                if name.ends_with(".ics") {
                    if let Ok(data) = self.fs.read_file(&child).await {
                        if let Ok(text) = String::from_utf8(data.to_vec()) {
                            out.push((child, text));
                        }
                    }
                }
            }
        }
        out
    }

    fn calendar_data_response(&self, entries: Vec<(DavPath, Option<String>)>) -> Option<Response<Body>> {
        let mut xw = XmlWriter::multistatus(&[("C", NS_CALDAV_URI)]).ok()?;
        for (path, content) in entries {
            xw.start("D:response").ok()?;
            xw.text_element("D:href", &path.href(false, &self.prefix)).ok()?;
            match content {
                Some(text) => {
                    xw.start("D:propstat").ok()?;
                    xw.start("D:prop").ok()?;
                    xw.text_element("C:calendar-data", &text).ok()?;
                    xw.end().ok()?;
                    xw.status_element(StatusCode::OK).ok()?;
                    xw.end().ok()?;
                },
                None => {
                    xw.status_element(StatusCode::NOT_FOUND).ok()?;
                },
            }
            xw.end().ok()?;
        }
        Some(multistatus_response(xw.finish().ok()?))
    }

    async fn calendar_query(&self, req: &HookRequest) -> Option<Response<Body>> {
        let depth = req.headers.typed_get::<Depth>().unwrap_or(Depth::One);
        let filter = xmlscan::calendar_filter(&req.body);
        let mut matched = Vec::new();
        for (path, text) in self.collect_ics(&req.path, depth).await {
            let comps = ical::parse_components(&text);
            if comps.iter().any(|c| ical::component_matches(c, &filter)) {
                matched.push((path, Some(text)));
            }
        }
        self.calendar_data_response(matched)
    }

    async fn calendar_multiget(&self, req: &HookRequest) -> Option<Response<Body>> {
        let mut entries = Vec::new();
        for href in xmlscan::multiget_hrefs(&req.body) {
            let path = match DavPath::from_request_path(&href, &self.prefix) {
                Ok(p) => p,
                Err(_) => continue,
            };
            match self.fs.read_file(&path).await {
                Ok(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => entries.push((path, Some(text))),
                    Err(_) => entries.push((path, None)),
                },
                Err(_) => entries.push((path, None)),
            }
        }
        self.calendar_data_response(entries)
    }

    async fn free_busy(&self, req: &HookRequest) -> Option<Response<Body>> {
        let window = xmlscan::freebusy_range(&req.body).unwrap_or_default();
        let mut lines = String::new();
        for (_, text) in self.collect_ics(&req.path, Depth::Infinity).await {
            for comp in ical::parse_components(&text) {
                if comp.kind != "VEVENT" {
                    continue;
                }
                if !ical::overlaps(comp.start(), comp.end(), &window) {
                    continue;
                }
                if let Some(start) = comp.start() {
                    let end = comp.end().unwrap_or(start);
                    lines.push_str(&format!("FREEBUSY:{}/{}\r\n", start, end));
                }
            }
        }
        let mut cal = String::new();
        cal.push_str("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//dav-engine//EN\r\n");
        cal.push_str("BEGIN:VFREEBUSY\r\n");
        if let Some(ws) = window.start.as_deref() {
            cal.push_str(&format!("DTSTART:{}\r\n", ws));
        }
        if let Some(we) = window.end.as_deref() {
            cal.push_str(&format!("DTEND:{}\r\n", we));
        }
        cal.push_str(&lines);
        cal.push_str("END:VFREEBUSY\r\nEND:VCALENDAR\r\n");

        let mut res = Response::new(Body::from(cal));
        *res.status_mut() = StatusCode::OK;
        res.headers_mut()
            .insert("content-type", "text/calendar; charset=utf-8".parse().unwrap());
        Some(res)
    }

    // rewrite one multistatus response block: calendar resourcetype
    // injection for marked collections, calendar-home-set for the root.
    async fn transform_block(&self, block: &str, want_home_set: bool) -> String {
        let href = match HREF_ELEM.captures(block) {
            Some(c) => c[1].to_string(),
            None => return block.to_string(),
        };
        let path = match DavPath::from_request_path(&href, &self.prefix) {
            Ok(p) => p,
            Err(_) => return block.to_string(),
        };

        let mut block = block.to_string();
        if want_home_set && path.is_root() {
            let home = format!(
                r#"<C:calendar-home-set xmlns:C="urn:ietf:params:xml:ns:caldav"><D:href>{}/</D:href></C:calendar-home-set>"#,
                self.prefix
            );
            block = crate::compat::promote_propstat_elements(&block, &[(&*HOME_SET_ELEM, &home)]);
        }

        if !self.is_calendar(&path).await {
            return block;
        }
        if block.contains("<D:resourcetype>") && !block.contains("C:calendar") {
            block = block.replacen(
                "</D:resourcetype>",
                r#"<C:calendar xmlns:C="urn:ietf:params:xml:ns:caldav"></C:calendar></D:resourcetype>"#,
                1,
            );
        }
        block
    }
}

impl DavHooks for CalDavHooks {
    fn before_put<'a>(&'a self, req: &'a HookRequest, _payload: &'a mut PutPayload) -> HookShortCircuit<'a> {
        async move {
            if self.under_calendar(&req.path).await && !req.path.file_name().ends_with(".ics") {
                let mut res = Response::new(Body::empty());
                *res.status_mut() = StatusCode::UNSUPPORTED_MEDIA_TYPE;
                return Some(res);
            }
            None
        }
        .boxed()
    }

    fn before_report<'a>(&'a self, req: &'a HookRequest) -> HookShortCircuit<'a> {
        async move {
            match xmlscan::report_kind(&req.body) {
                ReportKind::CalendarQuery => self.calendar_query(req).await,
                ReportKind::CalendarMultiget => self.calendar_multiget(req).await,
                ReportKind::FreeBusyQuery => self.free_busy(req).await,
                _ => None,
            }
        }
        .boxed()
    }

    fn after_options<'a>(&'a self, _req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        async move {
            let mut resp = resp;
            let dav = resp
                .headers()
                .get("dav")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("1,2")
                .to_string();
            if !dav.contains("calendar-access") {
                resp.headers_mut()
                    .insert("dav", format!("{},calendar-access", dav).parse().unwrap());
            }
            let allow = resp
                .headers()
                .get("allow")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            if !allow.contains("MKCALENDAR") {
                let value = if allow.is_empty() {
                    "MKCALENDAR".to_string()
                } else {
                    format!("{},MKCALENDAR", allow)
                };
                resp.headers_mut().insert("allow", value.parse().unwrap());
            }
            resp
        }
        .boxed()
    }

    fn after_propfind<'a>(&'a self, req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        async move {
            if !is_multistatus(&resp) {
                return resp;
            }
            let mut resp = resp;
            let body = match resp.body().as_str() {
                Some(s) => s.to_string(),
                None => return resp,
            };
            let want_home_set = match xmlscan::propfind_mode(&req.body) {
                xmlscan::PropfindMode::Prop(keys) => {
                    keys.iter().any(|k| k.ends_with("calendar-home-set"))
                },
                _ => false,
            };
            let mut out = String::with_capacity(body.len());
            let mut last = 0;
            for m in RESPONSE_BLOCK.find_iter(&body) {
                out.push_str(&body[last..m.start()]);
                out.push_str(&self.transform_block(m.as_str(), want_home_set).await);
                last = m.end();
            }
            out.push_str(&body[last..]);
            *resp.body_mut() = Body::from(out);
            resp
        }
        .boxed()
    }
}
