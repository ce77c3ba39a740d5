use std::collections::{HashMap, VecDeque};

use headers::HeaderMapExt;
use http::{Response, StatusCode};

use crate::body::Body;
use crate::conditional::{etag_matches_if_header, require_lock_ok};
use crate::davhandler::DavInner;
use crate::davheaders::Depth;
use crate::davpath::DavPath;
use crate::dialect::DialectCtx;
use crate::fs::{FileStat, PersistAdapter};
use crate::hooks::HookRequest;
use crate::multistatus::{multistatus_response, XmlWriter};
use crate::quota::{quota_limit, used_bytes};
use crate::statestore::PropMap;
use crate::util::systemtime_to_rfc3339;
use crate::xmlscan::{self, PropfindMode};
use crate::DavResult;

// live properties computed from storage.
const LIVE_PROPS: &[&str] = &[
    "displayname",
    "getcontentlength",
    "resourcetype",
    "getlastmodified",
    "getetag",
    "quota-used-bytes",
    "quota-available-bytes",
];

// default set served by allprop and listed by propname.
const DEFAULT_PROPS: &[&str] = &[
    "D:displayname",
    "D:getcontentlength",
    "D:resourcetype",
    "D:getlastmodified",
    "D:getetag",
];

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

fn prefix_of(qname: &str) -> Option<&str> {
    qname.rsplit_once(':').map(|(p, _)| p)
}

// a computed property value, ready to emit.
enum PropValue {
    Text(String),
    ResourceType { collection: bool },
    Empty,
}

// dedupe stat calls within one traversal.
struct StatMemo {
    stats: HashMap<String, FileStat>,
}

impl StatMemo {
    fn new() -> StatMemo {
        StatMemo { stats: HashMap::new() }
    }

    async fn get(&mut self, fs: &dyn PersistAdapter, path: &DavPath) -> Option<FileStat> {
        let key = path.as_url_string();
        if let Some(s) = self.stats.get(&key) {
            return Some(s.clone());
        }
        match fs.stat(path).await {
            Ok(s) => {
                self.stats.insert(key, s.clone());
                Some(s)
            },
            Err(_) => None,
        }
    }
}

struct PropWriter<'a> {
    inner:     &'a DavInner,
    xw:        XmlWriter,
    mode:      PropfindMode,
    prefix:    &'a str,
    // quota figures resolved at most once per request.
    limit:     Option<Option<u64>>,
    used_root: Option<u64>,
}

impl<'a> PropWriter<'a> {
    fn new(inner: &'a DavInner, mode: PropfindMode, prefix: &'a str) -> DavResult<PropWriter<'a>> {
        Ok(PropWriter {
            inner,
            xw: XmlWriter::multistatus(extra_namespaces(inner))?,
            mode,
            prefix,
            limit: None,
            used_root: None,
        })
    }

    async fn quota_limit(&mut self) -> Option<u64> {
        if self.limit.is_none() {
            self.limit = Some(quota_limit(&self.inner.store).await);
        }
        self.limit.unwrap()
    }

    async fn used_root(&mut self) -> u64 {
        if self.used_root.is_none() {
            self.used_root =
                Some(used_bytes(&*self.inner.fs, &self.inner.ignore, &DavPath::root()).await);
        }
        self.used_root.unwrap()
    }

    async fn live_prop(&mut self, local: &str, path: &DavPath, stat: &FileStat) -> Option<PropValue> {
        match local {
            "displayname" => Some(PropValue::Text(path.file_name().to_string())),
            "getcontentlength" => {
                let len = if stat.is_dir() { 0 } else { stat.size };
                Some(PropValue::Text(len.to_string()))
            },
            "resourcetype" => Some(PropValue::ResourceType { collection: stat.is_dir() }),
            "getlastmodified" => Some(PropValue::Text(
                stat.mtime.map(systemtime_to_rfc3339).unwrap_or_default(),
            )),
            "getetag" => Some(PropValue::Text(stat.etag())),
            "quota-used-bytes" => {
                let used = used_bytes(&*self.inner.fs, &self.inner.ignore, path).await;
                Some(PropValue::Text(used.to_string()))
            },
            "quota-available-bytes" => {
                let limit = self.quota_limit().await?;
                let used = self.used_root().await;
                Some(PropValue::Text(limit.saturating_sub(used).to_string()))
            },
            _ => None,
        }
    }

    fn emit(&mut self, qname: &str, value: &PropValue) -> DavResult<()> {
        match value {
            PropValue::Text(t) => self.xw.text_element(qname, t),
            PropValue::ResourceType { collection } => {
                self.xw.start(qname)?;
                if *collection {
                    self.xw.empty_element("D:collection")?;
                }
                self.xw.end()
            },
            PropValue::Empty => self.xw.empty_element(qname),
        }
    }

    fn emit_propstat(&mut self, status: StatusCode, props: &[(String, PropValue)]) -> DavResult<()> {
        self.xw.start("D:propstat")?;
        self.xw.start("D:prop")?;
        for (qname, value) in props {
            self.emit(qname, value)?;
        }
        self.xw.end()?;
        self.xw.status_element(status)?;
        self.xw.end()
    }

    async fn write_entity(&mut self, path: &DavPath, stat: &FileStat) -> DavResult<()> {
        let dead: PropMap = self.inner.store.get_props(path).await;

        let mut found: Vec<(String, PropValue)> = Vec::new();
        let mut missing: Vec<(String, PropValue)> = Vec::new();

        match self.mode.clone() {
            PropfindMode::Propname => {
                for qname in DEFAULT_PROPS {
                    found.push((qname.to_string(), PropValue::Empty));
                }
                for qname in dead.keys() {
                    if !is_live_qname(qname) {
                        found.push((qname.clone(), PropValue::Empty));
                    }
                }
            },
            PropfindMode::Allprop => {
                for qname in DEFAULT_PROPS {
                    if let Some(v) = self.live_prop(local_name(qname), path, stat).await {
                        found.push((qname.to_string(), v));
                    }
                }
                for (qname, value) in &dead {
                    if !is_live_qname(qname) {
                        found.push((qname.clone(), PropValue::Text(value.clone())));
                    }
                }
            },
            PropfindMode::Prop(keys) => {
                for qname in keys {
                    let is_dav = matches!(prefix_of(&qname), Some("D") | None);
                    if is_dav && LIVE_PROPS.contains(&local_name(&qname)) {
                        match self.live_prop(local_name(&qname), path, stat).await {
                            Some(v) => found.push((qname, v)),
                            None => missing.push((qname, PropValue::Empty)),
                        }
                        continue;
                    }
                    match dead.get(&qname) {
                        Some(value) => found.push((qname, PropValue::Text(value.clone()))),
                        None => missing.push((qname, PropValue::Empty)),
                    }
                }
            },
        }

        self.xw.start("D:response")?;
        let href = path.href(stat.is_dir(), self.prefix);
        self.xw.text_element("D:href", &href)?;
        self.emit_propstat(StatusCode::OK, &found)?;
        if !missing.is_empty() {
            self.emit_propstat(StatusCode::NOT_FOUND, &missing)?;
        }
        self.xw.end()
    }

    fn finish(self) -> DavResult<bytes::Bytes> {
        self.xw.finish()
    }
}

// a dead-prop key that shadows a live property is never listed; the live
// value wins.
fn is_live_qname(qname: &str) -> bool {
    matches!(prefix_of(qname), Some("D") | None) && LIVE_PROPS.contains(&local_name(qname))
}

// the C prefix shows up in requests and dead-prop keys once CalDAV is on.
fn extra_namespaces(inner: &DavInner) -> &'static [(&'static str, &'static str)] {
    if inner.caldav {
        &[("C", crate::multistatus::NS_CALDAV_URI)]
    } else {
        &[]
    }
}

impl DavInner {
    pub(crate) async fn handle_propfind(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;
        let depth = req.headers.typed_get::<Depth>().unwrap_or(Depth::One);
        let mode = xmlscan::propfind_mode(&req.body);
        trace!("propfind: type request: {:?}", mode);

        let mut memo = StatMemo::new();
        let stat = match memo.get(&*self.fs, path).await {
            Some(s) => s,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };

        let mut pw = PropWriter::new(self, mode, &self.prefix)?;
        pw.write_entity(path, &stat).await?;

        if stat.is_dir() && depth != Depth::Zero {
            let mut queue: VecDeque<DavPath> = VecDeque::new();
            queue.push_back(path.clone());
            while let Some(dir) = queue.pop_front() {
                let names = match self.fs.read_dir(&dir).await {
                    Ok(n) => n,
                    Err(e) => {
                        // if we cannot read_dir, just skip it.
                        error!("read_dir error on {}: {:?}", dir, e);
                        continue;
                    },
                };
                let names = self.ignore.filter_names(names);
                let names = self.store.apply_order(&dir, names).await;
                for name in names {
                    let child = dir.join(&name);
                    let cstat = match memo.get(&*self.fs, &child).await {
                        Some(s) => s,
                        None => continue,
                    };
                    pw.write_entity(&child, &cstat).await?;
                    if depth == Depth::Infinity && cstat.is_dir() {
                        queue.push_back(child);
                    }
                }
            }
        }

        let body = pw.finish()?;
        let mut res = multistatus_response(body);
        res.headers_mut()
            .typed_insert(headers::CacheControl::new().with_no_cache());
        res.headers_mut().typed_insert(headers::Pragma::no_cache());
        Ok(res)
    }

    pub(crate) async fn handle_proppatch(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;

        let stat = self
            .fs
            .stat(path)
            .await
            .map_err(|_| StatusCode::NOT_FOUND)?;

        // lock precondition, with the Office waiver.
        let lock_ok = require_lock_ok(&self.store, path, &req.headers).await;
        let ctx = DialectCtx {
            method:     req.method,
            path,
            user_agent: req.user_agent(),
            headers:    &req.headers,
        };
        if !self.dialects.lock_ok_for_proppatch(&ctx, lock_ok) {
            return Err(StatusCode::LOCKED.into());
        }
        if !etag_matches_if_header(&*self.fs, path, &req.headers).await {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }

        let (sets, removes) = xmlscan::proppatch_ops(&req.body);
        let existing = self.store.get_props(path).await;

        let mut patch = PropMap::new();
        let mut applied: Vec<String> = Vec::new();
        for (k, v) in sets {
            applied.push(k.clone());
            patch.insert(k, v);
        }
        let mut removed_present: Vec<String> = Vec::new();
        let mut removed_missing: Vec<String> = Vec::new();
        for k in &removes {
            if existing.contains_key(k) {
                removed_present.push(k.clone());
            } else {
                removed_missing.push(k.clone());
            }
        }
        self.store.merge_props(path, &patch, &removes).await?;

        let mut xw = XmlWriter::multistatus(extra_namespaces(self))?;
        xw.start("D:response")?;
        xw.text_element("D:href", &path.href(stat.is_dir(), &self.prefix))?;
        xw.start("D:propstat")?;
        xw.start("D:prop")?;
        for k in applied.iter().chain(removed_present.iter()) {
            xw.empty_element(k)?;
        }
        xw.end()?;
        xw.status_element(StatusCode::OK)?;
        xw.end()?;
        if !removed_missing.is_empty() {
            xw.start("D:propstat")?;
            xw.start("D:prop")?;
            for k in &removed_missing {
                xw.empty_element(k)?;
            }
            xw.end()?;
            xw.status_element(StatusCode::NOT_FOUND)?;
            xw.end()?;
        }
        xw.end()?;

        Ok(multistatus_response(xw.finish()?))
    }
}
