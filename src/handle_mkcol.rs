use http::{Response, StatusCode};

use crate::body::Body;
use crate::conditional::require_lock_ok;
use crate::davhandler::DavInner;
use crate::handle_caldav::calendar_default_props;
use crate::hooks::HookRequest;
use crate::statestore::PropMap;
use crate::xmlscan;
use crate::DavResult;

impl DavInner {
    // MKCOL, and MKCALENDAR which layers calendar defaults on top.
    pub(crate) async fn handle_mkcol(&self, req: &HookRequest, calendar: bool) -> DavResult<Response<Body>> {
        let path = &req.path;

        if path.is_root() {
            return Err(StatusCode::FORBIDDEN.into());
        }

        // extended MKCOL body must be XML.
        if !req.body.is_empty() {
            let ct = req.header("content-type").unwrap_or("");
            if !ct.contains("xml") {
                return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
            }
        }
        let body_props = xmlscan::mkcol_props(&req.body);

        if !require_lock_ok(&self.store, path, &req.headers).await {
            return Err(StatusCode::LOCKED.into());
        }
        if self.fs.exists(path).await.unwrap_or(false) {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }
        match self.fs.stat(&path.parent()).await {
            Ok(s) if s.is_dir() => {},
            _ => return Err(StatusCode::CONFLICT.into()),
        }

        self.fs.ensure_dir(path).await?;

        let mut props = PropMap::new();
        for (k, v) in body_props {
            props.insert(k, v);
        }
        if calendar {
            for (k, v) in calendar_default_props() {
                props.entry(k).or_insert(v);
            }
        }
        if !props.is_empty() {
            self.store.set_props(path, props).await?;
        }

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::CREATED;
        res.headers_mut().insert("content-length", "0".parse().unwrap());
        Ok(res)
    }
}
