use http::{Response, StatusCode};

use crate::body::Body;
use crate::conditional::require_lock_ok;
use crate::davhandler::DavInner;
use crate::hooks::HookRequest;
use crate::statestore::PropMap;
use crate::xmlscan;
use crate::DavResult;

impl DavInner {
    // ORDERPATCH: persist an explicit child order for a collection. The
    // list is not validated against actual children; apply_order ignores
    // unknown names.
    pub(crate) async fn handle_orderpatch(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;

        let names = xmlscan::orderpatch_names(&req.body);
        if names.is_empty() {
            return Err(StatusCode::BAD_REQUEST.into());
        }

        if !require_lock_ok(&self.store, path, &req.headers).await {
            return Err(StatusCode::LOCKED.into());
        }
        match self.fs.stat(path).await {
            Ok(s) if s.is_dir() => {},
            _ => return Err(StatusCode::CONFLICT.into()),
        }

        self.store.set_order(path, &names).await?;
        // mirror as a CSV dead property for interoperability.
        let mut patch = PropMap::new();
        patch.insert("Z:order".to_string(), names.join(","));
        self.store.merge_props(path, &patch, &[]).await?;

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::OK;
        res.headers_mut().insert("content-length", "0".parse().unwrap());
        Ok(res)
    }
}
