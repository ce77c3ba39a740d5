use headers::HeaderMapExt;
use http::{Response, StatusCode};

use crate::body::Body;
use crate::conditional::{etag_matches_if_header, require_lock_ok};
use crate::davhandler::DavInner;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::hooks::{HookRequest, PutPayload};
use crate::quota::{quota_limit, used_bytes};
use crate::DavResult;

impl DavInner {
    pub(crate) async fn handle_put(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;

        // partial writes are not supported.
        if req.headers.contains_key("content-range") {
            return Err(StatusCode::NOT_IMPLEMENTED.into());
        }

        let content_type = req
            .headers
            .typed_get::<davheaders::ContentType>()
            .map(|ct| ct.0)
            .or_else(|| {
                mime_guess::from_path(path.file_name())
                    .first_raw()
                    .map(|m| m.to_string())
            });
        let mut payload = PutPayload {
            data: req.body.clone(),
            content_type,
        };
        if let Some(resp) = self.hooks.before_put(req, &mut payload).await {
            return Ok(resp);
        }

        if !require_lock_ok(&self.store, path, &req.headers).await {
            return Err(StatusCode::LOCKED.into());
        }
        if !etag_matches_if_header(&*self.fs, path, &req.headers).await {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }

        // quota check before any byte lands.
        if let Some(limit) = quota_limit(&self.store).await {
            let used = used_bytes(&*self.fs, &self.ignore, &DavPath::root()).await;
            let existing = match self.fs.stat(path).await {
                Ok(s) if s.is_file() => s.size,
                _ => 0,
            };
            let grow = (payload.data.len() as u64).saturating_sub(existing);
            if used + grow > limit {
                return Err(StatusCode::INSUFFICIENT_STORAGE.into());
            }
        }

        self.fs.ensure_dir(&path.parent()).await?;
        self.fs
            .write_file(path, payload.data.clone(), payload.content_type.as_deref())
            .await?;
        self.store
            .record_version(path, &payload.data, payload.content_type.as_deref())
            .await?;

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::CREATED;
        res.headers_mut().insert(
            "content-length",
            payload.data.len().to_string().parse().unwrap(),
        );
        if let Some(ct) = payload.content_type.as_deref() {
            if let Ok(v) = ct.parse() {
                res.headers_mut().insert("content-type", v);
            }
        }
        Ok(res)
    }
}
