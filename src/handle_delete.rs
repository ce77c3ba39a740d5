use http::{Response, StatusCode};

use crate::body::Body;
use crate::conditional::{etag_matches_if_header, require_lock_ok};
use crate::davhandler::DavInner;
use crate::hooks::HookRequest;
use crate::DavResult;

impl DavInner {
    // DELETE, and UNBIND which shares its semantics.
    pub(crate) async fn handle_delete(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;

        if !require_lock_ok(&self.store, path, &req.headers).await {
            return Err(StatusCode::LOCKED.into());
        }
        if !etag_matches_if_header(&*self.fs, path, &req.headers).await {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }
        if !self.fs.exists(path).await.unwrap_or(false) {
            return Err(StatusCode::NOT_FOUND.into());
        }

        self.fs.remove(path, true).await?;

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::NO_CONTENT;
        res.headers_mut().insert("content-length", "0".parse().unwrap());
        Ok(res)
    }
}
