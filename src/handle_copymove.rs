use headers::HeaderMapExt;
use http::{Response, StatusCode};

use crate::body::Body;
use crate::conditional::{etag_matches_if_header, require_lock_ok};
use crate::davhandler::DavInner;
use crate::davheaders::{self, Depth, Overwrite};
use crate::davpath::DavPath;
use crate::dialect::DialectCtx;
use crate::hooks::HookRequest;
use crate::util::DavMethod;
use crate::DavResult;

impl DavInner {
    // COPY and MOVE, plus the bind family: BIND is a COPY whose source
    // comes from the Source: header, REBIND a MOVE.
    pub(crate) async fn handle_copymove(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let (source, dest) = match req.method {
            DavMethod::Bind => {
                let src = req
                    .headers
                    .typed_get::<davheaders::Source>()
                    .ok_or(StatusCode::BAD_REQUEST)?;
                let src = DavPath::from_destination(&src.0, &self.prefix)
                    .map_err(|_| StatusCode::BAD_REQUEST)?;
                (src, req.path.clone())
            },
            _ => {
                let dst = req
                    .headers
                    .typed_get::<davheaders::Destination>()
                    .ok_or(StatusCode::BAD_REQUEST)?;
                let dst = DavPath::from_destination(&dst.0, &self.prefix)
                    .map_err(|_| StatusCode::BAD_REQUEST)?;
                (req.path.clone(), dst)
            },
        };
        let is_move = matches!(req.method, DavMethod::Move | DavMethod::Rebind);

        // source must exist.
        let meta = self
            .fs
            .stat(&source)
            .await
            .map_err(|_| StatusCode::NOT_FOUND)?;

        // collection moves need Depth: infinity, unless a client dialect
        // says otherwise.
        if meta.is_dir() {
            let depth_ok = req.headers.typed_get::<Depth>() == Some(Depth::Infinity);
            let ctx = DialectCtx {
                method:     req.method,
                path:       &req.path,
                user_agent: req.user_agent(),
                headers:    &req.headers,
            };
            if !self.dialects.depth_ok_for_dir_ops(&ctx, depth_ok) {
                return Err(StatusCode::BAD_REQUEST.into());
            }
        }

        let overwrite = req.headers.typed_get::<Overwrite>().map(|o| o.0).unwrap_or(true);
        let existed = self.fs.exists(&dest).await.unwrap_or(false);
        if existed && !overwrite {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }
        if source == dest {
            return Err(StatusCode::FORBIDDEN.into());
        }

        // locks gate both ends, the ETag precondition only the source.
        if !require_lock_ok(&self.store, &source, &req.headers).await
            || !require_lock_ok(&self.store, &dest, &req.headers).await
        {
            return Err(StatusCode::LOCKED.into());
        }
        if !etag_matches_if_header(&*self.fs, &source, &req.headers).await {
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }

        match self.fs.stat(&dest.parent()).await {
            Ok(s) if s.is_dir() => {},
            _ => return Err(StatusCode::CONFLICT.into()),
        }

        if existed {
            self.fs.remove(&dest, true).await?;
        }
        if is_move {
            self.fs.rename(&source, &dest).await?;
            // the moved path's own lock does not follow it.
            if let Some(lock) = self.store.get_lock(&source).await {
                self.store.release_lock(&source, Some(&lock.token)).await.ok();
            }
        } else {
            self.fs.copy(&source, &dest).await?;
        }

        let mut res = Response::new(Body::empty());
        *res.status_mut() = if existed {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        };
        res.headers_mut().insert("content-length", "0".parse().unwrap());
        Ok(res)
    }
}
