use http::{Response, StatusCode};
use uuid::Uuid;

use crate::body::Body;
use crate::conditional::submitted_lock_tokens;
use crate::davhandler::DavInner;
use crate::hooks::HookRequest;
use crate::multistatus::{XmlWriter, NS_DAV_URI};
use crate::DavResult;

impl DavInner {
    // Exclusive write locks only; no refresh, no depth, no locking of
    // unmapped paths.
    pub(crate) async fn handle_lock(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;

        if !self.fs.exists(path).await.unwrap_or(false) {
            return Err(StatusCode::NOT_FOUND.into());
        }

        let lock = match self.store.get_lock(path).await {
            Some(existing) => existing,
            None => {
                let token = format!("opaquelocktoken:{}", Uuid::new_v4());
                self.store.set_lock(path, &token).await?
            },
        };

        let mut xw = XmlWriter::new("D:prop", &[("D", NS_DAV_URI)])?;
        xw.start("D:lockdiscovery")?;
        xw.start("D:activelock")?;
        xw.start("D:locktype")?;
        xw.empty_element("D:write")?;
        xw.end()?;
        xw.start("D:lockscope")?;
        xw.empty_element("D:exclusive")?;
        xw.end()?;
        xw.start("D:locktoken")?;
        xw.text_element("D:href", &lock.token)?;
        xw.end()?;
        let body = xw.finish()?;

        let mut res = Response::new(Body::from(body));
        *res.status_mut() = StatusCode::OK;
        res.headers_mut()
            .insert("content-type", "application/xml; charset=utf-8".parse().unwrap());
        res.headers_mut()
            .insert("lock-token", format!("<{}>", lock.token).parse().unwrap());
        Ok(res)
    }

    pub(crate) async fn handle_unlock(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;
        let tokens = submitted_lock_tokens(&req.headers);
        let token = tokens.first().map(|s| s.as_str());
        if self.store.release_lock(path, token).await? {
            let mut res = Response::new(Body::empty());
            *res.status_mut() = StatusCode::NO_CONTENT;
            res.headers_mut().insert("content-length", "0".parse().unwrap());
            Ok(res)
        } else {
            Err(StatusCode::CONFLICT.into())
        }
    }
}
