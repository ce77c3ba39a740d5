use http::{Response, StatusCode};

use crate::body::Body;
use crate::davhandler::DavInner;
use crate::hooks::HookRequest;
use crate::util::ALL_METHODS;
use crate::DavResult;

impl DavInner {
    // methods we answer for, as an Allow: value.
    pub(crate) fn allow_value(&self) -> String {
        let v: Vec<&str> = ALL_METHODS
            .iter()
            .filter(|m| self.allow.contains(**m))
            .map(|m| m.as_str())
            .collect();
        v.join(",")
    }

    pub(crate) async fn handle_options(&self, _req: &HookRequest) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::OK;
        res.headers_mut().insert("dav", "1,2".parse().unwrap());
        res.headers_mut().insert("ms-author-via", "DAV".parse().unwrap());
        res.headers_mut().insert("allow", self.allow_value().parse().unwrap());
        res.headers_mut().insert("content-length", "0".parse().unwrap());
        Ok(res)
    }
}
