use http::{Response, StatusCode};

use crate::body::Body;
use crate::davhandler::DavInner;
use crate::hooks::HookRequest;
use crate::multistatus::{multistatus_response, XmlWriter};
use crate::xmlscan::{self, ReportKind};
use crate::DavResult;

impl DavInner {
    // Core REPORT: the version tree. CalDAV reports are answered by the
    // beforeReport hook, which runs before this.
    pub(crate) async fn handle_report(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        match xmlscan::report_kind(&req.body) {
            ReportKind::VersionTree => self.report_version_tree(req).await,
            _ => Err(StatusCode::BAD_REQUEST.into()),
        }
    }

    async fn report_version_tree(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let path = &req.path;
        if !self.fs.exists(path).await.unwrap_or(false) {
            return Err(StatusCode::NOT_FOUND.into());
        }
        let versions = self.store.list_versions(path).await;

        let mut xw = XmlWriter::multistatus(&[])?;
        let href = path.href(false, &self.prefix);
        for v in versions {
            xw.start("D:response")?;
            xw.text_element("D:href", &href)?;
            xw.start("D:propstat")?;
            xw.start("D:prop")?;
            xw.text_element("Z:version-id", &v.id)?;
            xw.text_element("Z:size", &v.size.to_string())?;
            xw.text_element("Z:createdAt", &v.created_at)?;
            xw.end()?;
            xw.status_element(StatusCode::OK)?;
            xw.end()?;
            xw.end()?;
        }

        Ok(multistatus_response(xw.finish()?))
    }
}
