use std::collections::VecDeque;

use http::{Response, StatusCode};

use crate::body::Body;
use crate::davhandler::DavInner;
use crate::davpath::DavPath;
use crate::hooks::HookRequest;
use crate::multistatus::{multistatus_response, XmlWriter};
use crate::xmlscan;
use crate::DavResult;

impl DavInner {
    // SEARCH: minimal filename-contains query over the subtree.
    pub(crate) async fn handle_search(&self, req: &HookRequest) -> DavResult<Response<Body>> {
        let needle = match xmlscan::search_contains(&req.body) {
            Some(n) => n.to_lowercase(),
            None => return Err(StatusCode::BAD_REQUEST.into()),
        };

        let mut xw = XmlWriter::multistatus(&[])?;
        let mut queue: VecDeque<DavPath> = VecDeque::new();
        queue.push_back(req.path.clone());
        while let Some(dir) = queue.pop_front() {
            let names = match self.fs.read_dir(&dir).await {
                Ok(n) => n,
                Err(_) => continue,
            };
            for name in self.ignore.filter_names(names) {
                let child = dir.join(&name);
                let stat = match self.fs.stat(&child).await {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                if stat.is_dir() {
                    queue.push_back(child);
                    continue;
                }
                if name.to_lowercase().contains(&needle) {
                    xw.start("D:response")?;
                    xw.text_element("D:href", &child.href(false, &self.prefix))?;
                    xw.status_element(StatusCode::OK)?;
                    xw.end()?;
                }
            }
        }

        Ok(multistatus_response(xw.finish()?))
    }
}
