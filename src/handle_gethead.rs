use headers::HeaderMapExt;
use http::{Response, StatusCode};
use uuid::Uuid;

use crate::body::Body;
use crate::davhandler::DavInner;
use crate::davheaders;
use crate::fs::FileStat;
use crate::hooks::HookRequest;
use crate::util::systemtime_to_httpdate;
use crate::DavResult;

// one parsed, clamped byte range.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ByteRange {
    start: u64,
    end:   u64, // inclusive
}

// `bytes=a-b,c-,-n`; None on any malformed token (caller falls back to 200).
fn parse_ranges(value: &str, total: u64) -> Option<Vec<ByteRange>> {
    if total == 0 {
        return None;
    }
    let list = value.trim().strip_prefix("bytes=")?;
    let mut out = Vec::new();
    for token in list.split(',') {
        let token = token.trim();
        let dash = token.find('-')?;
        let (left, right) = token.split_at(dash);
        let right = &right[1..];
        let range = match (left.is_empty(), right.is_empty()) {
            (false, false) => {
                let start = left.parse::<u64>().ok()?;
                let end = right.parse::<u64>().ok()?;
                if start > end {
                    return None;
                }
                ByteRange { start, end }
            },
            (false, true) => ByteRange { start: left.parse::<u64>().ok()?, end: total - 1 },
            (true, false) => {
                let n = right.parse::<u64>().ok()?;
                if n == 0 {
                    return None;
                }
                ByteRange { start: total.saturating_sub(n), end: total - 1 }
            },
            (true, true) => return None,
        };
        // clamp to [0, total-1].
        let start = range.start.min(total - 1);
        let end = range.end.min(total - 1);
        if start > end {
            return None;
        }
        out.push(ByteRange { start, end });
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn content_type_of(stat: &FileStat) -> String {
    stat.mime.clone().unwrap_or_else(|| "application/octet-stream".to_string())
}

impl DavInner {
    pub(crate) async fn handle_get(&self, req: &HookRequest, head: bool) -> DavResult<Response<Body>> {
        let path = &req.path;

        // versioned read.
        if let Some(vid) = req.headers.typed_get::<davheaders::XVersionId>() {
            return match self.store.read_version(path, vid.0.trim()).await {
                Some((data, mime)) => {
                    let mut res = Response::new(Body::empty());
                    *res.status_mut() = StatusCode::OK;
                    let ct = mime.unwrap_or_else(|| "application/octet-stream".to_string());
                    res.headers_mut().insert("content-type", ct.parse().unwrap());
                    res.headers_mut()
                        .insert("content-length", data.len().to_string().parse().unwrap());
                    if !head {
                        *res.body_mut() = Body::from(data);
                    }
                    Ok(res)
                },
                None => Err(StatusCode::NOT_FOUND.into()),
            };
        }

        let stat = match self.fs.stat(path).await {
            Ok(s) => s,
            Err(_) => return Err(StatusCode::NOT_FOUND.into()),
        };

        if stat.is_dir() {
            return self.handle_dirlist(req, head).await;
        }

        let data = self.fs.read_file(path).await?;
        let total = data.len() as u64;

        let mut res = Response::new(Body::empty());
        res.headers_mut().insert("accept-ranges", "bytes".parse().unwrap());
        res.headers_mut().insert("etag", stat.etag().parse().unwrap());
        if let Some(mtime) = stat.mtime {
            res.headers_mut()
                .insert("last-modified", systemtime_to_httpdate(mtime).parse().unwrap());
        }

        let ranges = req
            .header("range")
            .and_then(|v| parse_ranges(v, total));

        match ranges {
            Some(ranges) if ranges.len() == 1 => {
                let r = ranges[0];
                *res.status_mut() = StatusCode::PARTIAL_CONTENT;
                res.headers_mut().insert(
                    "content-range",
                    format!("bytes {}-{}/{}", r.start, r.end, total).parse().unwrap(),
                );
                res.headers_mut()
                    .insert("content-type", content_type_of(&stat).parse().unwrap());
                let part = data.slice(r.start as usize..(r.end + 1) as usize);
                res.headers_mut()
                    .insert("content-length", part.len().to_string().parse().unwrap());
                if !head {
                    *res.body_mut() = Body::from(part);
                }
            },
            Some(ranges) => {
                // multipart/byteranges with a fresh boundary per response.
                let boundary = Uuid::new_v4().simple().to_string();
                let ct = content_type_of(&stat);
                let mut out = Vec::new();
                for r in &ranges {
                    out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
                    out.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
                    out.extend_from_slice(
                        format!("Content-Range: bytes {}-{}/{}\r\n\r\n", r.start, r.end, total).as_bytes(),
                    );
                    out.extend_from_slice(&data.slice(r.start as usize..(r.end + 1) as usize));
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
                *res.status_mut() = StatusCode::PARTIAL_CONTENT;
                res.headers_mut().insert(
                    "content-type",
                    format!("multipart/byteranges; boundary={}", boundary).parse().unwrap(),
                );
                res.headers_mut()
                    .insert("content-length", out.len().to_string().parse().unwrap());
                if !head {
                    *res.body_mut() = Body::from(out);
                }
            },
            None => {
                *res.status_mut() = StatusCode::OK;
                res.headers_mut()
                    .insert("content-type", content_type_of(&stat).parse().unwrap());
                res.headers_mut()
                    .insert("content-length", total.to_string().parse().unwrap());
                if !head {
                    *res.body_mut() = Body::from(data);
                }
            },
        }

        Ok(res)
    }

    // directory index, children in stored order and ignore-filtered.
    pub(crate) async fn handle_dirlist(&self, req: &HookRequest, head: bool) -> DavResult<Response<Body>> {
        let path = &req.path;
        let names = self.fs.read_dir(path).await?;
        let names = self.ignore.filter_names(names);
        let names = self.store.apply_order(path, names).await;

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::OK;
        res.headers_mut()
            .insert("content-type", "text/html; charset=utf-8".parse().unwrap());
        if head {
            return Ok(res);
        }

        let upath = htmlescape::encode_minimal(&path.href(true, &req.prefix));
        let mut w = String::new();
        w.push_str("<html><head>");
        w.push_str(&format!("<title>Index of {}</title>", upath));
        w.push_str("</head><body>");
        w.push_str(&format!("<h1>Index of {}</h1>", upath));
        w.push_str("<table>");
        w.push_str("<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>");
        w.push_str("<tr><td><a href=\"..\">Parent Directory</a></td><td>&nbsp;</td><td>[DIR]</td></tr>");

        for name in &names {
            let npath = path.join(name);
            let meta = match self.fs.stat(&npath).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let modified = meta.mtime.map(systemtime_to_httpdate).unwrap_or_default();
            let size = if meta.is_file() {
                meta.size.to_string()
            } else {
                "[DIR]".to_string()
            };
            let label = htmlescape::encode_minimal(name);
            w.push_str(&format!(
                "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
                npath.href(meta.is_dir(), &req.prefix),
                label,
                modified,
                size
            ));
        }
        w.push_str("</table></body></html>");

        res.headers_mut()
            .insert("content-length", w.len().to_string().parse().unwrap());
        *res.body_mut() = Body::from(w);
        Ok(res)
    }
}
