use bytes::Bytes;
use dav_engine::body::Body;
use dav_engine::fs::PersistAdapter;
use dav_engine::memfs::MemFs;
use dav_engine::davpath::DavPath;
use dav_engine::DavHandler;
use http::{Request, Response, StatusCode};

fn setup() -> DavHandler {
    DavHandler::builder().filesystem(MemFs::new()).build_handler()
}

async fn req(
    server: &DavHandler,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let request = builder.body(Bytes::from(body.to_string())).unwrap();
    server.handle(request).await
}

fn text(resp: &Response<Body>) -> String {
    resp.body().as_str().unwrap_or("").to_string()
}

fn header<'r>(resp: &'r Response<Body>, name: &str) -> &'r str {
    resp.headers().get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

#[tokio::test]
async fn test_put_get_etag() {
    let server = setup();

    let resp = req(&server, "PUT", "/file.txt", &[], "hello").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(header(&resp, "content-length"), "5");

    let resp = req(&server, "HEAD", "/file.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header(&resp, "etag").starts_with("W/\"5-"));
    assert!(resp.body().is_empty());

    let resp = req(&server, "GET", "/file.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(&resp), "hello");
    assert_eq!(header(&resp, "accept-ranges"), "bytes");
}

#[tokio::test]
async fn test_etag_stable_and_changes() {
    let server = setup();
    req(&server, "PUT", "/e.txt", &[], "hello").await;

    let a = req(&server, "GET", "/e.txt", &[], "").await;
    let b = req(&server, "HEAD", "/e.txt", &[], "").await;
    assert_eq!(header(&a, "etag"), header(&b, "etag"));

    req(&server, "PUT", "/e.txt", &[], "hello world").await;
    let c = req(&server, "GET", "/e.txt", &[], "").await;
    assert_ne!(header(&a, "etag"), header(&c, "etag"));
}

#[tokio::test]
async fn test_lock_cycle() {
    let server = setup();

    let resp = req(&server, "PUT", "/l.txt", &[], "x").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "LOCK", "/l.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = header(&resp, "lock-token")
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string();
    assert!(token.starts_with("opaquelocktoken:"));

    // same token again on a second LOCK.
    let resp = req(&server, "LOCK", "/l.txt", &[], "").await;
    assert_eq!(
        header(&resp, "lock-token").trim_start_matches('<').trim_end_matches('>'),
        token
    );

    let resp = req(&server, "PUT", "/l.txt", &[], "y").await;
    assert_eq!(resp.status(), StatusCode::LOCKED);

    let ifh = format!("(<{}>)", token);
    let resp = req(&server, "PUT", "/l.txt", &[("if", &ifh)], "y").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "UNLOCK", "/l.txt", &[("lock-token", "wrong")], "").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let lt = format!("<{}>", token);
    let resp = req(&server, "UNLOCK", "/l.txt", &[("lock-token", &lt)], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = req(&server, "PUT", "/l.txt", &[], "z").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_lock_blocks_other_mutations() {
    let server = setup();
    req(&server, "PUT", "/m.txt", &[], "data").await;
    let resp = req(&server, "LOCK", "/m.txt", &[], "").await;
    let token = header(&resp, "lock-token").to_string();

    let resp = req(&server, "DELETE", "/m.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::LOCKED);

    let resp = req(
        &server,
        "MOVE",
        "/m.txt",
        &[("destination", "http://host/m2.txt")],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::LOCKED);

    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:x"><D:set><D:prop><Z:a>1</Z:a></D:prop></D:set></D:propertyupdate>"#;
    let resp = req(&server, "PROPPATCH", "/m.txt", &[], body).await;
    assert_eq!(resp.status(), StatusCode::LOCKED);

    // with the token everything proceeds.
    let resp = req(&server, "DELETE", "/m.txt", &[("lock-token", &token)], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_dir_move_needs_depth_infinity() {
    let server = setup();

    let resp = req(&server, "MKCOL", "/d", &[], "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "MOVE", "/d", &[("destination", "http://h/d2")], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = req(
        &server,
        "MOVE",
        "/d",
        &[("destination", "http://h/d2"), ("depth", "infinity")],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "PROPFIND", "/", &[("depth", "1")], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let body = text(&resp);
    assert!(body.contains("/d2/"));
    assert!(!body.contains("<D:href>/d/</D:href>"));
}

#[tokio::test]
async fn test_finder_dialect_relaxes_depth() {
    let server = setup();
    req(&server, "MKCOL", "/mac", &[], "").await;
    let resp = req(
        &server,
        "MOVE",
        "/mac",
        &[
            ("destination", "http://h/mac2"),
            ("user-agent", "WebDAVFS/3.0 (03008000) Darwin/19.0"),
        ],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_propfind_prop_mode_unknown_prop() {
    let server = setup();
    req(&server, "PUT", "/a.txt", &[], "xxx").await;

    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop><D:getcontentlength/><Z:unknown xmlns:Z="urn:x"/></D:prop></D:propfind>"#;
    let resp = req(&server, "PROPFIND", "/a.txt", &[("depth", "0")], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let body = text(&resp);
    assert!(body.contains("<D:getcontentlength>3</D:getcontentlength>"));
    assert!(body.contains("Z:unknown"));
    assert!(body.contains("HTTP/1.1 404 Not Found"));
}

#[tokio::test]
async fn test_propfind_depth_responses() {
    let server = setup();
    req(&server, "MKCOL", "/col", &[], "").await;
    req(&server, "PUT", "/col/a", &[], "1").await;
    req(&server, "PUT", "/col/b", &[], "2").await;

    let resp = req(&server, "PROPFIND", "/col", &[("depth", "0")], "").await;
    assert_eq!(text(&resp).matches("<D:response>").count(), 1);

    let resp = req(&server, "PROPFIND", "/col", &[("depth", "1")], "").await;
    assert_eq!(text(&resp).matches("<D:response>").count(), 3);
}

#[tokio::test]
async fn test_allprop_contains_live_props() {
    let server = setup();
    req(&server, "PUT", "/live.txt", &[], "abc").await;
    let resp = req(&server, "PROPFIND", "/live.txt", &[("depth", "0")], "").await;
    let body = text(&resp);
    assert!(body.contains("<D:getlastmodified>"));
    assert!(body.contains("<D:getetag>"));
    assert!(body.contains("<D:displayname>live.txt</D:displayname>"));
}

#[tokio::test]
async fn test_copy_overwrite_semantics() {
    let server = setup();
    req(&server, "PUT", "/src.txt", &[], "source-bytes").await;
    req(&server, "PUT", "/dst.txt", &[], "old").await;

    let resp = req(
        &server,
        "COPY",
        "/src.txt",
        &[("destination", "/dst.txt"), ("overwrite", "F")],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    let resp = req(
        &server,
        "COPY",
        "/src.txt",
        &[("destination", "/dst.txt"), ("overwrite", "T")],
        "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = req(&server, "GET", "/dst.txt", &[], "").await;
    assert_eq!(text(&resp), "source-bytes");
}

#[tokio::test]
async fn test_copymove_requires_destination() {
    let server = setup();
    req(&server, "PUT", "/nodest.txt", &[], "x").await;
    let resp = req(&server, "COPY", "/nodest.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_single_and_multi_range() {
    let server = setup();
    req(&server, "PUT", "/r.txt", &[], "0123456789").await;

    let resp = req(&server, "GET", "/r.txt", &[("range", "bytes=2-5")], "").await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&resp, "content-range"), "bytes 2-5/10");
    assert_eq!(text(&resp), "2345");

    let resp = req(&server, "GET", "/r.txt", &[("range", "bytes=0-1,8-9")], "").await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert!(header(&resp, "content-type").starts_with("multipart/byteranges; boundary="));
    let body = text(&resp);
    assert!(body.contains("Content-Range: bytes 0-1/10"));
    assert!(body.contains("Content-Range: bytes 8-9/10"));
    assert!(body.contains("01"));
    assert!(body.contains("89"));
    assert!(body.trim_end().ends_with("--"));

    // malformed ranges fall back to a full response.
    let resp = req(&server, "GET", "/r.txt", &[("range", "bytes=x-y")], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(&resp), "0123456789");
}

#[tokio::test]
async fn test_quota_limit() {
    let server = setup();

    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:x"><D:set><D:prop><Z:quota-limit-bytes>5</Z:quota-limit-bytes></D:prop></D:set></D:propertyupdate>"#;
    let resp = req(&server, "PROPPATCH", "/", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);

    let resp = req(&server, "PUT", "/a.txt", &[], "xxx").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "PUT", "/b.txt", &[], "xxxx").await;
    assert_eq!(resp.status(), StatusCode::INSUFFICIENT_STORAGE);

    let resp = req(&server, "GET", "/b.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // rewriting an existing file only charges the delta.
    let resp = req(&server, "PUT", "/a.txt", &[], "xxxxx").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_versioning() {
    let server = setup();
    req(&server, "PUT", "/v.txt", &[], "one").await;
    req(&server, "PUT", "/v.txt", &[], "two!").await;
    req(&server, "PUT", "/v.txt", &[], "three").await;

    let body = r#"<D:version-tree xmlns:D="DAV:"/>"#;
    let resp = req(&server, "REPORT", "/v.txt", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let body = text(&resp);
    assert_eq!(body.matches("<Z:version-id>").count(), 3);
    assert!(body.contains("<Z:size>4</Z:size>"));

    let resp = req(&server, "GET", "/v.txt", &[("x-version-id", "1")], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(&resp), "one");

    let resp = req(&server, "GET", "/v.txt", &[("x-version-id", "9")], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_orderpatch_orders_listings() {
    let server = setup();
    req(&server, "MKCOL", "/col", &[], "").await;
    req(&server, "PUT", "/col/a", &[], "1").await;
    req(&server, "PUT", "/col/b", &[], "2").await;
    req(&server, "PUT", "/col/c", &[], "3").await;

    let body = r#"<D:orderpatch xmlns:D="DAV:">
        <D:order-member><D:segment>c</D:segment></D:order-member>
        <D:order-member><D:segment>a</D:segment></D:order-member>
        <D:order-member><D:segment>b</D:segment></D:order-member>
    </D:orderpatch>"#;
    let resp = req(&server, "ORDERPATCH", "/col", &[], body).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = req(&server, "PROPFIND", "/col", &[("depth", "1")], "").await;
    let body = text(&resp);
    let pc = body.find("/col/c").unwrap();
    let pa = body.find("/col/a").unwrap();
    let pb = body.find("/col/b").unwrap();
    assert!(pc < pa && pa < pb);

    let resp = req(&server, "GET", "/col", &[], "").await;
    let body = text(&resp);
    let pc = body.find("/col/c").unwrap();
    let pa = body.find("/col/a").unwrap();
    let pb = body.find("/col/b").unwrap();
    assert!(pc < pa && pa < pb);

    // ORDERPATCH on a file is a conflict.
    let single = r#"<D:orderpatch xmlns:D="DAV:"><D:order-member><D:segment>x</D:segment></D:order-member></D:orderpatch>"#;
    let resp = req(&server, "ORDERPATCH", "/col/a", &[], single).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ignored_paths_hidden() {
    let fs = MemFs::new();
    let p = |s: &str| DavPath::from_request_path(s, "").unwrap();
    fs.write_file(&p("/.DS_Store"), Bytes::from("junk"), None).await.unwrap();
    fs.write_file(&p("/._resource"), Bytes::from("junk"), None).await.unwrap();
    fs.write_file(&p("/real.txt"), Bytes::from("data"), None).await.unwrap();
    let server = DavHandler::builder().filesystem(fs).build_handler();

    let resp = req(&server, "PROPFIND", "/", &[("depth", "1")], "").await;
    let body = text(&resp);
    assert!(!body.contains(".DS_Store"));
    assert!(!body.contains("._resource"));
    assert!(body.contains("real.txt"));

    let resp = req(&server, "GET", "/.DS_Store", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = req(&server, "GET", "/", &[], "").await;
    assert!(!text(&resp).contains(".DS_Store"));

    let resp = req(&server, "PROPFIND", "/_dav", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_proppatch_mixed_result() {
    let server = setup();
    req(&server, "PUT", "/p.txt", &[], "x").await;

    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:x">
        <D:set><D:prop><Z:color>red</Z:color></D:prop></D:set>
        <D:remove><D:prop><Z:absent/></D:prop></D:remove>
    </D:propertyupdate>"#;
    let resp = req(&server, "PROPPATCH", "/p.txt", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let body = text(&resp);
    assert_eq!(body.matches("<D:response>").count(), 1);
    assert!(body.contains("HTTP/1.1 200 OK"));
    assert!(body.contains("HTTP/1.1 404 Not Found"));
    assert!(body.contains("Z:color"));
    assert!(body.contains("Z:absent"));

    // the set value is served back on PROPFIND.
    let pf = r#"<D:propfind xmlns:D="DAV:"><D:prop><Z:color xmlns:Z="urn:x"/></D:prop></D:propfind>"#;
    let resp = req(&server, "PROPFIND", "/p.txt", &[("depth", "0")], pf).await;
    assert!(text(&resp).contains("<Z:color>red</Z:color>"));
}

#[tokio::test]
async fn test_brief_strips_not_found() {
    let server = setup();
    req(&server, "PUT", "/b.txt", &[], "x").await;
    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop><D:getetag/><Z:nope xmlns:Z="urn:x"/></D:prop></D:propfind>"#;

    let resp = req(&server, "PROPFIND", "/b.txt", &[("depth", "0"), ("brief", "t")], body).await;
    let out = text(&resp);
    assert!(out.contains("<D:getetag>"));
    assert!(!out.contains("404 Not Found"));

    let resp = req(
        &server,
        "PROPFIND",
        "/b.txt",
        &[("depth", "0"), ("prefer", "return=minimal")],
        body,
    )
    .await;
    assert_eq!(header(&resp, "preference-applied"), "return=minimal");
    assert!(!text(&resp).contains("404 Not Found"));
}

#[tokio::test]
async fn test_lock_props_synthesized() {
    let server = setup();
    req(&server, "PUT", "/lp.txt", &[], "x").await;
    let body = r#"<D:propfind xmlns:D="DAV:"><D:prop><D:supportedlock/><D:lockdiscovery/></D:prop></D:propfind>"#;
    let resp = req(&server, "PROPFIND", "/lp.txt", &[("depth", "0")], body).await;
    let out = text(&resp);
    assert!(out.contains("<D:lockentry>"));
    assert!(out.contains("<D:exclusive>"));
    assert!(out.contains("<D:lockdiscovery>"));
    assert!(!out.contains("404 Not Found"));
}

#[tokio::test]
async fn test_get_prefer_minimal() {
    let server = setup();
    req(&server, "PUT", "/g.txt", &[], "payload").await;
    let resp = req(&server, "GET", "/g.txt", &[("prefer", "return=minimal")], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(resp.headers().get("content-length").is_none());
    assert_eq!(header(&resp, "preference-applied"), "return=minimal");
    assert!(resp.body().is_empty());
}

#[tokio::test]
async fn test_options_headers() {
    let server = setup();
    let resp = req(&server, "OPTIONS", "/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "dav"), "1,2");
    assert_eq!(header(&resp, "ms-author-via"), "DAV");
    let allow = header(&resp, "allow");
    assert!(allow.contains("PROPFIND"));
    assert!(allow.contains("ORDERPATCH"));
    assert!(!allow.contains("MKCALENDAR"));
}

#[tokio::test]
async fn test_search_by_name() {
    let server = setup();
    req(&server, "MKCOL", "/docs", &[], "").await;
    req(&server, "PUT", "/docs/Report-Final.txt", &[], "a").await;
    req(&server, "PUT", "/docs/notes.md", &[], "b").await;

    let body = r#"<D:searchrequest xmlns:D="DAV:"><D:contains>report</D:contains></D:searchrequest>"#;
    let resp = req(&server, "SEARCH", "/", &[], body).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    let out = text(&resp);
    assert!(out.contains("Report-Final.txt"));
    assert!(!out.contains("notes.md"));
}

#[tokio::test]
async fn test_acl_deny() {
    let server = setup();
    let body = r#"<D:propertyupdate xmlns:D="DAV:" xmlns:Z="urn:x"><D:set><D:prop><Z:acl-deny-PUT>true</Z:acl-deny-PUT></D:prop></D:set></D:propertyupdate>"#;
    req(&server, "PROPPATCH", "/", &[], body).await;

    let resp = req(&server, "PUT", "/denied.txt", &[], "x").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = req(&server, "MKCOL", "/allowed", &[], "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_report_is_bad_request() {
    let server = setup();
    req(&server, "PUT", "/r.txt", &[], "x").await;
    let resp = req(&server, "REPORT", "/r.txt", &[], "<D:who-knows xmlns:D=\"DAV:\"/>").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_content_range_unsupported() {
    let server = setup();
    let resp = req(&server, "PUT", "/cr.txt", &[("content-range", "bytes 0-4/10")], "xxxxx").await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_mkcol_edge_cases() {
    let server = setup();

    let resp = req(&server, "MKCOL", "/", &[], "").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = req(&server, "MKCOL", "/no/parent", &[], "").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    req(&server, "MKCOL", "/dir", &[], "").await;
    let resp = req(&server, "MKCOL", "/dir", &[], "").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = req(&server, "MKCOL", "/plain", &[("content-type", "text/plain")], "not xml").await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // extended mkcol stores its props.
    let body = r#"<D:mkcol xmlns:D="DAV:" xmlns:Z="urn:x"><D:set><D:prop><Z:kind>photos</Z:kind></D:prop></D:set></D:mkcol>"#;
    let resp = req(&server, "MKCOL", "/ext", &[("content-type", "application/xml")], body).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let pf = r#"<D:propfind xmlns:D="DAV:"><D:prop><Z:kind xmlns:Z="urn:x"/></D:prop></D:propfind>"#;
    let resp = req(&server, "PROPFIND", "/ext", &[("depth", "0")], pf).await;
    assert!(text(&resp).contains("<Z:kind>photos</Z:kind>"));
}

#[tokio::test]
async fn test_bind_unbind_rebind() {
    let server = setup();
    req(&server, "PUT", "/orig.txt", &[], "bound-data").await;

    let resp = req(&server, "BIND", "/bound.txt", &[("source", "/orig.txt")], "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = req(&server, "GET", "/bound.txt", &[], "").await;
    assert_eq!(text(&resp), "bound-data");

    let resp = req(&server, "UNBIND", "/bound.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = req(&server, "GET", "/bound.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = req(&server, "REBIND", "/orig.txt", &[("destination", "/moved.txt")], "").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = req(&server, "GET", "/moved.txt", &[], "").await;
    assert_eq!(text(&resp), "bound-data");
    let resp = req(&server, "GET", "/orig.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_etag_precondition_on_put() {
    let server = setup();
    req(&server, "PUT", "/if.txt", &[], "abc").await;
    let resp = req(&server, "GET", "/if.txt", &[], "").await;
    let etag = header(&resp, "etag").to_string();

    let good = format!("([{}])", etag);
    let resp = req(&server, "PUT", "/if.txt", &[("if", &good)], "abcd").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "PUT", "/if.txt", &[("if", "([W/\"0-0\"])")], "x").await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_delete_missing_is_404() {
    let server = setup();
    let resp = req(&server, "DELETE", "/ghost", &[], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_strip_prefix_roundtrip() {
    let server = DavHandler::builder()
        .filesystem(MemFs::new())
        .strip_prefix("/dav")
        .build_handler();

    let resp = req(&server, "PUT", "/dav/a.txt", &[], "abc").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = req(&server, "PROPFIND", "/dav/a.txt", &[("depth", "0")], "").await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);
    assert!(text(&resp).contains("<D:href>/dav/a.txt</D:href>"));

    // outside the prefix nothing resolves.
    let resp = req(&server, "GET", "/other/a.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

mod auth {
    use dav_engine::body::Body;
    use dav_engine::hooks::{DavHooks, HookRequest, HookShortCircuit};
    use futures_util::future::FutureExt;
    use http::{Response, StatusCode};

    #[derive(Debug, Clone)]
    pub struct BasicGate;

    impl DavHooks for BasicGate {
        fn authorize<'a>(&'a self, req: &'a HookRequest) -> HookShortCircuit<'a> {
            async move {
                if req.header("authorization").is_some() {
                    return None;
                }
                let mut resp = Response::new(Body::empty());
                *resp.status_mut() = StatusCode::UNAUTHORIZED;
                resp.headers_mut()
                    .insert("www-authenticate", "Basic realm=\"dav\"".parse().unwrap());
                Some(resp)
            }
            .boxed()
        }
    }
}

#[tokio::test]
async fn test_authorize_hook() {
    let server = DavHandler::builder()
        .filesystem(MemFs::new())
        .hooks(Box::new(auth::BasicGate))
        .build_handler();

    let resp = req(&server, "GET", "/x.txt", &[], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(header(&resp, "www-authenticate").starts_with("Basic"));

    // with credentials the canonical path runs (and 404s for a missing file).
    let resp = req(&server, "GET", "/x.txt", &[("authorization", "Basic Zm9vOmJhcg==")], "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
