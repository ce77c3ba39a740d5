//
// This module contains the main entry point of the library, DavHandler.
//
use std::sync::Arc;

use bytes::Bytes;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::acl::acl_allows;
use crate::body::Body;
use crate::compat::CompatHooks;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::dialect::{DialectPolicy, DialectSet};
use crate::fs::PersistAdapter;
use crate::handle_caldav::CalDavHooks;
use crate::hooks::{DavHooks, HookChain, HookRequest};
use crate::ignore::IgnoreFilter;
use crate::statestore::DavStateStore;
use crate::util::{dav_method, DavMethod, DavMethodSet};
use crate::DavResult;

/// The webdav handler struct.
///
/// Use `DavHandler::builder()` to configure one; the handler itself is
/// cheap to clone and share across request tasks.
#[derive(Clone)]
pub struct DavHandler {
    inner: Arc<DavInner>,
}

/// Configuration builder for [`DavHandler`].
#[derive(Default)]
pub struct DavConfig {
    prefix:          Option<String>,
    fs:              Option<Box<dyn PersistAdapter>>,
    allow:           Option<DavMethodSet>,
    hooks:           Vec<Box<dyn DavHooks>>,
    dialects:        Option<Vec<Box<dyn DialectPolicy>>>,
    ignore_patterns: Vec<String>,
    caldav:          bool,
}

impl DavConfig {
    pub fn new() -> DavConfig {
        DavConfig::default()
    }

    /// Prefix to be stripped off when handling requests, and re-attached
    /// when rendering hrefs.
    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the storage backend.
    pub fn filesystem(mut self, fs: Box<dyn PersistAdapter>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Which methods to allow (default is all methods).
    pub fn allow_methods(mut self, allow: DavMethodSet) -> Self {
        self.allow = Some(allow);
        self
    }

    /// Add a lifecycle hook. Hooks run in registration order, ahead of the
    /// built-in CalDAV and compat layers.
    pub fn hooks(mut self, hooks: Box<dyn DavHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    /// Replace the built-in dialect policy set. May be called repeatedly
    /// to add more policies.
    pub fn dialect(mut self, policy: Box<dyn DialectPolicy>) -> Self {
        self.dialects.get_or_insert_with(Vec::new).push(policy);
        self
    }

    /// Extra ignore globs on top of the built-in OS-metadata set.
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Enable the CalDAV subsystem (MKCALENDAR, calendar REPORTs,
    /// property injection).
    pub fn caldav(mut self, enable: bool) -> Self {
        self.caldav = enable;
        self
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build_handler(self) -> DavHandler {
        let fs = self.fs.expect("no filesystem configured");
        let prefix = self.prefix.unwrap_or_default();
        let store = DavStateStore::new(fs.clone());
        let ignore = IgnoreFilter::new(&self.ignore_patterns);

        let mut hooks = HookChain::default();
        for h in self.hooks {
            hooks.push(h);
        }
        if self.caldav {
            hooks.push(Box::new(CalDavHooks::new(
                fs.clone(),
                store.clone(),
                ignore.clone(),
                prefix.clone(),
            )));
        }
        hooks.push(Box::new(CompatHooks));

        let dialects = match self.dialects {
            Some(policies) => DialectSet::new(policies),
            None => DialectSet::builtin(),
        };

        DavHandler {
            inner: Arc::new(DavInner {
                prefix,
                fs,
                store,
                ignore,
                hooks,
                dialects,
                allow: self.allow.unwrap_or_default(),
                caldav: self.caldav,
            }),
        }
    }
}

impl DavHandler {
    /// Return a configuration builder.
    pub fn builder() -> DavConfig {
        DavConfig::new()
    }

    /// Handle a webdav request. The body must be fully collected by the
    /// transport; the response body is fully buffered.
    pub async fn handle(&self, req: Request<Bytes>) -> Response<Body> {
        self.inner.handle(req).await
    }
}

// The actual inner struct, shared by all clones of the handler.
pub(crate) struct DavInner {
    pub prefix:   String,
    pub fs:       Box<dyn PersistAdapter>,
    pub store:    DavStateStore,
    pub ignore:   IgnoreFilter,
    pub hooks:    HookChain,
    pub dialects: DialectSet,
    pub allow:    DavMethodSet,
    pub caldav:   bool,
}

impl DavInner {
    async fn handle(&self, req: Request<Bytes>) -> Response<Body> {
        let mut resp = match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result OK");
                resp
            },
            Err(err) => {
                debug!("== END REQUEST result {:?}", err);
                let mut resp = Response::new(Body::empty());
                *resp.status_mut() = err.statuscode();
                resp.headers_mut().insert("content-length", "0".parse().unwrap());
                resp
            },
        };
        self.add_default_headers(&mut resp);
        resp
    }

    // headers present on every response; hooks may already have set or
    // extended them.
    fn add_default_headers(&self, resp: &mut Response<Body>) {
        if !resp.headers().contains_key("dav") {
            resp.headers_mut().insert("dav", "1,2".parse().unwrap());
        }
        if !resp.headers().contains_key("ms-author-via") {
            resp.headers_mut().insert("ms-author-via", "DAV".parse().unwrap());
        }
        if !resp.headers().contains_key("allow") {
            resp.headers_mut().insert("allow", self.allow_value().parse().unwrap());
        }
    }

    async fn handle2(&self, req: Request<Bytes>) -> DavResult<Response<Body>> {
        let (parts, body) = req.into_parts();

        // debug when running the webdav litmus tests.
        if log_enabled!(log::Level::Debug) {
            if let Some(t) = parts.headers.typed_get::<davheaders::XLitmus>() {
                debug!("X-Litmus: {:?}", t);
            }
        }

        // translate HTTP method to Webdav method.
        let method = match dav_method(&parts.method) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", parts.method, parts.uri);
                return Err(e);
            },
        };

        // see if the method is allowed.
        if !self.allow.contains(method) || (method == DavMethod::MkCalendar && !self.caldav) {
            debug!("method {} not allowed on request {}", parts.method, parts.uri);
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        // make sure the request path is valid.
        let path = DavPath::from_request_path(parts.uri.path(), &self.prefix)?;

        debug!("== START REQUEST {:?} {}", method, path);

        let req = HookRequest {
            method,
            path,
            headers: parts.headers,
            body,
            prefix: self.prefix.clone(),
        };

        // guard pipeline: authorize, ignore, acl; then the handlers apply
        // lock/precondition/dialect checks themselves.
        if let Some(resp) = self.hooks.authorize(&req).await {
            return Ok(resp);
        }
        if method != DavMethod::Options {
            if self.ignore.hides(&req.path) {
                return Err(StatusCode::NOT_FOUND.into());
            }
            if !acl_allows(&self.store, &req.path, method).await {
                return Err(StatusCode::FORBIDDEN.into());
            }
        }

        match method {
            DavMethod::Options => {
                let resp = self.handle_options(&req).await?;
                Ok(self.hooks.after_options(&req, resp).await)
            },
            DavMethod::Head | DavMethod::Get => {
                if let Some(resp) = self.hooks.before_get(&req).await {
                    return Ok(self.hooks.after_get(&req, resp).await);
                }
                let resp = self.handle_get(&req, method == DavMethod::Head).await?;
                Ok(self.hooks.after_get(&req, resp).await)
            },
            DavMethod::Put => self.handle_put(&req).await,
            DavMethod::Delete | DavMethod::Unbind => self.handle_delete(&req).await,
            DavMethod::MkCol | DavMethod::MkCalendar => {
                let resp = self.handle_mkcol(&req, method == DavMethod::MkCalendar).await?;
                self.hooks.after_mkcol(&req).await;
                Ok(resp)
            },
            DavMethod::Copy | DavMethod::Move | DavMethod::Bind | DavMethod::Rebind => {
                self.handle_copymove(&req).await
            },
            DavMethod::Lock => self.handle_lock(&req).await,
            DavMethod::Unlock => self.handle_unlock(&req).await,
            DavMethod::PropFind => {
                if let Some(resp) = self.hooks.before_propfind(&req).await {
                    return Ok(self.hooks.after_propfind(&req, resp).await);
                }
                let resp = self.handle_propfind(&req).await?;
                Ok(self.hooks.after_propfind(&req, resp).await)
            },
            DavMethod::PropPatch => self.handle_proppatch(&req).await,
            DavMethod::Report => {
                if let Some(resp) = self.hooks.before_report(&req).await {
                    return Ok(resp);
                }
                self.handle_report(&req).await
            },
            DavMethod::Search => self.handle_search(&req).await,
            DavMethod::OrderPatch => self.handle_orderpatch(&req).await,
        }
    }
}
