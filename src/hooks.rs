//! Lifecycle hook framework.
//!
//! Hooks let auth, client-compat and CalDAV behavior layer over the core
//! without intruding on it. Before-hooks short-circuit on the first one
//! that produces a response; after-hooks fold over the running response in
//! registration order. Hook implementations are expected to swallow their
//! own backend failures so the canonical handler path still runs.

use bytes::Bytes;
use dyn_clone::DynClone;
use futures_util::future::{ready, BoxFuture, FutureExt};
use http::{HeaderMap, Response};

use crate::body::Body;
use crate::davpath::DavPath;
use crate::util::DavMethod;

/// Read-only view of the request handed to hooks.
#[derive(Debug, Clone)]
pub struct HookRequest {
    pub method:  DavMethod,
    pub path:    DavPath,
    pub headers: HeaderMap,
    /// Collected request body (empty for body-less methods).
    pub body:    Bytes,
    pub prefix:  String,
}

impl HookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }
}

/// Mutable PUT payload; `beforePut` hooks may rewrite body and content type.
#[derive(Debug, Clone)]
pub struct PutPayload {
    pub data:         Bytes,
    pub content_type: Option<String>,
}

pub type HookShortCircuit<'a> = BoxFuture<'a, Option<Response<Body>>>;
pub type HookTransform<'a> = BoxFuture<'a, Response<Body>>;

/// Per-method lifecycle hooks. Every method has a no-op default.
#[allow(unused_variables)]
pub trait DavHooks: std::fmt::Debug + Send + Sync + DynClone {
    /// May refuse the request with 401/403 before anything else runs.
    fn authorize<'a>(&'a self, req: &'a HookRequest) -> HookShortCircuit<'a> {
        ready(None).boxed()
    }

    fn before_get<'a>(&'a self, req: &'a HookRequest) -> HookShortCircuit<'a> {
        ready(None).boxed()
    }

    fn before_propfind<'a>(&'a self, req: &'a HookRequest) -> HookShortCircuit<'a> {
        ready(None).boxed()
    }

    fn before_put<'a>(&'a self, req: &'a HookRequest, payload: &'a mut PutPayload) -> HookShortCircuit<'a> {
        ready(None).boxed()
    }

    fn before_report<'a>(&'a self, req: &'a HookRequest) -> HookShortCircuit<'a> {
        ready(None).boxed()
    }

    fn after_options<'a>(&'a self, req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        ready(resp).boxed()
    }

    fn after_get<'a>(&'a self, req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        ready(resp).boxed()
    }

    fn after_propfind<'a>(&'a self, req: &'a HookRequest, resp: Response<Body>) -> HookTransform<'a> {
        ready(resp).boxed()
    }

    fn after_mkcol<'a>(&'a self, req: &'a HookRequest) -> BoxFuture<'a, ()> {
        ready(()).boxed()
    }
}

dyn_clone::clone_trait_object!(DavHooks);

/// Ordered hook composition: first-Some for before-hooks, fold for
/// after-hooks.
#[derive(Debug, Clone, Default)]
pub(crate) struct HookChain {
    hooks: Vec<Box<dyn DavHooks>>,
}

impl HookChain {
    pub fn push(&mut self, hook: Box<dyn DavHooks>) {
        self.hooks.push(hook);
    }

    pub async fn authorize(&self, req: &HookRequest) -> Option<Response<Body>> {
        for h in &self.hooks {
            if let Some(resp) = h.authorize(req).await {
                return Some(resp);
            }
        }
        None
    }

    pub async fn before_get(&self, req: &HookRequest) -> Option<Response<Body>> {
        for h in &self.hooks {
            if let Some(resp) = h.before_get(req).await {
                return Some(resp);
            }
        }
        None
    }

    pub async fn before_propfind(&self, req: &HookRequest) -> Option<Response<Body>> {
        for h in &self.hooks {
            if let Some(resp) = h.before_propfind(req).await {
                return Some(resp);
            }
        }
        None
    }

    pub async fn before_put(&self, req: &HookRequest, payload: &mut PutPayload) -> Option<Response<Body>> {
        for h in &self.hooks {
            if let Some(resp) = h.before_put(req, payload).await {
                return Some(resp);
            }
        }
        None
    }

    pub async fn before_report(&self, req: &HookRequest) -> Option<Response<Body>> {
        for h in &self.hooks {
            if let Some(resp) = h.before_report(req).await {
                return Some(resp);
            }
        }
        None
    }

    pub async fn after_options(&self, req: &HookRequest, mut resp: Response<Body>) -> Response<Body> {
        for h in &self.hooks {
            resp = h.after_options(req, resp).await;
        }
        resp
    }

    pub async fn after_get(&self, req: &HookRequest, mut resp: Response<Body>) -> Response<Body> {
        for h in &self.hooks {
            resp = h.after_get(req, resp).await;
        }
        resp
    }

    pub async fn after_propfind(&self, req: &HookRequest, mut resp: Response<Body>) -> Response<Body> {
        for h in &self.hooks {
            resp = h.after_propfind(req, resp).await;
        }
        resp
    }

    pub async fn after_mkcol(&self, req: &HookRequest) {
        for h in &self.hooks {
            h.after_mkcol(req).await;
        }
    }
}
