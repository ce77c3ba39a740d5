//! Client dialect policies.
//!
//! Well-known WebDAV clients bend the protocol in well-known ways; a
//! `DialectPolicy` decides, per request, whether a strict check may be
//! relaxed. Policies compose with OR semantics: the first policy that
//! answers true wins, otherwise the strict default stands.

use dyn_clone::DynClone;
use http::HeaderMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::davpath::DavPath;
use crate::util::DavMethod;

lazy_static! {
    static ref UA_FINDER: Regex = Regex::new(r"WebDAVFS|CFNetwork|Darwin").unwrap();
    static ref UA_WINDOWS: Regex = Regex::new(r"Microsoft-WebDAV-MiniRedir|DavClnt").unwrap();
    static ref UA_GVFS: Regex = Regex::new(r"gvfs|gio/|gnome-vfs|cadaver|davfs2").unwrap();
    static ref UA_OFFICE: Regex = Regex::new(r"Microsoft Office").unwrap();
}

/// Request facts a policy may look at.
#[derive(Debug, Clone, Copy)]
pub struct DialectCtx<'a> {
    pub method:     DavMethod,
    pub path:       &'a DavPath,
    pub user_agent: &'a str,
    pub headers:    &'a HeaderMap,
}

impl<'a> DialectCtx<'a> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[allow(unused_variables)]
pub trait DialectPolicy: std::fmt::Debug + Send + Sync + DynClone {
    /// May a directory MOVE/COPY proceed although `Depth: infinity` is
    /// missing? `default_ok` is the strict verdict.
    fn depth_ok_for_dir_ops(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        default_ok
    }

    /// May a PROPPATCH proceed although no valid lock token was submitted?
    fn lock_ok_for_proppatch(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        default_ok
    }
}

dyn_clone::clone_trait_object!(DialectPolicy);

/// Always defers to the strict check.
#[derive(Debug, Clone)]
pub struct Strict;

impl DialectPolicy for Strict {}

/// macOS Finder (WebDAVFS / CFNetwork / Darwin) sends directory MOVEs
/// without a Depth header.
#[derive(Debug, Clone)]
pub struct Finder;

impl DialectPolicy for Finder {
    fn depth_ok_for_dir_ops(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        default_ok || UA_FINDER.is_match(ctx.user_agent)
    }
}

/// Windows WebDAV redirector.
#[derive(Debug, Clone)]
pub struct WindowsRedirector;

impl DialectPolicy for WindowsRedirector {
    fn depth_ok_for_dir_ops(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        default_ok || UA_WINDOWS.is_match(ctx.user_agent)
    }
}

/// gvfs/gio, gnome-vfs, cadaver, davfs2.
#[derive(Debug, Clone)]
pub struct LinuxGvfs;

impl DialectPolicy for LinuxGvfs {
    fn depth_ok_for_dir_ops(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        default_ok || UA_GVFS.is_match(ctx.user_agent)
    }
}

/// Microsoft Office saves through PROPPATCH without re-sending the lock
/// token it holds.
#[derive(Debug, Clone)]
pub struct Office;

impl DialectPolicy for Office {
    fn lock_ok_for_proppatch(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        default_ok || UA_OFFICE.is_match(ctx.user_agent)
    }
}

/// OR-composition over an ordered policy list.
#[derive(Debug, Clone)]
pub(crate) struct DialectSet {
    policies: Vec<Box<dyn DialectPolicy>>,
}

impl DialectSet {
    pub fn new(policies: Vec<Box<dyn DialectPolicy>>) -> DialectSet {
        DialectSet { policies }
    }

    /// All built-in policies.
    pub fn builtin() -> DialectSet {
        DialectSet::new(vec![
            Box::new(Strict),
            Box::new(Finder),
            Box::new(WindowsRedirector),
            Box::new(LinuxGvfs),
            Box::new(Office),
        ])
    }

    pub fn push(&mut self, policy: Box<dyn DialectPolicy>) {
        self.policies.push(policy);
    }

    pub fn depth_ok_for_dir_ops(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        for p in &self.policies {
            if p.depth_ok_for_dir_ops(ctx, default_ok) {
                return true;
            }
        }
        default_ok
    }

    pub fn lock_ok_for_proppatch(&self, ctx: &DialectCtx<'_>, default_ok: bool) -> bool {
        for p in &self.policies {
            if p.lock_ok_for_proppatch(ctx, default_ok) {
                return true;
            }
        }
        default_ok
    }
}

impl Default for DialectSet {
    fn default() -> Self {
        DialectSet::builtin()
    }
}
